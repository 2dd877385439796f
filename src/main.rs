//! cmtkit CLI entry point
//!
//! Parses the command line, installs logging, runs the command and turns
//! any error into a user-facing message with a nonzero exit status.
//!
//! - `clients` - packages using a package
//! - `projects` - the project graph
//! - `uses` - dependency tree of a `cmt show uses` dump
//! - `tag-diff` - tag differences between two releases
//! - `checkout` / `latest-tag` - repository access
//! - `build` - package builder

use anyhow::Result;
use clap::Parser;
use cmtkit::cli;
use cmtkit::core::error::user_friendly_error;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    cli.init_logging();

    match cli.execute().await {
        Ok(()) => Ok(()),
        Err(e) => {
            let error_ctx = user_friendly_error(e);
            error_ctx.display();
            std::process::exit(1);
        }
    }
}
