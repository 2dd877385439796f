//! Command-line interface for cmtkit.
//!
//! # Available Commands
//!
//! ## Dependency inspection
//! - `clients` - packages using a given package
//! - `projects` - the project DAG, project dependencies, release packages
//! - `uses` - the dependency tree of a saved `cmt show uses` dump
//! - `tag-diff` - tag differences between two release trees
//!
//! ## Repository
//! - `checkout` - `cmt co` a package
//! - `latest-tag` - newest SVN tag of a package
//!
//! ## Builds
//! - `build` - run the generic package builder on a recipe
//!
//! # Global Options
//!
//! - `--verbose` - debug output
//! - `--quiet` - errors only
//! - `--config` - path to the configuration file
//! - `--cmt` - CMT executable to use
//!
//! # Example
//!
//! ```bash
//! cmtkit clients AthenaKernel --project AtlasEvent
//! cmtkit uses uses.cmt
//! cmtkit build numpy.toml --no-relocate
//! ```

mod build;
mod checkout;
mod clients;
pub mod common;
mod projects;
mod tag_diff;
mod uses;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crate::config::GlobalConfig;
use common::CommandContext;

/// cmtkit command line.
#[derive(Parser, Debug)]
#[command(
    name = "cmtkit",
    about = "CMT dependency inspector and generic package builder",
    version,
    long_about = "cmtkit reads the output of the CMT configuration management tool to answer \
                  dependency questions about a software release, and builds external packages \
                  into a shared install area."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only print errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Path to the configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// CMT executable (default: cmt.exe from PATH)
    #[arg(long, global = true, env = "CMT_BIN")]
    cmt: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the packages using a package
    Clients(clients::ClientsCommand),

    /// Show the project graph
    Projects(projects::ProjectsCommand),

    /// Print the dependency tree of a `cmt show uses` dump
    Uses(uses::UsesCommand),

    /// Build a package from a recipe
    Build(build::BuildCommand),

    /// Compare the package tags of two releases
    TagDiff(tag_diff::TagDiffCommand),

    /// Check a package out with `cmt co`
    Checkout(checkout::CheckoutCommand),

    /// Print the newest SVN tag of a package
    LatestTag(checkout::LatestTagCommand),
}

impl Cli {
    /// Log filter for the chosen verbosity; `RUST_LOG` wins when set.
    #[must_use]
    pub fn log_filter(&self) -> EnvFilter {
        if std::env::var("RUST_LOG").is_ok() {
            return EnvFilter::from_default_env();
        }
        let level = if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            "info"
        };
        EnvFilter::new(level)
    }

    /// Installs the tracing subscriber on stderr.
    pub fn init_logging(&self) {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(self.log_filter())
            .with_writer(std::io::stderr)
            .with_target(self.verbose)
            .without_time()
            .try_init();
    }

    /// Loads the configuration and runs the selected command.
    pub async fn execute(self) -> Result<()> {
        let mut config = GlobalConfig::load_with_optional(self.config).await?;
        if let Some(cmt) = self.cmt {
            config.cmt_bin = Some(cmt);
        }
        let ctx = CommandContext::new(config);

        match self.command {
            Commands::Clients(cmd) => cmd.execute(&ctx).await,
            Commands::Projects(cmd) => cmd.execute(&ctx).await,
            Commands::Uses(cmd) => cmd.execute(&ctx).await,
            Commands::Build(cmd) => cmd.execute(&ctx).await,
            Commands::TagDiff(cmd) => cmd.execute(&ctx).await,
            Commands::Checkout(cmd) => cmd.execute(&ctx).await,
            Commands::LatestTag(cmd) => cmd.execute(&ctx).await,
        }
    }
}
