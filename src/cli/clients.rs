//! List the packages using a package.

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use super::common::{CommandContext, print_json, print_packages};

/// Ask which packages of the release use a package.
#[derive(Args, Debug)]
pub struct ClientsCommand {
    /// Leaf name of the package
    package: String,

    /// Ask `cmt show clients` instead of building a probe package
    #[arg(long)]
    fast: bool,

    /// Top project of the query (default from configuration)
    #[arg(long, conflicts_with = "fast")]
    project: Option<String>,

    /// Output JSON
    #[arg(long)]
    json: bool,
}

impl ClientsCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let cmt = ctx.connect().await?;
        let clients = if self.fast {
            cmt.slow_show_clients(&self.package).await?
        } else {
            let top = self.project.as_deref().unwrap_or(&ctx.config.top_project);
            cmt.show_clients_of(&self.package, top).await?
        };

        if self.json {
            return print_json(&clients);
        }
        if clients.is_empty() {
            println!("No clients of {}", self.package.bold());
            return Ok(());
        }
        println!("{} ({} clients):", self.package.bold(), clients.len());
        print_packages(&clients);
        Ok(())
    }
}
