//! Repository commands: `cmt co` and tag discovery.

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use super::common::CommandContext;
use crate::core::CmtError;

/// Check a package out with `cmt co`.
#[derive(Args, Debug)]
pub struct CheckoutCommand {
    /// Full package name, e.g. `Control/AthenaKernel`
    full_name: String,

    /// Tag to check out (default: the head)
    #[arg(short = 'r', long)]
    version: Option<String>,
}

impl CheckoutCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let cmt = ctx.connect().await?;
        if !cmt.check_out(&self.full_name, self.version.as_deref()).await? {
            return Err(CmtError::CheckoutFailed {
                package: self.full_name,
            }
            .into());
        }
        println!("{} {}", "Checked out".green(), self.full_name.bold());
        Ok(())
    }
}

/// Print the newest tag of a package.
#[derive(Args, Debug)]
pub struct LatestTagCommand {
    /// Full package name, e.g. `Control/AthenaKernel`
    full_name: String,
}

impl LatestTagCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let cmt = ctx.connect().await?;
        match cmt.get_latest_pkg_tag(&self.full_name).await? {
            Some(tag) => {
                println!("{tag}");
                Ok(())
            }
            None => Err(CmtError::NoTagFound {
                package: self.full_name,
            }
            .into()),
        }
    }
}
