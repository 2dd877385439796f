//! Build a package from a recipe.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;
use tracing::warn;

use super::common::CommandContext;
use crate::core::CmtError;
use crate::pkgbuild::{BuildEnv, BuildFlavor, BuildOptions, BuildOutcome, build_package};
use crate::shell::LocalShell;

/// Run the package builder on a recipe file.
///
/// The CMT environment is optional: when CMT cannot be reached the build
/// runs with the recipe and the process environment only.
#[derive(Args, Debug)]
pub struct BuildCommand {
    /// Recipe file (`pkgbuild.toml`)
    recipe: PathBuf,

    /// Keep the staged install in place instead of linking it into the install area
    #[arg(long)]
    no_relocate: bool,

    /// Build flavor overriding the recipe's (autotools, distutils)
    #[arg(long)]
    flavor: Option<String>,
}

impl BuildCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let flavor = match self.flavor.as_deref() {
            Some(name) => Some(BuildFlavor::from_name(name).ok_or_else(|| CmtError::ConfigError {
                message: format!("unknown build flavor [{name}]"),
            })?),
            None => None,
        };
        let options = BuildOptions {
            relocate: ctx.config.relocate && !self.no_relocate,
            flavor,
        };

        let cmt = match ctx.connect().await {
            Ok(cmt) => Some(cmt),
            Err(e) => {
                warn!(target: "pkgbuild", "building without CMT environment: {:#}", e);
                None
            }
        };

        let shell = LocalShell::new()?;
        let outcome =
            build_package(&shell, &self.recipe, BuildEnv::from_process(), cmt.as_ref(), options)
                .await?;
        match outcome {
            BuildOutcome::Built => println!("{} {}", "Built".green().bold(), self.recipe.display()),
            BuildOutcome::AlreadyBuilt => {
                println!("{} {}", "Already built".yellow(), self.recipe.display());
            }
        }
        Ok(())
    }
}
