//! Shared state for CLI commands

use anyhow::{Context, Result};
use colored::Colorize;
use serde::Serialize;

use crate::cmt::{CmtSettings, CmtWrapper, PackageRecord};
use crate::config::GlobalConfig;
use crate::shell::LocalShell;

/// Configuration every command runs with.
#[derive(Debug, Clone)]
pub struct CommandContext {
    /// Loaded global configuration with command-line overrides applied
    pub config: GlobalConfig,
}

impl CommandContext {
    /// Wraps a loaded configuration.
    pub const fn new(config: GlobalConfig) -> Self {
        Self {
            config,
        }
    }

    /// CMT settings derived from the configuration.
    pub fn settings(&self) -> CmtSettings {
        CmtSettings::from(&self.config)
    }

    /// Connects to CMT from the current directory.
    pub async fn connect(&self) -> Result<CmtWrapper<LocalShell>> {
        let shell = LocalShell::new()?;
        CmtWrapper::connect(shell, self.settings())
            .await
            .context("Failed to set up the CMT environment")
    }
}

/// Prints `value` as pretty JSON on stdout.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Prints packages one per line as `<full_name> (<version>)`.
pub fn print_packages(packages: &[PackageRecord]) {
    for pkg in packages {
        println!("  {} ({})", pkg.full_name().bold(), pkg.version.cyan());
    }
}
