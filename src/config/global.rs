//! Global configuration management for cmtkit.
//!
//! The user configuration lives in `~/.cmtkit/config.toml` (overridable with
//! the `CMTKIT_CONFIG_PATH` environment variable or `--config`). A missing file
//! means defaults.
//!
//! # File Format
//!
//! ```toml
//! # explicit CMT binary (default: cmt.exe from PATH)
//! cmt_bin = "/afs/cern.ch/sw/contrib/CMT/v1r25/Linux-x86_64/cmt.exe"
//!
//! # project whose closure is probed by `cmtkit clients`
//! top_project = "AtlasOffline"
//!
//! # timeout for CMT and svn queries, 0 disables it
//! command_timeout_secs = 300
//!
//! # install through relative symlinks into the install area
//! relocate = true
//!
//! svnroot = "svn+ssh://svn.cern.ch/reps/atlasoff"
//! test_area = "/home/user/testarea/17.2.0"
//!
//! [project_releases]
//! GAUDI = "GaudiRelease"
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

use crate::constants::{CONFIG_DIR_NAME, CONFIG_FILE_NAME, DEFAULT_COMMAND_TIMEOUT, DEFAULT_TOP_PROJECT};

/// Environment variable overriding the configuration file location.
pub const CONFIG_PATH_ENV: &str = "CMTKIT_CONFIG_PATH";

/// User-wide cmtkit settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    /// Explicit CMT executable; looked up in `PATH` when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cmt_bin: Option<PathBuf>,

    /// Project whose dependency closure the client query probes
    pub top_project: String,

    /// Timeout in seconds for CMT and svn queries (0 = none)
    pub command_timeout_secs: u64,

    /// Whether package builds relocate into the install area
    pub relocate: bool,

    /// Subversion root for tag discovery; `SVNROOT` when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub svnroot: Option<String>,

    /// Work area excluded from version queries; `TestArea` when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_area: Option<String>,

    /// Extra project → release package names
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub project_releases: BTreeMap<String, String>,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            cmt_bin: None,
            top_project: DEFAULT_TOP_PROJECT.to_string(),
            command_timeout_secs: DEFAULT_COMMAND_TIMEOUT.as_secs(),
            relocate: true,
            svnroot: None,
            test_area: None,
            project_releases: BTreeMap::new(),
        }
    }
}

impl GlobalConfig {
    /// Loads the configuration from `path`, or from the default location.
    ///
    /// A missing file yields the defaults.
    pub async fn load_with_optional(path: Option<PathBuf>) -> Result<Self> {
        let path = match path {
            Some(path) => path,
            None => Self::default_path()?,
        };
        if path.exists() {
            Self::load_from(&path).await
        } else {
            tracing::debug!(target: "cmt", "no configuration at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Loads the configuration from a specific file.
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read global config from {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse global config from {}", path.display()))
    }

    /// Writes the configuration to `path`, creating parent directories.
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize global config")?;

        fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write global config to {}", path.display()))
    }

    /// `$CMTKIT_CONFIG_PATH`, or `~/.cmtkit/config.toml`.
    pub fn default_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            return Ok(PathBuf::from(path));
        }
        let home = dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Unable to determine home directory"))?;
        Ok(home.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Query timeout, `None` when disabled.
    pub const fn command_timeout(&self) -> Option<Duration> {
        if self.command_timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.command_timeout_secs))
        }
    }

    /// The configured SVN root, falling back to `SVNROOT`.
    pub fn svnroot(&self) -> Option<String> {
        self.svnroot.clone().or_else(|| std::env::var("SVNROOT").ok())
    }

    /// The configured test area, falling back to `TestArea`.
    pub fn test_area(&self) -> Option<String> {
        self.test_area.clone().or_else(|| std::env::var("TestArea").ok())
    }
}
