//! Package build recipes
//!
//! A recipe is a small TOML file describing one external package:
//!
//! ```toml
//! [package]
//! name = "fftw"
//! version = "3.2.2"
//! flavor = "autotools"          # or "distutils"
//! # src = "%(pkg_root)s/src/%(pkg_name)s-%(pkg_ver)s.tar.bz2"
//! # root = ".."                 # defaults to the recipe directory
//! # install_dir = "..."
//! # installarea_dir = "..."
//!
//! [env]
//! PKGBUILD_VERBOSE = "1"        # step output to the terminal
//! ```
//!
//! Every `[package]` field ends up in the build environment as a `pkg_*`
//! template; `[env]` entries are added verbatim and may reference any key.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::env::BuildEnv;
use super::flavor::BuildFlavor;
use crate::core::CmtError;

/// Default source tarball location.
pub const DEFAULT_SRC: &str = "%(pkg_root)s/src/%(pkg_name)s-%(pkg_ver)s.tar.gz";
/// Default shared install area.
pub const DEFAULT_INSTALLAREA_DIR: &str = "%(CMTINSTALLAREA)s/%(CMTCONFIG)s";
/// Default staging install directory.
pub const DEFAULT_INSTALL_DIR: &str = "%(pkg_root)s/%(CMTCONFIG)s/pkg-build-install-%(pkg_name)s";

fn default_flavor() -> String {
    "autotools".to_string()
}

/// The `[package]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecipePackage {
    /// Package name
    pub name: String,
    /// Package version
    pub version: String,
    /// Source archive or directory template
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    /// Package root; relative paths are taken from the recipe directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,
    /// Staging install directory template
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_dir: Option<String>,
    /// Install area template
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installarea_dir: Option<String>,
    /// Build flavor name
    #[serde(default = "default_flavor")]
    pub flavor: String,
}

/// A parsed recipe file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Recipe {
    /// Package description
    pub package: RecipePackage,
    /// Extra build environment entries
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    /// File the recipe was read from
    #[serde(skip)]
    pub path: PathBuf,
}

impl Recipe {
    /// Reads and validates a recipe file.
    pub async fn load(path: &Path) -> Result<Self> {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read recipe {}", path.display()))?;
        Self::parse(&text, path)
    }

    /// Parses recipe text; `path` locates the recipe for defaults and errors.
    pub fn parse(text: &str, path: &Path) -> Result<Self> {
        let invalid = |reason: String| CmtError::RecipeInvalid {
            path: path.display().to_string(),
            reason,
        };

        let mut recipe: Self = toml::from_str(text).map_err(|e| invalid(e.to_string().trim().to_string()))?;
        recipe.path = path.to_path_buf();

        let name = &recipe.package.name;
        if name.is_empty() || name.contains(['/', '\\']) || name.contains(char::is_whitespace) {
            return Err(invalid(format!("invalid package name [{name}]")).into());
        }
        if recipe.package.version.trim().is_empty() {
            return Err(invalid("empty package version".to_string()).into());
        }
        if BuildFlavor::from_name(&recipe.package.flavor).is_none() {
            return Err(invalid(format!("unknown flavor [{}]", recipe.package.flavor)).into());
        }
        Ok(recipe)
    }

    /// The flavor the recipe asks for.
    pub fn flavor(&self) -> Result<BuildFlavor> {
        BuildFlavor::from_name(&self.package.flavor).ok_or_else(|| {
            CmtError::RecipeInvalid {
                path: self.path.display().to_string(),
                reason: format!("unknown flavor [{}]", self.package.flavor),
            }
            .into()
        })
    }

    /// Directory holding the recipe.
    pub fn dir(&self) -> PathBuf {
        self.path.parent().map(Path::to_path_buf).unwrap_or_default()
    }

    /// Package root: `root` resolved against the recipe directory, or the
    /// recipe directory itself.
    pub fn root(&self) -> PathBuf {
        match &self.package.root {
            Some(root) => self.dir().join(root),
            None => self.dir(),
        }
    }

    /// Writes the recipe into `env`: the `pkg_*` keys (with their defaults),
    /// then the `[env]` table.
    pub fn apply(&self, env: &mut BuildEnv) {
        env.insert("pkg_name", self.package.name.as_str());
        env.insert("pkg_ver", self.package.version.as_str());
        env.insert("pkg_root", self.root().display().to_string());
        env.insert("pkg_src", self.package.src.as_deref().unwrap_or(DEFAULT_SRC));
        env.insert(
            "pkg_installarea_dir",
            self.package.installarea_dir.as_deref().unwrap_or(DEFAULT_INSTALLAREA_DIR),
        );
        env.insert(
            "pkg_install_dir",
            self.package.install_dir.as_deref().unwrap_or(DEFAULT_INSTALL_DIR),
        );
        for (key, value) in &self.env {
            env.insert(key.as_str(), value.as_str());
        }
    }
}
