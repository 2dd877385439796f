//! Wrapper around the CMT executable
//!
//! [`CmtWrapper`] runs CMT through a [`Shell`] and turns its text output into
//! typed data: the project graph (`show projects`), package versions
//! (`show versions`), macro values (`show macro_value`) and the client
//! queries implemented in [`clients`]. Results that depend only on the
//! environment are memoized per wrapper instance; a wrapper is meant to live
//! for one command invocation.
//!
//! Connecting validates the environment: a wrapper only exists when CMT
//! reports at least one project and the project graph has a single root.
//!
//! # Examples
//!
//! ```rust,no_run
//! use cmtkit::cmt::{CmtSettings, CmtWrapper};
//! use cmtkit::shell::LocalShell;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let cmt = CmtWrapper::connect(LocalShell::new()?, CmtSettings::default()).await?;
//! for project in cmt.projects_dag().await? {
//!     println!("{} {}", project.name(), project.version);
//! }
//! let clients = cmt.show_clients("AthenaKernel").await?;
//! println!("{} clients", clients.len());
//! # Ok(())
//! # }
//! ```

pub mod clients;
pub mod diff;
pub mod package;
pub mod projects;
pub mod uses;

pub use diff::{
    TagDiff, diff_package_dbs, discover_release_projects, harvest_release_uses, render_tag_diff,
};
pub use package::PackageRecord;
pub use projects::{ProjectGraph, ProjectRecord, project_release, project_release_with};
pub use uses::{DependencyGraph, DependencyNode, LineDecoder, PackageDb, PackageKind};

use anyhow::{Context, Result};
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, error, info, warn};

use crate::config::GlobalConfig;
use crate::constants::{
    CMT_BINARY, CMT_DIR, CMT_REQUIREMENTS_FILE, DEFAULT_COMMAND_TIMEOUT, DEFAULT_TOP_PROJECT,
};
use crate::core::CmtError;
use crate::shell::{Shell, ShellCommand};

/// Environment-level settings of a [`CmtWrapper`].
#[derive(Debug, Clone)]
pub struct CmtSettings {
    /// CMT executable; `cmt.exe` from `PATH` when `None`
    pub cmt_bin: Option<PathBuf>,
    /// Project whose closure the client query probes
    pub top_project: String,
    /// Timeout for each CMT or svn query
    pub command_timeout: Option<Duration>,
    /// Subversion root used for tag discovery
    pub svnroot: Option<String>,
    /// Work area ignored by version queries
    pub test_area: Option<String>,
    /// Extra project → release package names
    pub project_releases: BTreeMap<String, String>,
}

impl Default for CmtSettings {
    fn default() -> Self {
        Self {
            cmt_bin: None,
            top_project: DEFAULT_TOP_PROJECT.to_string(),
            command_timeout: Some(DEFAULT_COMMAND_TIMEOUT),
            svnroot: None,
            test_area: None,
            project_releases: BTreeMap::new(),
        }
    }
}

impl From<&GlobalConfig> for CmtSettings {
    fn from(config: &GlobalConfig) -> Self {
        Self {
            cmt_bin: config.cmt_bin.clone(),
            top_project: config.top_project.clone(),
            command_timeout: config.command_timeout(),
            svnroot: config.svnroot(),
            test_area: config.test_area(),
            project_releases: config.project_releases.clone(),
        }
    }
}

/// Typed access to a CMT environment.
pub struct CmtWrapper<S: Shell> {
    shell: S,
    bin: String,
    settings: CmtSettings,
    project_tree: OnceCell<ProjectGraph>,
    project_deps: DashMap<String, Vec<String>>,
    packages: DashMap<String, Option<PackageRecord>>,
    versions: DashMap<String, Option<String>>,
}

impl<S: Shell> CmtWrapper<S> {
    /// Locates CMT, loads the project graph and checks it is usable.
    ///
    /// # Errors
    ///
    /// [`CmtError::ToolNotFound`] when no CMT binary can be found,
    /// [`CmtError::NoProjects`] or [`CmtError::ProjectRootInconsistency`]
    /// when the environment is not a sound CMT setup.
    pub async fn connect(shell: S, settings: CmtSettings) -> Result<Self> {
        let bin = match &settings.cmt_bin {
            Some(bin) => bin.display().to_string(),
            None => which::which(CMT_BINARY)
                .map(|p| p.display().to_string())
                .map_err(|_| CmtError::ToolNotFound {
                    tool: CMT_BINARY.to_string(),
                })?,
        };
        debug!(target: "cmt", "using CMT binary [{}]", bin);

        let cmt = Self {
            shell,
            bin,
            settings,
            project_tree: OnceCell::new(),
            project_deps: DashMap::new(),
            packages: DashMap::new(),
            versions: DashMap::new(),
        };

        if cmt.projects().await?.is_empty() {
            return Err(CmtError::NoProjects.into());
        }
        if cmt.projects_dag().await?.is_empty() {
            return Err(CmtError::ProjectRootInconsistency {
                found: 0,
            }
            .into());
        }
        Ok(cmt)
    }

    /// The shell CMT runs in.
    pub const fn shell(&self) -> &S {
        &self.shell
    }

    /// The CMT executable.
    pub fn bin(&self) -> &str {
        &self.bin
    }

    /// The settings this wrapper was created with.
    pub const fn settings(&self) -> &CmtSettings {
        &self.settings
    }

    /// A CMT invocation with the query timeout applied.
    pub fn command<I, T>(&self, args: I) -> ShellCommand
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        ShellCommand::new(&self.bin).args(args).with_timeout(self.settings.command_timeout)
    }

    /// Runs `cmt show <args...>` in the shell directory and returns stdout.
    ///
    /// Standard error is discarded because CMT prints spurious errors there.
    /// A nonzero status is logged, the output is returned regardless.
    pub async fn show(&self, args: &[&str]) -> Result<String> {
        self.show_in(None, args).await
    }

    /// Like [`CmtWrapper::show`], running in `dir`.
    pub async fn show_in(&self, dir: Option<&Path>, args: &[&str]) -> Result<String> {
        let mut command = self.command(["show"]).args(args.iter().copied()).capture_stdout();
        if let Some(dir) = dir {
            command = command.current_dir(dir);
        }
        let output = self.shell.run(command).await?;
        if !output.success() {
            warn!(target: "cmt", "Problem during [{}]", output.command);
            warn!(target: "cmt", "{}", output.stdout);
        }
        Ok(output.stdout)
    }

    /// Value of a CMT macro, trimmed.
    pub async fn macro_value(&self, name: &str) -> Result<String> {
        Ok(self.show(&["macro_value", name]).await?.trim().to_string())
    }

    /// Value of a CMT macro as seen from the package in `dir`, trimmed.
    pub async fn macro_value_in(&self, dir: &Path, name: &str) -> Result<String> {
        Ok(self.show_in(Some(dir), &["macro_value", name]).await?.trim().to_string())
    }

    /// The project graph, parsed once per wrapper.
    pub async fn project_tree(&self) -> Result<&ProjectGraph> {
        self.project_tree
            .get_or_try_init(|| async {
                let listing = self.show(&["projects"]).await?;
                ProjectGraph::parse(&listing)
            })
            .await
    }

    /// Paths of all projects.
    pub async fn projects(&self) -> Result<Vec<String>> {
        Ok(self.project_tree().await?.paths())
    }

    /// All active projects in dependency order.
    pub async fn projects_dag(&self) -> Result<Vec<&ProjectRecord>> {
        self.project_tree().await?.projects_dag()
    }

    /// Projects transitively used by `name`.
    pub async fn project_deps(&self, name: &str) -> Result<Vec<String>> {
        if let Some(deps) = self.project_deps.get(name) {
            return Ok(deps.clone());
        }
        let deps = self.project_tree().await?.project_deps(name)?;
        self.project_deps.insert(name.to_string(), deps.clone());
        Ok(deps)
    }

    /// Release aggregator package of a project.
    pub fn project_release(&self, name: &str) -> String {
        project_release_with(name, &self.settings.project_releases)
    }

    /// Finds a package by leaf name in the `use` statements of the release
    /// packages, scanning projects in dependency order.
    pub async fn find_pkg(&self, name: &str) -> Result<Option<PackageRecord>> {
        if let Some(found) = self.packages.get(name) {
            return Ok(found.clone());
        }

        let mut found = None;
        for project in self.projects_dag().await? {
            let requirements = Path::new(&project.path)
                .join(self.project_release(project.name()))
                .join(CMT_DIR)
                .join(CMT_REQUIREMENTS_FILE);
            if !requirements.exists() {
                continue;
            }
            let content = tokio::fs::read_to_string(&requirements)
                .await
                .with_context(|| format!("Failed to read {}", requirements.display()))?;
            found = find_use_statement(&content, name);
            if found.is_some() {
                break;
            }
        }

        self.packages.insert(name.to_string(), found.clone());
        Ok(found)
    }

    /// Version of `full_name` in the current release.
    ///
    /// Lines of `cmt show versions` from the test area are skipped; the
    /// version is the second field of the first remaining line.
    pub async fn get_pkg_version(&self, full_name: &str) -> Result<Option<String>> {
        if let Some(version) = self.versions.get(full_name) {
            return Ok(version.clone());
        }

        let output = self.shell.run(self.command(["show", "versions", full_name])).await?;
        let test_area = self.settings.test_area.as_deref().filter(|t| !t.is_empty());
        let version = output
            .stdout
            .lines()
            .find(|line| test_area.is_none_or(|area| !line.contains(area)))
            .and_then(|line| line.split(' ').nth(1))
            .map(str::to_string);

        self.versions.insert(full_name.to_string(), version.clone());
        Ok(version)
    }

    /// Most recent SVN tag of `full_name`.
    ///
    /// `None` when no SVN root is configured, when `svn ls` fails, or when no
    /// tag follows the `<package>-xx-yy-zz` convention.
    pub async fn get_latest_pkg_tag(&self, full_name: &str) -> Result<Option<String>> {
        let Some(svnroot) = self.settings.svnroot.as_deref() else {
            error!(target: "cmt", "SVNROOT is not set.");
            return Ok(None);
        };
        let svnroot = svnroot.trim_end_matches('/');
        let url = if full_name.starts_with("Gaudi") {
            format!("{svnroot}/tags/{full_name}")
        } else {
            format!("{svnroot}/{full_name}/tags")
        };

        let command = ShellCommand::new("svn")
            .args(["ls", url.as_str()])
            .with_timeout(self.settings.command_timeout);
        let output = self.shell.run(command).await?;
        if output.stdout.lines().next().is_none() || !output.success() {
            return Ok(None);
        }

        let leaf = full_name.rsplit('/').next().unwrap_or(full_name);
        Ok(output
            .stdout
            .lines()
            .rfind(|tag| tag.starts_with(leaf))
            .map(|tag| tag.trim_end_matches(['/', '\n', ' ']).to_string()))
    }

    /// Checks `full_name` out of the repository with `cmt co`.
    ///
    /// Returns whether the checkout succeeded; a failure is only logged.
    pub async fn check_out(&self, full_name: &str, version: Option<&str>) -> Result<bool> {
        let mut command = self.command(["co"]);
        if let Some(version) = version {
            command = command.args(["-r", version]);
        }
        let command = command.arg(full_name).with_timeout(None);

        let output = self.shell.run(command).await?;
        if output.success() {
            info!(target: "cmt", "## {} [OK]", full_name);
            Ok(true)
        } else {
            warn!(target: "cmt", "Problem doing 'cmt co' !");
            warn!(target: "cmt", "Failed to issue [{}]", output.command);
            warn!(target: "cmt", "{}{}", output.stdout, output.stderr);
            Ok(false)
        }
    }
}

fn find_use_statement(requirements: &str, name: &str) -> Option<PackageRecord> {
    requirements
        .lines()
        .map(str::trim)
        .filter_map(|line| line.strip_prefix("use "))
        .map(|rest| rest.split_whitespace().collect::<Vec<_>>())
        .find_map(|fields| match fields.as_slice() {
            [n, version, path] if *n == name => Some(PackageRecord::new(*n, *version, *path)),
            [n, version] if *n == name => Some(PackageRecord::new(*n, *version, "")),
            _ => None,
        })
}
