//! Global constants used throughout the cmtkit codebase.
//!
//! File names, CMT conventions and default timeouts that several modules
//! agree on live here.

use std::time::Duration;

/// Number of spaces `cmt show uses` adds per nesting level.
pub const INDENT_STEP: usize = 2;

/// Pseudo-projects reported by `cmt show projects` that are not part of the
/// dependency DAG.
pub const NOISE_PROJECTS: [&str; 2] = ["CMTHOME", "CMTUSERCONTEXT"];

/// Projects whose release aggregator does not follow the `<name>Release` pattern.
pub const RELEASE_PACKAGE_OVERRIDES: [(&str, &str); 3] = [
    ("LCGCMT", "LCG_Release"),
    ("dqm-common", "DQMCRelease"),
    ("tdaq-common", "TDAQCRelease"),
];

/// Suffix appended to a project name to form its release aggregator package.
pub const RELEASE_SUFFIX: &str = "Release";

/// Project whose dependency closure is probed by default.
pub const DEFAULT_TOP_PROJECT: &str = "AtlasOffline";

/// CMT metadata directory inside a package.
pub const CMT_DIR: &str = "cmt";

/// CMT requirements file name.
pub const CMT_REQUIREMENTS_FILE: &str = "requirements";

/// CMT version file name.
pub const CMT_VERSION_FILE: &str = "version.cmt";

/// Name of the CMT executable looked up in `PATH`.
pub const CMT_BINARY: &str = "cmt.exe";

/// Prefix of synthetic probe packages created by the client query.
pub const PROBE_PACKAGE_PREFIX: &str = "Dep";

/// Author line written into probe package requirements.
pub const PROBE_PACKAGE_AUTHOR: &str = "DependenciesViewer";

/// Version suffix written into the probe package `version.cmt`.
pub const PROBE_PACKAGE_VERSION_SUFFIX: &str = "00-00-00";

/// Default timeout for CMT and svn queries (5 minutes).
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(300);

/// Project name prefix dropped when labelling packages in a tag diff.
pub const PROJECT_LABEL_PREFIX: &str = "Atlas";

/// Environment key that routes build step output to the terminal.
pub const PKGBUILD_VERBOSE_ENV: &str = "PKGBUILD_VERBOSE";

/// Prefix of every per-package build artifact (`pkg-build-<name>`).
pub const PKG_BUILD_PREFIX: &str = "pkg-build-";

/// Width of the separator framing a dumped build log.
pub const LOG_FRAME_WIDTH: usize = 80;

/// Directory under the home directory holding cmtkit configuration.
pub const CONFIG_DIR_NAME: &str = ".cmtkit";

/// Global configuration file name.
pub const CONFIG_FILE_NAME: &str = "config.toml";
