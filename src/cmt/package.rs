//! Package identity as reported by CMT.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A CMT package: name, version and the path of its parent directory
/// relative to the project (e.g. `Control` for `Control/AthenaKernel`).
///
/// Deduplication uses [`PackageRecord::full_name`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackageRecord {
    /// Leaf package name
    pub name: String,
    /// Version tag, e.g. `AthenaKernel-00-55-12`
    pub version: String,
    /// Container path, empty for top-level packages
    pub path: String,
    /// Owning project label, filled in when harvesting release requirements
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
}

impl PackageRecord {
    /// Creates a record without project label.
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            path: path.into(),
            project: None,
        }
    }

    /// Sets the owning project label.
    #[must_use]
    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    /// `path/name`, or just `name` when the path is empty.
    pub fn full_name(&self) -> String {
        if self.path.is_empty() {
            self.name.clone()
        } else if self.path.ends_with('/') {
            format!("{}{}", self.path, self.name)
        } else {
            format!("{}/{}", self.path, self.name)
        }
    }
}

impl fmt::Display for PackageRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.full_name(), self.version)
    }
}
