//! Package tag differences between two releases
//!
//! A release is summarized by the `use` statements of its projects' release
//! packages (`<Project>Release/cmt/requirements`). [`harvest_release_uses`]
//! collects them into one full-name keyed [`PackageDb`] and
//! [`diff_package_dbs`] lists every package whose tag differs or that only
//! one side has.

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use crate::cmt::package::PackageRecord;
use crate::cmt::projects::ProjectRecord;
use crate::cmt::uses::PackageDb;
use crate::constants::{CMT_DIR, CMT_REQUIREMENTS_FILE, PROJECT_LABEL_PREFIX, RELEASE_SUFFIX};

/// One row of a tag diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagDiff {
    /// Tag in the reference release, without the `<package>-` prefix
    pub ref_version: String,
    /// Project of the package in the reference release (`N/A` if unknown)
    pub ref_project: String,
    /// Tag in the checked release, without the `<package>-` prefix
    pub chk_version: String,
    /// Project of the package in the checked release (`N/A` if unknown)
    pub chk_project: String,
    /// Full package name
    pub full_name: String,
}

fn placeholder() -> PackageRecord {
    PackageRecord::new("None", "None-00-00-00", "-")
}

fn project_label(name: &str) -> String {
    name.strip_prefix(PROJECT_LABEL_PREFIX).unwrap_or(name).to_string()
}

/// The single `*Release/cmt/requirements` file of a project, if any.
fn release_requirements(project_path: &Path) -> Result<Option<PathBuf>> {
    let mut releases = Vec::new();
    let entries = std::fs::read_dir(project_path)
        .with_context(|| format!("Failed to list {}", project_path.display()))?;
    for entry in entries {
        let entry = entry?;
        if entry.file_name().to_string_lossy().ends_with(RELEASE_SUFFIX) {
            releases.push(entry.path());
        }
    }
    let [release] = releases.as_slice() else {
        return Ok(None);
    };
    let requirements = release.join(CMT_DIR).join(CMT_REQUIREMENTS_FILE);
    Ok(requirements.exists().then_some(requirements))
}

/// Collects the release `use` statements of every project.
///
/// Projects are read from the end of `dag` to its start, so a package listed
/// by several projects keeps the entry of the project closest to the top.
/// Each record is labelled with its project name, minus an `Atlas` prefix.
pub fn harvest_release_uses(dag: &[&ProjectRecord]) -> Result<PackageDb> {
    let mut db = PackageDb::new();
    for project in dag.iter().rev() {
        let Some(requirements) = release_requirements(Path::new(&project.path))? else {
            continue;
        };
        debug!(target: "cmt", "harvesting [{}]", requirements.display());
        let mut uses = PackageDb::from_requirements_file(&requirements)?;
        let label = project_label(project.name());
        for record in uses.records_mut() {
            record.project = Some(label.clone());
        }
        db.extend(uses);
    }
    Ok(db)
}

/// Projects found below `root`: every directory holding a `*Release` package
/// with a requirements file, in path order.
///
/// This stands in for a project DAG when two releases are compared from
/// their installation trees rather than from live CMT environments.
pub fn discover_release_projects(root: &Path) -> Result<Vec<ProjectRecord>> {
    let mut projects = Vec::new();
    for entry in WalkDir::new(root).min_depth(1).max_depth(4).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to walk {}", root.display()))?;
        if !entry.file_type().is_dir() {
            continue;
        }
        if release_requirements(entry.path())?.is_some() {
            let path = entry.path().display().to_string();
            let version = entry.file_name().to_string_lossy().to_string();
            projects.push(ProjectRecord::new(path, version));
        }
    }
    Ok(projects)
}

/// Lists the packages whose tags differ between `reference` and `check`,
/// sorted by full name. A package missing on one side is compared against
/// a `None-00-00-00` placeholder.
pub fn diff_package_dbs(reference: &PackageDb, check: &PackageDb) -> Vec<TagDiff> {
    let mut diffs: BTreeMap<String, (PackageRecord, PackageRecord)> = BTreeMap::new();

    for (key, ref_pkg) in reference.iter() {
        match check.get(key) {
            None => {
                diffs.insert(key.clone(), (ref_pkg.clone(), placeholder()));
            }
            Some(chk_pkg) if chk_pkg.version != ref_pkg.version => {
                diffs.insert(key.clone(), (ref_pkg.clone(), chk_pkg.clone()));
            }
            Some(_) => {}
        }
    }
    for (key, chk_pkg) in check.iter() {
        if !reference.contains(key) {
            diffs.insert(key.clone(), (placeholder(), chk_pkg.clone()));
        }
    }

    diffs
        .into_values()
        .map(|(ref_pkg, chk_pkg)| {
            let pkg = if ref_pkg.name == "None" {
                &chk_pkg
            } else {
                &ref_pkg
            };
            let prefix = format!("{}-", pkg.name);
            TagDiff {
                ref_version: ref_pkg.version.replace(&prefix, ""),
                ref_project: ref_pkg.project.clone().unwrap_or_else(|| "N/A".to_string()),
                chk_version: chk_pkg.version.replace(&prefix, ""),
                chk_project: chk_pkg.project.clone().unwrap_or_else(|| "N/A".to_string()),
                full_name: pkg.full_name(),
            }
        })
        .collect()
}

/// Renders a diff as a fixed-width table.
pub fn render_tag_diff(diffs: &[TagDiff]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<15} {:<15} | {:<15} {:<15} | {:<45}",
        "ref", "ref-project", "chk", "chk-project", "pkg-name"
    );
    let _ = writeln!(out, "{}", "-".repeat(120));
    for diff in diffs {
        let _ = writeln!(
            out,
            "{:<15} {:<15} | {:<15} {:<15} | {:<45}",
            diff.ref_version, diff.ref_project, diff.chk_version, diff.chk_project, diff.full_name
        );
    }
    let _ = writeln!(out, "{}", "-".repeat(120));
    let _ = write!(out, "::: found [{}] tags which are different", diffs.len());
    out
}
