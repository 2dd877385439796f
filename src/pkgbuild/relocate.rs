//! Relocation of an install tree into a shared install area
//!
//! Every file of the staging tree is exposed at the same relative location
//! under the install area through a *relative* symbolic link, so moving the
//! directory holding both trees keeps every link valid.
//!
//! Relocation is best effort: a file that cannot be linked is logged and
//! skipped.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, error};
use walkdir::WalkDir;

use crate::shell::Shell;
use crate::utils::fs::relative_path;

/// What a relocation pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelocationReport {
    /// Links created under the install area
    pub linked: Vec<PathBuf>,
    /// Staging files that could not be linked
    pub failed: Vec<PathBuf>,
}

/// Links every file below `dest_dir` into `installarea_dir`.
///
/// Existing entries at a link location are replaced. Only an unreadable
/// `dest_dir` is an error; per-file problems end up in
/// [`RelocationReport::failed`].
pub fn relocate<S: Shell>(
    shell: &S,
    dest_dir: &Path,
    installarea_dir: &Path,
) -> Result<RelocationReport> {
    let dest_dir = shell.resolve(dest_dir);
    let installarea_dir = shell.resolve(installarea_dir);
    let dest_dir = std::fs::canonicalize(&dest_dir)
        .with_context(|| format!("Failed to resolve {}", dest_dir.display()))?;
    debug!(
        target: "pkgbuild",
        "relocating [{}] -> [{}]...",
        dest_dir.display(),
        installarea_dir.display()
    );

    let mut report = RelocationReport::default();
    for entry in WalkDir::new(&dest_dir).min_depth(1).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                error!(target: "pkgbuild", "could not walk [{}]: {}", dest_dir.display(), e);
                continue;
            }
        };
        if entry.file_type().is_dir() {
            continue;
        }

        let src = entry.path();
        match link_one(shell, &dest_dir, &installarea_dir, src) {
            Ok(link) => report.linked.push(link),
            Err(e) => {
                error!(target: "pkgbuild", "could not relocate [{}]: {:#}", src.display(), e);
                report.failed.push(src.to_path_buf());
            }
        }
    }
    Ok(report)
}

fn link_one<S: Shell>(shell: &S, dest_dir: &Path, installarea_dir: &Path, src: &Path) -> Result<PathBuf> {
    let rel = src.strip_prefix(dest_dir).context("file outside of the staging tree")?;
    let dest = installarea_dir.join(rel);
    let dest_parent = dest.parent().context("link location has no parent")?;
    let src_parent = src.parent().context("staged file has no parent")?;
    let file_name = src.file_name().context("staged file has no name")?;

    shell.remove(&dest)?;
    shell.makedirs(dest_parent)?;
    let real_parent = std::fs::canonicalize(dest_parent)
        .with_context(|| format!("Failed to resolve {}", dest_parent.display()))?;

    let target = relative_path(src_parent, &real_parent).join(file_name);
    shell.symlink(&target, &dest)?;
    Ok(dest)
}
