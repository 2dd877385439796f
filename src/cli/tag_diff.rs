//! Compare the package tags of two release trees.

use anyhow::{Context, Result};
use clap::Args;
use std::path::{Path, PathBuf};
use tracing::info;

use super::common::{CommandContext, print_json};
use crate::cmt::{
    PackageDb, diff_package_dbs, discover_release_projects, harvest_release_uses, render_tag_diff,
};

/// Show which packages carry different tags in two releases.
#[derive(Args, Debug)]
pub struct TagDiffCommand {
    /// Installation tree of the reference release
    reference: PathBuf,

    /// Installation tree of the release to check
    check: PathBuf,

    /// Output JSON
    #[arg(long)]
    json: bool,
}

impl TagDiffCommand {
    pub async fn execute(self, _ctx: &CommandContext) -> Result<()> {
        let reference = release_db(&self.reference)?;
        let check = release_db(&self.check)?;
        let diffs = diff_package_dbs(&reference, &check);

        if self.json {
            return print_json(&diffs);
        }
        print!("{}", render_tag_diff(&diffs));
        Ok(())
    }
}

fn release_db(root: &Path) -> Result<PackageDb> {
    if !root.is_dir() {
        anyhow::bail!("Release tree not found: {}", root.display());
    }
    let projects = discover_release_projects(root)?;
    info!(target: "cmt", "{} release projects under {}", projects.len(), root.display());
    let dag: Vec<_> = projects.iter().collect();
    harvest_release_uses(&dag).with_context(|| format!("Failed to read release {}", root.display()))
}
