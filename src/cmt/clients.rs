//! "Who uses package X" queries
//!
//! Two strategies with the same result shape:
//!
//! - [`CmtWrapper::show_clients`] is the precise one. It creates a throwaway
//!   package `Dep<X>` that uses the release package of every project in the
//!   top project's closure, asks CMT for its `show uses` dump and scans the
//!   reconstructed graph for packages listing `X` as a direct dependency.
//!   The aggregator makes CMT materialize the whole dependency closure, so
//!   every package of the release appears in the graph.
//! - [`CmtWrapper::slow_show_clients`] asks `cmt show clients X` directly and
//!   parses the free-text answer. It needs no scratch package but only sees
//!   what CMT itself reports from the current package.

use anyhow::{Context, Result};
use regex::Regex;
use std::collections::HashSet;
use std::path::MAIN_SEPARATOR;
use tracing::{debug, info, trace, warn};

use super::CmtWrapper;
use crate::cmt::package::PackageRecord;
use crate::cmt::uses::{DependencyGraph, PackageDb};
use crate::constants::{
    CMT_DIR, CMT_REQUIREMENTS_FILE, CMT_VERSION_FILE, PROBE_PACKAGE_AUTHOR, PROBE_PACKAGE_PREFIX,
    PROBE_PACKAGE_VERSION_SUFFIX,
};
use crate::core::CmtError;
use crate::shell::Shell;
use crate::utils::fs::ensure_dir;

/// Packages of `graph` that use `package` directly, in name order.
///
/// Packages named in `excluded` (the release aggregators) never count as
/// clients, and each package is reported once.
pub fn collect_clients(
    graph: &DependencyGraph,
    package: &str,
    excluded: &[String],
) -> Vec<PackageRecord> {
    let mut seen = HashSet::new();
    let mut clients = Vec::new();
    for (name, node) in graph.nodes() {
        trace!(target: "cmt::clients", "-> {}: {:?}", name, node.deps().collect::<Vec<_>>());
        if node.depends_on(package)
            && !excluded.iter().any(|release| release == name)
            && seen.insert(name.to_string())
        {
            clients.push(node.package().clone());
        }
    }
    clients
}

/// Requirements file of the probe package.
pub fn probe_requirements(package: &str, releases: &[String]) -> String {
    let mut out = format!(
        "package {PROBE_PACKAGE_PREFIX}{package}\n\nauthor {PROBE_PACKAGE_AUTHOR}\n\n"
    );
    for release in releases {
        out.push_str(&format!("use {release} {release}-*\n"));
    }
    out.push('\n');
    out
}

fn ensure_leaf_name(package: &str) -> Result<()> {
    if package.contains('/') || package.contains(MAIN_SEPARATOR) {
        return Err(CmtError::InvalidPackageName {
            name: package.to_string(),
        }
        .into());
    }
    Ok(())
}

/// Strips every project path from a reported package path, then a leading `/`.
fn strip_project_paths(path: &str, projects: &[String]) -> String {
    let mut path = path.to_string();
    for project in projects.iter().filter(|p| !p.is_empty()) {
        path = path.replace(project.as_str(), "");
    }
    path.strip_prefix('/').map(str::to_string).unwrap_or(path)
}

impl<S: Shell> CmtWrapper<S> {
    /// All packages of the top project's closure using `package` directly.
    ///
    /// `package` must be a leaf name. The probe package lives in a private
    /// temporary directory which is removed on every exit path.
    ///
    /// # Errors
    ///
    /// [`CmtError::InvalidPackageName`] for names with a path separator and
    /// [`CmtError::CommandFailed`] when `cmt config` fails on the probe. A
    /// failing `cmt show uses` is only logged; whatever it printed is used.
    pub async fn show_clients(&self, package: &str) -> Result<Vec<PackageRecord>> {
        let top = self.settings().top_project.clone();
        self.show_clients_of(package, &top).await
    }

    /// [`CmtWrapper::show_clients`] with an explicit top project.
    pub async fn show_clients_of(&self, package: &str, top: &str) -> Result<Vec<PackageRecord>> {
        ensure_leaf_name(package)?;

        let mut projects = self.project_deps(top).await?;
        projects.push(top.to_string());
        info!(target: "cmt::clients", "building dependencies...");
        info!(target: "cmt::clients", "projects used: {:?}", projects);

        let releases: Vec<String> = projects.iter().map(|p| self.project_release(p)).collect();

        let scratch = tempfile::Builder::new()
            .prefix("cmtkit-clients-")
            .tempdir()
            .context("Failed to create a temporary directory for the probe package")?;
        let probe = format!("{PROBE_PACKAGE_PREFIX}{package}");
        let cmt_dir = scratch.path().join(&probe).join(CMT_DIR);
        ensure_dir(&cmt_dir)?;

        tokio::fs::write(cmt_dir.join(CMT_REQUIREMENTS_FILE), probe_requirements(package, &releases))
            .await
            .context("Failed to write probe requirements")?;
        tokio::fs::write(
            cmt_dir.join(CMT_VERSION_FILE),
            format!("{probe}-{PROBE_PACKAGE_VERSION_SUFFIX}\n\n"),
        )
        .await
        .context("Failed to write probe version file")?;

        let config = self.command(["config"]).current_dir(&cmt_dir).discard_output();
        debug!(target: "cmt::clients", "running [{}]...", config);
        self.shell()
            .run(config)
            .await?
            .into_success()
            .with_context(|| format!("could not configure {probe} package"))?;

        let dump = cmt_dir.join(format!("{package}.cmt"));
        let show_uses = self.command(["show", "uses"]).current_dir(&cmt_dir).write_to(&dump);
        debug!(target: "cmt::clients", "running [{}]...", show_uses);
        let output = self.shell().run(show_uses).await?;
        if !output.success() {
            warn!(target: "cmt::clients", "problem running command [{}]", output.command);
            warn!(target: "cmt::clients", "(ignoring it as I am resilient)");
        }

        let text = match tokio::fs::read_to_string(&dump).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", dump.display()));
            }
        };

        info!(target: "cmt::clients", "building packages db...");
        let db = PackageDb::from_show_uses(&text)?;
        info!(target: "cmt::clients", "building packages dependency tree...");
        let graph = DependencyGraph::parse(&text, &db)?;

        let clients = collect_clients(&graph, package, &releases);
        for client in &clients {
            info!(target: "cmt::clients", "=> [{}] ({})", client.full_name(), client.version);
        }

        scratch.close().context("Failed to remove the probe package directory")?;

        info!(target: "cmt::clients", "Found [{}] clients for [{}]", clients.len(), package);
        Ok(clients)
    }

    /// Clients of `package` as reported by `cmt show clients`.
    ///
    /// Project locations are stripped from the reported paths. A failing
    /// query is logged and yields an empty list.
    pub async fn slow_show_clients(&self, package: &str) -> Result<Vec<PackageRecord>> {
        ensure_leaf_name(package)?;

        let projects = self.projects().await?;
        let output = self.shell().run(self.command(["show", "clients", package])).await?;
        if !output.success() {
            warn!(target: "cmt::clients", "Problem during [{}]", output.command);
            warn!(target: "cmt::clients", "{}{}", output.stdout, output.stderr);
            return Ok(Vec::new());
        }

        let pattern = Regex::new(
            r"^# (?P<name>.*?) (?P<version>.*?) (?P<path>.*?) [(]use version (?P<used>.*?)[)]",
        )?;
        let clients: Vec<PackageRecord> = output
            .stdout
            .lines()
            .filter_map(|line| pattern.captures(line))
            .map(|caps| {
                PackageRecord::new(
                    &caps["name"],
                    &caps["version"],
                    strip_project_paths(&caps["path"], &projects),
                )
            })
            .collect();

        info!(target: "cmt::clients", "Found [{}] clients for [{}]", clients.len(), package);
        Ok(clients)
    }
}
