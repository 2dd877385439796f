//! Project graph reconstructed from `cmt show projects`
//!
//! Each line of the listing reads
//!
//! ```text
//!   AtlasEvent 17.2.0 (in /afs/cern.ch/atlas/software/builds/AtlasEvent/17.2.0) P=AtlasReconstruction C=AtlasConditions
//! ```
//!
//! The `P=` and `C=` tokens declare parent and child projects. The graph
//! must have a single root (the project nobody uses); [`ProjectGraph::parse`]
//! refuses anything else. Traversals only follow child edges.

use anyhow::Result;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, warn};

use crate::constants::{NOISE_PROJECTS, RELEASE_PACKAGE_OVERRIDES, RELEASE_SUFFIX};
use crate::core::CmtError;

/// Marker printed instead of `P=`/`C=` tokens for the top project by CMT v21.
const CURRENT_MARKER: &str = "(current)";

/// One CMT project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectRecord {
    /// Project location, e.g. `/afs/.../AtlasCore/17.2.0`
    pub path: String,
    /// Project version
    pub version: String,
    /// Names of the projects using this one, in order of first appearance
    pub parents: Vec<String>,
    /// Names of the projects this one uses, in order of first appearance
    pub children: Vec<String>,
}

impl ProjectRecord {
    /// Creates a record without edges.
    pub fn new(path: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            version: version.into(),
            parents: Vec::new(),
            children: Vec::new(),
        }
    }

    /// The project name: the name of the directory holding the version
    /// directory (`AtlasCore` for `/builds/AtlasCore/17.2.0`).
    pub fn name(&self) -> &str {
        let head = self.path.rfind('/').map_or("", |i| &self.path[..i]);
        let head = if head.chars().all(|c| c == '/') {
            head
        } else {
            head.trim_end_matches('/')
        };
        head.rfind('/').map_or(head, |i| &head[i + 1..])
    }

    fn add_parent(&mut self, name: &str) {
        if !self.parents.iter().any(|p| p == name) {
            self.parents.push(name.to_string());
        }
    }

    fn add_child(&mut self, name: &str) {
        if !self.children.iter().any(|c| c == name) {
            self.children.push(name.to_string());
        }
    }
}

/// Mapping from the project names CMT reports to their records.
#[derive(Debug, Clone, Default)]
pub struct ProjectGraph {
    projects: BTreeMap<String, ProjectRecord>,
    order: Vec<String>,
}

struct ParsedLine {
    name: String,
    version: String,
    path: String,
    data: Vec<String>,
}

impl ProjectGraph {
    /// Parses `cmt show projects` output and validates the result.
    ///
    /// Lines that do not look like project lines are logged and discarded,
    /// as are the `CMTHOME` and `CMTUSERCONTEXT` pseudo-projects and any edge
    /// pointing at them.
    ///
    /// # Errors
    ///
    /// [`CmtError::NoProjects`] when nothing was parsed and
    /// [`CmtError::ProjectRootInconsistency`] unless exactly one project has
    /// no parents.
    pub fn parse(text: &str) -> Result<Self> {
        let pattern = Regex::new(
            r"^(?P<indent>\s*?)(?P<name>[-_.\w]*?) (?P<version>[-_.\w/]*?) [(]in (?P<path>.*?)[)](?P<data>.*)",
        )?;

        let mut lines = Vec::new();
        for line in text.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let Some(caps) = pattern.captures(line) else {
                warn!(target: "cmt::projects", "!! discarding: !! {:?}", line);
                continue;
            };
            debug!(
                target: "cmt::projects",
                "{} {} {} [{}]",
                &caps["name"],
                &caps["version"],
                &caps["path"],
                &caps["data"]
            );
            if NOISE_PROJECTS.contains(&&caps["name"]) {
                continue;
            }
            lines.push(ParsedLine {
                name: caps["name"].to_string(),
                version: caps["version"].to_string(),
                path: caps["path"].to_string(),
                data: caps["data"].split_whitespace().map(str::to_string).collect(),
            });
        }

        let mut graph = Self::default();
        for (i, line) in lines.iter().enumerate() {
            let record = graph.entry(&line.name);
            record.version.clone_from(&line.version);
            record.path.clone_from(&line.path);

            if line.data.len() == 1 && line.data[0] == CURRENT_MARKER {
                if let Some(next) = lines.get(i + 1) {
                    record.add_child(&next.name);
                    graph.entry(&next.name).add_parent(&line.name);
                }
                continue;
            }

            for token in &line.data {
                if let Some(parent) = token.strip_prefix("P=") {
                    if !NOISE_PROJECTS.contains(&parent) {
                        record.add_parent(parent);
                    }
                } else if let Some(child) = token.strip_prefix("C=") {
                    if !NOISE_PROJECTS.contains(&child) {
                        record.add_child(child);
                    }
                }
            }
        }

        graph.validate()?;
        Ok(graph)
    }

    /// Builds a graph from records keyed by name and validates it like
    /// [`ProjectGraph::parse`].
    pub fn from_records<I, S>(records: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, ProjectRecord)>,
        S: Into<String>,
    {
        let mut graph = Self::default();
        for (name, record) in records {
            let name = name.into();
            if !graph.projects.contains_key(&name) {
                graph.order.push(name.clone());
            }
            graph.projects.insert(name, record);
        }
        graph.validate()?;
        Ok(graph)
    }

    fn entry(&mut self, name: &str) -> &mut ProjectRecord {
        if !self.projects.contains_key(name) {
            self.order.push(name.to_string());
        }
        self.projects.entry(name.to_string()).or_insert_with(|| ProjectRecord::new("", ""))
    }

    fn validate(&self) -> Result<()> {
        if self.projects.is_empty() {
            return Err(CmtError::NoProjects.into());
        }
        self.root()?;

        let mut graph: DiGraph<&str, ()> = DiGraph::new();
        let indices: HashMap<&str, NodeIndex> =
            self.order.iter().map(|name| (name.as_str(), graph.add_node(name.as_str()))).collect();
        for (name, record) in &self.projects {
            for child in &record.children {
                if let Some(&to) = indices.get(child.as_str()) {
                    graph.add_edge(indices[name.as_str()], to, ());
                }
            }
        }
        if let Err(cycle) = toposort(&graph, None) {
            return Err(CmtError::ProjectCycle {
                name: graph[cycle.node_id()].to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Name and record of the unique project without parents.
    pub fn root(&self) -> Result<(&str, &ProjectRecord)> {
        let roots: Vec<(&String, &ProjectRecord)> =
            self.projects.iter().filter(|(_, p)| p.parents.is_empty()).collect();
        match roots.as_slice() {
            [(name, record)] => Ok((name.as_str(), record)),
            _ => Err(CmtError::ProjectRootInconsistency {
                found: roots.len(),
            }
            .into()),
        }
    }

    /// Looks up a project by reported name.
    pub fn get(&self, name: &str) -> Option<&ProjectRecord> {
        self.projects.get(name)
    }

    /// Number of projects.
    pub fn len(&self) -> usize {
        self.projects.len()
    }

    /// Whether the graph is empty.
    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    /// Project paths in listing order.
    pub fn paths(&self) -> Vec<String> {
        self.order.iter().filter_map(|n| self.projects.get(n)).map(|p| p.path.clone()).collect()
    }

    /// Every project reachable from the root, each once, in depth-first
    /// pre-order along child edges.
    pub fn projects_dag(&self) -> Result<Vec<&ProjectRecord>> {
        let (root, _) = self.root()?;
        let mut visited = HashSet::new();
        let mut out = Vec::new();
        self.visit(root, &mut visited, &mut out);
        Ok(out)
    }

    fn visit<'a>(
        &'a self,
        name: &'a str,
        visited: &mut HashSet<&'a str>,
        out: &mut Vec<&'a ProjectRecord>,
    ) {
        if !visited.insert(name) {
            return;
        }
        let Some(record) = self.projects.get(name) else {
            warn!(target: "cmt::projects", "unknown child project [{}]", name);
            return;
        };
        out.push(record);
        for child in &record.children {
            self.visit(child, visited, out);
        }
    }

    /// Names of all projects transitively used by `name`, excluding `name`.
    ///
    /// # Errors
    ///
    /// [`CmtError::UnknownProject`] when `name` is not in the graph.
    pub fn project_deps(&self, name: &str) -> Result<Vec<String>> {
        if !self.projects.contains_key(name) {
            return Err(CmtError::UnknownProject {
                name: name.to_string(),
            }
            .into());
        }

        let mut visited: HashSet<&str> = HashSet::from([name]);
        let mut deps = Vec::new();
        let mut stack = vec![name];
        while let Some(current) = stack.pop() {
            let Some(record) = self.projects.get(current) else {
                continue;
            };
            for child in record.children.iter().rev() {
                if visited.insert(child.as_str()) {
                    deps.push(child.clone());
                    stack.push(child.as_str());
                }
            }
        }
        Ok(deps)
    }
}

/// Release aggregator package of a project (`AtlasCore` → `AtlasCoreRelease`).
pub fn project_release(name: &str) -> String {
    project_release_with(name, &BTreeMap::new())
}

/// Like [`project_release`], consulting `overrides` before the built-in table.
pub fn project_release_with(name: &str, overrides: &BTreeMap<String, String>) -> String {
    if let Some(release) = overrides.get(name) {
        return release.clone();
    }
    RELEASE_PACKAGE_OVERRIDES
        .iter()
        .find(|(project, _)| *project == name)
        .map_or_else(|| format!("{name}{RELEASE_SUFFIX}"), |(_, release)| (*release).to_string())
}
