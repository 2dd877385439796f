//! Parsing of `cmt show uses` dumps and requirements files
//!
//! A `show uses` dump has two parts: an indented tree of comment lines
//!
//! ```text
//! # use AtlasPolicy AtlasPolicy-01-*
//! #   use GaudiPolicy v12r7 (/afs/.../GAUDI/v19r7)
//! ```
//!
//! where every two extra spaces are one nesting level, followed by a flat
//! listing of `use <name> <version> <path> (<project>)` lines giving the
//! version CMT actually selected for each package.
//!
//! [`PackageDb::from_show_uses`] reads the flat listing,
//! [`DependencyGraph::parse`] reads the tree and substitutes the database
//! records for the imprecise versions printed in the tree.
//! [`PackageDb::from_requirements`] reads the `use` statements of a
//! requirements file, keyed by full name.

use anyhow::{Context, Result};
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{debug, error, trace, warn};

use crate::cmt::package::PackageRecord;
use crate::constants::INDENT_STEP;
use crate::core::CmtError;

/// One decoded tree line of a `show uses` dump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedLine {
    /// Nesting depth (0 for packages used directly by the shown package)
    pub indent: usize,
    /// The package as printed
    pub package: PackageRecord,
}

/// Decoder for the comment-tree lines of a `show uses` dump.
pub struct LineDecoder {
    marker: Regex,
    with_path: Regex,
    without_path: Regex,
}

impl LineDecoder {
    /// Compiles the dependency-line patterns.
    pub fn new() -> Result<Self> {
        Ok(Self {
            marker: Regex::new(r"^#\s*?use")?,
            with_path: Regex::new(
                r"^#(?P<indent>\s*?)use (?P<name>\w*) (?P<version>.*?) (?P<path>.*?) (.*?)",
            )?,
            without_path: Regex::new(r"^#(?P<indent>\s*?)use (?P<name>\w*) (?P<version>.*)")?,
        })
    }

    /// Decodes one line.
    ///
    /// Leading and trailing whitespace is stripped first. Lines without the
    /// `# use` marker yield `Ok(None)`. A marked line that matches neither
    /// detailed pattern is [`CmtError::UndecodableLine`].
    pub fn decode(&self, line: &str) -> Result<Option<DecodedLine>> {
        let line = line.trim();
        if !self.marker.is_match(line) {
            return Ok(None);
        }

        let caps = self.with_path.captures(line).or_else(|| self.without_path.captures(line));
        let Some(caps) = caps else {
            return Err(CmtError::UndecodableLine {
                line: line.to_string(),
            }
            .into());
        };

        let indent = caps.name("indent").map_or(0, |m| m.as_str().len()).saturating_sub(1);
        let name = caps.name("name").map_or("", |m| m.as_str());
        let version = caps.name("version").map_or("", |m| m.as_str());
        let path = caps.name("path").map_or("", |m| m.as_str());

        Ok(Some(DecodedLine {
            indent,
            package: PackageRecord::new(name, version, path),
        }))
    }
}

/// Lookup of known packages.
///
/// Databases built from a `show uses` listing are keyed by bare name;
/// databases harvested from requirements files are keyed by full name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageDb {
    entries: BTreeMap<String, PackageRecord>,
}

impl PackageDb {
    /// Creates an empty database.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses the flat `use <name> <version> <path> (...)` listing of a
    /// `show uses` dump, keyed by name. The last occurrence of a name wins.
    pub fn from_show_uses(text: &str) -> Result<Self> {
        let pattern = Regex::new(r"^use (?P<name>.*?) (?P<version>.*?) (?P<path>.*?) [(].*[)]")?;
        let mut db = Self::new();
        for line in text.lines() {
            let Some(caps) = pattern.captures(line.trim()) else {
                continue;
            };
            let pkg = PackageRecord::new(&caps["name"], &caps["version"], &caps["path"]);
            debug!(target: "cmt::uses", "found [{}] [{}] [{}]", pkg.name, pkg.version, pkg.path);
            db.entries.insert(pkg.name.clone(), pkg);
        }
        Ok(db)
    }

    /// Parses the `use <name> [<version> [<path>]]` statements of a
    /// requirements file, keyed by full name.
    ///
    /// The version defaults to `*`. The path is only taken when the statement
    /// has exactly three fields, so lines carrying extra qualifiers such as
    /// `-no_auto_imports` keep an empty path.
    pub fn from_requirements(text: &str) -> Self {
        let mut db = Self::new();
        for line in text.lines() {
            let Some(rest) = line.strip_prefix("use ") else {
                continue;
            };
            let fields: Vec<&str> = rest.split_whitespace().collect();
            let Some(name) = fields.first() else {
                error!(target: "cmt::uses", "unexpected line content: {:?}", line);
                continue;
            };
            let version = fields.get(1).copied().unwrap_or("*");
            let path = if fields.len() == 3 {
                fields[2]
            } else {
                ""
            };
            debug!(target: "cmt::uses", "found [{}] [{}] [{}]", name, version, path);
            let pkg = PackageRecord::new(*name, version, path);
            db.entries.insert(pkg.full_name(), pkg);
        }
        db
    }

    /// Reads a file and parses it with [`PackageDb::from_show_uses`].
    pub fn from_show_uses_file(path: &Path) -> Result<Self> {
        Self::from_show_uses(&read_dump(path)?)
    }

    /// Reads a file and parses it with [`PackageDb::from_requirements`].
    pub fn from_requirements_file(path: &Path) -> Result<Self> {
        Ok(Self::from_requirements(&read_dump(path)?))
    }

    /// Looks up a package by key.
    pub fn get(&self, key: &str) -> Option<&PackageRecord> {
        self.entries.get(key)
    }

    /// Whether `key` is present.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Inserts or replaces an entry.
    pub fn insert(&mut self, key: impl Into<String>, pkg: PackageRecord) {
        self.entries.insert(key.into(), pkg);
    }

    /// Merges `other` into this database; entries of `other` win.
    pub fn extend(&mut self, other: Self) {
        self.entries.extend(other.entries);
    }

    /// Iterates entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &PackageRecord)> {
        self.entries.iter()
    }

    /// Mutable iteration over the records.
    pub fn records_mut(&mut self) -> impl Iterator<Item = &mut PackageRecord> {
        self.entries.values_mut()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the database is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// How a package entered the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PackageKind {
    /// Used directly by the package whose uses were dumped (indent 0)
    Declared,
    /// Reached transitively
    Used,
}

/// A package and the names of the packages it uses directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyNode {
    package: PackageRecord,
    deps: BTreeSet<String>,
}

impl DependencyNode {
    fn new(package: PackageRecord) -> Self {
        Self {
            package,
            deps: BTreeSet::new(),
        }
    }

    /// The canonical record of this package.
    pub const fn package(&self) -> &PackageRecord {
        &self.package
    }

    /// Names of the packages used directly, sorted.
    pub fn deps(&self) -> impl Iterator<Item = &str> {
        self.deps.iter().map(String::as_str)
    }

    /// Whether `name` is a direct dependency.
    pub fn depends_on(&self, name: &str) -> bool {
        self.deps.contains(name)
    }

    fn add_dep(&mut self, name: &str) {
        self.deps.insert(name.to_string());
    }
}

/// Package dependency tree reconstructed from a `show uses` dump.
///
/// Every node has a kind entry. Dependency names need not be nodes
/// themselves.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: BTreeMap<String, DependencyNode>,
    kinds: BTreeMap<String, PackageKind>,
    roots: Vec<String>,
}

impl DependencyGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the graph from the tree part of a `show uses` dump.
    ///
    /// Each entry is replaced by its `db` record when one exists (the tree
    /// prints requested versions, the database the selected ones). The parent
    /// of an entry at depth `d > 0` is the most recent entry at depth
    /// `d - 2`; when the dump skips a level the most recent shallower entry is
    /// used instead.
    pub fn parse(text: &str, db: &PackageDb) -> Result<Self> {
        let decoder = LineDecoder::new()?;
        let mut graph = Self::new();
        let mut history: Vec<(usize, String)> = Vec::new();

        for line in text.lines() {
            let Some(DecodedLine {
                indent,
                package,
            }) = decoder.decode(line)?
            else {
                continue;
            };
            trace!(target: "cmt::uses", "found [{:3}] [{}]", indent, package.name);

            let package = if let Some(known) = db.get(&package.name) {
                known.clone()
            } else {
                warn!(target: "cmt::uses", "[{}] is not in pkgDb !!", package.name);
                package
            };

            let name = package.name.clone();
            let kind = if indent == 0 {
                PackageKind::Declared
            } else {
                PackageKind::Used
            };
            graph.add_package(package, kind);
            history.push((indent, name.clone()));

            if indent == 0 {
                if !graph.roots.contains(&name) {
                    graph.roots.push(name);
                }
                continue;
            }

            let earlier = &history[..history.len() - 1];
            let parent = earlier
                .iter()
                .rev()
                .find(|(depth, _)| depth + INDENT_STEP == indent)
                .or_else(|| earlier.iter().rev().find(|(depth, _)| *depth < indent))
                .map(|(_, parent)| parent.clone());

            if let Some(parent) = parent {
                trace!(target: "cmt::uses", "   ==> [{}] depends on [{}]", parent, name);
                if let Some(node) = graph.nodes.get_mut(&parent) {
                    node.add_dep(&name);
                }
            }
        }

        Ok(graph)
    }

    /// Reads a dump file and builds the graph.
    pub fn from_file(path: &Path, db: &PackageDb) -> Result<Self> {
        Self::parse(&read_dump(path)?, db)
    }

    /// Registers a package.
    ///
    /// The first registration of a name fixes its record; later ones only
    /// update its kind.
    pub fn add_package(&mut self, package: PackageRecord, kind: PackageKind) {
        self.kinds.insert(package.name.clone(), kind);
        self.nodes.entry(package.name.clone()).or_insert_with(|| DependencyNode::new(package));
    }

    /// Adds a dependency edge from `parent` (which must be registered) to `dep`.
    pub fn add_dependency(&mut self, parent: &str, dep: &str) -> bool {
        match self.nodes.get_mut(parent) {
            Some(node) => {
                node.add_dep(dep);
                true
            }
            None => false,
        }
    }

    /// Looks up a node by package name.
    pub fn get(&self, name: &str) -> Option<&DependencyNode> {
        self.nodes.get(name)
    }

    /// The kind of a registered package.
    pub fn kind(&self, name: &str) -> Option<PackageKind> {
        self.kinds.get(name).copied()
    }

    /// Nodes in name order.
    pub fn nodes(&self) -> impl Iterator<Item = (&str, &DependencyNode)> {
        self.nodes.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Indent-0 packages in order of first appearance.
    pub fn roots(&self) -> &[String] {
        &self.roots
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Packages listing `name` among their direct dependencies, in name order.
    pub fn direct_clients(&self, name: &str) -> Vec<&PackageRecord> {
        self.nodes.values().filter(|node| node.depends_on(name)).map(DependencyNode::package).collect()
    }

    /// Renders the tree below the roots, one package per line, indented by
    /// depth. A package already printed is shown once more but not expanded.
    pub fn render_tree(&self) -> String {
        let mut out = String::new();
        let mut expanded = BTreeSet::new();
        for root in &self.roots {
            self.render_node(root, 0, &mut expanded, &mut out);
        }
        out
    }

    fn render_node(
        &self,
        name: &str,
        depth: usize,
        expanded: &mut BTreeSet<String>,
        out: &mut String,
    ) {
        let label = self.nodes.get(name).map_or_else(
            || name.to_string(),
            |node| node.package().to_string(),
        );
        out.push_str(&" ".repeat(depth * INDENT_STEP));
        out.push_str(&label);
        out.push('\n');

        if !expanded.insert(name.to_string()) {
            return;
        }
        if let Some(node) = self.nodes.get(name) {
            for dep in node.deps() {
                self.render_node(dep, depth + 1, expanded, out);
            }
        }
    }
}

/// Reads a dump or requirements file, expanding `~` and environment
/// variables in its path.
pub fn read_dump(path: &Path) -> Result<String> {
    let raw = path.to_string_lossy();
    let expanded = shellexpand::full(&raw)
        .map(std::borrow::Cow::into_owned)
        .unwrap_or_else(|_| raw.to_string());
    std::fs::read_to_string(&expanded).with_context(|| format!("Failed to read {expanded}"))
}
