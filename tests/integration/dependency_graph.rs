use cmtkit::cmt::{DependencyGraph, PackageDb, PackageKind, PackageRecord};
use cmtkit::core::CmtError;
use tempfile::TempDir;

use crate::common::{PROBE_DUMP, write_file};

#[test]
fn test_declared_root_with_direct_dependency() {
    let dump = "# use Foo 1-0-0 Group ()\n#  use Bar 2-0-0 (Atlas)\n";
    let graph = DependencyGraph::parse(dump, &PackageDb::new()).unwrap();

    assert_eq!(graph.roots(), ["Foo"]);
    assert_eq!(graph.kind("Foo"), Some(PackageKind::Declared));
    assert_eq!(graph.kind("Bar"), Some(PackageKind::Used));
    assert!(graph.get("Foo").unwrap().depends_on("Bar"));
    assert!(!graph.get("Bar").unwrap().depends_on("Foo"));
}

#[test]
fn test_database_record_wins_over_dump() {
    let mut db = PackageDb::new();
    db.insert("Foo", PackageRecord::new("Foo", "2-0-0", "Group"));

    let graph = DependencyGraph::parse("# use Foo 1-0-0\n", &db).unwrap();
    let foo = graph.get("Foo").unwrap().package();
    assert_eq!(foo.version, "2-0-0");
    assert_eq!(foo.path, "Group");
}

#[test]
fn test_parent_is_two_indents_up() {
    let dump = "\
# use Top v1 Pkg (x)
#   use Left v1 Pkg (x)
#     use Leaf v1 Pkg (x)
#   use Right v1 Pkg (x)
#     use Leaf v1 Pkg (x)
#       use Deep v1 Pkg (x)
";
    let graph = DependencyGraph::parse(dump, &PackageDb::new()).unwrap();
    let deps = |name: &str| graph.get(name).unwrap().deps().map(str::to_string).collect::<Vec<_>>();

    assert_eq!(deps("Top"), ["Left", "Right"]);
    assert_eq!(deps("Left"), ["Leaf"]);
    assert_eq!(deps("Right"), ["Leaf"]);
    assert_eq!(deps("Leaf"), ["Deep"]);
}

#[test]
fn test_probe_dump_from_file() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "uses.cmt", PROBE_DUMP);
    let path = dir.path().join("uses.cmt");

    let db = PackageDb::from_show_uses_file(&path).unwrap();
    assert_eq!(db.len(), 3);
    let graph = DependencyGraph::from_file(&path, &db).unwrap();

    assert_eq!(graph.roots(), ["AtlasCoreRelease", "AtlasEventRelease", "AtlasOfflineRelease"]);
    assert_eq!(graph.get("B").unwrap().package().version, "B-00-00-02");
    assert!(graph.get("C").unwrap().depends_on("B"));

    let tree = graph.render_tree();
    assert!(tree.starts_with("AtlasCoreRelease"));
    assert!(tree.contains("\n  Tools/A (A-00-00-01)\n"));
}

#[test]
fn test_malformed_dependency_line() {
    let err = DependencyGraph::parse("# use\n", &PackageDb::new()).unwrap_err();
    assert!(matches!(err.downcast_ref::<CmtError>(), Some(CmtError::UndecodableLine { .. })));
}

#[test]
fn test_non_dependency_lines_are_ignored() {
    let dump = "\
# Selection :
use CMT v1r20p20081118 (/afs/cern.ch/sw/contrib)
#
# use Foo v1 Pkg (x)
";
    let graph = DependencyGraph::parse(dump, &PackageDb::new()).unwrap();
    assert_eq!(graph.len(), 1);
}
