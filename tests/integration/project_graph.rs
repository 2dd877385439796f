use cmtkit::cmt::{CmtWrapper, ProjectGraph};
use cmtkit::core::CmtError;
use cmtkit::test_utils::ScriptedShell;
use tempfile::TempDir;

use crate::common::{PROJECTS, connect, settings};

fn root_error(listing: &str) -> Option<usize> {
    let err = ProjectGraph::parse(listing).unwrap_err();
    match err.downcast_ref::<CmtError>() {
        Some(CmtError::ProjectRootInconsistency {
            found,
        }) => Some(*found),
        _ => None,
    }
}

#[test]
fn test_single_root_required() {
    let two_roots = "\
AtlasCore 17.2.0 (in /builds/AtlasCore/17.2.0)
Gaudi v21 (in /builds/GAUDI/v21)
";
    assert_eq!(root_error(two_roots), Some(2));

    let no_root = "\
AtlasCore 17.2.0 (in /builds/AtlasCore/17.2.0) P=AtlasEvent C=AtlasEvent
AtlasEvent 17.2.0 (in /builds/AtlasEvent/17.2.0) P=AtlasCore C=AtlasCore
";
    assert_eq!(root_error(no_root), Some(0));
}

#[test]
fn test_noise_projects_are_dropped() {
    let graph = ProjectGraph::parse(PROJECTS).unwrap();
    assert_eq!(graph.len(), 3);
    assert!(graph.get("CMTHOME").is_none());
    assert_eq!(graph.root().unwrap().0, "AtlasOffline");
}

#[tokio::test]
async fn test_connect_exposes_the_project_graph() {
    let dir = TempDir::new().unwrap();
    let shell = ScriptedShell::new(dir.path()).on("show projects", 0, PROJECTS);
    let cmt = connect(shell).await;

    let dag: Vec<&str> = cmt.projects_dag().await.unwrap().iter().map(|p| p.name()).collect();
    assert_eq!(dag, ["AtlasOffline", "AtlasEvent", "AtlasCore"]);

    let mut deps = cmt.project_deps("AtlasOffline").await.unwrap();
    deps.sort();
    assert_eq!(deps, ["AtlasCore", "AtlasEvent"]);
    assert!(cmt.project_deps("AtlasCore").await.unwrap().is_empty());
    assert_eq!(cmt.project_release("AtlasEvent"), "AtlasEventRelease");

    assert_eq!(cmt.projects().await.unwrap().len(), 3);
    let queries = cmt.shell().command_lines().iter().filter(|l| l.contains("show projects")).count();
    assert_eq!(queries, 1, "project listing is parsed once per wrapper");
}

#[tokio::test]
async fn test_connect_rejects_empty_environment() {
    let dir = TempDir::new().unwrap();
    let shell = ScriptedShell::new(dir.path()).on("show projects", 0, "#CMT> Warning: nothing\n");
    let err = CmtWrapper::connect(shell, settings()).await.err().unwrap();
    assert!(matches!(err.downcast_ref::<CmtError>(), Some(CmtError::NoProjects)));
}

#[tokio::test]
async fn test_unknown_project_deps() {
    let dir = TempDir::new().unwrap();
    let cmt = connect(ScriptedShell::new(dir.path()).on("show projects", 0, PROJECTS)).await;
    let err = cmt.project_deps("AtlasTrigger").await.unwrap_err();
    assert!(matches!(err.downcast_ref::<CmtError>(), Some(CmtError::UnknownProject { .. })));
}
