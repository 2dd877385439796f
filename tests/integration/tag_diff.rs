use cmtkit::cmt::{diff_package_dbs, discover_release_projects, harvest_release_uses, render_tag_diff};
use std::path::Path;
use tempfile::TempDir;

use crate::common::write_file;

/// Writes `<root>/<project>/<version>/<project>Release/cmt/requirements`.
pub fn release_project(root: &Path, project: &str, version: &str, uses: &str) {
    let rel = format!("{project}/{version}/{project}Release/cmt/requirements");
    write_file(root, &rel, &format!("package {project}Release\n\n{uses}"));
}

pub fn two_releases(dir: &Path) {
    release_project(
        &dir.join("ref"),
        "AtlasCore",
        "17.2.0",
        "use AthenaKernel AthenaKernel-00-55-12 Control\nuse StoreGate StoreGate-02-01-00 Control\n",
    );
    release_project(&dir.join("ref"), "AtlasEvent", "17.2.0", "use EventInfo EventInfo-00-20-00 Event\n");
    release_project(
        &dir.join("chk"),
        "AtlasCore",
        "17.2.1",
        "use AthenaKernel AthenaKernel-00-55-13 Control\nuse StoreGate StoreGate-02-01-00 Control\n",
    );
    release_project(&dir.join("chk"), "AtlasEvent", "17.2.1", "use EventInfo EventInfo-00-20-00 Event\n");
    release_project(&dir.join("chk"), "AtlasTrigger", "17.2.1", "use TrigConf TrigConf-01-00-00 Trigger\n");
}

#[test]
fn test_release_trees_diff() {
    let dir = TempDir::new().unwrap();
    two_releases(dir.path());

    let reference = discover_release_projects(&dir.path().join("ref")).unwrap();
    let names: Vec<&str> = reference.iter().map(|p| p.name()).collect();
    assert_eq!(names, ["AtlasCore", "AtlasEvent"]);
    assert_eq!(reference[0].version, "17.2.0");

    let check = discover_release_projects(&dir.path().join("chk")).unwrap();
    let reference = harvest_release_uses(&reference.iter().collect::<Vec<_>>()).unwrap();
    let check = harvest_release_uses(&check.iter().collect::<Vec<_>>()).unwrap();

    let diffs = diff_package_dbs(&reference, &check);
    assert_eq!(diffs.len(), 2);
    assert_eq!(diffs[0].full_name, "Control/AthenaKernel");
    assert_eq!((diffs[0].ref_version.as_str(), diffs[0].chk_version.as_str()), ("00-55-12", "00-55-13"));
    assert_eq!(diffs[0].ref_project, "Core");
    assert_eq!(diffs[1].full_name, "Trigger/TrigConf");
    assert_eq!(diffs[1].ref_version, "None-00-00-00");
    assert_eq!(diffs[1].ref_project, "N/A");
    assert_eq!(diffs[1].chk_project, "Trigger");

    let table = render_tag_diff(&diffs);
    assert!(table.ends_with("::: found [2] tags which are different"));
}

#[test]
fn test_identical_releases() {
    let dir = TempDir::new().unwrap();
    release_project(dir.path(), "AtlasCore", "17.2.0", "use AthenaKernel AthenaKernel-00-55-12 Control\n");
    let projects = discover_release_projects(dir.path()).unwrap();
    let db = harvest_release_uses(&projects.iter().collect::<Vec<_>>()).unwrap();
    assert!(diff_package_dbs(&db, &db.clone()).is_empty());
}
