use cmtkit::cmt::{CmtWrapper, DependencyGraph, PackageDb};
use cmtkit::core::CmtError;
use cmtkit::shell::{CommandOutput, OutputMode};
use cmtkit::test_utils::ScriptedShell;
use std::path::PathBuf;
use tempfile::TempDir;

use crate::common::{PROBE_DUMP, cmt_shell, connect};

/// Direct clients only: `C` uses `B` which uses `A`, yet only `B` is a client of `A`.
#[test]
fn test_direct_clients_of_dump() {
    let dump = "\
# use C C-00-00-01 Event
#   use B B-00-00-01 Control
#     use A A-00-00-01 Tools
";
    let graph = DependencyGraph::parse(dump, &PackageDb::new()).unwrap();
    let clients: Vec<String> = graph.direct_clients("A").iter().map(|p| p.name.clone()).collect();
    assert_eq!(clients, ["B"]);
}

#[tokio::test]
async fn test_show_clients_through_probe_package() {
    let dir = TempDir::new().unwrap();
    let shell = cmt_shell(dir.path())
        .on_run(" config", |command| {
            let cwd = command.working_dir().unwrap();
            let requirements = std::fs::read_to_string(cwd.join("requirements")).unwrap();
            assert!(requirements.starts_with("package DepA\n"));
            assert!(requirements.contains("use AtlasCoreRelease AtlasCoreRelease-*\n"));
            assert!(requirements.contains("use AtlasEventRelease AtlasEventRelease-*\n"));
            assert!(requirements.contains("use AtlasOfflineRelease AtlasOfflineRelease-*\n"));
            assert!(cwd.join("version.cmt").exists());
            CommandOutput::new(command.command_line(), 0, "", "")
        })
        .on("show uses", 0, PROBE_DUMP);
    let cmt = connect(shell).await;

    let clients = cmt.show_clients("A").await.unwrap();
    let names: Vec<String> = clients.iter().map(|p| p.full_name()).collect();
    assert_eq!(names, ["Control/B"]);
    assert_eq!(clients[0].version, "B-00-00-02");

    let show_uses = cmt
        .shell()
        .recorded()
        .into_iter()
        .find(|c| c.command_line.ends_with("show uses"))
        .unwrap();
    assert!(matches!(show_uses.output, OutputMode::WriteTo(_)));
    assert!(!show_uses.cwd.exists(), "probe package left behind");
}

#[tokio::test]
async fn test_release_packages_are_not_clients() {
    let dir = TempDir::new().unwrap();
    let shell = cmt_shell(dir.path()).on("show uses", 0, PROBE_DUMP);
    let cmt = connect(shell).await;

    assert!(cmt.show_clients("C").await.unwrap().is_empty());
    let clients = cmt.show_clients_of("B", "AtlasEvent").await.unwrap();
    assert_eq!(clients.iter().map(|p| p.full_name()).collect::<Vec<_>>(), ["Event/C"]);
}

/// Directory the command containing `pattern` ran in.
fn probe_dir(cmt: &CmtWrapper<ScriptedShell>, pattern: &str) -> PathBuf {
    cmt.shell()
        .recorded()
        .into_iter()
        .find(|c| c.command_line.contains(pattern))
        .map(|c| c.cwd)
        .unwrap()
}

#[tokio::test]
async fn test_failing_show_uses_is_tolerated() {
    let dir = TempDir::new().unwrap();
    let partial: String = PROBE_DUMP.lines().take(4).map(|line| format!("{line}\n")).collect();
    let shell = cmt_shell(dir.path()).on("show uses", 1, &partial);
    let cmt = connect(shell).await;

    let clients = cmt.show_clients("A").await.unwrap();
    assert_eq!(clients.iter().map(|p| p.full_name()).collect::<Vec<_>>(), ["Control/B"]);
    assert_eq!(clients[0].version, "B-00-00-02");
    assert!(!probe_dir(&cmt, "show uses").exists(), "probe package left behind");
}

#[tokio::test]
async fn test_empty_failing_show_uses_yields_no_clients() {
    let dir = TempDir::new().unwrap();
    let shell = cmt_shell(dir.path()).on("show uses", 1, "");
    let cmt = connect(shell).await;
    assert!(cmt.show_clients("A").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_failing_config_is_an_error() {
    let dir = TempDir::new().unwrap();
    let shell = cmt_shell(dir.path()).on(" config", 1, "");
    let cmt = connect(shell).await;
    let err = cmt.show_clients("A").await.unwrap_err();
    assert!(err.to_string().contains("could not configure DepA package"));

    let cwd = probe_dir(&cmt, " config");
    assert!(cwd.ends_with("DepA/cmt"));
    assert!(!cwd.exists(), "probe package left behind");
    assert!(cmt.shell().command_lines().iter().all(|line| !line.contains("show uses")));
}

#[tokio::test]
async fn test_package_path_is_rejected() {
    let dir = TempDir::new().unwrap();
    let cmt = connect(cmt_shell(dir.path())).await;
    let err = cmt.show_clients("Control/AthenaKernel").await.unwrap_err();
    assert!(matches!(err.downcast_ref::<CmtError>(), Some(CmtError::InvalidPackageName { .. })));
    assert_eq!(cmt.shell().command_lines(), ["cmt.exe show projects"]);
}

#[tokio::test]
async fn test_slow_show_clients() {
    let dir = TempDir::new().unwrap();
    let answer = "\
# B B-00-00-02 /builds/AtlasCore/17.2.0/Control (use version A-*)
# C C-00-00-03 /builds/AtlasEvent/17.2.0/Event (use version A-*)
some trailing text
";
    let shell = cmt_shell(dir.path()).on("show clients A", 0, answer);
    let cmt = connect(shell).await;

    let clients = cmt.slow_show_clients("A").await.unwrap();
    let names: Vec<String> = clients.iter().map(|p| p.full_name()).collect();
    assert_eq!(names, ["Control/B", "Event/C"]);
}

/// Stand-in `cmt` executable answering `show <what>` from `<what>.txt`.
#[cfg(unix)]
fn fake_cmt(root: &std::path::Path) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    crate::common::write_file(root, "answers/projects.txt", crate::common::PROJECTS);
    crate::common::write_file(root, "answers/uses.txt", PROBE_DUMP);
    let script = root.join("cmt.sh");
    let body = format!(
        "#!/bin/sh\nif [ \"$1\" = show ]; then cat \"{}/answers/$2.txt\"; fi\necho chatter >&2\n",
        root.display()
    );
    std::fs::write(&script, body).unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
    script
}

#[cfg(unix)]
#[tokio::test]
async fn test_show_clients_with_local_shell() {
    let dir = TempDir::new().unwrap();
    let settings = cmtkit::cmt::CmtSettings {
        cmt_bin: Some(fake_cmt(dir.path())),
        ..crate::common::settings()
    };
    let shell = cmtkit::shell::LocalShell::with_cwd(dir.path());
    let cmt = CmtWrapper::connect(shell, settings).await.unwrap();

    let clients = cmt.show_clients("A").await.unwrap();
    assert_eq!(clients.iter().map(|p| p.full_name()).collect::<Vec<_>>(), ["Control/B"]);
    assert_eq!(cmt.show(&["projects"]).await.unwrap(), crate::common::PROJECTS);
}
