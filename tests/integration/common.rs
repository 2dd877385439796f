//! Fixtures shared by the integration tests.

use std::path::Path;

use cmtkit::cmt::{CmtSettings, CmtWrapper};
use cmtkit::test_utils::ScriptedShell;

/// `cmt show projects` for a two-level release.
pub const PROJECTS: &str = "\
AtlasOffline 17.2.0 (in /builds/AtlasOffline/17.2.0) C=AtlasEvent
  AtlasEvent 17.2.0 (in /builds/AtlasEvent/17.2.0) P=AtlasOffline C=AtlasCore
    AtlasCore 17.2.0 (in /builds/AtlasCore/17.2.0) P=AtlasEvent
CMTHOME v1 (in /afs/cmt/home) C=AtlasOffline
";

/// `cmt show uses` of a probe package over the release packages of
/// [`PROJECTS`]. `B` uses `A`, `C` uses `B`.
pub const PROBE_DUMP: &str = "\
# use AtlasCoreRelease AtlasCoreRelease-17-02-00
#   use A A-00-00-01 Tools (no_version_directory)
#   use B B-00-00-02 Control (no_version_directory)
#     use A A-00-00-01 Tools (no_version_directory)
# use AtlasEventRelease AtlasEventRelease-17-02-00
#   use C C-00-00-03 Event (no_version_directory)
#     use B B-00-00-01 Control (no_version_directory)
# use AtlasOfflineRelease AtlasOfflineRelease-17-02-00
#   use C C-00-00-03 Event (no_version_directory)
#
use A A-00-00-01 Tools (/builds/AtlasCore/17.2.0)
use B B-00-00-02 Control (/builds/AtlasCore/17.2.0)
use C C-00-00-03 Event (/builds/AtlasEvent/17.2.0)
";

/// Settings pointing at a fake `cmt.exe`, so no `PATH` lookup happens.
pub fn settings() -> CmtSettings {
    CmtSettings {
        cmt_bin: Some("cmt.exe".into()),
        ..CmtSettings::default()
    }
}

/// A scripted shell answering `show projects` with [`PROJECTS`].
pub fn cmt_shell(cwd: &Path) -> ScriptedShell {
    ScriptedShell::new(cwd).on("show projects", 0, PROJECTS)
}

/// Connects a wrapper over `shell`.
pub async fn connect(shell: ScriptedShell) -> CmtWrapper<ScriptedShell> {
    CmtWrapper::connect(shell, settings()).await.unwrap()
}

/// Writes `text` to `root/rel`, creating parent directories.
pub fn write_file(root: &Path, rel: &str, text: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, text).unwrap();
}
