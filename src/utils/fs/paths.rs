//! Lexical path utilities.

use std::path::{Component, Path, PathBuf};

/// Normalizes a path by resolving `.` and `..` components.
///
/// This is a logical resolution: the filesystem is not consulted and
/// symbolic links are not followed.
///
/// # Examples
///
/// ```rust,no_run
/// use cmtkit::utils::fs::normalize_path;
/// use std::path::{Path, PathBuf};
///
/// let path = Path::new("/foo/./bar/../baz");
/// assert_eq!(normalize_path(path), PathBuf::from("/foo/baz"));
/// ```
#[must_use]
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut components: Vec<Component<'_>> = Vec::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match components.last() {
                Some(Component::Normal(_)) => {
                    components.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => components.push(component),
            },
            c => components.push(c),
        }
    }

    components.iter().collect()
}

/// Returns `path` relative to the directory `start`.
///
/// Both arguments must be absolute or both relative; they are normalized
/// first. The result walks up with `..` for every component of `start` that
/// is not shared with `path`, and is `.` when the two are equal.
///
/// # Examples
///
/// ```rust,no_run
/// use cmtkit::utils::fs::relative_path;
/// use std::path::{Path, PathBuf};
///
/// let rel = relative_path(Path::new("/a/b/c"), Path::new("/a/d"));
/// assert_eq!(rel, PathBuf::from("../b/c"));
/// ```
#[must_use]
pub fn relative_path(path: &Path, start: &Path) -> PathBuf {
    let path = normalize_path(path);
    let start = normalize_path(start);

    let path_parts: Vec<Component<'_>> = path.components().collect();
    let start_parts: Vec<Component<'_>> = start.components().collect();

    let common = path_parts.iter().zip(start_parts.iter()).take_while(|(a, b)| a == b).count();

    let mut rel = PathBuf::new();
    for _ in common..start_parts.len() {
        rel.push("..");
    }
    for part in &path_parts[common..] {
        rel.push(part.as_os_str());
    }

    if rel.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        rel
    }
}
