//! Container-aware path splitting.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

const ASAR_EXTENSION: &str = "asar";

/// Split an absolute, normalized path into the container holding it and the
/// path inside that container.
///
/// Walks from `full` toward the root and stops at the first path (`full`
/// itself included) whose extension is exactly `asar` and which is **not** a
/// directory according to `is_dir`. Directories named `*.asar` are ordinary
/// directories and are walked through. The container root itself splits
/// into an empty inner path.
///
/// Returns [`None`] when no container is found.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use asar_archive::split_archive_path;
///
/// let (archive, inner) = split_archive_path(Path::new("/srv/app.asar/lib/a.js"), |_| false).unwrap();
/// assert_eq!(archive, Path::new("/srv/app.asar"));
/// assert_eq!(inner, Path::new("lib/a.js"));
/// assert!(split_archive_path(Path::new("/srv/app/lib/a.js"), |_| false).is_none());
/// ```
pub fn split_archive_path(full: &Path, mut is_dir: impl FnMut(&Path) -> bool) -> Option<(PathBuf, PathBuf)> {
    let mut iter = full;
    loop {
        if iter.extension() == Some(OsStr::new(ASAR_EXTENSION)) && !is_dir(iter) {
            break;
        }
        iter = iter.parent()?;
    }
    let inner = full.strip_prefix(iter).ok()?;
    Some((iter.to_path_buf(), inner.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("/a/app.asar", "/a/app.asar", "")]
    #[case("/a/app.asar/index.js", "/a/app.asar", "index.js")]
    #[case("/a/app.asar/node_modules/x/package.json", "/a/app.asar", "node_modules/x/package.json")]
    // Nested containers split at the innermost one.
    #[case("/a/outer.asar/inner.asar/x.js", "/a/outer.asar/inner.asar", "x.js")]
    fn splits(#[case] full: &str, #[case] archive: &str, #[case] inner: &str) {
        let (a, i) = split_archive_path(Path::new(full), |_| false).unwrap();
        assert_eq!(a, Path::new(archive));
        assert_eq!(i, Path::new(inner));
    }

    #[rstest]
    #[case("/a/app/index.js")]
    #[case("/a/app.asar.unpacked/x.node")]
    #[case("/a/app.ASAR/x.js")]
    #[case("/")]
    fn no_container(#[case] full: &str) {
        assert!(split_archive_path(Path::new(full), |_| false).is_none());
    }

    #[test]
    fn directories_named_like_containers_are_skipped() {
        let dir = Path::new("/a/dir.asar");
        let split = split_archive_path(Path::new("/a/dir.asar/x.js"), |p| p == dir);
        assert!(split.is_none());
    }
}
