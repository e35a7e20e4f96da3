//! The native filesystem capability.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// What a native path turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeKind {
    File,
    Directory,
}

/// The filesystem operations the resolver needs outside of archives.
///
/// Every path handed to an implementation has already been classified as
/// *not* archive-bound, except for [`kind`](Self::kind) on container paths
/// themselves (to tell a real `*.asar` directory from a container file).
pub trait NativeFs {
    /// Kind of the entry at `path`, following symlinks.
    fn kind(&self, path: &Path) -> io::Result<NativeKind>;
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;
    /// Names of the entries of a directory, in no particular order.
    fn read_dir(&self, path: &Path) -> io::Result<Vec<String>>;
    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf>;
}

/// [`NativeFs`] backed by `std::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFs;

impl NativeFs for OsFs {
    fn kind(&self, path: &Path) -> io::Result<NativeKind> {
        let metadata = fs::metadata(path)?;
        Ok(if metadata.is_dir() { NativeKind::Directory } else { NativeKind::File })
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<String>> {
        fs::read_dir(path)?
            .map(|entry| entry.map(|entry| entry.file_name().to_string_lossy().into_owned()))
            .collect()
    }

    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        fs::canonicalize(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn os_fs_reports_kinds() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.js"), "1").unwrap();
        std::fs::create_dir(dir.path().join("lib")).unwrap();

        assert_eq!(OsFs.kind(&dir.path().join("a.js")).unwrap(), NativeKind::File);
        assert_eq!(OsFs.kind(&dir.path().join("lib")).unwrap(), NativeKind::Directory);
        assert_eq!(OsFs.kind(&dir.path().join("nope")).unwrap_err().kind(), io::ErrorKind::NotFound);
        let mut names = OsFs.read_dir(dir.path()).unwrap();
        names.sort();
        assert_eq!(names, vec!["a.js", "lib"]);
        assert_eq!(OsFs.read(&dir.path().join("a.js")).unwrap(), b"1");
    }
}
