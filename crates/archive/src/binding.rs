//! The archive binding trait.
//!
//! A binding is the only thing that understands a container's layout. The
//! resolution engine asks it questions about archive-relative paths and
//! never parses a container itself.

use crate::error::Result;
use crate::models::{FileInfo, Stats};
use std::fs::File;
use std::path::{Path, PathBuf};

/// Suffix of the native companion directory holding unpacked entries.
pub const UNPACKED_SUFFIX: &str = ".unpacked";

/// Read-only view of a single archive container.
///
/// Every `path` argument is relative to the archive root; the empty path is
/// the root itself. Lookups that miss return [`None`] rather than an error,
/// matching how callers check for existence.
///
/// Implementations are used from a single thread: handles are shared through
/// [`BindingHandle`] (an [`Rc`](std::rc::Rc)), so anything holding one
/// (including every open file descriptor) stays with the thread that opened
/// it.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use asar_archive::{ArchiveBinding, FileType};
///
/// fn is_dir(binding: &dyn ArchiveBinding, inner: &str) -> bool {
///     binding.stat(Path::new(inner)).is_some_and(|stats| stats.kind == FileType::Directory)
/// }
/// ```
pub trait ArchiveBinding {
    /// Absolute path of the container file.
    fn archive_path(&self) -> &Path;

    /// Location, size and flags of a file. Links are followed; directories
    /// have no file info.
    fn get_file_info(&self, path: &Path) -> Option<FileInfo>;

    /// Entry kind, without following a final link.
    fn stat(&self, path: &Path) -> Option<Stats>;

    /// Names of the direct children of a directory, sorted.
    fn readdir(&self, path: &Path) -> Option<Vec<String>>;

    /// Archive-relative target of a link, or the path itself for any other
    /// existing entry.
    fn realpath(&self, path: &Path) -> Option<PathBuf>;

    /// Materialize a file on the native filesystem and return its path.
    ///
    /// Unpacked entries return their companion path without copying. Packed
    /// entries are extracted into a temporary file that lives as long as the
    /// binding. Returns `Ok(None)` when the entry doesn't exist.
    fn copy_file_out(&self, path: &Path) -> Result<Option<PathBuf>>;

    /// The open container file, for reading packed entries directly.
    ///
    /// Bytes read through this handle are **not** integrity checked; callers
    /// are responsible for validating them against
    /// [`FileInfo::integrity`]. Returns [`None`] when the binding has no
    /// backing file.
    fn get_fd_and_validate_integrity_later(&self) -> Option<&File>;

    /// Native directory holding this archive's unpacked entries.
    fn unpacked_path(&self) -> PathBuf {
        unpacked_path(self.archive_path())
    }
}

/// Companion directory of the container at `archive_path`.
///
/// ```
/// use std::path::Path;
/// use asar_archive::unpacked_path;
///
/// assert_eq!(unpacked_path(Path::new("/srv/app.asar")), Path::new("/srv/app.asar.unpacked"));
/// ```
pub fn unpacked_path(archive_path: &Path) -> PathBuf {
    let mut companion = archive_path.as_os_str().to_owned();
    companion.push(UNPACKED_SUFFIX);
    PathBuf::from(companion)
}
