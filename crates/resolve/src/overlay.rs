//! Filesystem overlay: serve a path from its archive or from the native
//! filesystem.

use crate::classify::{PathInput, Split};
use crate::context::Context;
use crate::error::{ErrorKind, Result};
use crate::native::NativeKind;
use crate::path::{has_archive_token, normalize, strip_archive_extension};
use asar_archive::{ArchiveBinding, BindingHandle, FileType, integrity, join_inner, read_range};
use exn::ResultExt;
use std::io;
use std::path::{Path, PathBuf};

/// What an existing path is, after following links.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}
impl From<NativeKind> for EntryKind {
    fn from(kind: NativeKind) -> Self {
        match kind {
            NativeKind::File => EntryKind::File,
            NativeKind::Directory => EntryKind::Directory,
        }
    }
}

/// Kind of an archive entry, following a final link.
pub(crate) fn archive_entry_kind(binding: &dyn ArchiveBinding, inner: &Path) -> Option<EntryKind> {
    match binding.stat(inner)?.kind {
        FileType::File => Some(EntryKind::File),
        FileType::Directory => Some(EntryKind::Directory),
        FileType::Link if binding.get_file_info(inner).is_some() => Some(EntryKind::File),
        FileType::Link => binding.readdir(inner).map(|_| EntryKind::Directory),
    }
}

/// A native error that just means "nothing there".
pub(crate) fn is_missing(err: &io::Error) -> bool {
    matches!(err.kind(), io::ErrorKind::NotFound | io::ErrorKind::NotADirectory)
}

fn native_error(err: io::Error, path: &Path) -> ErrorKind {
    if is_missing(&err) { ErrorKind::NotFound(path.to_path_buf()) } else { ErrorKind::Io(err) }
}

impl Context {
    /// Shared binding for an archive, opened on first use.
    pub fn binding(&self, archive_path: &Path) -> Result<BindingHandle> {
        self.archives.get_or_open(archive_path).or_raise(|| ErrorKind::Archive)
    }

    /// Kind of the entry at a path, or `None` when it doesn't exist.
    pub fn stat_path<'a>(&self, input: impl Into<PathInput<'a>>) -> Result<Option<EntryKind>> {
        let input = input.into();
        match self.split_path(input)? {
            Split::Archive { archive_path, inner_path } => {
                Ok(archive_entry_kind(self.binding(&archive_path)?.as_ref(), &inner_path))
            },
            Split::NotArchive => {
                let path = input.into_path()?;
                match self.native.kind(&path) {
                    Ok(kind) => Ok(Some(kind.into())),
                    Err(e) if is_missing(&e) => Ok(None),
                    Err(e) => exn::bail!(ErrorKind::Io(e)),
                }
            },
        }
    }

    pub fn exists<'a>(&self, input: impl Into<PathInput<'a>>) -> Result<bool> {
        Ok(self.stat_path(input)?.is_some())
    }

    /// Read a whole file.
    ///
    /// Packed archive entries are read straight from the container and
    /// checked against their recorded hash. Unpacked entries are read from
    /// the companion directory.
    pub fn read_file<'a>(&self, input: impl Into<PathInput<'a>>) -> Result<Vec<u8>> {
        let input = input.into();
        let Split::Archive { archive_path, inner_path } = self.split_path(input)? else {
            let path = input.into_path()?;
            return Ok(self.native.read(&path).map_err(|e| native_error(e, &path))?);
        };
        let binding = self.binding(&archive_path)?;
        let not_found = || ErrorKind::NotFound(join_inner(&archive_path, &inner_path));
        let Some(info) = binding.get_file_info(&inner_path) else {
            exn::bail!(not_found());
        };
        if !info.unpacked
            && let Some(file) = binding.get_fd_and_validate_integrity_later()
        {
            let data = read_range(file, info.offset, info.size).map_err(ErrorKind::Io)?;
            if let Some(expected) = &info.integrity {
                integrity::validate(&data, expected).or_raise(|| ErrorKind::Archive)?;
            }
            return Ok(data);
        }
        let Some(out) = binding.copy_file_out(&inner_path).or_raise(|| ErrorKind::Archive)? else {
            exn::bail!(not_found());
        };
        Ok(self.native.read(&out).map_err(|e| native_error(e, &out))?)
    }

    /// Names of the entries of a directory.
    pub fn read_dir<'a>(&self, input: impl Into<PathInput<'a>>) -> Result<Vec<String>> {
        let input = input.into();
        match self.split_path(input)? {
            Split::Archive { archive_path, inner_path } => self
                .binding(&archive_path)?
                .readdir(&inner_path)
                .ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(join_inner(&archive_path, &inner_path)))),
            Split::NotArchive => {
                let path = input.into_path()?;
                Ok(self.native.read_dir(&path).map_err(|e| native_error(e, &path))?)
            },
        }
    }

    /// Canonical path of an existing entry.
    ///
    /// Inside an archive, links are resolved by the binding and the result is
    /// rejoined onto the canonical container path. While realpath mapping is
    /// enabled (during boundary-crossing resolution), a miss is retried on
    /// the path's mirror counterpart.
    pub fn realpath<'a>(&self, input: impl Into<PathInput<'a>>) -> Result<PathBuf> {
        let path = input.into().into_path()?;
        if let Some(real) = self.realpath_literal(&path)? {
            return Ok(real);
        }
        if self.is_realpath_mapping_enabled()
            && let Some(counterpart) = self.mirror_counterpart(&path)
            && let Some(real) = self.realpath_literal(&counterpart)?
        {
            tracing::trace!(path = %path.display(), real = %real.display(), "Realpath mapped across mirror boundary");
            return Ok(real);
        }
        exn::bail!(ErrorKind::NotFound(path))
    }

    fn realpath_literal(&self, path: &Path) -> Result<Option<PathBuf>> {
        match self.split_path(path)? {
            Split::Archive { archive_path, inner_path } => {
                let Some(inner) = self.binding(&archive_path)?.realpath(&inner_path) else {
                    return Ok(None);
                };
                let container = self.native.canonicalize(&archive_path).map_err(|e| native_error(e, &archive_path))?;
                Ok(Some(join_inner(&container, &inner)))
            },
            Split::NotArchive => match self.native.canonicalize(path) {
                Ok(real) => Ok(Some(real)),
                Err(e) if is_missing(&e) => Ok(None),
                Err(e) => exn::bail!(ErrorKind::Io(e)),
            },
        }
    }

    /// The same location on the other side of the mirror boundary: a path
    /// inside a container maps to its mirror directory and vice versa.
    ///
    /// Returns `None` when the path has no counterpart.
    pub fn mirror_counterpart(&self, path: &Path) -> Option<PathBuf> {
        let path = normalize(path);
        if has_archive_token(&path) {
            strip_archive_extension(&path)
        } else {
            self.registry.resolve_archive_mapping(&path)
        }
    }
}
