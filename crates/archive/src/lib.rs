//! Read-only access to ASAR archive containers.
//!
//! An archive is a single file holding a JSON header (the directory tree)
//! followed by the packed file contents. Entries flagged as unpacked live in
//! a native companion directory next to the container instead.
//!
//! Everything the resolution engine knows about a container goes through the
//! [`ArchiveBinding`] trait. [`AsarArchive`] reads real containers from disk;
//! with the `mock` feature enabled, `MemoryArchive` serves fixtures from
//! memory instead.

mod asar;
mod binding;
mod cache;
pub mod error;
pub mod integrity;
#[cfg(any(test, feature = "mock"))]
mod memory;
mod models;
mod path;
mod split;

pub use crate::asar::AsarArchive;
pub use crate::binding::{ArchiveBinding, UNPACKED_SUFFIX, unpacked_path};
pub use crate::cache::ArchiveCache;
#[cfg(any(test, feature = "mock"))]
pub use crate::memory::MemoryArchive;
pub use crate::models::{FileInfo, FileType, HashAlgorithm, Integrity, Stats};
pub use crate::path::{join_inner, validate as validate_inner_path};
pub use crate::split::split_archive_path;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::rc::Rc;

/// Shared handle to an open archive.
///
/// Handles are reference counted without atomics; a handle (and every
/// descriptor it owns) belongs to the thread that opened it.
pub type BindingHandle = Rc<dyn ArchiveBinding>;

/// Read exactly `size` bytes starting at `offset`.
///
/// Nothing is allocated up front; a range running past the end of the file
/// is [`io::ErrorKind::UnexpectedEof`].
///
/// Used together with
/// [`get_fd_and_validate_integrity_later`](ArchiveBinding::get_fd_and_validate_integrity_later)
/// to read packed entries without extracting them.
pub fn read_range(mut file: &File, offset: u64, size: u64) -> io::Result<Vec<u8>> {
    file.seek(SeekFrom::Start(offset))?;
    let mut buffer = Vec::new();
    file.take(size).read_to_end(&mut buffer)?;
    if buffer.len() as u64 != size {
        return Err(io::Error::from(io::ErrorKind::UnexpectedEof));
    }
    Ok(buffer)
}
