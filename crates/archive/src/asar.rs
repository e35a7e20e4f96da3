//! On-disk archive containers.

use crate::binding::ArchiveBinding;
use crate::error::{ErrorKind, Result};
use crate::integrity;
use crate::models::{FileInfo, FileType, HashAlgorithm, Integrity, Stats};
use crate::path::{join_inner, validate as validate_path};
use crate::read_range;
use exn::ResultExt;
use serde::Deserialize;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::TempPath;

/// Links pointing at links are followed at most this many times.
pub(crate) const MAX_LINK_DEPTH: usize = 32;
/// Length of the size pickle that precedes the header.
const SIZE_PICKLE_LEN: u64 = 8;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Node {
    files: Option<BTreeMap<String, Node>>,
    link: Option<String>,
    size: u64,
    /// Decimal string, relative to the end of the header.
    offset: Option<String>,
    unpacked: bool,
    executable: bool,
    integrity: Option<RawIntegrity>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawIntegrity {
    algorithm: String,
    hash: String,
    block_size: u32,
    blocks: Vec<String>,
}

/// An archive container read from the local filesystem.
///
/// The header is parsed once on [`open`](Self::open) and the container stays
/// open for the lifetime of the value. Packed files extracted through
/// [`copy_file_out`](ArchiveBinding::copy_file_out) are written to temporary
/// files that are removed when the archive is dropped.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use asar_archive::{ArchiveBinding, AsarArchive};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let archive = AsarArchive::open("/opt/app/resources/app.asar")?;
/// let entries = archive.readdir(Path::new("node_modules")).unwrap_or_default();
/// # Ok(())
/// # }
/// ```
pub struct AsarArchive {
    path: PathBuf,
    file: File,
    root: Node,
    /// Absolute offset of the first packed byte.
    data_offset: u64,
    /// Container length; packed entries must fit inside it.
    len: u64,
    extracted: RefCell<HashMap<PathBuf, TempPath>>,
}

impl AsarArchive {
    /// Open a container and parse its header.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::Open`] when the file can't be opened, and
    /// [`ErrorKind::InvalidHeader`] when its header is truncated, oversized
    /// or not a directory tree.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let invalid = || ErrorKind::InvalidHeader(path.to_path_buf());
        let mut file = File::open(path).or_raise(|| ErrorKind::Open(path.to_path_buf()))?;

        let mut size_pickle = [0u8; SIZE_PICKLE_LEN as usize];
        file.read_exact(&mut size_pickle).or_raise(invalid)?;
        let len = file.metadata().or_raise(|| ErrorKind::Open(path.to_path_buf()))?.len();
        let header_size = match (le_u32(&size_pickle, 0), le_u32(&size_pickle, 4)) {
            (Some(4), Some(size)) if SIZE_PICKLE_LEN + u64::from(size) <= len => size,
            _ => exn::bail!(invalid()),
        };
        let mut header = vec![0u8; header_size as usize];
        file.read_exact(&mut header).or_raise(invalid)?;
        let Some(json) = le_u32(&header, 4).and_then(|len| header.get(8..8 + len as usize)) else {
            exn::bail!(invalid());
        };
        let root: Node = serde_json::from_slice(json).or_raise(invalid)?;
        if root.files.is_none() {
            exn::bail!(invalid());
        }

        tracing::debug!(archive = %path.display(), header_size, "Opened archive container");
        Ok(Self {
            path: path.to_path_buf(),
            file,
            root,
            data_offset: SIZE_PICKLE_LEN + u64::from(header_size),
            len,
            extracted: RefCell::new(HashMap::new()),
        })
    }

    /// Find a node, following links in every component and, if
    /// `follow_final` is set, in the last one too. Returns the archive-relative
    /// path of the node actually reached.
    fn lookup(&self, path: &Path, follow_final: bool, depth: usize) -> Option<(PathBuf, &Node)> {
        if depth > MAX_LINK_DEPTH {
            tracing::warn!(archive = %self.path.display(), path = %path.display(), "Too many levels of links");
            return None;
        }
        let path = validate_path(path).ok()?;
        let mut node = &self.root;
        let mut resolved = PathBuf::new();
        let mut components = path.iter().peekable();
        while let Some(name) = components.next() {
            let child = node.files.as_ref()?.get(name.to_str()?)?;
            resolved.push(name);
            let is_last = components.peek().is_none();
            match &child.link {
                Some(target) if follow_final || !is_last => {
                    (resolved, node) = self.lookup(Path::new(target), true, depth + 1)?;
                },
                _ => node = child,
            }
        }
        Some((resolved, node))
    }

    fn file_info(&self, node: &Node) -> Option<FileInfo> {
        if node.files.is_some() || node.link.is_some() {
            return None;
        }
        let integrity = match &node.integrity {
            Some(raw) => match raw.algorithm.parse::<HashAlgorithm>() {
                Ok(algorithm) => Some(Integrity {
                    algorithm,
                    hash: raw.hash.clone(),
                    block_size: raw.block_size,
                    blocks: raw.blocks.clone(),
                }),
                Err(e) => {
                    tracing::error!(archive = %self.path.display(), error = %e, "Refusing entry with unknown integrity");
                    return None;
                },
            },
            None => None,
        };
        Some(FileInfo {
            size: node.size,
            offset: self.absolute_offset(node)?,
            unpacked: node.unpacked,
            executable: node.executable,
            integrity,
        })
    }

    /// Absolute offset of a packed file. `None` when the header places it
    /// outside the container.
    fn absolute_offset(&self, node: &Node) -> Option<u64> {
        if node.unpacked {
            return Some(0);
        }
        let relative = node.offset.as_deref().unwrap_or("0").parse::<u64>().ok()?;
        let offset = self.data_offset.checked_add(relative)?;
        if offset.checked_add(node.size).is_none_or(|end| end > self.len) {
            tracing::warn!(archive = %self.path.display(), offset, size = node.size, "Entry lies outside the container");
            return None;
        }
        Some(offset)
    }

    fn extract(&self, inner: &Path, info: &FileInfo) -> Result<TempPath> {
        let data = read_range(&self.file, info.offset, info.size).map_err(ErrorKind::Io)?;
        if let Some(integrity) = &info.integrity {
            integrity::validate(&data, integrity)?;
        }
        let suffix = inner.extension().map(|ext| format!(".{}", ext.to_string_lossy())).unwrap_or_default();
        let mut temp = tempfile::Builder::new().prefix("asar-").suffix(&suffix).tempfile().map_err(ErrorKind::Io)?;
        temp.write_all(&data).map_err(ErrorKind::Io)?;
        let temp = temp.into_temp_path();
        if info.executable {
            set_executable(&temp)?;
        }
        tracing::trace!(archive = %self.path.display(), inner = %inner.display(), to = %temp.display(), "Extracted entry");
        Ok(temp)
    }
}

impl ArchiveBinding for AsarArchive {
    fn archive_path(&self) -> &Path {
        &self.path
    }

    fn get_file_info(&self, path: &Path) -> Option<FileInfo> {
        let (_, node) = self.lookup(path, true, 0)?;
        self.file_info(node)
    }

    fn stat(&self, path: &Path) -> Option<Stats> {
        let (_, node) = self.lookup(path, false, 0)?;
        if node.files.is_some() {
            Some(Stats::directory())
        } else if node.link.is_some() {
            Some(Stats::link())
        } else {
            Some(Stats { size: node.size, offset: self.absolute_offset(node)?, kind: FileType::File })
        }
    }

    fn readdir(&self, path: &Path) -> Option<Vec<String>> {
        let (_, node) = self.lookup(path, true, 0)?;
        Some(node.files.as_ref()?.keys().cloned().collect())
    }

    fn realpath(&self, path: &Path) -> Option<PathBuf> {
        self.lookup(path, true, 0).map(|(resolved, _)| resolved)
    }

    fn copy_file_out(&self, path: &Path) -> Result<Option<PathBuf>> {
        let Some((resolved, node)) = self.lookup(path, true, 0) else {
            return Ok(None);
        };
        let Some(info) = self.file_info(node) else {
            return Ok(None);
        };
        if info.unpacked {
            return Ok(Some(join_inner(&self.unpacked_path(), &resolved)));
        }
        if let Some(temp) = self.extracted.borrow().get(&resolved) {
            return Ok(Some(temp.to_path_buf()));
        }
        let temp = self.extract(&resolved, &info)?;
        let out = temp.to_path_buf();
        self.extracted.borrow_mut().insert(resolved, temp);
        Ok(Some(out))
    }

    fn get_fd_and_validate_integrity_later(&self) -> Option<&File> {
        Some(&self.file)
    }
}

fn le_u32(bytes: &[u8], at: usize) -> Option<u32> {
    let word: [u8; 4] = bytes.get(at..at + 4)?.try_into().ok()?;
    Some(u32::from_le_bytes(word))
}

#[cfg(unix)]
pub(crate) fn set_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).map_err(ErrorKind::Io)?;
    Ok(())
}

#[cfg(not(unix))]
pub(crate) fn set_executable(_path: &Path) -> Result<()> {
    Ok(())
}
