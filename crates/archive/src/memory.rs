//! In-memory archive binding for testing.

use crate::asar::{MAX_LINK_DEPTH, set_executable};
use crate::binding::ArchiveBinding;
use crate::error::{ErrorKind, Result};
use crate::integrity::digest;
use crate::models::{FileInfo, FileType, HashAlgorithm, Stats};
use crate::path::{join_inner, validate as validate_path};
use serde_json::{Map, Value, json};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Block size recorded in generated integrity metadata.
const BLOCK_SIZE: usize = 4 * 1024 * 1024;

#[derive(Debug, Clone)]
enum Entry {
    File { data: Vec<u8>, unpacked: bool, executable: bool },
    Link(PathBuf),
    Dir,
}

/// Archive binding backed by an in-memory tree.
///
/// Parent directories are created implicitly. Packed files are extracted
/// into a temporary directory owned by the archive; unpacked files resolve
/// to the `.unpacked` companion path, which the test is expected to create
/// if it reads them.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use asar_archive::{ArchiveBinding, MemoryArchive};
///
/// let archive = MemoryArchive::new("/srv/app.asar")
///     .with_file("index.js", "module.exports = 1;")
///     .with_link("current", "index.js");
/// assert_eq!(archive.readdir(Path::new("")).unwrap(), vec!["current", "index.js"]);
/// assert_eq!(archive.realpath(Path::new("current")).unwrap(), Path::new("index.js"));
/// ```
#[derive(Debug)]
pub struct MemoryArchive {
    path: PathBuf,
    entries: BTreeMap<PathBuf, Entry>,
    extracted: RefCell<Option<TempDir>>,
}

impl MemoryArchive {
    pub fn new(archive_path: impl Into<PathBuf>) -> Self {
        Self {
            path: archive_path.into(),
            entries: BTreeMap::from([(PathBuf::new(), Entry::Dir)]),
            extracted: RefCell::new(None),
        }
    }

    pub fn with_file(self, path: impl AsRef<Path>, data: impl Into<Vec<u8>>) -> Self {
        self.insert(path.as_ref(), Entry::File { data: data.into(), unpacked: false, executable: false })
    }

    /// Add a file stored in the `.unpacked` companion directory.
    pub fn with_unpacked(self, path: impl AsRef<Path>, data: impl Into<Vec<u8>>) -> Self {
        self.insert(path.as_ref(), Entry::File { data: data.into(), unpacked: true, executable: false })
    }

    pub fn with_executable(self, path: impl AsRef<Path>, data: impl Into<Vec<u8>>) -> Self {
        self.insert(path.as_ref(), Entry::File { data: data.into(), unpacked: false, executable: true })
    }

    /// Add a link to another archive-relative path.
    pub fn with_link(self, path: impl AsRef<Path>, target: impl AsRef<Path>) -> Self {
        let Ok(target) = validate_path(target.as_ref()) else {
            panic!("MemoryArchive::with_link: invalid target {}", target.as_ref().display());
        };
        self.insert(path.as_ref(), Entry::Link(target))
    }

    pub fn with_dir(self, path: impl AsRef<Path>) -> Self {
        self.insert(path.as_ref(), Entry::Dir)
    }

    /// Panics if the path fails validation or names the root. If test setup
    /// is wrong, then test should not pass.
    fn insert(mut self, path: &Path, entry: Entry) -> Self {
        let validated = match validate_path(path) {
            Ok(validated) if !validated.as_os_str().is_empty() => validated,
            _ => panic!("MemoryArchive: invalid entry path {}", path.display()),
        };
        for ancestor in validated.ancestors().skip(1) {
            self.entries.entry(ancestor.to_path_buf()).or_insert(Entry::Dir);
        }
        self.entries.insert(validated, entry);
        self
    }

    fn resolve(&self, path: &Path, follow_final: bool, depth: usize) -> Option<PathBuf> {
        if depth > MAX_LINK_DEPTH {
            return None;
        }
        let path = validate_path(path).ok()?;
        let mut resolved = PathBuf::new();
        let mut components = path.iter().peekable();
        while let Some(name) = components.next() {
            resolved.push(name);
            let is_last = components.peek().is_none();
            match self.entries.get(&resolved)? {
                Entry::Link(target) if follow_final || !is_last => {
                    resolved = self.resolve(target, true, depth + 1)?;
                },
                Entry::File { .. } if !is_last => return None,
                _ => {},
            }
        }
        Some(resolved)
    }

    fn children(&self, dir: &Path) -> impl Iterator<Item = (&Path, &Entry)> {
        self.entries
            .iter()
            .filter(move |(path, _)| path.parent() == Some(dir))
            .map(|(path, entry)| (path.as_path(), entry))
    }

    /// Serialize the tree into a real container at `dest`.
    ///
    /// Packed files get SHA256 integrity metadata. Unpacked files are written
    /// to `<dest>.unpacked/`.
    pub fn write_asar(&self, dest: &Path) -> Result<()> {
        let mut blob = Vec::new();
        let header = self.header_node(Path::new(""), dest, &mut blob)?;
        let json = serde_json::to_vec(&header).map_err(|e| ErrorKind::Io(std::io::Error::other(e)))?;

        let padding = (4 - json.len() % 4) % 4;
        let payload_len = 4 + json.len() + padding;
        let mut out = Vec::with_capacity(8 + 4 + payload_len + blob.len());
        out.extend_from_slice(&4u32.to_le_bytes());
        out.extend_from_slice(&u32_len(4 + payload_len)?.to_le_bytes());
        out.extend_from_slice(&u32_len(payload_len)?.to_le_bytes());
        out.extend_from_slice(&u32_len(json.len())?.to_le_bytes());
        out.extend_from_slice(&json);
        out.extend(std::iter::repeat_n(0u8, padding));
        out.extend_from_slice(&blob);
        std::fs::write(dest, out).map_err(ErrorKind::Io)?;
        tracing::debug!(archive = %dest.display(), entries = self.entries.len(), "Wrote archive container");
        Ok(())
    }

    fn header_node(&self, dir: &Path, dest: &Path, blob: &mut Vec<u8>) -> Result<Value> {
        let mut files = Map::new();
        for (path, entry) in self.children(dir) {
            let name = path.file_name().map(|name| name.to_string_lossy().into_owned()).unwrap_or_default();
            let node = match entry {
                Entry::Dir => self.header_node(path, dest, blob)?,
                Entry::Link(target) => json!({ "link": target.to_string_lossy() }),
                Entry::File { data, unpacked: true, executable } => {
                    let native = crate::binding::unpacked_path(dest).join(path);
                    if let Some(parent) = native.parent() {
                        std::fs::create_dir_all(parent).map_err(ErrorKind::Io)?;
                    }
                    std::fs::write(&native, data).map_err(ErrorKind::Io)?;
                    let mut node = json!({ "size": data.len(), "unpacked": true, "integrity": integrity_json(data) });
                    if *executable {
                        node["executable"] = Value::Bool(true);
                    }
                    node
                },
                Entry::File { data, unpacked: false, executable } => {
                    let mut node = json!({
                        "size": data.len(),
                        "offset": blob.len().to_string(),
                        "integrity": integrity_json(data),
                    });
                    if *executable {
                        node["executable"] = Value::Bool(true);
                    }
                    blob.extend_from_slice(data);
                    node
                },
            };
            files.insert(name, node);
        }
        Ok(json!({ "files": files }))
    }
}

fn integrity_json(data: &[u8]) -> Value {
    let blocks: Vec<String> = data.chunks(BLOCK_SIZE).map(|block| digest(HashAlgorithm::Sha256, block)).collect();
    json!({
        "algorithm": "SHA256",
        "hash": digest(HashAlgorithm::Sha256, data),
        "blockSize": BLOCK_SIZE,
        "blocks": blocks,
    })
}

fn u32_len(len: usize) -> Result<u32> {
    Ok(u32::try_from(len).map_err(|e| ErrorKind::Io(std::io::Error::other(e)))?)
}

impl ArchiveBinding for MemoryArchive {
    fn archive_path(&self) -> &Path {
        &self.path
    }

    fn get_file_info(&self, path: &Path) -> Option<FileInfo> {
        let resolved = self.resolve(path, true, 0)?;
        match self.entries.get(&resolved)? {
            Entry::File { data, unpacked, executable } => Some(FileInfo {
                size: data.len() as u64,
                offset: 0,
                unpacked: *unpacked,
                executable: *executable,
                integrity: None,
            }),
            _ => None,
        }
    }

    fn stat(&self, path: &Path) -> Option<Stats> {
        let resolved = self.resolve(path, false, 0)?;
        Some(match self.entries.get(&resolved)? {
            Entry::File { data, .. } => Stats { size: data.len() as u64, offset: 0, kind: FileType::File },
            Entry::Link(_) => Stats::link(),
            Entry::Dir => Stats::directory(),
        })
    }

    fn readdir(&self, path: &Path) -> Option<Vec<String>> {
        let resolved = self.resolve(path, true, 0)?;
        let Entry::Dir = self.entries.get(&resolved)? else {
            return None;
        };
        Some(
            self.children(&resolved)
                .filter_map(|(child, _)| child.file_name())
                .map(|name| name.to_string_lossy().into_owned())
                .collect(),
        )
    }

    fn realpath(&self, path: &Path) -> Option<PathBuf> {
        self.resolve(path, true, 0)
    }

    fn copy_file_out(&self, path: &Path) -> Result<Option<PathBuf>> {
        let Some(resolved) = self.resolve(path, true, 0) else {
            return Ok(None);
        };
        let Some(Entry::File { data, unpacked, executable }) = self.entries.get(&resolved) else {
            return Ok(None);
        };
        if *unpacked {
            return Ok(Some(join_inner(&self.unpacked_path(), &resolved)));
        }
        let mut extracted = self.extracted.borrow_mut();
        if extracted.is_none() {
            *extracted = Some(tempfile::tempdir().map_err(ErrorKind::Io)?);
        }
        let Some(dir) = extracted.as_ref() else {
            return Ok(None);
        };
        let out = dir.path().join(&resolved);
        if !out.exists() {
            if let Some(parent) = out.parent() {
                std::fs::create_dir_all(parent).map_err(ErrorKind::Io)?;
            }
            std::fs::write(&out, data).map_err(ErrorKind::Io)?;
            if *executable {
                set_executable(&out)?;
            }
        }
        Ok(Some(out))
    }

    fn get_fd_and_validate_integrity_later(&self) -> Option<&File> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> MemoryArchive {
        MemoryArchive::new("/srv/app.asar")
            .with_file("index.js", "require('./lib')")
            .with_file("lib/index.js", "module.exports = 42;")
            .with_link("node_modules/dep", "vendor/dep")
            .with_file("vendor/dep/package.json", r#"{"main": "main.js"}"#)
            .with_unpacked("native/addon.node", b"\x7fELF".to_vec())
            .with_dir("empty")
    }

    #[test]
    fn implied_directories() {
        let archive = fixture();
        assert!(archive.stat(Path::new("lib")).unwrap().is_dir());
        assert!(archive.stat(Path::new("vendor")).unwrap().is_dir());
        assert_eq!(archive.readdir(Path::new("empty")).unwrap(), Vec::<String>::new());
    }

    #[test]
    fn links_are_followed_except_at_the_end() {
        let archive = fixture();
        assert_eq!(archive.stat(Path::new("node_modules/dep")).unwrap().kind, FileType::Link);
        assert!(archive.stat(Path::new("node_modules/dep/package.json")).unwrap().is_file());
        assert_eq!(archive.realpath(Path::new("node_modules/dep")).unwrap(), Path::new("vendor/dep"));
        assert_eq!(archive.readdir(Path::new("node_modules/dep")).unwrap(), vec!["package.json"]);
    }

    #[test]
    fn missing_entries() {
        let archive = fixture();
        assert!(archive.stat(Path::new("nope.js")).is_none());
        assert!(archive.stat(Path::new("index.js/child")).is_none());
        assert!(archive.readdir(Path::new("index.js")).is_none());
        assert!(archive.get_file_info(Path::new("lib")).is_none());
        assert!(archive.copy_file_out(Path::new("nope.js")).unwrap().is_none());
    }

    #[test]
    fn copy_out_packed_and_unpacked() {
        let archive = fixture();
        let out = archive.copy_file_out(Path::new("lib/index.js")).unwrap().unwrap();
        assert_eq!(std::fs::read(&out).unwrap(), b"module.exports = 42;");
        let native = archive.copy_file_out(Path::new("native/addon.node")).unwrap().unwrap();
        assert_eq!(native, Path::new("/srv/app.asar.unpacked/native/addon.node"));
    }

    #[test]
    #[should_panic]
    fn invalid_fixture_path_panics() {
        let _ = MemoryArchive::new("/srv/app.asar").with_file("../escape.js", "");
    }
}
