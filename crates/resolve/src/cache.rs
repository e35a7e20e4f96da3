//! Resolution caches.
//!
//! All caches are unbounded and live as long as their [`Context`]; archives
//! and mirror directories are treated as immutable once registered, so
//! there is no invalidation. Reading a cache never performs I/O.
//!
//! [`Context`]: crate::Context

use crate::package::PackageDescriptor;
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Tri-state result of an existence check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i8)]
pub enum StatCode {
    NotFound = -1,
    File = 0,
    Directory = 1,
}
impl StatCode {
    pub fn exists(self) -> bool {
        self != Self::NotFound
    }
}

/// Stat results keyed by normalized absolute path.
///
/// Misses are never stored: a file that doesn't exist yet may be created
/// later and must be checked again.
#[derive(Debug, Default)]
pub struct StatCache {
    entries: RefCell<HashMap<PathBuf, StatCode>>,
}
impl StatCache {
    pub fn get(&self, path: &Path) -> Option<StatCode> {
        self.entries.borrow().get(path).copied()
    }

    pub fn insert(&self, path: PathBuf, code: StatCode) {
        if code.exists() {
            self.entries.borrow_mut().insert(path, code);
        }
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.entries.borrow().contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

/// Raw manifest text as read from disk or an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawJson {
    /// `None` when the file is absent or unreadable.
    pub content: Option<String>,
    pub non_empty: bool,
}
impl RawJson {
    pub fn missing() -> Self {
        Self { content: None, non_empty: false }
    }

    pub fn new(content: String) -> Self {
        let non_empty = !content.is_empty();
        Self { content: Some(content), non_empty }
    }
}

/// Raw manifest reads, beneath [`PackageCache`].
#[derive(Debug, Default)]
pub struct JsonCache {
    entries: RefCell<HashMap<PathBuf, RawJson>>,
}
impl JsonCache {
    pub fn get(&self, path: &Path) -> Option<RawJson> {
        self.entries.borrow().get(path).cloned()
    }

    pub fn insert(&self, path: PathBuf, raw: RawJson) {
        self.entries.borrow_mut().insert(path, raw);
    }
}

/// Parsed manifests keyed by the absolute `package.json` path. `None`
/// records that no manifest exists there.
#[derive(Debug, Default)]
pub struct PackageCache {
    entries: RefCell<HashMap<PathBuf, Option<Rc<PackageDescriptor>>>>,
}
impl PackageCache {
    pub fn get(&self, path: &Path) -> Option<Option<Rc<PackageDescriptor>>> {
        self.entries.borrow().get(path).cloned()
    }

    pub fn insert(&self, path: PathBuf, package: Option<Rc<PackageDescriptor>>) {
        self.entries.borrow_mut().insert(path, package);
    }
}

/// Key of a [`PathCache`] entry: the request and the exact, ordered list
/// of directories it was searched in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathKey {
    pub request: String,
    pub dirs: Vec<PathBuf>,
}
impl PathKey {
    pub fn new(request: &str, dirs: &[PathBuf]) -> Self {
        Self { request: request.to_string(), dirs: dirs.to_vec() }
    }
}

/// Final filenames of completed resolutions.
#[derive(Debug, Default)]
pub struct PathCache {
    entries: RefCell<HashMap<PathKey, PathBuf>>,
}
impl PathCache {
    pub fn get(&self, key: &PathKey) -> Option<PathBuf> {
        self.entries.borrow().get(key).cloned()
    }

    pub fn insert(&self, key: PathKey, filename: PathBuf) {
        self.entries.borrow_mut().insert(key, filename);
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

/// Whether native `*.asar` paths are real directories, for the splitter.
#[derive(Debug, Default)]
pub struct DirectoryMemo {
    entries: RefCell<HashMap<PathBuf, bool>>,
}
impl DirectoryMemo {
    pub fn get_or_check(&self, path: &Path, check: impl FnOnce() -> bool) -> bool {
        if let Some(is_dir) = self.entries.borrow().get(path) {
            return *is_dir;
        }
        let is_dir = check();
        self.entries.borrow_mut().insert(path.to_path_buf(), is_dir);
        is_dir
    }
}

/// Every cache a [`Context`](crate::Context) keeps.
#[derive(Debug, Default)]
pub struct Caches {
    pub stat: StatCache,
    pub json: JsonCache,
    pub package: PackageCache,
    pub path: PathCache,
    pub directories: DirectoryMemo,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stat_cache_skips_misses() {
        let cache = StatCache::default();
        cache.insert(PathBuf::from("/a"), StatCode::NotFound);
        cache.insert(PathBuf::from("/b"), StatCode::Directory);
        assert_eq!(cache.get(Path::new("/a")), None);
        assert_eq!(cache.get(Path::new("/b")), Some(StatCode::Directory));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn json_cache_keeps_missing_reads() {
        let cache = JsonCache::default();
        cache.insert(PathBuf::from("/p/package.json"), RawJson::missing());
        cache.insert(PathBuf::from("/q/package.json"), RawJson::new("{}".to_string()));
        assert_eq!(cache.get(Path::new("/p/package.json")), Some(RawJson::missing()));
        assert!(cache.get(Path::new("/q/package.json")).unwrap().non_empty);
        assert!(!RawJson::new(String::new()).non_empty);
    }

    #[test]
    fn path_key_is_order_sensitive() {
        let cache = PathCache::default();
        let dirs = vec![PathBuf::from("/a"), PathBuf::from("/b")];
        cache.insert(PathKey::new("x", &dirs), PathBuf::from("/a/x.js"));
        assert!(cache.get(&PathKey::new("x", &dirs)).is_some());
        let reversed: Vec<_> = dirs.into_iter().rev().collect();
        assert!(cache.get(&PathKey::new("x", &reversed)).is_none());
    }

    #[test]
    fn stat_code_values() {
        assert_eq!(StatCode::NotFound as i8, -1);
        assert_eq!(StatCode::File as i8, 0);
        assert_eq!(StatCode::Directory as i8, 1);
        assert!(!StatCode::NotFound.exists());
    }

    #[test]
    fn directory_memo_checks_once() {
        let memo = DirectoryMemo::default();
        assert!(memo.get_or_check(Path::new("/a.asar"), || true));
        assert!(memo.get_or_check(Path::new("/a.asar"), || panic!("checked twice")));
    }
}
