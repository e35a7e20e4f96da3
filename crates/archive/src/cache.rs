//! Per-process table of open archive bindings.

use crate::BindingHandle;
use crate::asar::AsarArchive;
use crate::error::Result;
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;
use std::rc::Rc;

type Opener = Box<dyn Fn(&Path) -> Result<BindingHandle>>;

/// Opens each container at most once and hands out shared handles.
///
/// Only successful opens are cached, so a container that appears later is
/// picked up on the next request.
pub struct ArchiveCache {
    opener: Opener,
    entries: RefCell<HashMap<PathBuf, BindingHandle>>,
}

impl ArchiveCache {
    /// Cache using a custom opener.
    pub fn new(opener: impl Fn(&Path) -> Result<BindingHandle> + 'static) -> Self {
        Self {
            opener: Box::new(opener),
            entries: RefCell::new(HashMap::new()),
        }
    }

    /// Cache that opens real containers from the local filesystem.
    pub fn on_disk() -> Self {
        Self::new(|path| {
            let archive: BindingHandle = Rc::new(AsarArchive::open(path)?);
            Ok(archive)
        })
    }

    /// Cache serving the given in-memory archives, keyed by their archive
    /// path. Opening any other path fails with
    /// [`ErrorKind::Open`](crate::error::ErrorKind::Open).
    #[cfg(any(test, feature = "mock"))]
    pub fn from_memory(archives: impl IntoIterator<Item = crate::MemoryArchive>) -> Self {
        use crate::ArchiveBinding;
        use crate::error::ErrorKind;

        let archives: HashMap<PathBuf, BindingHandle> = archives
            .into_iter()
            .map(|archive| (archive.archive_path().to_path_buf(), Rc::new(archive) as BindingHandle))
            .collect();
        Self::new(move |path| {
            archives.get(path).cloned().ok_or_else(|| exn::Exn::from(ErrorKind::Open(path.to_path_buf())))
        })
    }

    /// Shared handle for the container at `path`, opening it on first use.
    pub fn get_or_open(&self, path: &Path) -> Result<BindingHandle> {
        if let Some(handle) = self.entries.borrow().get(path) {
            return Ok(Rc::clone(handle));
        }
        let handle = (self.opener)(path)?;
        tracing::debug!(archive = %path.display(), "Cached archive binding");
        self.entries.borrow_mut().insert(path.to_path_buf(), Rc::clone(&handle));
        Ok(handle)
    }

    pub fn is_cached(&self, path: &Path) -> bool {
        self.entries.borrow().contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}
impl Default for ArchiveCache {
    fn default() -> Self {
        Self::on_disk()
    }
}
