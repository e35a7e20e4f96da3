//! Archive entry metadata.
//!
//! These types are what a binding reports about entries inside a container;
//! none of them carry file contents.

/// Kind of an entry inside an archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileType {
    File,
    Directory,
    /// Symbolic link to another archive-relative path
    Link,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    Sha256,
}

/// Hash recorded in the header for a packed file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Integrity {
    pub algorithm: HashAlgorithm,
    /// Lowercase hex digest of the whole file
    pub hash: String,
    pub block_size: u32,
    /// Per-block hex digests
    pub blocks: Vec<String>,
}

/// Location and flags of a file inside an archive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileInfo {
    /// File size in bytes
    pub size: u64,
    /// Absolute byte offset inside the container (zero when unpacked)
    pub offset: u64,
    /// Stored in the `.unpacked` companion directory instead of the container
    pub unpacked: bool,
    pub executable: bool,
    pub integrity: Option<Integrity>,
}

/// Result of [`stat`](crate::ArchiveBinding::stat).
///
/// Directories and links report a zero size and offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    pub size: u64,
    pub offset: u64,
    pub kind: FileType,
}
impl Stats {
    pub(crate) fn directory() -> Self {
        Self { size: 0, offset: 0, kind: FileType::Directory }
    }

    pub(crate) fn link() -> Self {
        Self { size: 0, offset: 0, kind: FileType::Link }
    }

    pub fn is_file(&self) -> bool {
        self.kind == FileType::File
    }

    pub fn is_dir(&self) -> bool {
        self.kind == FileType::Directory
    }
}
impl From<&FileInfo> for Stats {
    fn from(info: &FileInfo) -> Self {
        Self { size: info.size, offset: info.offset, kind: FileType::File }
    }
}
