//! Path classification: is this path inside an archive?

use crate::context::Context;
use crate::error::{ErrorKind, Result};
use crate::native::NativeKind;
use crate::path::{self, has_archive_token};
use asar_archive::split_archive_path;
use exn::ResultExt;
use std::path::{Path, PathBuf};
use tracing::instrument;
use url::Url;

/// The forms a path can arrive in.
#[derive(Debug, Clone, Copy)]
pub enum PathInput<'a> {
    Str(&'a str),
    Path(&'a Path),
    /// Raw bytes, expected to be UTF-8.
    Bytes(&'a [u8]),
    /// Only `file:` URLs are accepted.
    Url(&'a Url),
}

impl PathInput<'_> {
    pub fn into_path(self) -> Result<PathBuf> {
        match self {
            PathInput::Str(s) => Ok(PathBuf::from(s)),
            PathInput::Path(path) => Ok(path.to_path_buf()),
            PathInput::Bytes(bytes) => {
                let text = std::str::from_utf8(bytes)
                    .or_raise(|| ErrorKind::InvalidPath("path buffer is not valid UTF-8".to_string()))?;
                Ok(PathBuf::from(text))
            },
            PathInput::Url(url) => {
                if url.scheme() != "file" {
                    exn::bail!(ErrorKind::InvalidPath(format!("URL scheme must be `file`, got `{}`", url.scheme())));
                }
                Ok(url.to_file_path().map_err(|()| ErrorKind::InvalidPath(format!("not a local file URL: {url}")))?)
            },
        }
    }
}
impl<'a> From<&'a str> for PathInput<'a> {
    fn from(s: &'a str) -> Self {
        PathInput::Str(s)
    }
}
impl<'a> From<&'a String> for PathInput<'a> {
    fn from(s: &'a String) -> Self {
        PathInput::Str(s)
    }
}
impl<'a> From<&'a Path> for PathInput<'a> {
    fn from(path: &'a Path) -> Self {
        PathInput::Path(path)
    }
}
impl<'a> From<&'a PathBuf> for PathInput<'a> {
    fn from(path: &'a PathBuf) -> Self {
        PathInput::Path(path)
    }
}
impl<'a> From<&'a [u8]> for PathInput<'a> {
    fn from(bytes: &'a [u8]) -> Self {
        PathInput::Bytes(bytes)
    }
}
impl<'a> From<&'a Url> for PathInput<'a> {
    fn from(url: &'a Url) -> Self {
        PathInput::Url(url)
    }
}

/// Outcome of [`Context::split_path`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Split {
    NotArchive,
    Archive {
        /// The container file.
        archive_path: PathBuf,
        /// Path relative to the container root; empty for the root itself.
        inner_path: PathBuf,
    },
}
impl Split {
    pub fn is_archive(&self) -> bool {
        matches!(self, Split::Archive { .. })
    }
}

impl Context {
    /// Classify a path and, when it is inside a registered archive, split it
    /// into the container and the path inside it.
    ///
    /// Cheap for the common case: a path that never mentions `.asar`, or any
    /// path while archive support is disabled, is rejected without touching
    /// the filesystem. Paths that mention the extension but don't sit inside
    /// a registered container are not archive paths either.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::InvalidPath`] when the input can't be read as a path,
    /// and [`ErrorKind::InvalidArchivePath`] when a registered archive path
    /// can't be split.
    #[instrument(level = "trace", skip_all)]
    pub fn split_path<'a>(&self, input: impl Into<PathInput<'a>>) -> Result<Split> {
        if self.disabled {
            return Ok(Split::NotArchive);
        }
        let path = input.into().into_path()?;
        if !has_archive_token(&path) || !self.registry.is_archive(&path) {
            return Ok(Split::NotArchive);
        }
        let absolute = path::resolve(Path::new(""), &path);
        match split_archive_path(&absolute, |candidate| self.is_native_dir(candidate)) {
            Some((archive_path, inner_path)) => Ok(Split::Archive { archive_path, inner_path }),
            None => exn::bail!(ErrorKind::InvalidArchivePath(path)),
        }
    }

    /// Memoized native directory check, used to tell `*.asar` directories
    /// from containers.
    fn is_native_dir(&self, path: &Path) -> bool {
        self.caches
            .directories
            .get_or_check(path, || matches!(self.native.kind(path), Ok(NativeKind::Directory)))
    }
}
