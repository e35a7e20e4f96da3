//! Resolution Error Types

use derive_more::{Display, Error};
use std::io::Error as IoError;
use std::path::PathBuf;

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Registration could not complete: an archive is missing in strict
    /// mode, or a glob pattern is malformed.
    #[display("configuration error: {_0}")]
    Config(#[error(not(source))] String),
    /// Input could not be turned into a path (non-UTF-8 buffer, non-`file`
    /// URL).
    #[display("invalid path: {_0}")]
    InvalidPath(#[error(not(source))] String),
    /// Path looks archive-bound, but no container could be split from it.
    #[display("invalid asar archive path: {}", _0.display())]
    InvalidArchivePath(#[error(not(source))] PathBuf),
    /// Binding failed to open or read an archive.
    #[display("archive error")]
    Archive,
    #[display("not found: {}", _0.display())]
    NotFound(#[error(not(source))] PathBuf),
    #[display("I/O error: {_0}")]
    Io(IoError),
    /// Neither the declared `main` of a package nor its `index` exist.
    #[display(
        "cannot find module '{}'. Please verify that {} has a valid \"main\" entry",
        main.display(),
        package_json.display()
    )]
    InvalidPackageMain { main: PathBuf, package_json: PathBuf },
    #[display("cannot find module '{_0}'")]
    ModuleNotFound(#[error(not(source))] String),
}
impl From<IoError> for ErrorKind {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Archive)
    }

    /// Returns `true` when the module simply doesn't exist, as opposed to
    /// a broken setup.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::ModuleNotFound(_) | Self::InvalidPackageMain { .. })
    }
}
