//! Archive-relative path validation.

use std::path::{Component, Path, PathBuf};

use crate::error::{ErrorKind, Result};

/// Validates a path relative to the archive root.
///
/// The empty path (and anything that normalizes to it, such as `.` or `a/..`)
/// is the archive root and is valid. Leading separators are ignored, so
/// `/a/b` and `a/b` name the same entry.
///
/// > **Note:** This does **not** normalize backslashes, non-UTF8 bytes, or
/// >           platform-specific weirdness. Null bytes are explicitly rejected.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use asar_archive::validate_inner_path;
/// assert_eq!(validate_inner_path("lib/./index.js").unwrap(), Path::new("lib/index.js"));
/// assert_eq!(validate_inner_path("").unwrap(), Path::new(""));
/// assert!(validate_inner_path("../outside.js").is_err());
/// ```
pub fn validate(path: impl AsRef<Path>) -> Result<PathBuf> {
    let mut components = Vec::new();
    for component in path.as_ref().components() {
        match component {
            Component::Normal(s) => {
                if s.as_encoded_bytes().contains(&0) {
                    exn::bail!(ErrorKind::InvalidPath(path.as_ref().to_path_buf()));
                }
                components.push(s)
            },
            Component::CurDir | Component::RootDir => {},
            Component::Prefix(_) => exn::bail!(ErrorKind::InvalidPath(path.as_ref().to_path_buf())),
            Component::ParentDir => {
                if components.pop().is_none() {
                    exn::bail!(ErrorKind::InvalidPath(path.as_ref().to_path_buf()));
                }
            },
        }
    }
    Ok(components.into_iter().collect())
}

/// Joins an archive-relative path onto a base without leaving a trailing
/// separator behind for the root.
pub fn join_inner(base: &Path, inner: &Path) -> PathBuf {
    if inner.as_os_str().is_empty() { base.to_path_buf() } else { base.join(inner) }
}
