//! Lexical path helpers.
//!
//! None of these touch the filesystem. They follow the host's path module
//! rather than `std::fs::canonicalize`: `..` is applied textually, symlinks
//! are not followed.

use std::path::{Component, Path, PathBuf};

/// The container extension, with its dot.
pub const ARCHIVE_EXTENSION: &str = ".asar";

/// Collapse `.`, `..` and repeated separators.
///
/// `..` at the root of an absolute path is dropped; at the start of a
/// relative path it is kept. An empty result becomes `.`.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use asar_resolve::path::normalize;
///
/// assert_eq!(normalize(Path::new("/a/b/../c/./d.js")), Path::new("/a/c/d.js"));
/// assert_eq!(normalize(Path::new("../x//y")), Path::new("../x/y"));
/// ```
pub fn normalize(path: &Path) -> PathBuf {
    let mut out: Vec<Component> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {},
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                },
                Some(Component::RootDir | Component::Prefix(_)) => {},
                _ => out.push(component),
            },
            _ => out.push(component),
        }
    }
    if out.is_empty() {
        return PathBuf::from(".");
    }
    out.into_iter().collect()
}

/// Resolve `request` against `base`, like the host's `path.resolve(base,
/// request)`.
///
/// Relative results are anchored at the current directory.
pub fn resolve(base: &Path, request: impl AsRef<Path>) -> PathBuf {
    let joined = base.join(request);
    if joined.is_absolute() {
        return normalize(&joined);
    }
    match std::env::current_dir() {
        Ok(cwd) => normalize(&cwd.join(joined)),
        Err(_) => normalize(&joined),
    }
}

/// Whether the path mentions the container extension anywhere, ignoring
/// case.
pub fn has_archive_token(path: &Path) -> bool {
    path.as_os_str().as_encoded_bytes().windows(ARCHIVE_EXTENSION.len()).any(|w| w.eq_ignore_ascii_case(ARCHIVE_EXTENSION.as_bytes()))
}

/// Byte index just past the first `.asar` (any case) for which `accept`
/// holds on the remaining text.
fn find_extension(path: &str, accept: impl Fn(&str) -> bool) -> Option<usize> {
    let lower = path.to_ascii_lowercase();
    lower.match_indices(ARCHIVE_EXTENSION).map(|(at, _)| at + ARCHIVE_EXTENSION.len()).find(|&end| accept(&path[end..]))
}

fn starts_with_separator(rest: &str) -> bool {
    rest.starts_with(std::path::is_separator)
}

/// Prefix of `path` up to and including the first `.asar` that ends a
/// segment.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use asar_resolve::path::archive_boundary;
///
/// assert_eq!(archive_boundary(Path::new("/a/app.asar/lib/x.js")).unwrap(), Path::new("/a/app.asar"));
/// assert_eq!(archive_boundary(Path::new("/a/app.asar")).unwrap(), Path::new("/a/app.asar"));
/// assert!(archive_boundary(Path::new("/a/app.asarx/y")).is_none());
/// ```
pub fn archive_boundary(path: &Path) -> Option<PathBuf> {
    let text = path.to_str()?;
    let end = find_extension(text, |rest| rest.is_empty() || starts_with_separator(rest))?;
    Some(PathBuf::from(&text[..end]))
}

/// Remove the first `.asar` that is followed by a separator, mapping a path
/// inside a container onto its mirror directory.
///
/// A bare container path has no mirror counterpart and yields [`None`].
///
/// ```
/// use std::path::Path;
/// use asar_resolve::path::strip_archive_extension;
///
/// assert_eq!(strip_archive_extension(Path::new("/a/app.asar/x.js")).unwrap(), Path::new("/a/app/x.js"));
/// assert!(strip_archive_extension(Path::new("/a/app.asar")).is_none());
/// ```
pub fn strip_archive_extension(path: &Path) -> Option<PathBuf> {
    let text = path.to_str()?;
    let end = find_extension(text, starts_with_separator)?;
    let start = end - ARCHIVE_EXTENSION.len();
    Some(PathBuf::from(format!("{}{}", &text[..start], &text[end..])))
}

/// Text-level suffix check; [`Path::ends_with`] only matches whole
/// components.
pub fn ends_with(path: &Path, suffix: &str) -> bool {
    path.as_os_str().as_encoded_bytes().ends_with(suffix.as_bytes())
}

/// Whether a request names a directory explicitly: a trailing `/`, or `.`
/// or `..` as its last segment.
pub fn has_trailing_slash(request: &str) -> bool {
    request.ends_with('/')
        || matches!(request, "." | "..")
        || request.ends_with("/.")
        || request.ends_with("/..")
}

/// Whether a request is relative to the requiring module (`./x`, `../x`,
/// `.` or `..`) rather than a bare package name.
pub fn is_relative_request(request: &str) -> bool {
    matches!(request, "." | "..")
        || request.starts_with("./")
        || request.starts_with("../")
        || (cfg!(windows) && (request.starts_with(".\\") || request.starts_with("..\\")))
}
