//! Registered archives and their mirror directories.

use crate::error::{ErrorKind, Result};
use crate::native::{NativeFs, NativeKind};
use crate::path::{self, archive_boundary};
use asar_archive::join_inner;
use asar_config::RegisterOptions;
use exn::ResultExt;
use indexmap::IndexMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::instrument;

const GLOB_TOKENS: [char; 3] = ['*', '?', '['];

/// How a registered archive is backed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    /// A container file, served through a binding.
    File,
    /// A plain directory registered in place of a container. It only
    /// contributes a mirror mapping; it never classifies as archive-bound.
    Directory,
}

/// Which paths are archives, and which directories mirror them.
///
/// Both maps keep insertion order: when several mirror directories are a
/// prefix of the same path, the one registered first wins.
#[derive(Debug, Default)]
pub struct ArchiveRegistry {
    archives: IndexMap<PathBuf, ArchiveKind>,
    /// Mirror directory → archive path.
    mirrors: IndexMap<PathBuf, PathBuf>,
}

impl ArchiveRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every archive named in `options`.
    ///
    /// Entries containing `*`, `?` or `[` are glob patterns and register
    /// every matching file. Everything else is resolved to an absolute path
    /// and registered as is.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::Config`] for a malformed glob pattern, or for a missing
    /// archive when `throw_if_no_entry` is set. Missing archives are skipped
    /// with a warning otherwise.
    #[instrument(level = "debug", skip_all, fields(count = options.archives.len()))]
    pub fn load_archives(&mut self, options: &RegisterOptions, native: &dyn NativeFs) -> Result<()> {
        for entry in &options.archives {
            if entry.contains(GLOB_TOKENS) {
                for matched in expand_glob(entry, native)? {
                    self.register(matched, options, native)?;
                }
            } else {
                self.register(path::resolve(Path::new(""), entry), options, native)?;
            }
        }
        Ok(())
    }

    fn register(&mut self, archive: PathBuf, options: &RegisterOptions, native: &dyn NativeFs) -> Result<()> {
        if self.archives.contains_key(&archive) {
            tracing::warn!(archive = %archive.display(), "Archive already registered, ignoring");
            return Ok(());
        }
        let kind = match native.kind(&archive) {
            Ok(NativeKind::File) => ArchiveKind::File,
            Ok(NativeKind::Directory) => {
                tracing::warn!(
                    archive = %archive.display(),
                    "Archive path is a directory; it is registered for mirror mapping only"
                );
                ArchiveKind::Directory
            },
            Err(e) if options.throw_if_no_entry => {
                exn::bail!(ErrorKind::Config(format!("archive not found: {} ({e})", archive.display())));
            },
            Err(e) => {
                tracing::warn!(archive = %archive.display(), error = %e, "Archive not found, skipping");
                return Ok(());
            },
        };
        if options.mirror_asar_base_path && archive.extension() == Some(OsStr::new("asar")) {
            let mirror = archive.with_extension("");
            if let Some(existing) = self.mirrors.get(&mirror) {
                tracing::debug!(mirror = %mirror.display(), archive = %existing.display(), "Mirror directory already mapped");
            } else {
                tracing::debug!(mirror = %mirror.display(), archive = %archive.display(), "Registered mirror directory");
                self.mirrors.insert(mirror, archive.clone());
            }
        }
        tracing::debug!(archive = %archive.display(), ?kind, "Registered archive");
        self.archives.insert(archive, kind);
        Ok(())
    }

    /// Whether `path` is, or lies inside, a registered container file.
    /// Relative paths are taken against the current directory.
    pub fn is_archive(&self, path: &Path) -> bool {
        archive_boundary(&path::resolve(Path::new(""), path))
            .is_some_and(|boundary| self.archives.get(&boundary) == Some(&ArchiveKind::File))
    }

    /// Map a path under a mirror directory onto the archive it shadows.
    ///
    /// Matching is by whole path segments: `/srv/application/x` is not under
    /// the mirror `/srv/app`.
    ///
    /// ```
    /// # use std::path::Path;
    /// # use asar_resolve::registry::ArchiveRegistry;
    /// let registry = ArchiveRegistry::new();
    /// assert!(registry.resolve_archive_mapping(Path::new("/srv/app/index.js")).is_none());
    /// ```
    pub fn resolve_archive_mapping(&self, path: &Path) -> Option<PathBuf> {
        if self.mirrors.is_empty() {
            return None;
        }
        let path = path::resolve(Path::new(""), path);
        self.mirrors
            .iter()
            .find_map(|(mirror, archive)| path.strip_prefix(mirror).ok().map(|suffix| join_inner(archive, suffix)))
    }

    pub fn archives(&self) -> &IndexMap<PathBuf, ArchiveKind> {
        &self.archives
    }

    pub fn mirrors(&self) -> &IndexMap<PathBuf, PathBuf> {
        &self.mirrors
    }

    pub fn is_empty(&self) -> bool {
        self.archives.is_empty()
    }
}

/// Expand a glob pattern to the absolute paths of the files it matches.
fn expand_glob(pattern: &str, native: &dyn NativeFs) -> Result<Vec<PathBuf>> {
    let entries = glob::glob(pattern).or_raise(|| ErrorKind::Config(format!("invalid glob pattern `{pattern}`")))?;
    let mut matches = Vec::new();
    for entry in entries {
        match entry {
            Ok(matched) => {
                let matched = path::resolve(Path::new(""), matched);
                if matches!(native.kind(&matched), Ok(NativeKind::File)) {
                    matches.push(matched);
                }
            },
            Err(e) => tracing::warn!(pattern, error = %e, "Unreadable glob match, skipping"),
        }
    }
    tracing::debug!(pattern, matched = matches.len(), "Expanded archive pattern");
    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::OsFs;
    use std::fs;
    use tempfile::TempDir;

    fn fixture() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("dist")).unwrap();
        fs::write(dir.path().join("dist/app.asar"), "").unwrap();
        fs::write(dir.path().join("dist/plugins.asar"), "").unwrap();
        fs::write(dir.path().join("dist/notes.txt"), "").unwrap();
        fs::create_dir(dir.path().join("dist/folder.asar")).unwrap();
        dir
    }

    fn load(archives: &[String]) -> ArchiveRegistry {
        let mut registry = ArchiveRegistry::new();
        registry.load_archives(&RegisterOptions::new(archives), &OsFs).unwrap();
        registry
    }

    #[test]
    fn glob_registers_matching_files_only() {
        let dir = fixture();
        let registry = load(&[format!("{}/dist/*.asar", dir.path().display())]);
        let registered: Vec<_> = registry.archives().keys().cloned().collect();
        assert_eq!(registered, vec![dir.path().join("dist/app.asar"), dir.path().join("dist/plugins.asar")]);
        assert!(registry.archives().values().all(|kind| *kind == ArchiveKind::File));
        assert_eq!(registry.mirrors().get(&dir.path().join("dist/app")), Some(&dir.path().join("dist/app.asar")));
    }

    #[test]
    #[tracing_test::traced_test]
    fn duplicate_registration_is_ignored() {
        let dir = fixture();
        let app = dir.path().join("dist/app.asar").display().to_string();
        let registry = load(&[app.clone(), app]);
        assert_eq!(registry.archives().len(), 1);
        assert_eq!(registry.mirrors().len(), 1);
        logs_assert(|lines: &[&str]| {
            match lines.iter().filter(|line| line.contains("WARN") && line.contains("Archive already registered")).count() {
                1 => Ok(()),
                n => Err(format!("expected one duplicate warning, got {n}")),
            }
        });
    }

    #[test]
    fn missing_archive_lenient_and_strict() {
        let dir = fixture();
        let missing = dir.path().join("dist/missing.asar").display().to_string();
        assert!(load(std::slice::from_ref(&missing)).is_empty());

        let mut registry = ArchiveRegistry::new();
        let options = RegisterOptions::new([missing]).throw_if_no_entry(true);
        let err = registry.load_archives(&options, &OsFs).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Config(_)));
    }

    #[test]
    fn directory_archive_mirrors_but_is_not_an_archive() {
        let dir = fixture();
        let folder = dir.path().join("dist/folder.asar");
        let registry = load(&[folder.display().to_string()]);
        assert_eq!(registry.archives().get(&folder), Some(&ArchiveKind::Directory));
        assert!(!registry.is_archive(&folder.join("x.js")));
        assert_eq!(registry.resolve_archive_mapping(&dir.path().join("dist/folder/x.js")), Some(folder.join("x.js")));
    }

    #[test]
    fn mirroring_can_be_disabled() {
        let dir = fixture();
        let mut registry = ArchiveRegistry::new();
        let options = RegisterOptions::new([dir.path().join("dist/app.asar").display().to_string()]).mirror_asar_base_path(false);
        registry.load_archives(&options, &OsFs).unwrap();
        assert_eq!(registry.archives().len(), 1);
        assert!(registry.mirrors().is_empty());
    }

    #[test]
    fn is_archive_uses_the_boundary_prefix() {
        let dir = fixture();
        let app = dir.path().join("dist/app.asar");
        let registry = load(&[app.display().to_string()]);
        assert!(registry.is_archive(&app));
        assert!(registry.is_archive(&app.join("sub/file.js")));
        assert!(registry.is_archive(&app.join("sub/../other.js")));
        assert!(!registry.is_archive(&dir.path().join("dist/plugins.asar/x.js")));
        assert!(!registry.is_archive(&dir.path().join("dist/app.asarx")));
    }

    /// `target` spelled relative to the current directory.
    #[cfg(unix)]
    fn relative_to_cwd(target: &Path) -> PathBuf {
        let cwd = std::env::current_dir().unwrap();
        let up = "../".repeat(cwd.components().count() - 1);
        PathBuf::from(up).join(target.strip_prefix("/").unwrap())
    }

    #[cfg(unix)]
    #[test]
    fn relative_paths_are_made_absolute() {
        let dir = fixture();
        let app = dir.path().join("dist/app.asar");
        let registry = load(&[app.display().to_string()]);
        assert!(registry.is_archive(&relative_to_cwd(&app.join("x.js"))));
        assert_eq!(
            registry.resolve_archive_mapping(&relative_to_cwd(&dir.path().join("dist/app/x.js"))),
            Some(app.join("x.js"))
        );
    }

    #[test]
    fn mapping_matches_whole_segments() {
        let dir = fixture();
        let registry = load(&[dir.path().join("dist/app.asar").display().to_string()]);
        let app = dir.path().join("dist/app");
        assert_eq!(registry.resolve_archive_mapping(&app.join("lib/x.js")), Some(dir.path().join("dist/app.asar/lib/x.js")));
        assert_eq!(registry.resolve_archive_mapping(&app), Some(dir.path().join("dist/app.asar")));
        assert!(registry.resolve_archive_mapping(&dir.path().join("dist/application/x.js")).is_none());
    }

    #[test]
    fn first_registered_mirror_wins() {
        let mut registry = ArchiveRegistry::new();
        registry.mirrors.insert(PathBuf::from("/srv/app"), PathBuf::from("/srv/app.asar"));
        registry.mirrors.insert(PathBuf::from("/srv/app/nested"), PathBuf::from("/srv/app/nested.asar"));
        assert_eq!(
            registry.resolve_archive_mapping(Path::new("/srv/app/nested/x.js")),
            Some(PathBuf::from("/srv/app.asar/nested/x.js"))
        );
    }

    #[test]
    fn invalid_glob_pattern() {
        let mut registry = ArchiveRegistry::new();
        let err = registry.load_archives(&RegisterOptions::new(["/srv/[*.asar"]), &OsFs).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Config(_)));
    }
}
