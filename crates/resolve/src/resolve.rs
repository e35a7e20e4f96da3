//! Archive-aware CommonJS module resolution.
//!
//! The search follows the host loader step for step: stat the candidate,
//! try it as a file, with each extension, then as a package directory. With
//! archive support on, every stat and manifest read that misses is retried
//! on the other side of the mirror boundary, so `app/` and `app.asar/`
//! behave as one tree and candidates keep the host's order across it.

use crate::cache::{PathKey, RawJson, StatCode};
use crate::classify::Split;
use crate::context::Context;
use crate::error::{ErrorKind, Result};
use crate::native::NativeKind;
use crate::overlay::{EntryKind, archive_entry_kind, is_missing};
use crate::package::PackageDescriptor;
use crate::path::{self, ARCHIVE_EXTENSION, ends_with, has_trailing_slash, is_relative_request, normalize};
use asar_archive::{join_inner, unpacked_path};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::instrument;

const NATIVE_ADDON_EXTENSION: &str = ".node";
const PACKAGE_JSON: &str = "package.json";
const NODE_MODULES: &str = "node_modules";

/// Which side of the mirror boundary a lookup may reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reach {
    /// Only the path as given.
    Literal,
    /// The path as given, then its mirror counterpart on a miss.
    Crossing,
}

impl Context {
    /// Cached existence check of the path as given.
    ///
    /// Only hits are cached: a path that is missing now is checked again next
    /// time. Native errors read as [`StatCode::NotFound`]; archive errors
    /// propagate.
    pub fn stat(&self, filename: &Path) -> Result<StatCode> {
        let filename = normalize(filename);
        if let Some(code) = self.caches.stat.get(&filename) {
            return Ok(code);
        }
        let code = match self.split_path(&filename)? {
            Split::Archive { archive_path, inner_path } => {
                match archive_entry_kind(self.binding(&archive_path)?.as_ref(), &inner_path) {
                    Some(EntryKind::File) => StatCode::File,
                    Some(EntryKind::Directory) => StatCode::Directory,
                    None => StatCode::NotFound,
                }
            },
            Split::NotArchive => match self.native.kind(&filename) {
                Ok(NativeKind::File) => StatCode::File,
                Ok(NativeKind::Directory) => StatCode::Directory,
                Err(e) => {
                    if !is_missing(&e) {
                        tracing::debug!(path = %filename.display(), error = %e, "Native stat failed");
                    }
                    StatCode::NotFound
                },
            },
        };
        self.caches.stat.insert(filename, code);
        Ok(code)
    }

    fn stat_as(&self, filename: &Path, reach: Reach) -> Result<StatCode> {
        let code = self.stat(filename)?;
        if code.exists() || reach == Reach::Literal {
            return Ok(code);
        }
        match self.mirror_counterpart(filename) {
            Some(counterpart) => self.stat(&counterpart),
            None => Ok(code),
        }
    }

    /// Find the file a request resolves to, searching `dirs` in order.
    ///
    /// Absolute requests ignore `dirs`. A relative request with no
    /// directories to search, or one found nowhere, is `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Archive failures, and [`ErrorKind::InvalidPackageMain`] when a
    /// package declares a `main` that doesn't exist and has no `index`
    /// either.
    #[instrument(level = "debug", skip(self, dirs), fields(candidates = dirs.len()))]
    pub fn find_path(&self, request: &str, dirs: &[PathBuf], is_main: bool) -> Result<Option<PathBuf>> {
        let root = [PathBuf::new()];
        let dirs = if Path::new(request).is_absolute() {
            &root[..]
        } else if dirs.is_empty() {
            return Ok(None);
        } else {
            dirs
        };

        let key = PathKey::new(request, dirs);
        if let Some(filename) = self.caches.path.get(&key) {
            return Ok(Some(filename));
        }

        let found = if self.disabled {
            self.search(request, dirs, is_main, Reach::Literal)?
        } else {
            let _mapping = self.enable_realpath_mapping();
            self.search(request, dirs, is_main, Reach::Crossing)?.map(|filename| self.cross_boundary(filename))
        };

        if let Some(filename) = &found {
            tracing::trace!(filename = %filename.display(), "Resolved");
            self.caches.path.insert(key, filename.clone());
        }
        Ok(found)
    }

    fn search(&self, request: &str, dirs: &[PathBuf], is_main: bool, reach: Reach) -> Result<Option<PathBuf>> {
        let trailing_slash = has_trailing_slash(request);
        for dir in dirs {
            // A container stats as a directory only once registered, so a
            // `.asar` candidate is searched regardless.
            if !dir.as_os_str().is_empty()
                && self.stat_as(dir, reach)? != StatCode::Directory
                && (self.disabled || !ends_with(dir, ARCHIVE_EXTENSION))
            {
                continue;
            }

            let base = path::resolve(dir, request);
            let rc = self.stat_as(&base, reach)?;
            let mut filename = None;
            if !trailing_slash {
                if rc == StatCode::File {
                    let preserve =
                        if is_main { self.options.preserve_symlinks_main } else { self.options.preserve_symlinks };
                    filename = Some(self.settle(&base, preserve)?);
                }
                if filename.is_none() {
                    filename = self.try_extensions(&base, is_main, reach)?;
                }
            }
            if filename.is_none() && rc == StatCode::Directory {
                filename = self.try_package(&base, is_main, reach)?;
            }
            let filename = match filename {
                Some(found) if !self.disabled => self.resolve_asar(found, is_main, reach)?,
                other => other,
            };
            if filename.is_some() {
                return Ok(filename);
            }
        }
        Ok(None)
    }

    /// Follow symlinks unless they are to be preserved.
    fn settle(&self, filename: &Path, preserve_symlinks: bool) -> Result<PathBuf> {
        if preserve_symlinks { Ok(path::resolve(Path::new(""), filename)) } else { self.realpath(filename) }
    }

    fn try_file(&self, filename: &Path, is_main: bool, reach: Reach) -> Result<Option<PathBuf>> {
        if self.stat_as(filename, reach)? != StatCode::File {
            return Ok(None);
        }
        Ok(Some(self.settle(filename, self.options.preserve_symlinks && !is_main)?))
    }

    fn try_extensions(&self, base: &Path, is_main: bool, reach: Reach) -> Result<Option<PathBuf>> {
        for extension in &self.options.extensions {
            let mut candidate = base.as_os_str().to_owned();
            candidate.push(extension);
            if let Some(filename) = self.try_file(Path::new(&candidate), is_main, reach)? {
                return Ok(Some(filename));
            }
        }
        Ok(None)
    }

    fn try_package(&self, request_path: &Path, is_main: bool, reach: Reach) -> Result<Option<PathBuf>> {
        let package = self.read_package_as(request_path, reach)?;
        let index = path::resolve(request_path, "index");
        let Some(main) = package.as_deref().and_then(PackageDescriptor::main) else {
            return self.try_extensions(&index, is_main, reach);
        };

        let filename = path::resolve(request_path, main);
        if let Some(found) = self.try_file(&filename, is_main, reach)? {
            return Ok(Some(found));
        }
        if let Some(found) = self.try_extensions(&filename, is_main, reach)? {
            return Ok(Some(found));
        }
        if let Some(found) = self.try_extensions(&path::resolve(&filename, "index"), is_main, reach)? {
            return Ok(Some(found));
        }

        let package_json = path::resolve(request_path, PACKAGE_JSON);
        let Some(found) = self.try_extensions(&index, is_main, reach)? else {
            exn::bail!(ErrorKind::InvalidPackageMain { main: filename, package_json });
        };
        tracing::warn!(
            code = "DEP0128",
            package_json = %package_json.display(),
            main,
            "Invalid 'main' field in package.json. Please either fix that or report it to the module author"
        );
        Ok(Some(found))
    }

    /// A filename that is itself a container is resolved again as a
    /// package, until it isn't; the result is then moved out to the
    /// unpacked companion directory if it has to live there.
    fn resolve_asar(&self, mut filename: PathBuf, is_main: bool, reach: Reach) -> Result<Option<PathBuf>> {
        while ends_with(&filename, ARCHIVE_EXTENSION) {
            let redirected = self.redirect_unpacked(filename)?;
            match self.try_package(&redirected, is_main, reach)? {
                Some(found) => filename = found,
                None => return Ok(None),
            }
        }
        Ok(Some(self.redirect_unpacked(filename)?))
    }

    /// Native addons and nested containers can't be loaded from inside a
    /// container: point them at `<archive>.unpacked/<inner>` instead.
    fn redirect_unpacked(&self, filename: PathBuf) -> Result<PathBuf> {
        if !ends_with(&filename, NATIVE_ADDON_EXTENSION) && !ends_with(&filename, ARCHIVE_EXTENSION) {
            return Ok(filename);
        }
        let (Some(parent), Some(name)) = (filename.parent().map(Path::to_path_buf), filename.file_name().map(OsStr::to_os_string))
        else {
            return Ok(filename);
        };
        let Split::Archive { archive_path, inner_path } = self.split_path(&parent)? else {
            return Ok(filename);
        };
        let redirected = join_inner(&unpacked_path(&archive_path), &inner_path).join(name);
        tracing::trace!(from = %filename.display(), to = %redirected.display(), "Redirected to unpacked");
        Ok(redirected)
    }

    /// Rewrite a search result that doesn't literally exist onto the
    /// side of the boundary where it does.
    fn cross_boundary(&self, filename: PathBuf) -> PathBuf {
        if self.caches.stat.contains(&normalize(&filename)) {
            return filename;
        }
        self.mirror_counterpart(&filename).unwrap_or(filename)
    }

    /// Read and filter the `package.json` in a directory.
    ///
    /// `None` means there is no manifest. With archive support enabled, a
    /// directory whose manifest doesn't exist falls back to the manifest of
    /// its mirror counterpart.
    pub fn read_package(&self, package_path: &Path) -> Result<Option<Rc<PackageDescriptor>>> {
        self.read_package_as(package_path, if self.disabled { Reach::Literal } else { Reach::Crossing })
    }

    fn read_package_as(&self, package_path: &Path, reach: Reach) -> Result<Option<Rc<PackageDescriptor>>> {
        let package = self.read_package_literal(package_path)?;
        if reach == Reach::Literal || package.as_ref().is_some_and(|package| package.exists) {
            return Ok(package);
        }
        match self.mirror_counterpart(package_path) {
            Some(counterpart) => {
                let mapped = self.read_package_literal(&counterpart)?;
                Ok(if mapped.is_some() { mapped } else { package })
            },
            None => Ok(package),
        }
    }

    fn read_package_literal(&self, package_path: &Path) -> Result<Option<Rc<PackageDescriptor>>> {
        let json_path = path::resolve(package_path, PACKAGE_JSON);
        if let Some(package) = self.caches.package.get(&json_path) {
            return Ok(package);
        }
        let raw = match self.caches.json.get(&json_path) {
            Some(raw) => raw,
            None => {
                let raw = self.read_json(&json_path)?;
                self.caches.json.insert(json_path.clone(), raw.clone());
                raw
            },
        };
        let package = raw.content.map(|content| {
            let json = if raw.non_empty { content.as_str() } else { "{}" };
            Rc::new(PackageDescriptor::parse(json))
        });
        self.caches.package.insert(json_path, package.clone());
        Ok(package)
    }

    fn read_json(&self, json_path: &Path) -> Result<RawJson> {
        match self.read_file(json_path) {
            Ok(bytes) => Ok(RawJson::new(String::from_utf8_lossy(&bytes).into_owned())),
            Err(e) if matches!(&*e, ErrorKind::NotFound(_) | ErrorKind::Io(_)) => Ok(RawJson::missing()),
            Err(e) => Err(e),
        }
    }

    /// Resolve a request the way `require` does from `parent`.
    ///
    /// Relative requests search the parent's directory, absolute ones are
    /// used as is, and bare package names search every `node_modules`
    /// directory from the parent's directory up to the root. Without a
    /// parent, the current directory stands in for it.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::ModuleNotFound`] when nothing matches, plus everything
    /// [`find_path`](Self::find_path) can fail with.
    pub fn resolve_filename(&self, request: &str, parent: Option<&Path>, is_main: bool) -> Result<PathBuf> {
        let from = match parent.and_then(Path::parent) {
            Some(dir) => path::resolve(Path::new(""), dir),
            None => path::resolve(Path::new(""), "."),
        };
        let dirs = if Path::new(request).is_absolute() {
            Vec::new()
        } else if is_relative_request(request) {
            vec![from]
        } else {
            node_module_paths(&from)
        };
        match self.find_path(request, &dirs, is_main)? {
            Some(filename) => Ok(filename),
            None => exn::bail!(ErrorKind::ModuleNotFound(request.to_string())),
        }
    }
}

/// Directories searched for bare requests made from `from`, nearest first.
///
/// ```
/// use std::path::{Path, PathBuf};
/// use asar_resolve::node_module_paths;
///
/// assert_eq!(
///     node_module_paths(Path::new("/srv/app/node_modules/dep")),
///     vec![
///         PathBuf::from("/srv/app/node_modules/dep/node_modules"),
///         PathBuf::from("/srv/app/node_modules"),
///         PathBuf::from("/srv/node_modules"),
///         PathBuf::from("/node_modules"),
///     ]
/// );
/// ```
pub fn node_module_paths(from: &Path) -> Vec<PathBuf> {
    let from = path::resolve(Path::new(""), from);
    let mut paths: Vec<PathBuf> = from
        .ancestors()
        .filter(|dir| dir.parent().is_some() && dir.file_name() != Some(OsStr::new(NODE_MODULES)))
        .map(|dir| dir.join(NODE_MODULES))
        .collect();
    if let Some(root) = from.ancestors().last() {
        paths.push(root.join(NODE_MODULES));
    }
    paths
}
