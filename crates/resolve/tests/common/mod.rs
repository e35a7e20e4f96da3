#![allow(dead_code)]

use asar_archive::{ArchiveCache, MemoryArchive};
use asar_config::{RegisterOptions, ResolveOptions};
use asar_resolve::{Context, NativeFs, NativeKind, OsFs};
use std::cell::RefCell;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tempfile::TempDir;

/// A canonical temporary directory to build native trees in.
pub struct Fixture {
    _dir: TempDir,
    pub root: PathBuf,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        Self { _dir: dir, root }
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    pub fn write(&self, relative: &str, contents: &str) -> PathBuf {
        let path = self.path(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, contents).unwrap();
        path
    }

    pub fn mkdir(&self, relative: &str) -> PathBuf {
        let path = self.path(relative);
        std::fs::create_dir_all(&path).unwrap();
        path
    }
}

/// [`OsFs`] that records every path it is asked about.
#[derive(Clone, Default)]
pub struct RecordingFs {
    calls: Rc<RefCell<Vec<PathBuf>>>,
}

impl RecordingFs {
    pub fn calls(&self) -> Vec<PathBuf> {
        self.calls.borrow().clone()
    }

    /// Recorded paths strictly below `dir`.
    pub fn touched_inside(&self, dir: &Path) -> Vec<PathBuf> {
        self.calls.borrow().iter().filter(|path| path.starts_with(dir) && path.as_path() != dir).cloned().collect()
    }

    fn record(&self, path: &Path) {
        self.calls.borrow_mut().push(path.to_path_buf());
    }
}

impl NativeFs for RecordingFs {
    fn kind(&self, path: &Path) -> io::Result<NativeKind> {
        self.record(path);
        OsFs.kind(path)
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.record(path);
        OsFs.read(path)
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<String>> {
        self.record(path);
        OsFs.read_dir(path)
    }

    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        self.record(path);
        OsFs.canonicalize(path)
    }
}

/// The application used by most scenarios:
///
/// - `app.asar`: a placeholder container file, served from memory
/// - `app/`: its native mirror directory, holding a few files of its own
pub struct App {
    pub fixture: Fixture,
    pub archive: PathBuf,
    pub mirror: PathBuf,
    pub native: RecordingFs,
    pub context: Context,
}

impl App {
    pub fn new() -> Self {
        Self::build(ResolveOptions::default(), false)
    }

    pub fn with_options(options: ResolveOptions) -> Self {
        Self::build(options, false)
    }

    /// Same tree and registration, with archive support switched off.
    pub fn disabled() -> Self {
        Self::build(ResolveOptions::default(), true)
    }

    fn build(options: ResolveOptions, disabled: bool) -> Self {
        let fixture = Fixture::new();
        let archive = fixture.write("app.asar", "");
        let mirror = fixture.mkdir("app");
        fixture.write("app/index.js", "require('semver')");
        fixture.write("app/common.js", "module.exports = 'mirror';");
        fixture.write("app/only-mirror.js", "");

        let memory = MemoryArchive::new(&archive)
            .with_file("package.json", r#"{"name": "app", "main": "main.js"}"#)
            .with_file("main.js", "require('./components')")
            .with_file("components/index.js", "require('../dep'); require('express');")
            .with_file("dep/index.js", "module.exports = 'dep';")
            .with_file("common.js", "module.exports = 'archive';")
            .with_file("only-archive.js", "")
            .with_file("mirror-pkg/lib.js", "")
            .with_file("node_modules/express/package.json", r#"{"name": "express", "main": "lib/express.js"}"#)
            .with_file("node_modules/express/lib/express.js", "")
            .with_file("node_modules/semver/package.json", r#"{"name": "semver", "main": "semver.js"}"#)
            .with_file("node_modules/semver/semver.js", "")
            .with_link("node_modules/latest", "node_modules/semver")
            .with_file("broken/package.json", r#"{"main": "nope.js"}"#)
            .with_file("legacy/package.json", r#"{"main": "nope.js"}"#)
            .with_file("legacy/index.js", "")
            .with_file("corrupt/package.json", "{ \"main\": ")
            .with_file("corrupt/index.js", "")
            .with_unpacked("native/addon.node", b"\x7fELF".to_vec());

        let native = RecordingFs::default();
        let mut context = Context::builder()
            .disabled(disabled)
            .options(options)
            .native(native.clone())
            .archives(ArchiveCache::from_memory([memory]))
            .build();
        context.load_archives(&RegisterOptions::new([archive.display().to_string()])).unwrap();
        Self { fixture, archive, mirror, native, context }
    }

    pub fn in_archive(&self, relative: &str) -> PathBuf {
        self.archive.join(relative)
    }

    pub fn in_mirror(&self, relative: &str) -> PathBuf {
        self.mirror.join(relative)
    }
}
