//! Archive-aware path classification and module resolution.
//!
//! Application code packed into an ASAR container should load exactly as it
//! would from a plain directory. This crate decides, for any path, whether
//! it lies inside a registered container, and reimplements the CommonJS
//! resolution algorithm on top of that decision, so that `require` calls
//! cross between a container (`app.asar/`) and its mirror directory
//! (`app/`) transparently.
//!
//! All state lives in a [`Context`]:
//!
//! 1. Build one with [`Context::builder`] or [`Context::from_config`].
//! 2. Register archives with [`Context::load_archives`].
//! 3. Classify paths with [`Context::split_path`] and resolve requests with
//!    [`Context::find_path`] or [`Context::resolve_filename`].
//!
//! Container contents are only ever read through an
//! [`ArchiveBinding`](asar_archive::ArchiveBinding); native files through a
//! [`NativeFs`].

mod cache;
mod classify;
mod context;
pub mod error;
mod native;
mod overlay;
pub mod package;
pub mod path;
pub mod registry;
mod resolve;

pub use crate::cache::{Caches, DirectoryMemo, JsonCache, PackageCache, PathCache, PathKey, RawJson, StatCache, StatCode};
pub use crate::classify::{PathInput, Split};
pub use crate::context::{Context, ContextBuilder};
pub use crate::native::{NativeFs, NativeKind, OsFs};
pub use crate::overlay::EntryKind;
pub use crate::package::{PackageDescriptor, PackageType};
pub use crate::registry::{ArchiveKind, ArchiveRegistry};
pub use crate::resolve::node_module_paths;
