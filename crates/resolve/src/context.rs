//! The resolution context.

use crate::cache::Caches;
use crate::error::{ErrorKind, Result};
use crate::native::{NativeFs, OsFs};
use crate::registry::ArchiveRegistry;
use asar_archive::ArchiveCache;
use asar_config::{Config, RegisterOptions, ResolveOptions, env_disables_archives};
use exn::ResultExt;
use std::cell::Cell;

/// Everything archive-aware resolution needs, owned in one place.
///
/// A context holds the registry, the open archive bindings and every cache.
/// It is built once, has its archives registered, and is then passed by
/// reference to classification and resolution calls. Contexts use `Rc`,
/// `RefCell` and `Cell` internally: each thread builds its own.
///
/// # Examples
///
/// ```no_run
/// use std::path::PathBuf;
/// use asar_config::RegisterOptions;
/// use asar_resolve::Context;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mut context = Context::builder().build();
/// context.load_archives(&RegisterOptions::new(["/opt/app/resources/app.asar"]))?;
/// let found = context.find_path("./index", &[PathBuf::from("/opt/app/resources/app.asar")], true)?;
/// # Ok(())
/// # }
/// ```
pub struct Context {
    pub(crate) options: ResolveOptions,
    pub(crate) disabled: bool,
    pub(crate) native: Box<dyn NativeFs>,
    pub(crate) registry: ArchiveRegistry,
    pub(crate) archives: ArchiveCache,
    pub(crate) caches: Caches,
    realpath_mapping: Cell<bool>,
}

impl Context {
    pub fn builder() -> ContextBuilder {
        ContextBuilder::default()
    }

    /// Build a context from loaded configuration and register its archives.
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate().or_raise(|| ErrorKind::Config("invalid configuration".to_string()))?;
        let mut context = Self::builder().options(config.resolve.clone()).disabled(config.is_disabled()).build();
        context.load_archives(&config.register)?;
        Ok(context)
    }

    /// Register archives. Must complete before any resolution traffic.
    pub fn load_archives(&mut self, options: &RegisterOptions) -> Result<()> {
        self.registry.load_archives(options, self.native.as_ref())
    }

    pub fn options(&self) -> &ResolveOptions {
        &self.options
    }

    /// Whether every archive code path is switched off.
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn registry(&self) -> &ArchiveRegistry {
        &self.registry
    }

    pub fn caches(&self) -> &Caches {
        &self.caches
    }

    pub fn archive_cache(&self) -> &ArchiveCache {
        &self.archives
    }

    pub fn is_realpath_mapping_enabled(&self) -> bool {
        self.realpath_mapping.get()
    }

    /// Let [`realpath`](Self::realpath) retry misses across the mirror
    /// boundary until the returned guard is dropped.
    pub(crate) fn enable_realpath_mapping(&self) -> RealpathMappingGuard<'_> {
        let previous = self.realpath_mapping.replace(true);
        RealpathMappingGuard { flag: &self.realpath_mapping, previous }
    }
}
impl Default for Context {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Restores the realpath mapping flag on drop, on every exit path.
pub(crate) struct RealpathMappingGuard<'a> {
    flag: &'a Cell<bool>,
    previous: bool,
}
impl Drop for RealpathMappingGuard<'_> {
    fn drop(&mut self) {
        self.flag.set(self.previous);
    }
}

/// Builder for [`Context`].
///
/// Unset parts default to the process environment: `ELECTRON_NO_ASAR` for
/// the disable switch, `std::fs` for native access, and on-disk containers.
#[derive(Default)]
pub struct ContextBuilder {
    options: Option<ResolveOptions>,
    disabled: Option<bool>,
    native: Option<Box<dyn NativeFs>>,
    archives: Option<ArchiveCache>,
}

impl ContextBuilder {
    pub fn options(mut self, options: ResolveOptions) -> Self {
        self.options = Some(options);
        self
    }

    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = Some(disabled);
        self
    }

    pub fn native(mut self, native: impl NativeFs + 'static) -> Self {
        self.native = Some(Box::new(native));
        self
    }

    /// Where archive bindings come from.
    pub fn archives(mut self, archives: ArchiveCache) -> Self {
        self.archives = Some(archives);
        self
    }

    pub fn build(self) -> Context {
        let disabled = self.disabled.unwrap_or_else(env_disables_archives);
        if disabled {
            tracing::debug!("Archive support disabled");
        }
        Context {
            options: self.options.unwrap_or_default(),
            disabled,
            native: self.native.unwrap_or_else(|| Box::new(OsFs)),
            registry: ArchiveRegistry::new(),
            archives: self.archives.unwrap_or_else(ArchiveCache::on_disk),
            caches: Caches::default(),
            realpath_mapping: Cell::new(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fallible(context: &Context, fail: bool) -> Result<()> {
        let _guard = context.enable_realpath_mapping();
        assert!(context.is_realpath_mapping_enabled());
        if fail {
            exn::bail!(ErrorKind::NotFound("/x".into()));
        }
        Ok(())
    }

    #[test]
    fn realpath_mapping_restored_on_every_exit() {
        let context = Context::builder().disabled(false).build();
        assert!(!context.is_realpath_mapping_enabled());
        fallible(&context, false).unwrap();
        assert!(!context.is_realpath_mapping_enabled());
        assert!(fallible(&context, true).is_err());
        assert!(!context.is_realpath_mapping_enabled());
    }

    #[test]
    fn nested_guards_restore_previous_state() {
        let context = Context::builder().disabled(false).build();
        let outer = context.enable_realpath_mapping();
        {
            let _inner = context.enable_realpath_mapping();
        }
        assert!(context.is_realpath_mapping_enabled());
        drop(outer);
        assert!(!context.is_realpath_mapping_enabled());
    }

    #[test]
    fn from_config_rejects_invalid_config() {
        let mut config = Config::default();
        config.resolve.extensions.clear();
        let err = Context::from_config(&config).err().unwrap();
        assert!(matches!(&*err, ErrorKind::Config(_)));
    }

    #[test]
    fn from_config_carries_options() {
        let mut config = Config::default();
        config.disabled = true;
        config.resolve.preserve_symlinks = true;
        let context = Context::from_config(&config).unwrap();
        assert!(context.is_disabled());
        assert!(context.options().preserve_symlinks);
        assert!(context.registry().is_empty());
    }
}
