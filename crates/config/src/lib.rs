//! Configuration for archive registration and archive-aware module resolution.
//!
//! Sources are merged in order, later ones winning:
//!
//! 1. Built-in defaults ([`Config::default`])
//! 2. An optional configuration file (TOML, YAML or JSON, by extension)
//! 3. Environment variables prefixed with `ASAR_`, nested keys split on `__`
//!    (e.g. `ASAR_REGISTER__THROW_IF_NO_ENTRY=true`)
//!
//! The legacy `ELECTRON_NO_ASAR` switch is not part of the merged tree; see
//! [`env_disables_archives`].

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable that switches all archive logic off when set to a
/// non-empty value.
pub const NO_ASAR_ENV: &str = "ELECTRON_NO_ASAR";
/// Prefix for environment variables merged into [`Config`].
pub const ENV_PREFIX: &str = "ASAR_";
/// Extensions searched, in order, when a request names no extension.
pub const DEFAULT_EXTENSIONS: [&str; 3] = [".js", ".json", ".node"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub register: RegisterOptions,
    pub resolve: ResolveOptions,
    /// Suppress every archive code path; resolution behaves as if no archive
    /// had ever been registered.
    pub disabled: bool,
}

/// Which archives to register, and how.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegisterOptions {
    /// Archive container paths. Entries containing `*`, `?` or `[` are
    /// expanded as glob patterns (files only).
    pub archives: Vec<String>,
    /// Fail registration when an archive is missing, instead of warning.
    pub throw_if_no_entry: bool,
    /// Register `app/` as a mirror of `app.asar/`.
    pub mirror_asar_base_path: bool,
}
impl Default for RegisterOptions {
    fn default() -> Self {
        Self {
            archives: Vec::new(),
            throw_if_no_entry: false,
            mirror_asar_base_path: true,
        }
    }
}
impl RegisterOptions {
    pub fn new(archives: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            archives: archives.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn throw_if_no_entry(mut self, throw: bool) -> Self {
        self.throw_if_no_entry = throw;
        self
    }

    pub fn mirror_asar_base_path(mut self, mirror: bool) -> Self {
        self.mirror_asar_base_path = mirror;
        self
    }
}

/// Knobs of the module resolution algorithm itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolveOptions {
    /// Keep symlinked paths for dependencies instead of following them.
    pub preserve_symlinks: bool,
    /// Same as `preserve_symlinks`, for the main entry point only.
    pub preserve_symlinks_main: bool,
    /// Loadable-file extensions, tried in order.
    pub extensions: Vec<String>,
}
impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            preserve_symlinks: false,
            preserve_symlinks_main: false,
            extensions: DEFAULT_EXTENSIONS.iter().map(|ext| ext.to_string()).collect(),
        }
    }
}

impl Config {
    /// Load configuration from defaults, an optional file, and the
    /// environment, then validate it.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(file) = file {
            figment = match file.extension().and_then(|ext| ext.to_str()) {
                Some("toml") => figment.merge(Toml::file(file)),
                Some("yaml" | "yml") => figment.merge(Yaml::file(file)),
                Some("json") => figment.merge(Json::file(file)),
                _ => exn::bail!(ErrorKind::UnsupportedFile(file.to_path_buf())),
            };
        }
        let config: Config = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(|e| ErrorKind::Load(e.to_string()))?;
        config.validate()?;
        tracing::debug!(
            archives = config.register.archives.len(),
            disabled = config.disabled,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Per-user configuration file location, if the platform has one.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "asar").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    pub fn validate(&self) -> Result<()> {
        if self.resolve.extensions.is_empty() {
            exn::bail!(ErrorKind::Invalid("at least one extension is required".to_string()));
        }
        if let Some(ext) = self.resolve.extensions.iter().find(|ext| !ext.starts_with('.') || ext.len() < 2) {
            exn::bail!(ErrorKind::Invalid(format!("extension `{ext}` must start with a dot")));
        }
        if self.register.archives.iter().any(|archive| archive.trim().is_empty()) {
            exn::bail!(ErrorKind::Invalid("archive paths must not be empty".to_string()));
        }
        Ok(())
    }

    /// Whether archive logic is off, from either this configuration or the
    /// process environment.
    pub fn is_disabled(&self) -> bool {
        self.disabled || env_disables_archives()
    }
}

/// Returns `true` when [`NO_ASAR_ENV`] is set to a non-empty value.
pub fn env_disables_archives() -> bool {
    std::env::var_os(NO_ASAR_ENV).is_some_and(|value| !value.is_empty())
}
