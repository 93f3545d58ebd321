//! Schema source selection and the persisted override setting.
//!
//! A conversion uses either a user-designated `.fbs` file or the embedded
//! default schema. The override is a single optional path stored in a TOML
//! config, preferring workspace scope (a `.flatview.toml` found in the
//! working directory or an ancestor) over the global config file.
//! Stored paths that have become invalid are cleared on detection and the
//! default schema is substituted; override problems never fail a
//! conversion.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// The compiled-in default schema.
pub const DEFAULT_SCHEMA: &str = include_str!("../schemas/document.fbs");

/// Required extension for schema override files.
pub const SCHEMA_EXTENSION: &str = "fbs";

/// File name marking a workspace root and holding its config.
pub const WORKSPACE_CONFIG_NAME: &str = ".flatview.toml";

#[derive(Error, Debug)]
pub enum SchemaSourceError {
    #[error("schema file not found: {0:?}")]
    NotFound(PathBuf),

    #[error("not a .fbs schema file: {0:?}")]
    WrongExtension(PathBuf),

    #[error("schema file is not readable: {path:?}: {source}")]
    Unreadable {
        path: PathBuf,
        source: io::Error,
    },

    #[error("could not determine config directory")]
    NoConfigDir,

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Persisted settings, one optional schema path.
#[derive(Debug, Serialize, Deserialize, Default)]
struct SchemaConfig {
    schema: Option<PathBuf>,
}

impl SchemaConfig {
    /// Load from file, or default if the file doesn't exist.
    fn load(path: &Path) -> Result<Self, SchemaSourceError> {
        if !path.exists() {
            return Ok(SchemaConfig::default());
        }
        let contents = fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    fn save(&self, path: &Path) -> Result<(), SchemaSourceError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }
}

/// Decides which schema text is authoritative for the next conversion.
///
/// Holds the config file paths for both scopes; settings are re-read from
/// disk on every call so external edits take effect on the next
/// conversion.
#[derive(Debug, Clone)]
pub struct SchemaSource {
    workspace_config: Option<PathBuf>,
    global_config: PathBuf,
}

impl SchemaSource {
    /// Build from explicit config file paths.
    ///
    /// `workspace_config` present means a workspace context exists and
    /// takes precedence for both reads and writes.
    pub fn new(workspace_config: Option<PathBuf>, global_config: PathBuf) -> Self {
        Self {
            workspace_config,
            global_config,
        }
    }

    /// Discover config scopes starting from a directory.
    ///
    /// Walks ancestors for a `.flatview.toml` workspace config; the global
    /// config lives under the platform config directory.
    pub fn discover(start: &Path) -> Result<Self, SchemaSourceError> {
        let workspace_config = start
            .ancestors()
            .map(|dir| dir.join(WORKSPACE_CONFIG_NAME))
            .find(|candidate| candidate.is_file());
        Ok(Self::new(workspace_config, Self::global_config_path()?))
    }

    /// Path of the global config file.
    pub fn global_config_path() -> Result<PathBuf, SchemaSourceError> {
        let config_dir = dirs::config_dir().ok_or(SchemaSourceError::NoConfigDir)?;
        Ok(config_dir.join("flatview").join("config.toml"))
    }

    /// The persisted override path, if it is still valid.
    ///
    /// A stored path that no longer exists, has the wrong extension, or
    /// cannot be opened is treated as unset, and the stale setting is
    /// cleared as a side effect.
    pub fn current_override_path(&self) -> Option<PathBuf> {
        for scope in self.scopes() {
            let config = match SchemaConfig::load(scope) {
                Ok(config) => config,
                Err(error) => {
                    tracing::warn!(config = %scope.display(), %error, "failed to load config");
                    continue;
                }
            };
            let Some(path) = config.schema else {
                continue;
            };
            match validate_schema_path(&path) {
                Ok(()) => return Some(path),
                Err(error) => {
                    tracing::warn!(
                        schema = %path.display(),
                        %error,
                        "stored schema override is no longer valid, clearing it"
                    );
                    clear_scope(scope);
                }
            }
        }
        None
    }

    /// Contents of the override file, if one is set and readable.
    ///
    /// A read failure clears the setting and falls back to `None`.
    pub fn current_override_content(&self) -> Option<String> {
        let path = self.current_override_path()?;
        match fs::read_to_string(&path) {
            Ok(text) => Some(text),
            Err(error) => {
                tracing::warn!(
                    schema = %path.display(),
                    %error,
                    "failed to read schema override, clearing it"
                );
                if let Err(error) = self.clear_override() {
                    tracing::warn!(%error, "failed to clear schema override");
                }
                None
            }
        }
    }

    /// Validate and persist a schema override path.
    ///
    /// Prefers workspace scope when a workspace context exists, else
    /// global. The path is stored in canonical form so it stays valid when
    /// the working directory changes.
    pub fn set_override(&self, path: &Path) -> Result<(), SchemaSourceError> {
        validate_schema_path(path)?;
        let scope = self
            .workspace_config
            .as_deref()
            .unwrap_or(&self.global_config);
        let mut config = SchemaConfig::load(scope)?;
        config.schema = Some(fs::canonicalize(path)?);
        config.save(scope)
    }

    /// Remove the override setting from whichever scope holds it.
    pub fn clear_override(&self) -> Result<(), SchemaSourceError> {
        for scope in self.scopes() {
            let mut config = SchemaConfig::load(scope)?;
            if config.schema.is_some() {
                config.schema = None;
                config.save(scope)?;
            }
        }
        Ok(())
    }

    /// The schema text to use for the next conversion.
    ///
    /// Override content when a valid override is set, else the embedded
    /// default. Never fails.
    pub fn effective_schema_text(&self) -> String {
        self.current_override_content()
            .unwrap_or_else(|| DEFAULT_SCHEMA.to_string())
    }

    /// Config scopes in precedence order: workspace first, then global.
    fn scopes(&self) -> impl Iterator<Item = &PathBuf> {
        self.workspace_config
            .iter()
            .chain(std::iter::once(&self.global_config))
    }
}

fn validate_schema_path(path: &Path) -> Result<(), SchemaSourceError> {
    if !path.is_file() {
        return Err(SchemaSourceError::NotFound(path.to_path_buf()));
    }
    let extension_ok = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(SCHEMA_EXTENSION));
    if !extension_ok {
        return Err(SchemaSourceError::WrongExtension(path.to_path_buf()));
    }
    fs::File::open(path).map_err(|source| SchemaSourceError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

/// Best-effort removal of a stale setting from one scope.
fn clear_scope(scope: &Path) {
    let result = SchemaConfig::load(scope).and_then(|mut config| {
        config.schema = None;
        config.save(scope)
    });
    if let Err(error) = result {
        tracing::warn!(config = %scope.display(), %error, "failed to clear stale schema override");
    }
}
