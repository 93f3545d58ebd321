//! Command handlers

pub mod flatc;
pub mod schema;
pub mod view;

use anyhow::{Context, Result};
use flatview::{FlatcLocator, SchemaSource};
use std::path::Path;

/// Locator for this invocation: pinned path if given, else the default
/// install directory.
pub fn make_locator(pinned: Option<&Path>) -> Result<FlatcLocator> {
    if let Some(path) = pinned {
        return Ok(FlatcLocator::with_resolved(path.to_path_buf()));
    }
    let install_dir = FlatcLocator::default_install_dir()
        .context("could not determine a local data directory for flatc")?;
    Ok(FlatcLocator::new(install_dir))
}

/// Schema source discovered from the current directory.
pub fn make_source() -> Result<SchemaSource> {
    let cwd = std::env::current_dir().context("could not determine current directory")?;
    SchemaSource::discover(&cwd).context("could not locate configuration")
}
