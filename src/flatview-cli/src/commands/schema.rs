//! Handle the `schema` subcommands: override management and classifier
//! introspection.

use anyhow::{Context, Result};
use flatview::source::WORKSPACE_CONFIG_NAME;
use flatview::{BinaryFieldClassifier, SchemaSource};
use std::path::Path;

pub fn set(path: &Path, global: bool, workspace: bool) -> Result<()> {
    let source = if global {
        SchemaSource::new(None, SchemaSource::global_config_path()?)
    } else if workspace {
        let cwd = std::env::current_dir().context("could not determine current directory")?;
        SchemaSource::new(
            Some(cwd.join(WORKSPACE_CONFIG_NAME)),
            SchemaSource::global_config_path()?,
        )
    } else {
        super::make_source()?
    };

    source.set_override(path)?;
    println!("Schema override set to {}", path.display());
    Ok(())
}

pub fn clear() -> Result<()> {
    let source = super::make_source()?;
    source.clear_override()?;
    println!("Schema override cleared; the default schema is in effect");
    Ok(())
}

pub fn show() -> Result<()> {
    let source = super::make_source()?;
    match source.current_override_path() {
        Some(path) => println!("{}", path.display()),
        None => println!("default (embedded document schema)"),
    }
    Ok(())
}

pub fn fields(prefix: Option<&str>) -> Result<()> {
    let source = super::make_source()?;
    let classifier = BinaryFieldClassifier::parse(&source.effective_schema_text());

    let paths = classifier.paths_under(prefix.unwrap_or(""));
    if paths.is_empty() {
        println!("No binary field paths under the given prefix");
        return Ok(());
    }
    for path in paths {
        println!("{path}");
    }
    Ok(())
}
