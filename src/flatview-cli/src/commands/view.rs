//! Handle the `view` command: decode a container file and display it.

use crate::cli::OutputFormat;
use anyhow::{Context, Result};
use flatview::Converter;
use std::fs;
use std::path::Path;

pub fn handle(
    input: &Path,
    output: Option<&Path>,
    format: OutputFormat,
    schema: Option<&Path>,
    flatc: Option<&Path>,
) -> Result<()> {
    let payload =
        fs::read(input).with_context(|| format!("failed to read {}", input.display()))?;

    let locator = super::make_locator(flatc)?;
    let source = super::make_source()?;
    let converter = Converter::new(&locator, &source);

    let json = match schema {
        Some(path) => {
            let schema_text = fs::read_to_string(path)
                .with_context(|| format!("failed to read schema {}", path.display()))?;
            converter.convert_with_schema(&payload, &schema_text)?
        }
        None => converter.convert(&payload)?,
    };

    let text = match format {
        OutputFormat::Json => json,
        OutputFormat::Yaml => {
            let tree: serde_json::Value = serde_json::from_str(&json)?;
            serde_yaml::to_string(&tree)?
        }
    };

    match output {
        Some(path) => {
            fs::write(path, &text)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Wrote {}", path.display());
        }
        None => println!("{text}"),
    }

    Ok(())
}
