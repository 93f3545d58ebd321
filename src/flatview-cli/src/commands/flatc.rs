//! Handle the `flatc` subcommands: tool resolution front-end.

use anyhow::Result;
use std::path::Path;

pub fn ensure(pinned: Option<&Path>) -> Result<()> {
    let locator = super::make_locator(pinned)?;
    let path = locator.resolve()?;
    println!("{}", path.display());
    Ok(())
}

pub fn which(pinned: Option<&Path>) -> Result<()> {
    if let Some(path) = pinned {
        println!("{}", path.display());
        return Ok(());
    }
    let locator = super::make_locator(None)?;
    match locator.find_existing() {
        Some(path) => println!("{}", path.display()),
        None => println!("flatc is not installed; run `flatview flatc ensure` to download it"),
    }
    Ok(())
}
