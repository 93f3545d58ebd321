//! CLI argument definitions for flatview

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "flatview")]
#[command(about = "Schema-driven viewer for FlatBuffers binary container files")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Use this flatc executable instead of probing or downloading
    #[arg(long, global = true)]
    pub flatc: Option<PathBuf>,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Decode a binary container file and print it as structured text
    View {
        /// Binary container file to decode
        input: PathBuf,

        /// Write the result here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "json")]
        format: OutputFormat,

        /// One-shot schema file, bypassing the persisted override
        #[arg(long)]
        schema: Option<PathBuf>,
    },

    /// Manage the schema override used for decoding
    Schema {
        #[command(subcommand)]
        command: SchemaCommand,
    },

    /// Manage the external flatc compiler
    Flatc {
        #[command(subcommand)]
        command: FlatcCommand,
    },
}

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Yaml,
}

#[derive(clap::Subcommand, Debug)]
pub enum SchemaCommand {
    /// Validate and persist a schema override path
    Set {
        /// Path to a .fbs schema file
        path: PathBuf,

        /// Persist in the global config even inside a workspace
        #[arg(long, conflicts_with = "workspace")]
        global: bool,

        /// Persist in a .flatview.toml in the current directory
        #[arg(long)]
        workspace: bool,
    },

    /// Remove the schema override
    Clear,

    /// Show which schema is in effect
    Show,

    /// List the field paths classified as binary data
    Fields {
        /// Only show paths under this dot-qualified prefix
        prefix: Option<String>,
    },
}

#[derive(clap::Subcommand, Debug)]
pub enum FlatcCommand {
    /// Resolve flatc, downloading it if necessary
    Ensure,

    /// Report where flatc would be found, without downloading
    Which,
}
