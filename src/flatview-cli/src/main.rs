mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::*;

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let flatc = cli.flatc.as_deref();

    match cli.command {
        Commands::View {
            input,
            output,
            format,
            schema,
        } => {
            commands::view::handle(&input, output.as_deref(), format, schema.as_deref(), flatc)?;
        }

        Commands::Schema { command } => match command {
            SchemaCommand::Set {
                path,
                global,
                workspace,
            } => {
                commands::schema::set(&path, global, workspace)?;
            }

            SchemaCommand::Clear => {
                commands::schema::clear()?;
            }

            SchemaCommand::Show => {
                commands::schema::show()?;
            }

            SchemaCommand::Fields { prefix } => {
                commands::schema::fields(prefix.as_deref())?;
            }
        },

        Commands::Flatc { command } => match command {
            FlatcCommand::Ensure => {
                commands::flatc::ensure(flatc)?;
            }

            FlatcCommand::Which => {
                commands::flatc::which(flatc)?;
            }
        },
    }

    Ok(())
}
