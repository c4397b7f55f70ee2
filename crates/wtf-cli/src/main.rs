mod backup;
mod builder;
mod cart;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;
use wtf_core::AppConfig;

use crate::backup::BackupCommands;
use crate::builder::BuilderCommands;
use crate::cart::CartCommands;

#[derive(Debug, Parser)]
#[command(name = "wtf-cli")]
#[command(about = "WTF storefront cart and drink-builder command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Read and mutate the storefront cart
    Cart {
        #[command(subcommand)]
        command: CartCommands,
    },
    /// Inspect or discard the pending add-to-cart backup
    Backup {
        #[command(subcommand)]
        command: BackupCommands,
    },
    /// Price and compile drink-builder selections
    Builder {
        #[command(subcommand)]
        command: BuilderCommands,
    },
}

/// Menu file override shared by commands that need it.
#[derive(Debug, Clone, clap::Args)]
struct MenuArgs {
    /// Path to the drink-builder menu [default: WTF_MENU_PATH]
    #[arg(long)]
    menu: Option<PathBuf>,
}

impl MenuArgs {
    /// The `--menu` override, else the configured menu path.
    fn resolve<'a>(&'a self, config: &'a AppConfig) -> &'a Path {
        self.menu.as_deref().unwrap_or(&config.menu_path)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = wtf_core::load_app_config()?;

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
    tracing::debug!(?config, env = %config.env, "loaded config");

    match cli.command {
        Commands::Cart { command } => cart::run(command, &config).await,
        Commands::Backup { command } => backup::run(&command, &config),
        Commands::Builder { command } => builder::run(&command, &config),
    }
}

/// Prints `value` as pretty JSON on stdout.
pub(crate) fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
