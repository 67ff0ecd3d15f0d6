//! notebook: command-line front end for personal notes and folders.
//!
//! Records live in `notes.json` inside the data directory, next to
//! `config.json`. Edits go through the same debounced autosave path as an
//! interactive editor.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use notebook_cli::commands::{self, Command};
use notebook_cli::config::{self, Config};
use notebook_cli::file_gateway::JsonFileGateway;
use notebook_core::{ActionResponse, NoteActions, SessionAuthenticator, Workspace};

#[derive(Parser, Debug)]
#[command(name = "notebook")]
#[command(about = "Personal notes with autosave")]
struct Args {
    /// Data directory (default: $NOTEBOOK_DATA_DIR, then the platform data dir)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Enable verbose logging
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging - respects RUST_LOG env var, defaults to info (or debug with --verbose)
    let default_filter = if args.verbose {
        "debug,notebook_core=debug,notebook_cli=debug"
    } else {
        "warn,notebook_core=info,notebook_cli=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let data_dir = config::resolve_data_dir(args.data_dir, |key| std::env::var(key).ok())?;
    debug!("Data directory: {:?}", data_dir);
    let config = Config::load(&data_dir)?;

    let gateway = JsonFileGateway::in_dir(&data_dir)
        .await
        .context("Failed to open record store")?;
    let auth = SessionAuthenticator::signed_in(config.user.to_user());
    let actions = Arc::new(NoteActions::new(gateway, auth));
    let workspace = Workspace::new(actions, config.autosave());

    let result = commands::run(&workspace, args.command).await;
    let failed = result.is_err();

    if args.json {
        let response = ActionResponse::from(result);
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        match &result {
            Ok(output) => print!("{}", commands::render(output)),
            Err(e) => eprintln!("error: {}", e),
        }
    }

    if failed {
        std::process::exit(1);
    }
    info!("Done");
    Ok(())
}
