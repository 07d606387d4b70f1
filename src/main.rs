//! Usage: `vehicle-console` entry point - CLI parsing, process wiring, dispatch.

use clap::{Parser, Subcommand};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use vehicle_console::app::logging;
use vehicle_console::commands;
use vehicle_console::domain::session::{SessionStore, SqliteSessionStore};
use vehicle_console::infra::{app_paths, db, settings::Settings};
use vehicle_console::shared::error::AppResult;

#[derive(Parser)]
#[command(
    name = "vehicle-console",
    version,
    about = "Keycloak OIDC demo client for the vehicle API"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sign in through the identity provider's browser flow
    Login,
    /// Clear the local session and end the provider session
    Logout,
    /// Show session state and identity claims
    Status,
    /// List vehicles from the downstream API
    Vehicles,
    /// Refresh the session tokens now
    Refresh {
        /// Keep refreshing ahead of expiry until interrupted
        #[arg(long)]
        follow: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let data_dir = match app_paths::data_dir() {
        Ok(dir) => dir,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };
    let _log_guard = logging::init(&data_dir);
    logging::install_panic_hook();

    match dispatch(cli.command, &data_dir).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("command failed: {err}");
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

async fn dispatch(command: Command, data_dir: &Path) -> AppResult<()> {
    let settings = Settings::from_env()?;
    let db = db::init(data_dir)?;
    let store: Arc<dyn SessionStore> = Arc::new(SqliteSessionStore::new(db));

    match command {
        Command::Login => commands::login::run(&settings, store).await,
        Command::Logout => commands::logout::run(&settings, store).await,
        Command::Status => commands::status::run(store).await,
        Command::Vehicles => commands::vehicles::run(&settings, store).await,
        Command::Refresh { follow } => commands::refresh::run(&settings, store, follow).await,
    }
}
