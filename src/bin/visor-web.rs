// SPDX-License-Identifier: MIT

//! Standalone web server for the Visor gallery.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use visor::config::AppConfig;
use visor::db::Catalog;
use visor::history::History;
use visor::search::{SuggestionProvider, VisualSearchClient};
use visor::web::AppState;
use visor::Result;

#[derive(Parser, Debug)]
#[command(name = "visor-web")]
#[command(version)]
#[command(about = "Visor gallery web server")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Host to bind to
    #[arg(short = 'H', long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let mut config = AppConfig::load(&args.config)?;

    if let Some(host) = args.host {
        config.web.host = host;
    }
    if let Some(port) = args.port {
        config.web.port = port;
    }

    let db = Catalog::open(&config.database.path)?;
    info!("Database: {}", config.database.path);

    let provider: Box<dyn SuggestionProvider> =
        Box::new(VisualSearchClient::from_config(&config.search));
    let history = History::new(PathBuf::from("visor_history.jsonl"));

    let state = Arc::new(AppState {
        db,
        config,
        provider,
        history,
    });

    visor::web::start_server(state).await
}
