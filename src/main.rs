//! Synergy Board Server
//!
//! HTTP server for collaborative project boards with AI-assisted
//! workload analysis and task prioritization.

use anyhow::{Context, Result};
use clap::Parser;
use std::fs::OpenOptions;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use synergy_board::board::Board;
use synergy_board::cli::{Cli, Command, log_filter};
use synergy_board::config::Config;
use synergy_board::db::Database;
use synergy_board::gateway;
use synergy_board::pipeline::Pipeline;
use synergy_board::web::{self, AppState};
use tracing::info;
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // .env is optional; load it first so it can set RUST_LOG
    dotenvy::dotenv().ok();

    // Initialize logging based on --log option
    let filter = log_filter(cli.verbose, std::env::var("RUST_LOG").ok().as_deref());
    match cli.log.as_str() {
        "0" | "off" => {
            // No logging
        }
        "1" | "stdout" => {
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(filter)
                .with_writer(std::io::stdout)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        "2" | "stderr" => {
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        filename => {
            // Log to file (append mode)
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(filename)?;
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(filter)
                .with_writer(file)
                .with_ansi(false)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }

    let mut config = Config::load_or_default(cli.config.as_deref().map(Path::new))?;

    // Override from CLI arguments
    if let Some(db_path) = &cli.database {
        config.server.db_path = db_path.into();
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    match cli.command {
        Some(Command::Init) => {
            config.ensure_db_dir()?;
            Database::open(&config.server.db_path)?;
            info!("Database initialized at {:?}", config.server.db_path);
        }
        Some(Command::Serve) | None => {
            run_server(config).await?;
        }
    }

    Ok(())
}

async fn run_server(config: Config) -> Result<()> {
    config.ensure_db_dir()?;

    info!(
        "Starting Synergy Board Server v{}",
        env!("CARGO_PKG_VERSION")
    );
    info!("Database: {:?}", config.server.db_path);

    let db = Arc::new(Database::open(&config.server.db_path)?);
    let board = Board::new(db);
    let gateway = gateway::from_config(&config.gateway);
    let pipeline = Pipeline::new(board, gateway, config.gateway.timeout());

    let addr: SocketAddr = config
        .bind_addr()
        .parse()
        .with_context(|| format!("Invalid bind address '{}'", config.bind_addr()))?;

    web::serve(AppState::new(pipeline), addr).await
}
