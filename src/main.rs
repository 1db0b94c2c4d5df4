//! Chatrelay HTTP server
//!
//! Starts an Axum web server exposing the multilingual chat API.

use std::net::SocketAddr;

use chatrelay::cli::{Cli, Command, generate_config_template};
use chatrelay::config::Config;
use chatrelay::handlers::{self, AppState};
use chatrelay::storage::pool::DatabasePool;
use chatrelay::telemetry;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Subcommands run without loading a config file
    if let Some(Command::Config { output }) = cli.command {
        let template = generate_config_template();
        match output {
            Some(path) => {
                std::fs::write(&path, template)?;
                println!("Wrote configuration template to {}", path);
            }
            None => print!("{}", template),
        }
        return Ok(());
    }

    // Load configuration
    let config = Config::from_file(&cli.config)?;

    // Initialize telemetry
    telemetry::init(&config.observability.log_level);

    tracing::info!(
        "Starting Chatrelay server on {}:{}",
        config.server.host,
        config.server.port
    );

    // Open the database and build shared state
    let pool = DatabasePool::new(&config.database.path).await?;
    tracing::info!(path = %config.database.path, "Database ready");

    let host = config.server.host.clone();
    let port = config.server.port;
    let state = AppState::new(config, pool)?;
    let app = handlers::router(state);

    // Create socket address
    let addr = SocketAddr::from((
        host.parse::<std::net::IpAddr>()
            .unwrap_or_else(|_| std::net::IpAddr::from([0, 0, 0, 0])),
        port,
    ));

    tracing::info!("Listening on {}", addr);
    tracing::info!("Health check available at http://{}/health", addr);

    // Start server
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
