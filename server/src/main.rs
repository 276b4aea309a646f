use clap::Parser;
use log::{error, info};
use server::config::GameConfig;
use server::network::Server;
use std::path::PathBuf;

/// Authoritative snake arena server.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Maximum number of connected clients
    #[arg(short, long, default_value = "16")]
    max_clients: usize,

    /// TOML file with game settings
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the grid side length
    #[arg(long)]
    grid_size: Option<i32>,

    /// Override the tick period in milliseconds
    #[arg(long)]
    tick_ms: Option<u64>,

    /// Seed for reproducible food and spawn placement
    #[arg(long)]
    seed: Option<u64>,
}

impl Args {
    fn game_config(&self) -> Result<GameConfig, Box<dyn std::error::Error>> {
        let mut config = match &self.config {
            Some(path) => {
                info!("Loading config from {}", path.display());
                GameConfig::load(path)?
            }
            None => GameConfig::default(),
        };

        if let Some(grid_size) = self.grid_size {
            config.grid_size = grid_size;
        }
        if let Some(tick_ms) = self.tick_ms {
            config.tick_ms = tick_ms;
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = args.game_config()?;

    info!("Starting server...");
    info!(
        "Grid {}x{}, tick {}ms, up to {} clients",
        config.grid_size, config.grid_size, config.tick_ms, args.max_clients
    );

    let address = format!("{}:{}", args.host, args.port);
    let mut server = Server::new(&address, config, args.max_clients, args.seed).await?;

    let shutdown = server.shutdown_handle();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C, shutting down gracefully...");
                shutdown.shutdown();
            }
            Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
        }
    });

    server.run().await?;
    info!("Server stopped");

    Ok(())
}
