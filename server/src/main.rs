use clap::Parser;
use log::{error, info};
use server::game::GameConfig;
use server::network::{Server, ServerConfig};
use tokio::time::Duration;

/// Command line arguments
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server IP address to bind to
    #[clap(short = 'H', long, default_value = "127.0.0.1")]
    host: String,
    /// Server port to listen on
    #[clap(short, long, default_value = "3001")]
    port: u16,
    /// Tick rate (updates per second)
    #[clap(short, long, default_value = "60", value_parser = clap::value_parser!(u32).range(1..=1000))]
    tick_rate: u32,
    /// Score that ends a match
    #[clap(short, long, default_value = "5", value_parser = clap::value_parser!(u32).range(1..))]
    winning_score: u32,
    /// Maximum number of rooms alive at once
    #[clap(long, default_value = "1024")]
    max_rooms: usize,
    /// Seconds between statistics log lines, 0 to disable
    #[clap(long, default_value = "10")]
    stats_interval: u64,
}

/// Main-method of the application.
/// Parses command-line arguments, binds the listener and serves until Ctrl+C.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Tip: set RUST_LOG=info to see server logs");
    }
    env_logger::init();

    let args = Args::parse();

    let config = ServerConfig {
        bind_addr: format!("{}:{}", args.host, args.port),
        max_rooms: args.max_rooms,
        stats_interval: Duration::from_secs(args.stats_interval),
        game: GameConfig {
            tick_rate: args.tick_rate,
            winning_score: args.winning_score,
        },
    };
    info!(
        "Starting pong server ({}Hz, first to {}, up to {} rooms)",
        config.game.tick_rate, config.game.winning_score, config.max_rooms
    );

    let server = Server::bind(config).await?;

    // Handle shutdown gracefully
    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server stopped: {}", e);
                return Err(e.into());
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    Ok(())
}
