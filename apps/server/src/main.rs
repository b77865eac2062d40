use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::info;
use tuber_chats::{RoomKeys, RoomLog};
use tuber_config::load as load_config;
use tuber_gateway::{build_router, GatewayState};
use tuber_runtime::{telemetry, BackendServices};

#[derive(Parser)]
#[command(name = "tuber-server")]
#[command(about = "Tuber trip chat relay (serves by default)")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP and WebSocket server
    Serve,
    /// Print the retained history of a room
    History {
        /// Room (trip) identifier
        room: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => run_server().await,
        Commands::History { room } => print_history(&room).await,
    }
}

async fn run_server() -> anyhow::Result<()> {
    telemetry::init_tracing().context("failed to initialise tracing")?;

    info!("starting Tuber chat relay");

    let config = load_config().context("failed to load configuration")?;

    let services = BackendServices::initialise(&config)
        .await
        .context("failed to initialise backend services")?;

    let state = GatewayState::from_config(&config, services.relay.clone());
    let app = build_router(state);

    let address = format!("{}:{}", config.http.address, config.http.port);
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind http listener on {address}"))?;

    info!(%address, "http server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(tuber_runtime::shutdown_signal())
        .await
        .context("http server error")?;

    info!("chat relay shut down");
    Ok(())
}

async fn print_history(room: &str) -> anyhow::Result<()> {
    let config = load_config().context("failed to load configuration")?;
    let keys = RoomKeys::new(room).context("invalid room")?;

    let services = BackendServices::initialise(&config)
        .await
        .context("failed to initialise backend services")?;

    let events = services
        .log
        .read_all(keys.log_key())
        .await
        .with_context(|| format!("failed to read history of room {room}"))?;

    println!("=== ROOM {room} ===");
    if events.is_empty() {
        println!("No messages retained for this room");
        return Ok(());
    }

    println!("Found {} messages:", events.len());
    println!("{:<20} {:<38} {}", "Position", "Participant", "Payload");
    println!("{}", "-".repeat(100));

    for event in events {
        println!(
            "{:<20} {:<38} {}",
            event
                .position
                .map(|position| position.to_string())
                .unwrap_or_else(|| "NULL".to_string()),
            event.participant,
            String::from_utf8_lossy(&event.payload)
        );
    }

    Ok(())
}
