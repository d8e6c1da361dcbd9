//! Todo Server - WebSocket JSON-RPC server for the Todo sample.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use tether_demo::{todo_registry, ws, TodoStore};

#[derive(Parser, Debug)]
#[command(name = "todo-server")]
#[command(about = "WebSocket JSON-RPC server for the Todo sample")]
struct Args {
    /// Port to listen on (0 = auto-assign)
    #[arg(short, long, default_value = "4649")]
    port: u16,

    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging
    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();

    info!("Starting Todo server");

    let listener = TcpListener::bind((args.host.as_str(), args.port)).await?;
    let addr = listener.local_addr()?;
    info!("Server listening on ws://{}", addr);

    let registry = Arc::new(todo_registry(TodoStore::seeded()));

    tokio::select! {
        result = ws::serve(listener, registry) => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received, exiting");
        }
    }

    Ok(())
}
