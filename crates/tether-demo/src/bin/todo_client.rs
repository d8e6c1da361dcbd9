//! Todo Client - connects to the Todo server and fetches Todos for a user.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use tether_core::{spawn_router, RpcClient};
use tether_demo::{ws, TodoProxy};

#[derive(Parser, Debug)]
#[command(name = "todo-client")]
#[command(about = "WebSocket JSON-RPC client for the Todo sample")]
struct Args {
    /// Server URL
    #[arg(long, default_value = "ws://127.0.0.1:4649")]
    url: String,

    /// Only fetch Todos belonging to this user
    #[arg(long, default_value = "2")]
    user_id: u64,

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

    let (transport, inbound) = ws::connect(&args.url).await?;
    let client = Arc::new(RpcClient::new(transport));
    spawn_router(client.clone(), inbound);

    let proxy = TodoProxy::new(&client);
    let todos = proxy.get_todos(Some(args.user_id)).await?;

    info!("Found {} Todos", todos.len());
    for todo in &todos {
        println!("#{} [user {}] {}", todo.id, todo.user_id, todo.title);
    }

    Ok(())
}
