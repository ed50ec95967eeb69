//! Tycoon multiplayer game server.

use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod error;
mod protocol;
mod registry;
mod room;
mod server;
mod store;
mod sync;

use config::ServerConfig;
use store::{FileStore, MemoryStore, RoomStore};
use sync::ServerState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env()?;

    info!("Starting Tycoon server...");

    let store: Arc<dyn RoomStore> = match &config.data_dir {
        Some(dir) => {
            info!("Persisting rooms under {}", dir.display());
            Arc::new(FileStore::open(dir)?)
        }
        None => {
            info!("No data directory set, rooms are kept in memory");
            Arc::new(MemoryStore::new())
        }
    };

    let addr = config.addr;
    let state = Arc::new(ServerState::new(config, store));
    let restored = state.registry.restore()?;
    info!("Restored {} rooms", restored);

    server::run_server(addr, state).await
}
