mod config;
mod db;
mod frame;
mod routes;
mod services;
mod state;

use std::sync::Arc;

use canvas::store::{BoardStore, MemoryStore};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = config::ServerConfig::from_env();

    let store: Arc<dyn BoardStore> = if let Some(database_url) = &config.database_url {
        let pool = db::init_pool(database_url, config.db_max_connections)
            .await
            .expect("database init failed");
        Arc::new(services::store::PgBoardStore::new(pool))
    } else {
        tracing::warn!("DATABASE_URL not set; boards live in memory only");
        let memory = MemoryStore::new();
        for (board_id, size) in config::SEED_BOARDS {
            memory.create_board(board_id, size).await;
        }
        Arc::new(memory)
    };
    let tiles = Arc::new(services::tiles::FsTileStore::new(
        config.tile_dir.clone(),
        &config.public_base_url,
    ));

    let port = config.port;
    let state = state::AppState::new(store, tiles, config);
    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "pixelboard listening");
    axum::serve(listener, app).await.expect("server failed");
}
