pub mod boards;
pub mod error;
pub mod tiles;
pub mod ws;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Board REST routes, tile upload, the websocket relay, and static tiles.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let tiles = ServeDir::new(&state.config.tile_dir);

    Router::new()
        .route("/api/boards/{id}", get(boards::get_board).put(boards::put_board))
        .route("/api/boards/{id}/pixels", get(boards::list_pixels))
        .route("/api/boards/{id}/pixels/{idx}", get(boards::get_pixel).put(boards::put_pixel))
        .route("/api/boards/{id}/images/{idx}", put(boards::put_image))
        .route("/api/tiles/{board_id}/{idx}", post(tiles::upload_tile))
        .route("/api/ws", get(ws::handle_ws))
        .route("/healthz", get(healthz))
        .nest_service("/tiles", tiles)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
