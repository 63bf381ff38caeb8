//! Router construction.

use axum::Router;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/artist-songs", get(handlers::get_artist_songs).delete(handlers::delete_artist))
        .route("/artist-songs/add", post(handlers::add_song))
        .route("/artist-songs/remove", post(handlers::remove_song))
        .route("/cached-artists", get(handlers::cached_artists))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
