//! Application state shared across handlers.

use std::sync::Arc;

use crate::gateway::ArtistSongCacheGateway;

#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<ArtistSongCacheGateway>,
}

impl AppState {
    pub fn new(gateway: ArtistSongCacheGateway) -> Self {
        Self { gateway: Arc::new(gateway) }
    }
}
