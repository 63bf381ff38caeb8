//! HTTP handlers over the artist song gateway.

use axum::Json;
use axum::extract::{Query, State};
use chordium_core::Song;
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtistPathQuery {
    #[serde(default)]
    pub artist_path: Option<String>,
}

impl ArtistPathQuery {
    fn require(self) -> ApiResult<String> {
        self.artist_path
            .filter(|path| !path.trim().is_empty())
            .ok_or_else(|| ApiError::InvalidInput("artistPath is required".into()))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddSongRequest {
    pub artist_name: String,
    pub song: Song,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveSongRequest {
    pub artist_name: String,
    pub song_path: String,
}

/// Outcome of a mutation; `false` means nothing changed.
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub object_store: bool,
}

/// `GET /artist-songs?artistPath=`
pub async fn get_artist_songs(
    State(state): State<AppState>, Query(query): Query<ArtistPathQuery>,
) -> ApiResult<Json<Vec<Song>>> {
    let artist_path = query.require()?;
    let songs = state.gateway.get_songs(&artist_path).await?;
    Ok(Json(songs))
}

/// `POST /artist-songs/add`
pub async fn add_song(
    State(state): State<AppState>, Json(request): Json<AddSongRequest>,
) -> ApiResult<Json<SuccessResponse>> {
    let success = state.gateway.add_song(&request.artist_name, &request.song).await?;
    Ok(Json(SuccessResponse { success }))
}

/// `POST /artist-songs/remove`
pub async fn remove_song(
    State(state): State<AppState>, Json(request): Json<RemoveSongRequest>,
) -> ApiResult<Json<SuccessResponse>> {
    let success = state.gateway.remove_song(&request.artist_name, &request.song_path).await?;
    Ok(Json(SuccessResponse { success }))
}

/// `DELETE /artist-songs?artistPath=`
pub async fn delete_artist(
    State(state): State<AppState>, Query(query): Query<ArtistPathQuery>,
) -> ApiResult<Json<SuccessResponse>> {
    let artist_path = query.require()?;
    let success = state.gateway.delete_artist(&artist_path).await?;
    Ok(Json(SuccessResponse { success }))
}

/// `GET /cached-artists`
pub async fn cached_artists(State(state): State<AppState>) -> ApiResult<Json<Vec<String>>> {
    Ok(Json(state.gateway.list_artists().await?))
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        object_store: state.gateway.store_enabled().await,
    })
}
