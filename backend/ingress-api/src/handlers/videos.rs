//! Public playback lookups

use actix_web::{web, HttpResponse};
use hls_core::VideoStatus;
use metadata_store::MetadataError;
use serde::Deserialize;

use crate::error::{ApiError, Result};
use crate::state::AppState;

const DEFAULT_PAGE_SIZE: i32 = 20;
const MAX_PAGE_SIZE: i32 = 100;

/// GET /latest - resolve the latest-pointer to a playback URL.
pub async fn latest_video(state: web::Data<AppState>) -> Result<HttpResponse> {
    let (pointer, record) = state.repo.get_latest_video().await.map_err(|err| match err {
        MetadataError::NotFound(_) => ApiError::NotFound("no completed videos yet".to_string()),
        other => other.into(),
    })?;

    // The pointer is only ever written after a completed record, but a
    // reader must still never see a non-completed result.
    if record.status != VideoStatus::Completed {
        return Err(ApiError::NotFound("no completed videos yet".to_string()));
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "videoId": pointer.video_id,
        "playbackUrl": pointer.playback_url,
        "processedAt": pointer.processed_at,
    })))
}

#[derive(Debug, Deserialize)]
pub struct ListVideosQuery {
    pub limit: Option<i32>,
    pub cursor: Option<String>,
}

/// GET /videos - reverse-chronological listing with an opaque cursor.
pub async fn list_videos(
    state: web::Data<AppState>,
    query: web::Query<ListVideosQuery>,
) -> Result<HttpResponse> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);

    let page = state.repo.list_videos(limit, query.cursor.as_deref()).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "videos": page.videos,
        "nextCursor": page.next_cursor,
    })))
}
