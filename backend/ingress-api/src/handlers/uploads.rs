//! Two-phase upload protocol
//!
//! `init` hands the client a presigned PUT URL for a freshly minted
//! videoId; `complete` confirms the object actually landed in the raw
//! bucket before creating the metadata record and enqueueing the job.
//! Verifying existence first keeps the queue free of jobs whose download
//! would be dead on arrival.

use actix_web::{web, HttpRequest, HttpResponse};
use hls_core::VideoJob;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::error::{ApiError, Result};
use crate::metrics::UPLOADS_INITIATED;
use crate::middleware::request_id;
use crate::state::AppState;
use crate::validation::{
    file_extension, validate_content_type, validate_filename, validate_upload_key,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitUploadRequest {
    pub filename: String,
    pub content_type: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitUploadResponse {
    pub video_id: String,
    pub upload_url: String,
    pub key: String,
    pub expires_in: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteUploadRequest {
    pub video_id: String,
    pub key: String,
    pub filename: String,
}

pub async fn init_upload(
    state: web::Data<AppState>,
    body: web::Json<InitUploadRequest>,
) -> Result<HttpResponse> {
    validate_filename(&body.filename)?;
    validate_content_type(&body.content_type)?;

    let video_id = Uuid::new_v4().to_string();
    // Extension is present: validate_filename requires one.
    let extension = file_extension(&body.filename)
        .ok_or_else(|| ApiError::BadRequest("filename has no extension".to_string()))?;
    let key = format!("uploads/{video_id}.{extension}");

    let upload_url = state
        .s3
        .presign_put(
            &state.config.raw_bucket,
            &key,
            &body.content_type,
            state.config.presign_ttl,
        )
        .await?;

    UPLOADS_INITIATED.with_label_values(&["init"]).inc();
    info!(video_id = %video_id, key = %key, "upload initialized");

    Ok(HttpResponse::Ok().json(InitUploadResponse {
        video_id,
        upload_url,
        key,
        expires_in: state.config.presign_ttl.as_secs(),
    }))
}

pub async fn complete_upload(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<CompleteUploadRequest>,
) -> Result<HttpResponse> {
    if body.video_id.is_empty() {
        return Err(ApiError::BadRequest("videoId is required".to_string()));
    }
    validate_filename(&body.filename)?;
    let key = validate_upload_key(&body.key, &body.video_id)?;

    // The client claims the PUT happened; confirm before enqueueing.
    let metadata = state.s3.head(&state.config.raw_bucket, &key).await?;

    state
        .repo
        .create_video(&body.video_id, &body.filename, &key, metadata.size_bytes)
        .await?;

    let job = VideoJob {
        video_id: body.video_id.clone(),
        s3_key: key.clone(),
        bucket: state.config.raw_bucket.clone(),
        filename: body.filename.clone(),
    };
    let payload =
        serde_json::to_string(&job).map_err(|e| ApiError::Internal(e.to_string()))?;
    let trace_headers = otel_config::inject_trace_context(&tracing::Span::current());

    state.queue.send(payload, trace_headers).await?;

    UPLOADS_INITIATED.with_label_values(&["complete"]).inc();
    info!(
        video_id = %body.video_id,
        key = %key,
        size_bytes = metadata.size_bytes,
        "upload completed, job enqueued"
    );

    Ok(HttpResponse::Accepted().json(serde_json::json!({
        "videoId": body.video_id,
        "status": "processing",
        "message": "video accepted for processing",
        "requestId": request_id(&req),
    })))
}
