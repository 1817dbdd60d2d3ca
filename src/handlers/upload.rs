use crate::api::error::AppError;
use crate::services::pipeline::{self, UploadOutcome};
use axum::{
    Json,
    extract::{Multipart, State},
    http::{HeaderMap, header},
};
use futures::TryStreamExt;
use serde::Serialize;
use tokio_util::io::StreamReader;
use tracing::info;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct UploadResponse {
    pub status: String,
    pub received_mb: f64,
    pub total_mb: f64,
    pub percentage: String,
    pub output: String,
    pub file_hash: String,
}

impl From<UploadOutcome> for UploadResponse {
    fn from(outcome: UploadOutcome) -> Self {
        let percentage = if outcome.declared > 0 {
            format!(
                "{:.2}%",
                outcome.received as f64 / outcome.declared as f64 * 100.0
            )
        } else {
            "unknown".to_string()
        };

        Self {
            status: "success".to_string(),
            received_mb: round_mb(outcome.received),
            total_mb: round_mb(outcome.declared),
            percentage,
            output: outcome.output_filename,
            file_hash: outcome.hash,
        }
    }
}

fn round_mb(bytes: u64) -> f64 {
    (bytes as f64 / 1024.0 / 1024.0 * 100.0).round() / 100.0
}

#[utoipa::path(
    post,
    path = "/upload",
    request_body(content = Multipart, description = "Audio/video file upload"),
    responses(
        (status = 200, description = "File transcoded successfully", body = UploadResponse),
        (status = 400, description = "Missing file field or size mismatch"),
        (status = 409, description = "Duplicate content"),
        (status = 500, description = "Transcode failure")
    ),
    tag = "upload"
)]
pub async fn upload_file(
    State(state): State<crate::AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let declared: u64 = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);

    info!(
        "new upload request: declared {} bytes, {} hashes registered",
        declared,
        state.registry.len()
    );

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let original_filename = field.file_name().unwrap_or("unnamed").to_string();
        let body_with_io_error =
            field.map_err(|err| std::io::Error::new(std::io::ErrorKind::Other, err));
        let reader = StreamReader::new(body_with_io_error);

        let outcome = pipeline::process_upload(
            &state.config,
            &state.registry,
            state.transcoder.as_ref(),
            &original_filename,
            declared,
            reader,
        )
        .await?;

        return Ok(Json(outcome.into()));
    }

    Err(AppError::BadRequest(
        "no file field in multipart body".to_string(),
    ))
}
