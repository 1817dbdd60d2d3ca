use crate::api::error::AppError;
use axum::{Form, Json, extract::State};
use reqwest::multipart;
use serde::Deserialize;
use tracing::info;
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct AskRequest {
    pub wav_filename: String,
    pub question: String,
}

#[utoipa::path(
    post,
    path = "/upload_and_ask",
    request_body(content = AskRequest, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Upstream JSON response, relayed verbatim"),
        (status = 404, description = "No artifact with that filename"),
        (status = 502, description = "Upstream call failed")
    ),
    tag = "ask"
)]
pub async fn upload_and_ask(
    State(state): State<crate::AppState>,
    Form(req): Form<AskRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    if req.wav_filename.contains(['/', '\\']) || req.wav_filename.contains("..") {
        return Err(AppError::BadRequest("invalid filename".to_string()));
    }

    let wav_path = state.config.upload_dir.join(&req.wav_filename);
    if tokio::fs::metadata(&wav_path).await.is_err() {
        return Err(AppError::NotFound(format!(
            "WAV file not found: {}",
            req.wav_filename
        )));
    }

    info!(
        "relaying {} with question: {}",
        req.wav_filename, req.question
    );

    let bytes = tokio::fs::read(&wav_path).await?;
    let file_part = multipart::Part::bytes(bytes)
        .file_name(req.wav_filename.clone())
        .mime_str("audio/wav")
        .map_err(|e| AppError::BadRequest(format!("invalid mime: {}", e)))?;
    let form = multipart::Form::new()
        .part("file", file_part)
        .text("question", req.question);

    let response = state
        .http
        .post(&state.config.ask_url)
        .multipart(form)
        .send()
        .await
        .map_err(|e| AppError::Upstream(e.to_string()))?;

    if !response.status().is_success() {
        return Err(AppError::Upstream(format!(
            "upstream returned {}",
            response.status()
        )));
    }

    let body = response
        .json::<serde_json::Value>()
        .await
        .map_err(|e| AppError::Upstream(format!("invalid upstream JSON: {}", e)))?;

    Ok(Json(body))
}
