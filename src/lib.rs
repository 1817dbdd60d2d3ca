pub mod api;
pub mod config;
pub mod handlers;
pub mod services;
pub mod utils;

use crate::config::Config;
use crate::services::registry::DedupRegistry;
use crate::services::transcoder::Transcoder;
use axum::{Router, routing::post};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::upload::upload_file,
        handlers::ask::upload_and_ask,
    ),
    components(
        schemas(
            handlers::upload::UploadResponse,
            handlers::ask::AskRequest,
        )
    ),
    tags(
        (name = "upload", description = "File ingest and transcoding"),
        (name = "ask", description = "Relay a transcoded file to the answering service")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub registry: Arc<DedupRegistry>,
    pub transcoder: Arc<dyn Transcoder>,
    pub http: reqwest::Client,
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/upload", post(handlers::upload::upload_file))
        .route("/upload_and_ask", post(handlers::ask::upload_and_ask))
        .layer(CorsLayer::very_permissive())
        .layer(axum::extract::DefaultBodyLimit::max(state.config.max_body_size))
        .with_state(state)
}
