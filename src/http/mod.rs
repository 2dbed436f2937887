//! HTTP surface: `POST /convert`, `GET /health` and the static file fallback.

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::{convert, config::ServiceConfig, ConversionRequest, EngineFactory, PdfDocument};

mod assets;
mod error;

pub use error::ApiError;

pub const PDF_CONTENT_TYPE: &str = "application/pdf";
pub const PDF_DISPOSITION: &str = "attachment; filename=\"converted.pdf\"";
pub const HEALTH_MESSAGE: &str = "HTML to PDF service is running";

/// Process-wide state shared by every handler; never mutated after startup.
pub struct AppState<F> {
    factory: Arc<F>,
    static_dir: Arc<PathBuf>,
}

impl<F> Clone for AppState<F> {
    fn clone(&self) -> Self {
        Self {
            factory: Arc::clone(&self.factory),
            static_dir: Arc::clone(&self.static_dir),
        }
    }
}

impl<F: EngineFactory> AppState<F> {
    pub fn new(factory: F, static_dir: impl Into<PathBuf>) -> Self {
        Self {
            factory: Arc::new(factory),
            static_dir: Arc::new(static_dir.into()),
        }
    }
}

/// Build the service router.
pub fn router<F: EngineFactory>(state: AppState<F>, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/convert", post(convert_pdf::<F>))
        .route("/health", get(health))
        .fallback(assets::serve_static::<F>)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state)
}

/// Build the router from the parsed service configuration.
pub fn app<F: EngineFactory>(factory: F, config: &ServiceConfig) -> Router {
    router(
        AppState::new(factory, config.static_dir.clone()),
        config.max_body_bytes,
    )
}

async fn convert_pdf<F: EngineFactory>(
    State(state): State<AppState<F>>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let request = ConversionRequest::from_slice(&body)?;
    let document = convert(&state.factory, &request).await?;
    Ok(pdf_response(document))
}

fn pdf_response(document: PdfDocument) -> Response {
    let headers = [
        (header::CONTENT_TYPE, HeaderValue::from_static(PDF_CONTENT_TYPE)),
        (
            header::CONTENT_DISPOSITION,
            HeaderValue::from_static(PDF_DISPOSITION),
        ),
        (header::CONTENT_LENGTH, HeaderValue::from(document.len())),
    ];
    (StatusCode::OK, headers, document.into_bytes()).into_response()
}

#[derive(Debug, Serialize)]
struct HealthStatus {
    status: &'static str,
    message: &'static str,
}

async fn health() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "OK",
        message: HEALTH_MESSAGE,
    })
}
