use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use log::{error, warn};
use serde::Serialize;

use crate::Error;

pub const VALIDATION_MESSAGE: &str = "HTML content is required";
pub const CONVERSION_MESSAGE: &str = "Failed to convert HTML to PDF";

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
}

/// The two error classes callers can observe. The underlying cause is logged
/// and never sent back.
#[derive(Debug)]
pub enum ApiError {
    /// The request had no usable markup (400)
    Validation(Error),
    /// Anything that went wrong while converting (500)
    Conversion(Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Conversion(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => VALIDATION_MESSAGE,
            ApiError::Conversion(_) => CONVERSION_MESSAGE,
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        if err.is_validation() {
            ApiError::Validation(err)
        } else {
            ApiError::Conversion(err)
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::Validation(cause) => warn!("Rejected conversion request: {}", cause),
            ApiError::Conversion(cause) => error!("PDF conversion error: {}", cause),
        }
        let body = ErrorBody {
            error: self.message(),
        };
        (self.status(), Json(body)).into_response()
    }
}
