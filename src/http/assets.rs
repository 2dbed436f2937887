//! Plain file serving from the static directory.

use std::path::{Component, PathBuf};

use axum::{
    extract::State,
    http::{header, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use log::debug;

use super::AppState;
use crate::EngineFactory;

const INDEX_FILE: &str = "index.html";

pub(super) async fn serve_static<F: EngineFactory>(
    State(state): State<AppState<F>>,
    method: Method,
    uri: Uri,
) -> Response {
    if method != Method::GET && method != Method::HEAD {
        return StatusCode::NOT_FOUND.into_response();
    }

    let Some(relative) = resolve_asset_path(uri.path()) else {
        debug!("Rejected static path {}", uri.path());
        return StatusCode::NOT_FOUND.into_response();
    };

    let path = state.static_dir.join(relative);
    match tokio::fs::read(&path).await {
        Ok(contents) => {
            let mime = mime_guess::from_path(&path).first_or_octet_stream();
            ([(header::CONTENT_TYPE, mime.to_string())], contents).into_response()
        }
        Err(_) => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Map a request path onto a path relative to the static directory.
/// Directory paths resolve to their index file; traversal is refused.
fn resolve_asset_path(request_path: &str) -> Option<PathBuf> {
    let mut relative = PathBuf::new();
    for segment in request_path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return None,
            s if s.contains('\\') || s.contains(':') => return None,
            s => relative.push(s),
        }
    }

    if request_path.ends_with('/') || relative.as_os_str().is_empty() {
        relative.push(INDEX_FILE);
    }

    // Only plain relative components may remain
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return None;
    }
    Some(relative)
}
