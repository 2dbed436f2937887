//! The conversion pipeline: markup in, PDF bytes out

use std::sync::Arc;
use std::time::Instant;

use log::{info, warn};

use crate::{ConversionRequest, EngineFactory, Error, PdfDocument, RenderSession, Result};

/// Convert one request into a PDF using a fresh engine from `factory`.
///
/// Validation happens before any engine is started. Once launched, the
/// engine belongs to a [`RenderSession`] local to this call, so it is closed
/// whether the conversion succeeds, fails part-way, or this future is dropped.
pub async fn convert<F: EngineFactory>(
    factory: &Arc<F>,
    request: &ConversionRequest,
) -> Result<PdfDocument> {
    let html = request.html()?;
    let options = request.layout().resolve()?;

    let started = Instant::now();
    let session = RenderSession::launch(Arc::clone(factory)).await?;
    session.load_html(html).await?;
    session.wait_until_settled(factory.settle()).await?;
    let bytes = session.print_pdf(&options).await?;

    // The document is complete at this point; a failed teardown is only logged.
    if let Err(e) = session.close().await {
        warn!("Engine close failed after a successful conversion: {}", e);
    }

    if bytes.is_empty() {
        return Err(Error::RenderError("engine returned an empty document".into()));
    }

    let document = PdfDocument::new(bytes);
    info!(
        "Converted {} bytes of HTML into a {} byte PDF in {}ms",
        html.len(),
        document.len(),
        started.elapsed().as_millis()
    );
    Ok(document)
}
