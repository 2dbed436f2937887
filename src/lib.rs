//! RFox PDF Service
//!
//! A small HTTP service that turns raw HTML into PDF documents by driving a
//! headless browser. The browser does all the layout, font and PDF work; this
//! crate accepts requests, runs each one through its own engine instance and
//! hands the bytes back.
//!
//! # Features
//!
//! - **CDP Backend** (default): Uses Chrome DevTools Protocol via headless Chrome
//! - **Pluggable Engines**: `EngineFactory` lets tests swap Chrome for a mock
//! - **Scoped Engines**: every engine is owned by one `RenderSession` and is
//!   closed when the session goes away, on every exit path
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use rfpdf::{cdp::CdpFactory, convert, ConversionRequest, EngineConfig};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let factory = Arc::new(CdpFactory::new(EngineConfig::default()));
//! let request = ConversionRequest::from_html("<html><body>Hi</body></html>");
//! let document = convert(&factory, &request).await?;
//! std::fs::write("hi.pdf", document.as_bytes())?;
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::time::Duration;

pub mod error;
pub use error::{Error, Result};

pub mod options;
pub use options::{ConversionRequest, LayoutOptions, Margins, PdfOptions};

pub mod config;
pub mod convert;
pub use convert::convert;

pub mod http;

// Worker-thread backed async facade over a blocking engine
pub mod session;
pub use session::RenderSession;

#[cfg(feature = "cdp")]
pub mod cdp;

/// Configuration for launching rendering engines
///
/// The defaults match a containerised deployment: Chrome's sandbox is off
/// (it needs privileges containers rarely grant), the binary is auto-detected
/// and every engine call may take up to 30 seconds.
///
/// # Examples
///
/// ```
/// let cfg = rfpdf::EngineConfig::default();
/// assert!(!cfg.sandbox);
/// assert_eq!(cfg.settle.grace_ms, 500);
/// ```
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Explicit browser binary; `None` lets the backend find one
    pub chrome_path: Option<PathBuf>,
    /// Whether to keep the browser's process sandbox enabled
    pub sandbox: bool,
    /// Upper bound for any single engine call in milliseconds
    pub timeout_ms: u64,
    /// Viewport used while laying out the document before printing
    pub viewport: Viewport,
    /// How the engine decides a loaded document is ready to print
    pub settle: SettleConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chrome_path: None,
            sandbox: false,
            timeout_ms: 30000,
            viewport: Viewport::default(),
            settle: SettleConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Viewport dimensions
#[derive(Debug, Clone, Copy)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

/// Settle heuristic applied after markup is loaded
///
/// The engine first waits until no network request has been in flight for
/// `network_idle_ms` and the document's load event has fired, then optionally
/// for web fonts, then sleeps for `grace_ms` to absorb late layout shifts.
/// This is best effort: script-driven content that keeps changing after that
/// point is printed as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettleConfig {
    /// Quiet window with no request in flight, in milliseconds
    pub network_idle_ms: u64,
    /// Wait for `document.fonts.ready` after the load event
    pub wait_for_fonts: bool,
    /// Fixed delay after the readiness signals, in milliseconds (0 disables)
    pub grace_ms: u64,
}

impl Default for SettleConfig {
    fn default() -> Self {
        Self {
            network_idle_ms: 500,
            wait_for_fonts: true,
            grace_ms: 500,
        }
    }
}

impl SettleConfig {
    pub fn network_idle(&self) -> Duration {
        Duration::from_millis(self.network_idle_ms)
    }

    pub fn grace(&self) -> Duration {
        Duration::from_millis(self.grace_ms)
    }
}

/// A rendered PDF, alive for one request/response cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfDocument {
    bytes: Vec<u8>,
}

impl PdfDocument {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Exact byte length, used for `Content-Length`
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Core trait for rendering engine implementations
///
/// One value is one isolated browser instance with a single page. Engines are
/// blocking and are driven from a dedicated worker thread (see
/// [`RenderSession`]); they never cross threads after creation.
pub trait Engine {
    /// Replace the page's document with `html`
    fn load_html(&mut self, html: &str) -> Result<()>;

    /// Block until the loaded document is ready to print
    fn wait_until_settled(&mut self, settle: &SettleConfig) -> Result<()>;

    /// Print the current document and return the PDF bytes
    fn print_pdf(&mut self, options: &PdfOptions) -> Result<Vec<u8>>;

    /// Close the engine and clean up resources
    fn close(self) -> Result<()>;
}

/// Creates a fresh engine for every conversion
///
/// Factories are shared between requests; the engines they create are not.
pub trait EngineFactory: Send + Sync + 'static {
    type Engine: Engine;

    /// Start a new, isolated engine instance
    fn launch(&self) -> Result<Self::Engine>;

    /// Settle heuristic engines from this factory should apply
    fn settle(&self) -> SettleConfig {
        SettleConfig::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.viewport.width, 1280);
        assert_eq!(config.viewport.height, 720);
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert!(config.chrome_path.is_none());
    }

    #[test]
    fn test_settle_defaults() {
        let settle = SettleConfig::default();
        assert!(settle.wait_for_fonts);
        assert_eq!(settle.grace(), Duration::from_millis(500));
        assert_eq!(settle.network_idle(), Duration::from_millis(500));
    }

    #[test]
    fn test_pdf_document_length() {
        let doc = PdfDocument::new(b"%PDF-1.4".to_vec());
        assert_eq!(doc.len(), 8);
        assert!(!doc.is_empty());
        assert_eq!(doc.into_bytes(), b"%PDF-1.4".to_vec());
    }
}
