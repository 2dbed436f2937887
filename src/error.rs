//! Error types for the conversion pipeline

use thiserror::Error;

/// Result type alias for conversion operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while turning markup into a PDF
#[derive(Error, Debug)]
pub enum Error {
    /// The request carried no usable markup
    #[error("HTML content is required")]
    MissingHtml,

    /// The request body or its `options` member was malformed
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A layout option could not be interpreted
    #[error("Invalid layout option `{key}`: {reason}")]
    InvalidOption { key: String, reason: String },

    /// Failed to start the rendering engine
    #[error("Engine initialization failed: {0}")]
    InitializationError(String),

    /// Failed to load markup into the engine
    #[error("Failed to load content: {0}")]
    LoadError(String),

    /// The document did not settle
    #[error("Content did not settle: {0}")]
    SettleError(String),

    /// Failed to produce the PDF
    #[error("Rendering failed: {0}")]
    RenderError(String),

    /// The worker thread owning the engine went away
    #[error("Engine worker failed: {0}")]
    WorkerError(String),

    /// CDP-specific error
    #[cfg(feature = "cdp")]
    #[error("CDP error: {0}")]
    CdpError(String),
}

impl Error {
    /// Whether the error was caused by the caller's input rather than by the
    /// conversion itself.
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::MissingHtml | Error::InvalidRequest(_))
    }

    pub(crate) fn invalid_option(key: &str, reason: impl Into<String>) -> Self {
        Error::InvalidOption {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(feature = "cdp")]
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::CdpError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_classes() {
        assert!(Error::MissingHtml.is_validation());
        assert!(Error::InvalidRequest("options must be an object".into()).is_validation());
        assert!(!Error::invalid_option("format", "unknown paper format").is_validation());
        assert!(!Error::RenderError("boom".into()).is_validation());
    }

    #[test]
    fn test_missing_html_message() {
        assert_eq!(Error::MissingHtml.to_string(), "HTML content is required");
    }
}
