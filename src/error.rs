//! Pipeline error taxonomy.
//!
//! DESIGN
//! ======
//! `PipelineError` covers every failure that aborts a request. Raster
//! conversion failures are deliberately absent: they degrade the response to
//! SVG instead (see `convert::ConversionError`).

// =============================================================================
// ERROR CODES
// =============================================================================

/// Grepable error code and retryable flag.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}

// =============================================================================
// PIPELINE ERROR
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    /// Missing or invalid request fields. Detected before any renderer call.
    #[error("{0}")]
    ClientInput(String),

    /// The diagram source is not valid D2.
    #[error("compile failed: {0}")]
    Compile(String),

    /// The source compiled but layout or drawing failed.
    #[error("render failed: {0}")]
    Render(String),

    /// Anything unexpected. The detail is logged, never sent to the client.
    #[error("internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    pub fn missing_field(field: &str) -> Self {
        Self::ClientInput(format!("Missing {field} in request body"))
    }

    /// Detail that may be shown to the client alongside a 500.
    #[must_use]
    pub fn client_message(&self) -> Option<&str> {
        match self {
            Self::Compile(msg) | Self::Render(msg) => Some(msg),
            Self::ClientInput(_) | Self::Internal(_) => None,
        }
    }
}

impl ErrorCode for PipelineError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::ClientInput(_) => "E_CLIENT_INPUT",
            Self::Compile(_) => "E_COMPILE",
            Self::Render(_) => "E_RENDER",
            Self::Internal(_) => "E_INTERNAL",
        }
    }
}
