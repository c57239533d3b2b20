//! Format conversion — SVG artifact → final response payload.
//!
//! DESIGN
//! ======
//! SVG output is an identity transform. PNG output goes through a
//! [`RasterConverter`]: either the in-process codec ([`codec`]) or a scoped
//! headless browser surface ([`browser`]). A failed conversion never fails
//! the request. It yields [`Conversion::Degraded`], the SVG is served
//! instead, and the reason code travels in the `X-D2-Raster-Fallback` header.

pub mod browser;
pub mod codec;

pub use browser::BrowserConverter;
pub use codec::CodecConverter;

use std::collections::BTreeMap;
use std::time::Duration;

use crate::engine::EngineDecision;
use crate::error::ErrorCode;
use crate::options::OutputFormat;
use crate::render::RenderArtifact;

pub const SVG_MIME: &str = "image/svg+xml";
pub const PNG_MIME: &str = "image/png";

pub const HEADER_ENGINE: &str = "x-d2-engine";
pub const HEADER_ENGINE_REASON: &str = "x-d2-engine-reason";
pub const HEADER_RASTER_FALLBACK: &str = "x-d2-raster-fallback";

// =============================================================================
// ERROR
// =============================================================================

/// Why a raster conversion did not produce a PNG.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConversionError {
    /// No raster backend is configured.
    #[error("raster conversion unavailable")]
    Unavailable,

    /// The SVG markup could not be parsed.
    #[error("malformed svg: {0}")]
    Malformed(String),

    /// The drawing is empty or larger than the configured maximum.
    #[error("raster size {width}x{height} out of range")]
    InvalidSize { width: u32, height: u32 },

    /// Conversion exceeded its time budget.
    #[error("raster conversion timed out after {0:?}")]
    Timeout(Duration),

    /// The rendering surface failed to start, load or capture.
    #[error("rendering surface failed: {0}")]
    Surface(String),

    /// PNG encoding failed.
    #[error("png encoding failed: {0}")]
    Encode(String),
}

impl ErrorCode for ConversionError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Unavailable => "unavailable",
            Self::Malformed(_) => "malformed-svg",
            Self::InvalidSize { .. } => "invalid-size",
            Self::Timeout(_) => "timeout",
            Self::Surface(_) => "surface-error",
            Self::Encode(_) => "encode-error",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Surface(_))
    }
}

// =============================================================================
// CONVERTER SEAM
// =============================================================================

/// SVG → PNG strategy. Enables mocking in tests.
#[async_trait::async_trait]
pub trait RasterConverter: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Rasterize `svg` to PNG bytes.
    ///
    /// # Errors
    ///
    /// Returns a [`ConversionError`] describing why no PNG was produced.
    async fn rasterize(&self, svg: &str) -> Result<Vec<u8>, ConversionError>;
}

// =============================================================================
// CONVERSION OUTCOME
// =============================================================================

/// Outcome of the conversion stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conversion {
    /// SVG was requested and is returned as is.
    Vector(RenderArtifact),
    /// PNG was requested and produced.
    Raster(Vec<u8>),
    /// PNG was requested but conversion failed; the SVG is returned instead.
    Degraded { artifact: RenderArtifact, reason: ConversionError },
}

/// Convert `artifact` to `target`, degrading to SVG when rasterization fails.
pub async fn convert(
    artifact: RenderArtifact,
    target: OutputFormat,
    raster: Option<&dyn RasterConverter>,
) -> Conversion {
    match target {
        OutputFormat::Svg => Conversion::Vector(artifact),
        OutputFormat::Png => {
            let Some(converter) = raster else {
                return Conversion::Degraded { artifact, reason: ConversionError::Unavailable };
            };
            match converter.rasterize(artifact.svg()).await {
                Ok(png) => Conversion::Raster(png),
                Err(reason) => Conversion::Degraded { artifact, reason },
            }
        }
    }
}

// =============================================================================
// FINAL ARTIFACT
// =============================================================================

/// Response payload: body bytes, content type and diagnostic headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalArtifact {
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
    pub diagnostic_headers: BTreeMap<&'static str, String>,
}

impl FinalArtifact {
    #[must_use]
    pub fn new(conversion: Conversion, decision: &EngineDecision) -> Self {
        let mut diagnostic_headers = BTreeMap::new();
        diagnostic_headers.insert(HEADER_ENGINE, decision.engine().to_string());
        diagnostic_headers.insert(HEADER_ENGINE_REASON, decision.reason().to_owned());

        let (mime_type, bytes) = match conversion {
            Conversion::Vector(artifact) => (SVG_MIME, artifact.into_bytes()),
            Conversion::Raster(png) => (PNG_MIME, png),
            Conversion::Degraded { artifact, reason } => {
                diagnostic_headers.insert(HEADER_RASTER_FALLBACK, reason.error_code().to_owned());
                (SVG_MIME, artifact.into_bytes())
            }
        };

        Self { mime_type, bytes, diagnostic_headers }
    }

    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.diagnostic_headers.contains_key(HEADER_RASTER_FALLBACK)
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
