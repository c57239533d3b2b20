//! Renderer seam — D2 source + options → SVG artifact.
//!
//! SYSTEM CONTEXT
//! ==============
//! The diagram language is owned by the external `d2` binary. This module only
//! defines the async trait the pipeline calls and the artifact it returns;
//! [`d2::D2Cli`] is the production implementation. Tests swap in mocks.

pub mod d2;

pub use d2::D2Cli;

use crate::error::PipelineError;
use crate::options::{DiagramSource, RenderOptions};

/// SVG markup produced by the renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderArtifact {
    svg: String,
}

impl RenderArtifact {
    #[must_use]
    pub fn new(svg: String) -> Self {
        Self { svg }
    }

    #[must_use]
    pub fn svg(&self) -> &str {
        &self.svg
    }

    /// Byte length of the markup.
    #[must_use]
    pub fn len(&self) -> usize {
        self.svg.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.svg.is_empty()
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.svg.into_bytes()
    }
}

/// Compile and render a diagram. Enables mocking in tests.
#[async_trait::async_trait]
pub trait DiagramRenderer: Send + Sync {
    /// Render `source` to SVG with `options`.
    ///
    /// # Errors
    ///
    /// [`PipelineError::Compile`] when the source is not valid D2,
    /// [`PipelineError::Render`] when layout or drawing fails, and
    /// [`PipelineError::Internal`] when the renderer cannot be invoked at all.
    async fn render(&self, source: &DiagramSource, options: &RenderOptions) -> Result<RenderArtifact, PipelineError>;
}
