//! Request-to-image pipeline.
//!
//! DESIGN
//! ======
//! compose options → render SVG → convert to the requested format. Compile
//! and render failures abort the request; conversion failures degrade it to
//! SVG. The pipeline holds only immutable collaborators, so one instance is
//! shared by every request without locking.

use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};
use uuid::Uuid;

use crate::convert::{self, Conversion, FinalArtifact, RasterConverter};
use crate::engine;
use crate::error::{ErrorCode, PipelineError};
use crate::options::{RenderRequest, compose_options};
use crate::render::DiagramRenderer;

pub struct Pipeline {
    renderer: Arc<dyn DiagramRenderer>,
    raster: Option<Arc<dyn RasterConverter>>,
}

impl Pipeline {
    #[must_use]
    pub fn new(renderer: Arc<dyn DiagramRenderer>, raster: Option<Arc<dyn RasterConverter>>) -> Self {
        Self { renderer, raster }
    }

    /// Name of the configured raster backend, if any.
    #[must_use]
    pub fn raster_backend(&self) -> Option<&'static str> {
        self.raster.as_ref().map(|r| r.name())
    }

    /// Run one request through every stage.
    ///
    /// # Errors
    ///
    /// Returns the renderer's [`PipelineError`] on compile, render or
    /// invocation failure. Raster conversion never errors.
    pub async fn generate(&self, request: &RenderRequest) -> Result<FinalArtifact, PipelineError> {
        let request_id = Uuid::new_v4();
        let (options, decision) = compose_options(request);
        info!(
            %request_id,
            engine = %decision.engine(),
            reason = decision.reason(),
            format = %request.output_format,
            source_len = request.source.as_str().len(),
            "pipeline: engine selected"
        );

        if engine::has_layout_directive(request.source.as_str()) {
            info!(%request_id, engine = %decision.engine(), "pipeline: --layout overrides layout-engine directive in source");
        }

        let started = Instant::now();
        let artifact = self
            .renderer
            .render(&request.source, &options)
            .await
            .inspect_err(|e| warn!(%request_id, code = e.error_code(), error = %e, "pipeline: render failed"))?;
        info!(
            %request_id,
            svg_len = artifact.len(),
            elapsed_ms = started.elapsed().as_millis(),
            "pipeline: rendered"
        );

        let conversion = convert::convert(artifact, request.output_format, self.raster.as_deref()).await;
        if let Conversion::Degraded { reason, .. } = &conversion {
            warn!(
                %request_id,
                backend = self.raster_backend().unwrap_or("none"),
                code = reason.error_code(),
                retryable = reason.retryable(),
                error = %reason,
                "pipeline: raster conversion failed, serving svg"
            );
        }

        Ok(FinalArtifact::new(conversion, &decision))
    }
}

#[cfg(test)]
#[path = "pipeline_test.rs"]
mod tests;
