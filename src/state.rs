//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. It
//! holds only the immutable pipeline, so there is no mutable state shared
//! between requests.

use std::sync::Arc;

use crate::config::{RasterBackend, ServiceConfig};
use crate::convert::browser::BrowserSettings;
use crate::convert::{BrowserConverter, CodecConverter, RasterConverter};
use crate::pipeline::Pipeline;
use crate::render::{D2Cli, DiagramRenderer};

/// Clone is required by Axum; the pipeline is Arc-wrapped.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
}

impl AppState {
    #[must_use]
    pub fn new(pipeline: Pipeline) -> Self {
        Self { pipeline: Arc::new(pipeline) }
    }

    /// Wire the production collaborators described by `config`.
    #[must_use]
    pub fn from_config(config: &ServiceConfig) -> Self {
        let renderer: Arc<dyn DiagramRenderer> = Arc::new(D2Cli::new(config.d2_bin.clone(), config.render_timeout));
        Self::new(Pipeline::new(renderer, raster_converter(config)))
    }
}

fn raster_converter(config: &ServiceConfig) -> Option<Arc<dyn RasterConverter>> {
    let raster = &config.raster;
    match raster.backend {
        RasterBackend::Codec => {
            Some(Arc::new(CodecConverter::new(raster.timeout, raster.max_dimension, raster.concurrency)))
        }
        RasterBackend::Browser => Some(Arc::new(BrowserConverter::new(BrowserSettings {
            bin: raster.browser_bin.clone(),
            no_sandbox: raster.browser_no_sandbox,
            settle: raster.settle,
            timeout: raster.timeout,
            max_dimension: raster.max_dimension,
        }))),
        RasterBackend::None => None,
    }
}
