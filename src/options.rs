//! Request model and option composition.
//!
//! `compose_options` merges what the caller asked for with the engine
//! selector's recommendation. An explicit engine always wins and the selector
//! is not consulted at all in that case.

use std::fmt;
use std::str::FromStr;

use crate::engine::{self, EngineDecision, LayoutEngine};

pub const REASON_USER_SPECIFIED: &str = "user specified";
pub const REASON_AUTO_DISABLED: &str = "default — auto-selection disabled";

// =============================================================================
// DIAGRAM SOURCE
// =============================================================================

/// Non-empty D2 source text. Opaque to this crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagramSource(String);

impl DiagramSource {
    /// Wrap `text`, rejecting the empty string.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Option<Self> {
        let text = text.into();
        if text.is_empty() { None } else { Some(Self(text)) }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// =============================================================================
// OUTPUT FORMAT
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Svg,
    Png,
}

impl OutputFormat {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Svg => "svg",
            Self::Png => "png",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported output format: {0}")]
pub struct UnknownFormat(pub String);

impl FromStr for OutputFormat {
    type Err = UnknownFormat;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "svg" => Ok(Self::Svg),
            "png" => Ok(Self::Png),
            _ => Err(UnknownFormat(raw.to_owned())),
        }
    }
}

// =============================================================================
// REQUEST / OPTIONS
// =============================================================================

/// A validated render request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRequest {
    pub source: DiagramSource,
    pub explicit_engine: Option<LayoutEngine>,
    pub theme: Option<i64>,
    pub sketch: Option<bool>,
    pub output_format: OutputFormat,
    pub auto_engine: bool,
}

impl RenderRequest {
    /// A request with every option left at its default.
    #[must_use]
    pub fn new(source: DiagramSource) -> Self {
        Self {
            source,
            explicit_engine: None,
            theme: None,
            sketch: None,
            output_format: OutputFormat::default(),
            auto_engine: true,
        }
    }
}

/// Options handed to the renderer. `None` fields are left to the renderer's
/// own defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    pub layout_engine: LayoutEngine,
    pub theme_id: Option<i64>,
    pub sketch: Option<bool>,
}

/// Resolve the engine and normalized renderer options for `request`.
#[must_use]
pub fn compose_options(request: &RenderRequest) -> (RenderOptions, EngineDecision) {
    compose_options_with(request, engine::select_engine)
}

/// Same as [`compose_options`] with the engine selector supplied by the caller.
pub fn compose_options_with<F>(request: &RenderRequest, select: F) -> (RenderOptions, EngineDecision)
where
    F: FnOnce(&str) -> EngineDecision,
{
    let decision = match (request.explicit_engine, request.auto_engine) {
        (Some(engine), _) => EngineDecision::new(engine, REASON_USER_SPECIFIED),
        (None, true) => select(request.source.as_str()),
        (None, false) => EngineDecision::new(LayoutEngine::default(), REASON_AUTO_DISABLED),
    };

    let options = RenderOptions { layout_engine: decision.engine(), theme_id: request.theme, sketch: request.sketch };

    (options, decision)
}

#[cfg(test)]
#[path = "options_test.rs"]
mod tests;
