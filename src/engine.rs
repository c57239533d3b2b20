//! Layout engine selection.
//!
//! DESIGN
//! ======
//! `select_engine` is a pure heuristic over the raw diagram text. It never
//! parses D2; it counts brace groupings and `->` connectors with regexes and
//! checks a few keyword patterns. Rules are evaluated in a fixed priority
//! order and the first match wins, so earlier rules break ties.
//!
//! TRADE-OFFS
//! ==========
//! Regex counting can double-count or miss nested and escaped occurrences.
//! The thresholds below are tunable constants, not proven optima.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

/// Grouping count above which a diagram with any connector prefers ELK.
pub const CONTAINER_GROUPING_THRESHOLD: usize = 2;
/// Grouping count above which an architecture diagram prefers ELK.
pub const ARCHITECTURE_GROUPING_THRESHOLD: usize = 3;
/// Connector count above which an architecture diagram prefers ELK.
pub const ARCHITECTURE_CONNECTOR_THRESHOLD: usize = 5;
/// Connector count above which any diagram prefers ELK.
pub const COMPLEX_CONNECTOR_THRESHOLD: usize = 10;
/// Grouping count above which any diagram prefers ELK.
pub const COMPLEX_GROUPING_THRESHOLD: usize = 5;

pub const REASON_TABULAR: &str = "handles tabular/class layouts better";
pub const REASON_CONTAINERS: &str = "better container-to-container routing";
pub const REASON_ARCHITECTURE: &str = "better for complex software architecture";
pub const REASON_COMPLEX: &str = "minimizes edge crossings in complex diagrams";
pub const REASON_DEFAULT: &str = "reliable for simple hierarchical diagrams";

const CONNECTOR_TOKEN: &str = "->";

static TABULAR_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"shape\s*:\s*(?:sql_table|class)\b").expect("static regex"));
static GROUPING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{[^}]*\}").expect("static regex"));
static NESTED_GROUPING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{[^{}]*\{[^{}]*\}").expect("static regex"));
static ARCHITECTURE_TERMS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:server|client|database|api|service|microservice|container)s?\b").expect("static regex")
});
static LAYOUT_DIRECTIVE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"layout-engine\s*:").expect("static regex"));

// =============================================================================
// LAYOUT ENGINE
// =============================================================================

/// A layout engine understood by the `d2` renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LayoutEngine {
    #[default]
    Dagre,
    Elk,
    Tala,
}

impl LayoutEngine {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dagre => "dagre",
            Self::Elk => "elk",
            Self::Tala => "tala",
        }
    }
}

impl fmt::Display for LayoutEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported layout engine: {0}")]
pub struct UnknownEngine(pub String);

impl FromStr for LayoutEngine {
    type Err = UnknownEngine;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "dagre" => Ok(Self::Dagre),
            "elk" => Ok(Self::Elk),
            "tala" => Ok(Self::Tala),
            _ => Err(UnknownEngine(raw.to_owned())),
        }
    }
}

// =============================================================================
// DECISION
// =============================================================================

/// The engine chosen for one request and why. Read-only once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineDecision {
    engine: LayoutEngine,
    reason: &'static str,
}

impl EngineDecision {
    #[must_use]
    pub fn new(engine: LayoutEngine, reason: &'static str) -> Self {
        Self { engine, reason }
    }

    #[must_use]
    pub fn engine(&self) -> LayoutEngine {
        self.engine
    }

    #[must_use]
    pub fn reason(&self) -> &'static str {
        self.reason
    }
}

/// Shape statistics the heuristic runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceStats {
    pub groupings: usize,
    pub connectors: usize,
    pub nested: bool,
}

impl SourceStats {
    #[must_use]
    pub fn scan(source: &str) -> Self {
        Self {
            groupings: GROUPING.find_iter(source).count(),
            connectors: source.matches(CONNECTOR_TOKEN).count(),
            nested: NESTED_GROUPING.is_match(source),
        }
    }
}

/// Pick a layout engine for `source`.
#[must_use]
pub fn select_engine(source: &str) -> EngineDecision {
    if TABULAR_SHAPE.is_match(source) {
        return EngineDecision::new(LayoutEngine::Elk, REASON_TABULAR);
    }

    let stats = SourceStats::scan(source);

    if (stats.groupings > CONTAINER_GROUPING_THRESHOLD && stats.connectors > 0) || stats.nested {
        return EngineDecision::new(LayoutEngine::Elk, REASON_CONTAINERS);
    }

    if ARCHITECTURE_TERMS.is_match(source)
        && (stats.groupings > ARCHITECTURE_GROUPING_THRESHOLD || stats.connectors > ARCHITECTURE_CONNECTOR_THRESHOLD)
    {
        return EngineDecision::new(LayoutEngine::Elk, REASON_ARCHITECTURE);
    }

    if stats.connectors > COMPLEX_CONNECTOR_THRESHOLD || stats.groupings > COMPLEX_GROUPING_THRESHOLD {
        return EngineDecision::new(LayoutEngine::Elk, REASON_COMPLEX);
    }

    EngineDecision::new(LayoutEngine::default(), REASON_DEFAULT)
}

/// True when the source carries its own `layout-engine:` configuration
/// directive. The `--layout` flag takes precedence over it.
#[must_use]
pub fn has_layout_directive(source: &str) -> bool {
    LAYOUT_DIRECTIVE.is_match(source)
}

#[cfg(test)]
#[path = "engine_test.rs"]
mod tests;
