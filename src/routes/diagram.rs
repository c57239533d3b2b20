//! Diagram rendering routes.

use axum::body::Body;
use axum::extract::State;
use axum::extract::rejection::{FormRejection, JsonRejection};
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::Form;
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::convert::FinalArtifact;
use crate::engine::LayoutEngine;
use crate::error::{ErrorCode, PipelineError};
use crate::options::{DiagramSource, OutputFormat, RenderRequest};
use crate::state::AppState;

const GENERIC_ERROR: &str = "Internal server error";

// =============================================================================
// REQUEST BODIES
// =============================================================================

/// JSON body of `POST /generate-diagram`.
#[derive(Debug, Default, Deserialize)]
pub struct GenerateDiagramBody {
    #[serde(rename = "d2Code")]
    pub d2_code: Option<String>,
    pub layout: Option<String>,
    pub theme: Option<ThemeField>,
    pub sketch: Option<bool>,
    pub output_format: Option<String>,
    #[serde(rename = "autoEngine")]
    pub auto_engine: Option<bool>,
}

/// Theme ids arrive as numeric strings from forms and as numbers from scripts.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ThemeField {
    Number(i64),
    Text(String),
}

/// Form body of `POST /render`.
#[derive(Debug, Default, Deserialize)]
pub struct RenderFormBody {
    pub title: Option<String>,
    pub text: Option<String>,
}

/// Treat missing, empty and whitespace-only optional fields alike.
fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

impl GenerateDiagramBody {
    /// Validate the body into a [`RenderRequest`].
    ///
    /// # Errors
    ///
    /// [`PipelineError::ClientInput`] for a missing `d2Code` or an unknown
    /// `layout`, `theme` or `output_format` value.
    pub fn into_request(self) -> Result<RenderRequest, PipelineError> {
        let source = self
            .d2_code
            .and_then(DiagramSource::new)
            .ok_or_else(|| PipelineError::missing_field("d2Code"))?;

        let explicit_engine = non_blank(self.layout.as_deref())
            .map(str::parse::<LayoutEngine>)
            .transpose()
            .map_err(|e| PipelineError::ClientInput(e.to_string()))?;

        let theme = match self.theme {
            None => None,
            Some(ThemeField::Number(n)) => Some(n),
            Some(ThemeField::Text(raw)) => non_blank(Some(raw.as_str()))
                .map(|t| {
                    t.parse::<i64>()
                        .map_err(|_| PipelineError::ClientInput(format!("invalid theme: {raw}")))
                })
                .transpose()?,
        };

        let output_format = non_blank(self.output_format.as_deref())
            .map(str::parse::<OutputFormat>)
            .transpose()
            .map_err(|e| PipelineError::ClientInput(e.to_string()))?
            .unwrap_or_default();

        Ok(RenderRequest {
            source,
            explicit_engine,
            theme,
            sketch: self.sketch,
            output_format,
            auto_engine: self.auto_engine.unwrap_or(true),
        })
    }
}

impl RenderFormBody {
    /// Validate the form into a PNG [`RenderRequest`] with auto engine selection.
    ///
    /// # Errors
    ///
    /// [`PipelineError::ClientInput`] when `text` is missing or empty.
    pub fn into_request(self) -> Result<RenderRequest, PipelineError> {
        let source = self
            .text
            .and_then(DiagramSource::new)
            .ok_or_else(|| PipelineError::missing_field("text"))?;
        let mut request = RenderRequest::new(source);
        request.output_format = OutputFormat::Png;
        Ok(request)
    }
}

// =============================================================================
// HANDLERS
// =============================================================================

/// `POST /generate-diagram` — render a JSON request to SVG or PNG.
pub async fn generate_diagram(
    State(state): State<AppState>,
    body: Result<Json<GenerateDiagramBody>, JsonRejection>,
) -> Response {
    let request = match body {
        Ok(Json(body)) => body.into_request(),
        // Without a JSON content type there is no body to read the source from.
        Err(JsonRejection::MissingJsonContentType(_)) => Err(PipelineError::missing_field("d2Code")),
        Err(rejection) => Err(PipelineError::ClientInput(format!("Invalid JSON body: {}", rejection.body_text()))),
    };
    respond(&state, request).await
}

/// `POST /render` — render a form-encoded `text` field to PNG.
pub async fn render_form(State(state): State<AppState>, body: Result<Form<RenderFormBody>, FormRejection>) -> Response {
    let request = match body {
        Ok(Form(body)) => {
            if let Some(title) = non_blank(body.title.as_deref()) {
                info!(title, "render: form request");
            }
            body.into_request()
        }
        Err(rejection) => Err(PipelineError::ClientInput(format!("Invalid form body: {}", rejection.body_text()))),
    };
    respond(&state, request).await
}

async fn respond(state: &AppState, request: Result<RenderRequest, PipelineError>) -> Response {
    let result = match request {
        Ok(request) => state.pipeline.generate(&request).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(artifact) => artifact_response(artifact),
        Err(e) => pipeline_error_response(&e),
    }
}

// =============================================================================
// RESPONSES
// =============================================================================

pub(crate) fn pipeline_error_to_status(err: &PipelineError) -> StatusCode {
    match err {
        PipelineError::ClientInput(_) => StatusCode::BAD_REQUEST,
        PipelineError::Compile(_) | PipelineError::Render(_) | PipelineError::Internal(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

pub(crate) fn pipeline_error_response(err: &PipelineError) -> Response {
    let status = pipeline_error_to_status(err);
    let body = match err {
        PipelineError::ClientInput(msg) => {
            warn!(code = err.error_code(), error = %msg, "diagram: rejected request");
            serde_json::json!({ "error": msg })
        }
        _ => {
            error!(code = err.error_code(), error = %err, "diagram: generation failed");
            match err.client_message() {
                Some(message) => serde_json::json!({ "error": GENERIC_ERROR, "message": message }),
                None => serde_json::json!({ "error": GENERIC_ERROR }),
            }
        }
    };
    (status, Json(body)).into_response()
}

pub(crate) fn artifact_response(artifact: FinalArtifact) -> Response {
    debug!(
        mime = artifact.mime_type,
        bytes = artifact.bytes.len(),
        degraded = artifact.is_degraded(),
        "diagram: responding"
    );
    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, artifact.mime_type)
        .header(CONTENT_LENGTH, artifact.bytes.len());

    for (name, value) in &artifact.diagnostic_headers {
        // Reasons may carry non-ASCII punctuation; `from_bytes` accepts it as opaque header bytes.
        match HeaderValue::from_bytes(value.as_bytes()) {
            Ok(value) => builder = builder.header(HeaderName::from_static(*name), value),
            Err(e) => warn!(header = *name, error = %e, "diagram: dropping invalid diagnostic header"),
        }
    }

    builder.body(Body::from(artifact.bytes)).unwrap_or_else(|e| {
        pipeline_error_response(&PipelineError::Internal(format!("response build failed: {e}")))
    })
}

#[cfg(test)]
#[path = "diagram_test.rs"]
mod tests;
