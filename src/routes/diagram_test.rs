use std::collections::BTreeMap;

use super::*;
use crate::convert::{HEADER_ENGINE, HEADER_ENGINE_REASON, HEADER_RASTER_FALLBACK, SVG_MIME};
use crate::options::REASON_AUTO_DISABLED;

fn body(json: serde_json::Value) -> GenerateDiagramBody {
    serde_json::from_value(json).unwrap()
}

// =============================================================================
// GenerateDiagramBody::into_request
// =============================================================================

#[test]
fn minimal_body_uses_defaults() {
    let req = body(serde_json::json!({ "d2Code": "a -> b" })).into_request().unwrap();
    assert_eq!(req.source.as_str(), "a -> b");
    assert_eq!(req.explicit_engine, None);
    assert_eq!(req.theme, None);
    assert_eq!(req.sketch, None);
    assert_eq!(req.output_format, OutputFormat::Svg);
    assert!(req.auto_engine);
}

#[test]
fn full_body_is_parsed() {
    let req = body(serde_json::json!({
        "d2Code": "a -> b",
        "layout": "ELK",
        "theme": "200",
        "sketch": true,
        "output_format": "png",
        "autoEngine": false
    }))
    .into_request()
    .unwrap();
    assert_eq!(req.explicit_engine, Some(LayoutEngine::Elk));
    assert_eq!(req.theme, Some(200));
    assert_eq!(req.sketch, Some(true));
    assert_eq!(req.output_format, OutputFormat::Png);
    assert!(!req.auto_engine);
}

#[test]
fn numeric_theme_is_accepted() {
    let req = body(serde_json::json!({ "d2Code": "a", "theme": 3 })).into_request().unwrap();
    assert_eq!(req.theme, Some(3));
}

#[test]
fn blank_optional_fields_are_ignored() {
    let req = body(serde_json::json!({ "d2Code": "a", "layout": "", "theme": " ", "output_format": "" }))
        .into_request()
        .unwrap();
    assert_eq!(req.explicit_engine, None);
    assert_eq!(req.theme, None);
    assert_eq!(req.output_format, OutputFormat::Svg);
}

#[test]
fn missing_source_is_client_error() {
    let err = body(serde_json::json!({ "layout": "elk" })).into_request().unwrap_err();
    assert_eq!(err, PipelineError::ClientInput("Missing d2Code in request body".into()));
}

#[test]
fn empty_source_is_client_error() {
    let err = body(serde_json::json!({ "d2Code": "" })).into_request().unwrap_err();
    assert_eq!(err, PipelineError::missing_field("d2Code"));
}

#[test]
fn unknown_layout_is_client_error() {
    let err = body(serde_json::json!({ "d2Code": "a", "layout": "circo" })).into_request().unwrap_err();
    assert!(matches!(err, PipelineError::ClientInput(msg) if msg.contains("circo")));
}

#[test]
fn non_numeric_theme_is_client_error() {
    let err = body(serde_json::json!({ "d2Code": "a", "theme": "dark" })).into_request().unwrap_err();
    assert_eq!(err, PipelineError::ClientInput("invalid theme: dark".into()));
}

#[test]
fn unknown_output_format_is_client_error() {
    let err = body(serde_json::json!({ "d2Code": "a", "output_format": "gif" })).into_request().unwrap_err();
    assert!(matches!(err, PipelineError::ClientInput(msg) if msg.contains("gif")));
}

// =============================================================================
// RenderFormBody::into_request
// =============================================================================

#[test]
fn form_renders_png_with_auto_engine() {
    let form = RenderFormBody { title: Some("flow".into()), text: Some("a -> b".into()) };
    let req = form.into_request().unwrap();
    assert_eq!(req.output_format, OutputFormat::Png);
    assert!(req.auto_engine);
}

#[test]
fn form_without_text_is_client_error() {
    let err = RenderFormBody::default().into_request().unwrap_err();
    assert_eq!(err.to_string(), "Missing text in request body");
}

// =============================================================================
// RESPONSES
// =============================================================================

#[test]
fn error_status_mapping() {
    assert_eq!(pipeline_error_to_status(&PipelineError::ClientInput(String::new())), StatusCode::BAD_REQUEST);
    assert_eq!(pipeline_error_to_status(&PipelineError::Compile(String::new())), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(pipeline_error_to_status(&PipelineError::Render(String::new())), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(pipeline_error_to_status(&PipelineError::Internal(String::new())), StatusCode::INTERNAL_SERVER_ERROR);
}

#[test]
fn artifact_response_sets_content_and_diagnostic_headers() {
    let mut diagnostic_headers = BTreeMap::new();
    diagnostic_headers.insert(HEADER_ENGINE, "dagre".to_owned());
    diagnostic_headers.insert(HEADER_ENGINE_REASON, REASON_AUTO_DISABLED.to_owned());
    diagnostic_headers.insert(HEADER_RASTER_FALLBACK, "timeout".to_owned());
    let artifact = FinalArtifact { mime_type: SVG_MIME, bytes: b"<svg/>".to_vec(), diagnostic_headers };

    let response = artifact_response(artifact);
    let headers = response.headers();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(headers[CONTENT_TYPE], SVG_MIME);
    assert_eq!(headers[CONTENT_LENGTH], "6");
    assert_eq!(headers["x-d2-engine"], "dagre");
    assert_eq!(headers["x-d2-engine-reason"].as_bytes(), REASON_AUTO_DISABLED.as_bytes());
    assert_eq!(headers["x-d2-raster-fallback"], "timeout");
}
