use std::collections::HashMap;

use super::*;

fn config_from(vars: &[(&str, &str)]) -> Result<ServiceConfig, ConfigError> {
    let vars: HashMap<String, String> = vars.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect();
    ServiceConfig::from_lookup(|key| vars.get(key).cloned())
}

#[test]
fn defaults_apply_when_unset() {
    let cfg = config_from(&[]).unwrap();
    assert_eq!(cfg.port, DEFAULT_PORT);
    assert_eq!(cfg.d2_bin, DEFAULT_D2_BIN);
    assert_eq!(cfg.render_timeout, Duration::from_secs(DEFAULT_RENDER_TIMEOUT_SECS));
    assert_eq!(
        cfg.raster,
        RasterConfig {
            backend: RasterBackend::Codec,
            browser_bin: DEFAULT_BROWSER_BIN.into(),
            browser_no_sandbox: false,
            settle: Duration::from_millis(DEFAULT_RASTER_SETTLE_MS),
            timeout: Duration::from_secs(DEFAULT_RASTER_TIMEOUT_SECS),
            max_dimension: DEFAULT_RASTER_MAX_DIMENSION,
            concurrency: DEFAULT_RASTER_CONCURRENCY,
        }
    );
}

#[test]
fn overrides_are_parsed() {
    let cfg = config_from(&[
        ("PORT", "8080"),
        ("D2_BIN", "/opt/d2/bin/d2"),
        ("D2_RENDER_TIMEOUT_SECS", "5"),
        ("RASTER_BACKEND", "browser"),
        ("BROWSER_BIN", "google-chrome"),
        ("BROWSER_NO_SANDBOX", "yes"),
        ("RASTER_SETTLE_MS", "250"),
        ("RASTER_TIMEOUT_SECS", "3"),
        ("RASTER_MAX_DIMENSION", "2048"),
        ("RASTER_CONCURRENCY", "2"),
    ])
    .unwrap();

    assert_eq!(cfg.port, 8080);
    assert_eq!(cfg.d2_bin, "/opt/d2/bin/d2");
    assert_eq!(cfg.render_timeout, Duration::from_secs(5));
    assert_eq!(cfg.raster.backend, RasterBackend::Browser);
    assert_eq!(cfg.raster.browser_bin, "google-chrome");
    assert!(cfg.raster.browser_no_sandbox);
    assert_eq!(cfg.raster.settle, Duration::from_millis(250));
    assert_eq!(cfg.raster.timeout, Duration::from_secs(3));
    assert_eq!(cfg.raster.max_dimension, 2048);
    assert_eq!(cfg.raster.concurrency, 2);
}

#[test]
fn invalid_port_errors() {
    let err = config_from(&[("PORT", "http")]).unwrap_err().to_string();
    assert!(err.contains("invalid PORT"));
}

#[test]
fn unknown_raster_backend_errors() {
    let err = config_from(&[("RASTER_BACKEND", "gpu")]).unwrap_err().to_string();
    assert!(err.contains("unknown RASTER_BACKEND"));
}

#[test]
fn raster_backend_none_is_accepted() {
    let cfg = config_from(&[("RASTER_BACKEND", "none")]).unwrap();
    assert_eq!(cfg.raster.backend, RasterBackend::None);
}

#[test]
fn malformed_numbers_fall_back_to_defaults() {
    let cfg = config_from(&[("RASTER_TIMEOUT_SECS", "soon"), ("BROWSER_NO_SANDBOX", "maybe")]).unwrap();
    assert_eq!(cfg.raster.timeout, Duration::from_secs(DEFAULT_RASTER_TIMEOUT_SECS));
    assert!(!cfg.raster.browser_no_sandbox);
}

#[test]
fn zero_concurrency_is_raised_to_one() {
    let cfg = config_from(&[("RASTER_CONCURRENCY", "0")]).unwrap();
    assert_eq!(cfg.raster.concurrency, 1);
}
