//! Service configuration parsed from environment variables.

use std::time::Duration;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_D2_BIN: &str = "d2";
pub const DEFAULT_RENDER_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_BROWSER_BIN: &str = "chromium";
pub const DEFAULT_RASTER_SETTLE_MS: u64 = 500;
pub const DEFAULT_RASTER_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_RASTER_MAX_DIMENSION: u32 = 4096;
pub const DEFAULT_RASTER_CONCURRENCY: usize = 4;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid {key}: {value}")]
    InvalidValue { key: &'static str, value: String },

    #[error("unknown RASTER_BACKEND: {0} (expected 'codec', 'browser' or 'none')")]
    UnknownRasterBackend(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RasterBackend {
    Codec,
    Browser,
    None,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterConfig {
    pub backend: RasterBackend,
    pub browser_bin: String,
    pub browser_no_sandbox: bool,
    pub settle: Duration,
    pub timeout: Duration,
    pub max_dimension: u32,
    /// In-process conversions allowed to run at once.
    pub concurrency: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub port: u16,
    pub d2_bin: String,
    pub render_timeout: Duration,
    pub raster: RasterConfig,
}

impl ServiceConfig {
    /// Build typed service config from environment variables.
    ///
    /// All optional:
    /// - `PORT`: default 3000
    /// - `D2_BIN`: path or name of the `d2` binary, default `d2`
    /// - `D2_RENDER_TIMEOUT_SECS`: default 30
    /// - `RASTER_BACKEND`: `codec` (default), `browser` or `none`
    /// - `BROWSER_BIN`: default `chromium`
    /// - `BROWSER_NO_SANDBOX`: default false
    /// - `RASTER_SETTLE_MS`: default 500
    /// - `RASTER_TIMEOUT_SECS`: default 15
    /// - `RASTER_MAX_DIMENSION`: default 4096
    /// - `RASTER_CONCURRENCY`: default 4, minimum 1
    ///
    /// # Errors
    ///
    /// Returns an error for a malformed `PORT` or an unknown `RASTER_BACKEND`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ServiceConfig::from_env`] with a custom variable source.
    ///
    /// # Errors
    ///
    /// See [`ServiceConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = match lookup("PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidValue { key: "PORT", value: raw })?,
            None => DEFAULT_PORT,
        };

        let raster = RasterConfig {
            backend: parse_backend(lookup("RASTER_BACKEND").as_deref())?,
            browser_bin: lookup("BROWSER_BIN").unwrap_or_else(|| DEFAULT_BROWSER_BIN.to_owned()),
            browser_no_sandbox: lookup("BROWSER_NO_SANDBOX")
                .as_deref()
                .and_then(parse_bool)
                .unwrap_or(false),
            settle: Duration::from_millis(parse_or(&lookup, "RASTER_SETTLE_MS", DEFAULT_RASTER_SETTLE_MS)),
            timeout: Duration::from_secs(parse_or(&lookup, "RASTER_TIMEOUT_SECS", DEFAULT_RASTER_TIMEOUT_SECS)),
            max_dimension: parse_or(&lookup, "RASTER_MAX_DIMENSION", DEFAULT_RASTER_MAX_DIMENSION),
            concurrency: parse_or(&lookup, "RASTER_CONCURRENCY", DEFAULT_RASTER_CONCURRENCY).max(1),
        };

        Ok(Self {
            port,
            d2_bin: lookup("D2_BIN").unwrap_or_else(|| DEFAULT_D2_BIN.to_owned()),
            render_timeout: Duration::from_secs(parse_or(&lookup, "D2_RENDER_TIMEOUT_SECS", DEFAULT_RENDER_TIMEOUT_SECS)),
            raster,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr + Copy,
{
    lookup(key)
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_backend(raw: Option<&str>) -> Result<RasterBackend, ConfigError> {
    match raw.map(str::trim).unwrap_or("codec") {
        "codec" => Ok(RasterBackend::Codec),
        "browser" => Ok(RasterBackend::Browser),
        "none" => Ok(RasterBackend::None),
        other => Err(ConfigError::UnknownRasterBackend(other.to_owned())),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
