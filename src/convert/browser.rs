//! Out-of-process raster capture through a headless browser.
//!
//! DESIGN
//! ======
//! Each conversion acquires a [`RenderSurface`]: a uniquely named temp
//! directory holding the SVG and the screenshot, plus the browser process
//! that loads one and writes the other. The surface is released by `Drop`,
//! which removes the directory and kills a still-running browser. Because the
//! whole capture runs inside one `tokio::time::timeout`, a timeout or a
//! cancelled request drops the surface mid-flight and still releases it.
//!
//! The settle period is handed to the browser as `--virtual-time-budget`, so
//! the wait before capture is bounded by the browser itself as well as by the
//! outer timeout.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use tempfile::TempDir;
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use super::{ConversionError, RasterConverter};

/// Window used when the markup declares no usable size.
pub const DEFAULT_WINDOW: (u32, u32) = (1280, 720);

const SVG_FILE: &str = "diagram.svg";
const PNG_FILE: &str = "diagram.png";

static SVG_ROOT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<svg\b[^>]*>").expect("static regex"));
static VIEW_BOX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\bviewBox\s*=\s*"([^"]*)""#).expect("static regex"));
static WIDTH: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"\swidth\s*=\s*"([0-9.]+)"#).expect("static regex"));
static HEIGHT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"\sheight\s*=\s*"([0-9.]+)"#).expect("static regex"));

// =============================================================================
// CONFIG
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserSettings {
    pub bin: String,
    pub no_sandbox: bool,
    pub settle: Duration,
    pub timeout: Duration,
    pub max_dimension: u32,
}

pub struct BrowserConverter {
    settings: BrowserSettings,
}

impl BrowserConverter {
    #[must_use]
    pub fn new(settings: BrowserSettings) -> Self {
        Self { settings }
    }

    async fn capture(&self, svg: &str) -> Result<Vec<u8>, ConversionError> {
        let (width, height) = svg_dimensions(svg).unwrap_or(DEFAULT_WINDOW);
        let max = self.settings.max_dimension;
        if width == 0 || height == 0 || width > max || height > max {
            return Err(ConversionError::InvalidSize { width, height });
        }

        let mut surface = RenderSurface::acquire()?;
        surface.load(svg).await?;
        surface.screenshot(&self.settings, (width, height)).await
    }
}

#[async_trait::async_trait]
impl RasterConverter for BrowserConverter {
    fn name(&self) -> &'static str {
        "browser"
    }

    async fn rasterize(&self, svg: &str) -> Result<Vec<u8>, ConversionError> {
        tokio::time::timeout(self.settings.timeout, self.capture(svg))
            .await
            .map_err(|_| ConversionError::Timeout(self.settings.timeout))?
    }
}

// =============================================================================
// RENDER SURFACE
// =============================================================================

/// A short-lived, isolated browser context for one capture.
pub struct RenderSurface {
    dir: TempDir,
    browser: Option<Child>,
}

impl RenderSurface {
    /// Create the surface's private scratch directory.
    ///
    /// # Errors
    ///
    /// [`ConversionError::Surface`] if the directory cannot be created.
    pub fn acquire() -> Result<Self, ConversionError> {
        let dir = tempfile::Builder::new()
            .prefix("d2render-surface-")
            .tempdir()
            .map_err(|e| ConversionError::Surface(format!("scratch dir: {e}")))?;
        debug!(dir = %dir.path().display(), "surface: acquired");
        Ok(Self { dir, browser: None })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    fn svg_path(&self) -> PathBuf {
        self.dir.path().join(SVG_FILE)
    }

    fn png_path(&self) -> PathBuf {
        self.dir.path().join(PNG_FILE)
    }

    async fn load(&self, svg: &str) -> Result<(), ConversionError> {
        tokio::fs::write(self.svg_path(), svg)
            .await
            .map_err(|e| ConversionError::Surface(format!("write svg: {e}")))
    }

    async fn screenshot(&mut self, settings: &BrowserSettings, window: (u32, u32)) -> Result<Vec<u8>, ConversionError> {
        let args = browser_args(settings, window, &self.svg_path(), &self.png_path());
        let child = Command::new(&settings.bin)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ConversionError::Surface(format!("failed to spawn {}: {e}", settings.bin)))?;

        let browser = self.browser.insert(child);
        let status = browser
            .wait()
            .await
            .map_err(|e| ConversionError::Surface(format!("browser wait: {e}")))?;
        if !status.success() {
            return Err(ConversionError::Surface(format!("browser exited with {status}")));
        }

        let png = tokio::fs::read(self.png_path())
            .await
            .map_err(|e| ConversionError::Surface(format!("read screenshot: {e}")))?;
        if png.is_empty() {
            return Err(ConversionError::Surface("empty screenshot".into()));
        }
        Ok(png)
    }
}

impl Drop for RenderSurface {
    fn drop(&mut self) {
        if let Some(browser) = self.browser.as_mut() {
            match browser.try_wait() {
                Ok(Some(_)) => {}
                Ok(None) => {
                    if let Err(e) = browser.start_kill() {
                        warn!(error = %e, "surface: failed to kill browser");
                    }
                }
                Err(e) => warn!(error = %e, "surface: failed to poll browser"),
            }
        }
        debug!(dir = %self.dir.path().display(), "surface: released");
    }
}

// =============================================================================
// HELPERS
// =============================================================================

/// Browser command line for one screenshot.
#[must_use]
pub fn browser_args(settings: &BrowserSettings, window: (u32, u32), svg: &Path, png: &Path) -> Vec<String> {
    let mut args = vec![
        "--headless".to_owned(),
        "--disable-gpu".to_owned(),
        "--hide-scrollbars".to_owned(),
        "--default-background-color=ffffffff".to_owned(),
        format!("--window-size={},{}", window.0, window.1),
        format!("--virtual-time-budget={}", settings.settle.as_millis()),
        format!("--screenshot={}", png.display()),
    ];
    if settings.no_sandbox {
        args.push("--no-sandbox".into());
    }
    args.push(format!("file://{}", svg.display()));
    args
}

/// Pixel size declared on the root `<svg>` element, from `viewBox` first and
/// `width`/`height` second.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn svg_dimensions(svg: &str) -> Option<(u32, u32)> {
    let root = SVG_ROOT.find(svg)?.as_str();

    let from_view_box = VIEW_BOX.captures(root).and_then(|caps| {
        let parts: Vec<f64> = caps[1]
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|p| !p.is_empty())
            .filter_map(|p| p.parse().ok())
            .collect();
        match parts.as_slice() {
            [_, _, w, h] if *w > 0.0 && *h > 0.0 => Some((w.ceil() as u32, h.ceil() as u32)),
            _ => None,
        }
    });
    if from_view_box.is_some() {
        return from_view_box;
    }

    let width: f64 = WIDTH.captures(root)?[1].parse().ok()?;
    let height: f64 = HEIGHT.captures(root)?[1].parse().ok()?;
    Some((width.ceil() as u32, height.ceil() as u32))
}

#[cfg(test)]
#[path = "browser_test.rs"]
mod tests;
