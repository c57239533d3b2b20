//! In-process SVG → PNG codec built on `resvg`.
//!
//! DESIGN
//! ======
//! Rasterization runs on the blocking pool and cannot be interrupted, so the
//! timeout only bounds how long the request waits for it. A semaphore caps
//! how many conversions may occupy the pool at once; the permit moves into
//! the blocking task and is released when the work really ends, even if the
//! request already gave up on it.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use image::ImageEncoder;
use image::codecs::png::PngEncoder;
use resvg::tiny_skia;
use resvg::usvg;
use tokio::sync::Semaphore;
use tracing::debug;

use super::{ConversionError, RasterConverter};

/// System fonts, loaded once and shared by every conversion.
static FONTDB: LazyLock<Arc<usvg::fontdb::Database>> = LazyLock::new(|| {
    let mut db = usvg::fontdb::Database::new();
    db.load_system_fonts();
    debug!(faces = db.len(), "codec: loaded system fonts");
    Arc::new(db)
});

pub struct CodecConverter {
    timeout: Duration,
    max_dimension: u32,
    permits: Arc<Semaphore>,
}

impl CodecConverter {
    /// `concurrency` is clamped to at least one slot.
    #[must_use]
    pub fn new(timeout: Duration, max_dimension: u32, concurrency: usize) -> Self {
        Self { timeout, max_dimension, permits: Arc::new(Semaphore::new(concurrency.max(1))) }
    }

    async fn run(&self, svg: String) -> Result<Vec<u8>, ConversionError> {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|e| ConversionError::Encode(format!("codec closed: {e}")))?;
        let max_dimension = self.max_dimension;
        let task = tokio::task::spawn_blocking(move || {
            let result = svg_to_png(&svg, max_dimension);
            drop(permit);
            result
        });
        task.await
            .map_err(|join| ConversionError::Encode(format!("codec task failed: {join}")))?
    }
}

#[async_trait::async_trait]
impl RasterConverter for CodecConverter {
    fn name(&self) -> &'static str {
        "codec"
    }

    async fn rasterize(&self, svg: &str) -> Result<Vec<u8>, ConversionError> {
        // Waiting for a slot counts against the timeout.
        tokio::time::timeout(self.timeout, self.run(svg.to_owned()))
            .await
            .map_err(|_| ConversionError::Timeout(self.timeout))?
    }
}

/// Rasterize `svg` on a white background and encode it as PNG.
///
/// # Errors
///
/// [`ConversionError::Malformed`] when the markup does not parse,
/// [`ConversionError::InvalidSize`] when either side is zero or exceeds
/// `max_dimension`, [`ConversionError::Encode`] when encoding fails.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn svg_to_png(svg: &str, max_dimension: u32) -> Result<Vec<u8>, ConversionError> {
    let opts = usvg::Options { fontdb: FONTDB.clone(), ..Default::default() };
    let tree = usvg::Tree::from_str(svg, &opts).map_err(|e| ConversionError::Malformed(e.to_string()))?;

    let size = tree.size();
    let width = size.width().ceil() as u32;
    let height = size.height().ceil() as u32;
    if width == 0 || height == 0 || width > max_dimension || height > max_dimension {
        return Err(ConversionError::InvalidSize { width, height });
    }

    let mut pixmap =
        tiny_skia::Pixmap::new(width, height).ok_or(ConversionError::InvalidSize { width, height })?;
    pixmap.fill(tiny_skia::Color::WHITE);
    resvg::render(&tree, tiny_skia::Transform::default(), &mut pixmap.as_mut());

    let mut png = Vec::new();
    PngEncoder::new(&mut png)
        .write_image(pixmap.data(), width, height, image::ExtendedColorType::Rgba8)
        .map_err(|e| ConversionError::Encode(e.to_string()))?;
    Ok(png)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G'];
    const SQUARE: &str =
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="20" height="10"><rect width="20" height="10" fill="red"/></svg>"#;

    #[test]
    fn renders_simple_svg_to_png() {
        let png = svg_to_png(SQUARE, 4096).unwrap();
        assert!(png.starts_with(PNG_MAGIC));
    }

    #[test]
    fn malformed_markup_is_rejected() {
        let err = svg_to_png("<svg><g>", 4096).unwrap_err();
        assert!(matches!(err, ConversionError::Malformed(_)));
    }

    #[test]
    fn oversized_drawing_is_rejected() {
        let err = svg_to_png(SQUARE, 16).unwrap_err();
        assert_eq!(err, ConversionError::InvalidSize { width: 20, height: 10 });
    }

    #[tokio::test]
    async fn converter_runs_codec_off_the_runtime() {
        let converter = CodecConverter::new(Duration::from_secs(10), 4096, 2);
        let png = converter.rasterize(SQUARE).await.unwrap();
        assert!(png.starts_with(PNG_MAGIC));
        assert_eq!(converter.name(), "codec");
    }

    #[tokio::test]
    async fn converter_reports_malformed_markup() {
        let converter = CodecConverter::new(Duration::from_secs(10), 4096, 2);
        let err = converter.rasterize("not svg at all").await.unwrap_err();
        assert!(matches!(err, ConversionError::Malformed(_)));
    }

    #[tokio::test]
    async fn saturated_codec_times_out_instead_of_queueing_forever() {
        let converter = CodecConverter::new(Duration::from_millis(100), 4096, 1);
        let held = Arc::clone(&converter.permits).acquire_owned().await.unwrap();

        let err = converter.rasterize(SQUARE).await.unwrap_err();
        assert_eq!(err, ConversionError::Timeout(Duration::from_millis(100)));

        drop(held);
        let png = converter.rasterize(SQUARE).await.unwrap();
        assert!(png.starts_with(PNG_MAGIC));
    }

    #[tokio::test]
    async fn permit_is_returned_after_each_conversion() {
        let converter = CodecConverter::new(Duration::from_secs(10), 4096, 1);
        converter.rasterize(SQUARE).await.unwrap();
        converter.rasterize("<svg><g>").await.unwrap_err();
        assert_eq!(converter.permits.available_permits(), 1);
    }

    #[test]
    fn zero_concurrency_still_allows_one_conversion() {
        let converter = CodecConverter::new(Duration::from_secs(1), 4096, 0);
        assert_eq!(converter.permits.available_permits(), 1);
    }
}
