//! Pixel-level comparison of a capture against its stored reference.
//!
//! A pixel fails when the luma-weighted distance between the two colors
//! (each alpha-blended over a configurable backdrop) exceeds the per-pixel
//! threshold. The page fails when the ratio of failed pixels over the
//! capture's own area reaches the configured maximum. A dimension mismatch
//! short-circuits before any pixel is examined.

use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::capture::KeyColor;
use crate::config::DiffSettings;

/// Luma weights for perceptual channel distance (ITU-R BT.601)
const LUMA_R: f64 = 0.299;
const LUMA_G: f64 = 0.587;
const LUMA_B: f64 = 0.114;

/// Outcome of comparing a capture against a reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    /// Failed-pixel ratio below the configured maximum
    Pass,
    /// Too many pixels differ
    Fail,
    /// Capture and reference dimensions differ; no pixels were scanned
    SizeMismatch,
}

/// Detailed comparison result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffResult {
    /// Number of pixels exceeding the per-pixel threshold
    pub failed_pixels: u64,

    /// Failed pixels over the capture's own width × height
    pub failed_ratio: f64,

    /// Pass, fail, or size mismatch
    pub verdict: Verdict,
}

impl DiffResult {
    fn size_mismatch() -> Self {
        Self {
            failed_pixels: 0,
            failed_ratio: 0.0,
            verdict: Verdict::SizeMismatch,
        }
    }
}

/// Compare a capture against a reference image.
///
/// Returns the result plus, whenever the verdict is not `Pass` and the
/// dimensions agree, a visual diff image: the capture dimmed, with failing
/// pixels highlighted red.
pub fn compare(
    actual: &RgbaImage,
    reference: &RgbaImage,
    settings: &DiffSettings,
    blend_background: KeyColor,
) -> (DiffResult, Option<RgbaImage>) {
    if actual.dimensions() != reference.dimensions() {
        return (DiffResult::size_mismatch(), None);
    }

    let (width, height) = actual.dimensions();
    let mut failed: u64 = 0;
    let mut overlay = RgbaImage::new(width, height);

    for y in 0..height {
        for x in 0..width {
            let a = *actual.get_pixel(x, y);
            let b = *reference.get_pixel(x, y);

            if pixel_distance(a, b, blend_background) > settings.pixel_threshold {
                failed += 1;
                overlay.put_pixel(x, y, Rgba([255, 0, 0, 255]));
            } else {
                // dimmed capture as context
                overlay.put_pixel(x, y, Rgba([a[0] / 4, a[1] / 4, a[2] / 4, 255]));
            }
        }
    }

    let ratio = failed as f64 / (f64::from(width) * f64::from(height));
    let verdict = if ratio < settings.max_failed_ratio {
        Verdict::Pass
    } else {
        Verdict::Fail
    };

    let result = DiffResult {
        failed_pixels: failed,
        failed_ratio: ratio,
        verdict,
    };
    let overlay = (verdict != Verdict::Pass).then_some(overlay);

    (result, overlay)
}

/// Perceptual distance between two RGBA pixels, normalized to [0, 1].
///
/// Each pixel is alpha-blended over the backdrop first so that transparent
/// captures compare against the color a viewer would actually see.
fn pixel_distance(a: Rgba<u8>, b: Rgba<u8>, backdrop: KeyColor) -> f64 {
    let (ar, ag, ab) = blend_over(a, backdrop);
    let (br, bg, bb) = blend_over(b, backdrop);

    let dr = ar - br;
    let dg = ag - bg;
    let db = ab - bb;

    (LUMA_R * dr * dr + LUMA_G * dg * dg + LUMA_B * db * db).sqrt() / 255.0
}

/// Composite a pixel over an opaque backdrop, returning float channels
fn blend_over(pixel: Rgba<u8>, backdrop: KeyColor) -> (f64, f64, f64) {
    let alpha = f64::from(pixel[3]) / 255.0;
    let blend = |fg: u8, bg: u8| f64::from(fg) * alpha + f64::from(bg) * (1.0 - alpha);
    (
        blend(pixel[0], backdrop.r),
        blend(pixel[1], backdrop.g),
        blend(pixel[2], backdrop.b),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn solid(width: u32, height: u32, rgba: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba(rgba))
    }

    fn settings() -> DiffSettings {
        DiffSettings {
            pixel_threshold: 0.1,
            max_failed_ratio: 0.05,
        }
    }

    #[test]
    fn test_self_compare_passes_with_zero_ratio() {
        let img = solid(16, 16, [120, 80, 40, 255]);
        let (result, overlay) = compare(&img, &img, &settings(), KeyColor::WHITE);

        assert_eq!(result.verdict, Verdict::Pass);
        assert_eq!(result.failed_pixels, 0);
        assert_eq!(result.failed_ratio, 0.0);
        assert!(overlay.is_none());
    }

    #[test]
    fn test_size_mismatch_short_circuits() {
        let reference = solid(800, 600, [0, 0, 0, 255]);
        let actual = solid(1000, 1000, [0, 0, 0, 255]);
        let (result, overlay) = compare(&actual, &reference, &settings(), KeyColor::WHITE);

        assert_eq!(result.verdict, Verdict::SizeMismatch);
        assert_eq!(result.failed_pixels, 0);
        assert!(overlay.is_none());
    }

    #[test]
    fn test_opposite_images_fail() {
        let black = solid(16, 16, [0, 0, 0, 255]);
        let white = solid(16, 16, [255, 255, 255, 255]);
        let (result, overlay) = compare(&black, &white, &settings(), KeyColor::WHITE);

        assert_eq!(result.verdict, Verdict::Fail);
        assert_eq!(result.failed_pixels, 16 * 16);
        assert_eq!(result.failed_ratio, 1.0);

        // Every failing pixel is highlighted in the diff artifact
        let overlay = overlay.expect("diff image on failure");
        assert_eq!(overlay.get_pixel(0, 0), &Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn test_ratio_uses_actual_dimensions() {
        // 1 failed pixel out of 10x10 = 0.01
        let reference = solid(10, 10, [0, 0, 0, 255]);
        let mut actual = reference.clone();
        actual.put_pixel(5, 5, Rgba([255, 255, 255, 255]));

        let (result, _) = compare(&actual, &reference, &settings(), KeyColor::WHITE);
        assert_eq!(result.failed_pixels, 1);
        assert!((result.failed_ratio - 0.01).abs() < 1e-12);
        assert_eq!(result.verdict, Verdict::Pass);
    }

    #[test]
    fn test_small_noise_below_threshold_passes() {
        let reference = solid(8, 8, [100, 100, 100, 255]);
        let actual = solid(8, 8, [103, 101, 99, 255]);

        let (result, _) = compare(&actual, &reference, &settings(), KeyColor::WHITE);
        assert_eq!(result.verdict, Verdict::Pass);
        assert_eq!(result.failed_pixels, 0);
    }

    #[test]
    fn test_transparent_pixels_blend_to_backdrop() {
        // Fully transparent black equals opaque white once blended over white
        let transparent = solid(4, 4, [0, 0, 0, 0]);
        let white = solid(4, 4, [255, 255, 255, 255]);

        let (result, _) = compare(&transparent, &white, &settings(), KeyColor::WHITE);
        assert_eq!(result.verdict, Verdict::Pass);
        assert_eq!(result.failed_pixels, 0);
    }
}
