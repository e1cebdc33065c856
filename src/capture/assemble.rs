//! Frame assembly: still PNGs, looped GIF animations, transparency recovery.
//!
//! Chromium cannot export a WebGL canvas with real alpha, so transparent
//! scenes are rendered over a known background color and recovered here by
//! chroma-keying that exact color back to transparent.

use std::fs::File;
use std::path::Path;

use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, Frame, Rgba, RgbaImage};

use super::types::CaptureResult;
use crate::config::CaptureSettings;

/// Background color keyed to transparent when recovery is enabled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl KeyColor {
    /// Pure white, the renderer's default clear color
    pub const WHITE: KeyColor = KeyColor {
        r: 255,
        g: 255,
        b: 255,
    };

    /// Build from a 24-bit hex value (e.g. 0x202020)
    pub fn from_hex(hex: u32) -> Self {
        Self {
            r: ((hex >> 16) & 0xff) as u8,
            g: ((hex >> 8) & 0xff) as u8,
            b: (hex & 0xff) as u8,
        }
    }
}

/// Set alpha to zero on every pixel whose RGB exactly matches `key`.
///
/// Exact match only: a pixel one intensity step off the key color is left
/// untouched.
pub fn recover_transparency(image: &mut RgbaImage, key: KeyColor) {
    for pixel in image.pixels_mut() {
        let Rgba([r, g, b, _]) = *pixel;
        if r == key.r && g == key.g && b == key.b {
            pixel[3] = 0;
        }
    }
}

/// Persist a still frame as PNG, optionally recovering transparency first
pub fn write_still(
    mut frame: RgbaImage,
    path: &Path,
    key: Option<KeyColor>,
) -> CaptureResult<()> {
    if let Some(key) = key {
        recover_transparency(&mut frame, key);
    }
    frame.save(path)?;
    Ok(())
}

/// Compose captured frames into a looped GIF animation.
///
/// Each frame gets the configured delay; the repeat flag selects infinite
/// looping versus a single play-through.
pub fn write_animation(
    frames: Vec<RgbaImage>,
    path: &Path,
    settings: &CaptureSettings,
    key: Option<KeyColor>,
) -> CaptureResult<()> {
    let file = File::create(path)?;
    let mut encoder = GifEncoder::new(file);
    encoder.set_repeat(if settings.gif_repeat {
        Repeat::Infinite
    } else {
        Repeat::Finite(0)
    })?;

    let delay = Delay::from_numer_denom_ms(settings.gif_delay_ms, 1);
    for mut frame in frames {
        if let Some(key) = key {
            recover_transparency(&mut frame, key);
        }
        encoder.encode_frame(Frame::from_parts(frame, 0, 0, delay))?;
    }

    Ok(())
}
