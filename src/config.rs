//! Configuration management with environment variable support.
//!
//! This module provides centralized configuration for Web Vision, supporting:
//! - Environment variables for all tunable timing and comparison values
//! - Sensible defaults for capturing a locally served gallery
//! - Plain settings structs, cached once per process
//!
//! # Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `WEB_VISION_NETWORK_TIMEOUT` | Base navigation timeout (ms) | `6000` |
//! | `WEB_VISION_NETWORK_TAX` | Extra wait per downloaded payload (ms) | `2000` |
//! | `WEB_VISION_PAGE_SIZE_MIN_TAX` | Payload size incurring no extra wait (MiB) | `1.0` |
//! | `WEB_VISION_PAGE_SIZE_MAX_TAX` | Payload size incurring the full extra wait (MiB) | `5.0` |
//! | `WEB_VISION_RENDER_TIMEOUT` | Base render-completion timeout (ms) | `1200` |
//! | `WEB_VISION_MAX_ATTEMPTS` | Attempts per page before giving up | `3` |
//! | `WEB_VISION_BACKOFF` | Fixed delay between attempts (ms) | `500` |
//! | `WEB_VISION_VIEWPORT` | Square screenshot side length (px) | `1000` |
//! | `WEB_VISION_PIXEL_THRESHOLD` | Per-pixel difference threshold (0..1) | `0.1` |
//! | `WEB_VISION_MAX_FAILED_RATIO` | Failed-pixel ratio that fails a page | `0.05` |
//! | `WEB_VISION_OUTPUT_DIR` | Directory for capture artifacts | `./output` |
//! | `WEB_VISION_REFERENCE_DIR` | Directory for baseline images | `./references` |

use std::env;
use std::sync::OnceLock;

// ============================================================================
// Default Values
// ============================================================================

/// Base navigation timeout in milliseconds
pub const DEFAULT_NETWORK_TIMEOUT_MS: u64 = 6000;

/// Additional wait budget for downloaded resources, in milliseconds
pub const DEFAULT_NETWORK_TAX_MS: u64 = 2000;

/// Payload size in MiB below which no network tax applies
pub const DEFAULT_PAGE_SIZE_MIN_TAX_MB: f64 = 1.0;

/// Payload size span in MiB over which the network tax ramps to its maximum
pub const DEFAULT_PAGE_SIZE_MAX_TAX_MB: f64 = 5.0;

/// Base render-completion timeout in milliseconds
pub const DEFAULT_RENDER_TIMEOUT_MS: u64 = 1200;

/// Attempts per page before recording a permanent failure
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Fixed inter-attempt backoff in milliseconds
pub const DEFAULT_BACKOFF_MS: u64 = 500;

/// Square viewport side length in pixels
pub const DEFAULT_VIEWPORT: u32 = 1000;

/// Frames captured per animated page
pub const DEFAULT_GIF_FRAMES: u32 = 60;

/// Delay between animation frames in milliseconds
pub const DEFAULT_GIF_DELAY_MS: u32 = 50;

/// Per-pixel perceptual difference threshold
pub const DEFAULT_PIXEL_THRESHOLD: f64 = 0.1;

/// Failed-pixel ratio above which a verification fails
pub const DEFAULT_MAX_FAILED_RATIO: f64 = 0.05;

/// Default output directory for capture artifacts
pub const DEFAULT_OUTPUT_DIR: &str = "./output";

/// Default directory for baseline reference images
pub const DEFAULT_REFERENCE_DIR: &str = "./references";

// ============================================================================
// Environment Variable Names
// ============================================================================

/// Environment variable for the base navigation timeout
pub const ENV_NETWORK_TIMEOUT: &str = "WEB_VISION_NETWORK_TIMEOUT";

/// Environment variable for the network tax budget
pub const ENV_NETWORK_TAX: &str = "WEB_VISION_NETWORK_TAX";

/// Environment variable for the minimum-tax payload size
pub const ENV_PAGE_SIZE_MIN_TAX: &str = "WEB_VISION_PAGE_SIZE_MIN_TAX";

/// Environment variable for the maximum-tax payload size
pub const ENV_PAGE_SIZE_MAX_TAX: &str = "WEB_VISION_PAGE_SIZE_MAX_TAX";

/// Environment variable for the base render timeout
pub const ENV_RENDER_TIMEOUT: &str = "WEB_VISION_RENDER_TIMEOUT";

/// Environment variable for the attempt bound
pub const ENV_MAX_ATTEMPTS: &str = "WEB_VISION_MAX_ATTEMPTS";

/// Environment variable for the inter-attempt backoff
pub const ENV_BACKOFF: &str = "WEB_VISION_BACKOFF";

/// Environment variable for the viewport side length
pub const ENV_VIEWPORT: &str = "WEB_VISION_VIEWPORT";

/// Environment variable for the per-pixel threshold
pub const ENV_PIXEL_THRESHOLD: &str = "WEB_VISION_PIXEL_THRESHOLD";

/// Environment variable for the failed-ratio threshold
pub const ENV_MAX_FAILED_RATIO: &str = "WEB_VISION_MAX_FAILED_RATIO";

/// Environment variable for the artifact output directory
pub const ENV_OUTPUT_DIR: &str = "WEB_VISION_OUTPUT_DIR";

/// Environment variable for the reference image directory
pub const ENV_REFERENCE_DIR: &str = "WEB_VISION_REFERENCE_DIR";

// ============================================================================
// Configuration Getters (with caching)
// ============================================================================

static CONFIG: OnceLock<Config> = OnceLock::new();

/// Get the global configuration (initialized from environment on first access)
pub fn get() -> &'static Config {
    CONFIG.get_or_init(Config::from_env)
}

/// Centralized configuration for Web Vision
#[derive(Debug, Clone)]
pub struct Config {
    /// Render-wait and retry timing
    pub timing: TimingSettings,
    /// Screenshot and animation capture settings
    pub capture: CaptureSettings,
    /// Pixel comparison thresholds
    pub diff: DiffSettings,
    /// Artifact and reference locations
    pub store: StoreSettings,
}

/// Timing settings for page load, render wait, and retry
#[derive(Debug, Clone)]
pub struct TimingSettings {
    /// Base navigation timeout (ms); scaled by attempt number
    pub network_timeout_ms: u64,
    /// Extra wait budget proportional to payload size (ms)
    pub network_tax_ms: u64,
    /// Payload size in MiB that incurs no extra wait
    pub page_size_min_tax_mb: f64,
    /// Payload size span in MiB over which the extra wait ramps to full
    pub page_size_max_tax_mb: f64,
    /// Base render-completion timeout (ms); scaled by attempt number
    pub render_timeout_ms: u64,
    /// Attempts per page before recording a permanent failure
    pub max_attempts: u32,
    /// Fixed delay between attempts (ms)
    pub backoff_ms: u64,
}

/// Capture settings for screenshots and animations
#[derive(Debug, Clone)]
pub struct CaptureSettings {
    /// Square viewport side length in pixels
    pub viewport: u32,
    /// Frames per animated capture
    pub gif_frames: u32,
    /// Delay between animation frames (ms)
    pub gif_delay_ms: u32,
    /// Whether the animation loops forever
    pub gif_repeat: bool,
}

/// Pixel comparison settings
#[derive(Debug, Clone)]
pub struct DiffSettings {
    /// Per-pixel perceptual difference threshold (0..1)
    pub pixel_threshold: f64,
    /// Failed-pixel ratio above which verification fails
    pub max_failed_ratio: f64,
}

/// Artifact and reference store settings
#[derive(Debug, Clone)]
pub struct StoreSettings {
    /// Directory for capture artifacts
    pub output_dir: String,
    /// Directory for baseline reference images
    pub reference_dir: String,
}

impl Config {
    /// Create configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        Self {
            timing: TimingSettings::from_env(),
            capture: CaptureSettings::from_env(),
            diff: DiffSettings::from_env(),
            store: StoreSettings::from_env(),
        }
    }

    /// Create configuration with all defaults (ignoring environment)
    pub fn defaults() -> Self {
        Self {
            timing: TimingSettings::defaults(),
            capture: CaptureSettings::defaults(),
            diff: DiffSettings::defaults(),
            store: StoreSettings::defaults(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl TimingSettings {
    /// Create timing settings from environment variables
    pub fn from_env() -> Self {
        Self {
            network_timeout_ms: env_parse(ENV_NETWORK_TIMEOUT, DEFAULT_NETWORK_TIMEOUT_MS),
            network_tax_ms: env_parse(ENV_NETWORK_TAX, DEFAULT_NETWORK_TAX_MS),
            page_size_min_tax_mb: env_parse(ENV_PAGE_SIZE_MIN_TAX, DEFAULT_PAGE_SIZE_MIN_TAX_MB),
            page_size_max_tax_mb: env_parse(ENV_PAGE_SIZE_MAX_TAX, DEFAULT_PAGE_SIZE_MAX_TAX_MB),
            render_timeout_ms: env_parse(ENV_RENDER_TIMEOUT, DEFAULT_RENDER_TIMEOUT_MS),
            max_attempts: env_parse(ENV_MAX_ATTEMPTS, DEFAULT_MAX_ATTEMPTS),
            backoff_ms: env_parse(ENV_BACKOFF, DEFAULT_BACKOFF_MS),
        }
    }

    /// Create timing settings with defaults
    pub fn defaults() -> Self {
        Self {
            network_timeout_ms: DEFAULT_NETWORK_TIMEOUT_MS,
            network_tax_ms: DEFAULT_NETWORK_TAX_MS,
            page_size_min_tax_mb: DEFAULT_PAGE_SIZE_MIN_TAX_MB,
            page_size_max_tax_mb: DEFAULT_PAGE_SIZE_MAX_TAX_MB,
            render_timeout_ms: DEFAULT_RENDER_TIMEOUT_MS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_ms: DEFAULT_BACKOFF_MS,
        }
    }
}

impl CaptureSettings {
    /// Create capture settings from environment variables
    pub fn from_env() -> Self {
        Self {
            viewport: env_parse(ENV_VIEWPORT, DEFAULT_VIEWPORT),
            gif_frames: DEFAULT_GIF_FRAMES,
            gif_delay_ms: DEFAULT_GIF_DELAY_MS,
            gif_repeat: true,
        }
    }

    /// Create capture settings with defaults
    pub fn defaults() -> Self {
        Self {
            viewport: DEFAULT_VIEWPORT,
            gif_frames: DEFAULT_GIF_FRAMES,
            gif_delay_ms: DEFAULT_GIF_DELAY_MS,
            gif_repeat: true,
        }
    }
}

impl DiffSettings {
    /// Create diff settings from environment variables
    pub fn from_env() -> Self {
        Self {
            pixel_threshold: env_parse(ENV_PIXEL_THRESHOLD, DEFAULT_PIXEL_THRESHOLD),
            max_failed_ratio: env_parse(ENV_MAX_FAILED_RATIO, DEFAULT_MAX_FAILED_RATIO),
        }
    }

    /// Create diff settings with defaults
    pub fn defaults() -> Self {
        Self {
            pixel_threshold: DEFAULT_PIXEL_THRESHOLD,
            max_failed_ratio: DEFAULT_MAX_FAILED_RATIO,
        }
    }
}

impl StoreSettings {
    /// Create store settings from environment variables
    pub fn from_env() -> Self {
        Self {
            output_dir: env::var(ENV_OUTPUT_DIR).unwrap_or_else(|_| DEFAULT_OUTPUT_DIR.to_string()),
            reference_dir: env::var(ENV_REFERENCE_DIR)
                .unwrap_or_else(|_| DEFAULT_REFERENCE_DIR.to_string()),
        }
    }

    /// Create store settings with defaults
    pub fn defaults() -> Self {
        Self {
            output_dir: DEFAULT_OUTPUT_DIR.to_string(),
            reference_dir: DEFAULT_REFERENCE_DIR.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::defaults();
        assert_eq!(config.timing.network_timeout_ms, DEFAULT_NETWORK_TIMEOUT_MS);
        assert_eq!(config.timing.max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert_eq!(config.capture.viewport, DEFAULT_VIEWPORT);
        assert_eq!(config.diff.pixel_threshold, DEFAULT_PIXEL_THRESHOLD);
        assert_eq!(config.store.output_dir, DEFAULT_OUTPUT_DIR);
    }

    #[test]
    fn test_env_parse_fallback() {
        assert_eq!(env_parse("WEB_VISION_DOES_NOT_EXIST", 42u64), 42);
    }
}
