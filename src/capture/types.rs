// Core types shared by the capture pipeline

use serde::{Deserialize, Serialize};

/// How a page renders and what artifact it produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RenderMode {
    /// A single settled frame saved as PNG
    Still,
    /// A continuously animating scene saved as looped GIF
    Animated,
}

impl RenderMode {
    /// File extension of the artifact produced in this mode
    pub fn extension(&self) -> &'static str {
        match self {
            RenderMode::Still => "png",
            RenderMode::Animated => "gif",
        }
    }
}

/// One page under test: a URL path fragment plus its render mode
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageTarget {
    /// Path fragment appended to the gallery base URL (e.g. "cube")
    pub id: String,

    /// Still or animated capture
    pub mode: RenderMode,
}

impl PageTarget {
    /// Create a still-mode target
    pub fn still(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            mode: RenderMode::Still,
        }
    }

    /// Create an animated-mode target
    pub fn animated(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            mode: RenderMode::Animated,
        }
    }
}

/// Options injected into the page before rendering begins
///
/// These land on well-known globals the gallery pages read at startup,
/// alongside the render lifecycle flags on `window.__renderProbe`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageOptions {
    /// Whether the scene should animate
    pub animated: bool,

    /// Background color as a 24-bit hex value (e.g. 0xffffff)
    pub background: Option<u32>,

    /// Whether the scene renders with a transparent background
    pub transparent: bool,
}

impl Default for PageOptions {
    fn default() -> Self {
        Self {
            animated: false,
            background: None,
            transparent: false,
        }
    }
}

/// Result type for capture operations
pub type CaptureResult<T> = Result<T, CaptureError>;

/// Error types for capture operations
#[derive(Debug)]
pub enum CaptureError {
    /// Navigation did not complete within the scaled timeout
    NavigationTimeout(String),

    /// Screenshot capture failed (fatal for the current attempt)
    Capture(String),

    /// Browser driver error (launch, evaluation, tab management)
    Browser(anyhow::Error),

    /// I/O error
    Io(std::io::Error),

    /// Image decode/encode error
    Image(image::ImageError),
}

impl std::fmt::Display for CaptureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureError::NavigationTimeout(page) => {
                write!(f, "Navigation timeout for page '{}'", page)
            }
            CaptureError::Capture(msg) => write!(f, "Capture error: {}", msg),
            CaptureError::Browser(err) => write!(f, "Browser error: {}", err),
            CaptureError::Io(err) => write!(f, "I/O error: {}", err),
            CaptureError::Image(err) => write!(f, "Image error: {}", err),
        }
    }
}

impl std::error::Error for CaptureError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CaptureError::NavigationTimeout(_) | CaptureError::Capture(_) => None,
            CaptureError::Browser(err) => err.source(),
            CaptureError::Io(err) => Some(err),
            CaptureError::Image(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for CaptureError {
    fn from(err: std::io::Error) -> Self {
        CaptureError::Io(err)
    }
}

impl From<image::ImageError> for CaptureError {
    fn from(err: image::ImageError) -> Self {
        CaptureError::Image(err)
    }
}

impl From<anyhow::Error> for CaptureError {
    fn from(err: anyhow::Error) -> Self {
        CaptureError::Browser(err)
    }
}

impl CaptureError {
    /// Whether another attempt may succeed
    ///
    /// Navigation timeouts and capture failures are transient; driver and
    /// I/O errors usually mean the browser itself is gone.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CaptureError::NavigationTimeout(_) | CaptureError::Capture(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_mode_extension() {
        assert_eq!(RenderMode::Still.extension(), "png");
        assert_eq!(RenderMode::Animated.extension(), "gif");
    }

    #[test]
    fn test_page_target_constructors() {
        let still = PageTarget::still("cube");
        assert_eq!(still.id, "cube");
        assert_eq!(still.mode, RenderMode::Still);

        let animated = PageTarget::animated("cube");
        assert_eq!(animated.mode, RenderMode::Animated);
    }

    #[test]
    fn test_error_transience() {
        assert!(CaptureError::NavigationTimeout("cube".to_string()).is_transient());
        assert!(CaptureError::Capture("boom".to_string()).is_transient());
        assert!(!CaptureError::Io(std::io::Error::other("disk")).is_transient());
    }
}
