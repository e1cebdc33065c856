//! Headless Chromium session: page load, render wait, and screenshot capture.
//!
//! Wraps the `headless_chrome` driver with the adaptive timing protocol:
//! navigation timeouts scale with the attempt number, and the pre-render
//! delay scales with the byte count observed on the wire during the load.
//!
//! The render lifecycle is a message-passing contract with the page. Before
//! rendering the host injects capture options onto well-known globals and
//! sets `window.__renderProbe.started`; the page sets
//! `window.__renderProbe.finished` once its first frame is complete.

use std::ffi::OsStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use headless_chrome::protocol::cdp::types::Event;
use headless_chrome::protocol::cdp::Page::{CaptureScreenshotFormatOption, Viewport};
use headless_chrome::{Browser, LaunchOptionsBuilder, Tab};
use image::RgbaImage;

use super::timing;
use super::types::{CaptureError, CaptureResult, PageOptions};
use crate::config::{CaptureSettings, TimingSettings};

/// A live browser with one tab, reused across every page in a run
pub struct BrowserSession {
    /// Keeps the browser process alive
    _browser: Browser,
    tab: Arc<Tab>,
    /// Bytes transferred during the current page load; reset at each navigation
    page_bytes: Arc<AtomicU64>,
    base_url: String,
    viewport: u32,
    timing: TimingSettings,
}

impl BrowserSession {
    /// Launch Chromium and prepare a tab for capturing gallery pages.
    ///
    /// `base_url` is the root of the served gallery; page ids are appended
    /// as path fragments. Software WebGL is forced so captures are stable
    /// on machines without a GPU.
    pub fn launch(
        base_url: impl Into<String>,
        timing: TimingSettings,
        capture: &CaptureSettings,
        headless: bool,
    ) -> CaptureResult<Self> {
        let viewport = capture.viewport;

        let launch_opts = LaunchOptionsBuilder::default()
            .headless(headless)
            .window_size(Some((viewport, viewport)))
            .sandbox(false)
            .idle_browser_timeout(Duration::from_secs(300))
            .args(vec![
                OsStr::new("--use-gl=angle"),
                OsStr::new("--use-angle=swiftshader"),
                OsStr::new("--enable-surface-synchronization"),
                OsStr::new("--hide-scrollbars"),
            ])
            .build()
            .map_err(anyhow::Error::msg)?;

        let browser = Browser::new(launch_opts)?;
        let tab = browser.new_tab()?;

        let page_bytes = Arc::new(AtomicU64::new(0));
        register_byte_counter(&tab, Arc::clone(&page_bytes))?;
        forward_page_console(&tab)?;

        Ok(Self {
            _browser: browser,
            tab,
            page_bytes,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            viewport,
            timing,
        })
    }

    /// Navigate to a page with an attempt-scaled timeout.
    ///
    /// Resets the transferred-byte counter first and returns the bytes
    /// observed during the load. Never retries on its own; a timeout is
    /// reported once and the orchestrator decides what to do next.
    pub fn load_page(&self, page_id: &str, attempt: u32) -> CaptureResult<u64> {
        let url = format!("{}/{}", self.base_url, page_id);
        let timeout = timing::scaled_timeout(self.timing.network_timeout_ms, attempt);

        self.page_bytes.store(0, Ordering::Relaxed);
        self.tab.set_default_timeout(timeout);

        self.tab.navigate_to(&url)?;
        self.tab
            .wait_until_navigated()
            .map_err(|_| CaptureError::NavigationTimeout(page_id.to_string()))?;

        Ok(self.page_bytes.load(Ordering::Relaxed))
    }

    /// Wait for the page to finish rendering, best effort.
    ///
    /// First sleeps proportionally to the downloaded payload (the network
    /// tax), then injects options, signals render start, and polls the
    /// finished flag until it is set or the scaled render timeout elapses.
    /// A render timeout logs a warning but still returns `Ok`: the capture
    /// proceeds with whatever is on screen.
    pub fn wait_for_render(
        &self,
        attempt: u32,
        transferred_bytes: u64,
        options: &PageOptions,
    ) -> CaptureResult<()> {
        let weight = timing::resource_size(
            transferred_bytes,
            self.timing.page_size_min_tax_mb,
            self.timing.page_size_max_tax_mb,
        );
        let tax = timing::network_tax_delay(self.timing.network_tax_ms, weight, attempt);
        if !tax.is_zero() {
            log::debug!(
                "network tax {}ms (payload weight {:.2}, attempt {})",
                tax.as_millis(),
                weight,
                attempt
            );
            std::thread::sleep(tax);
        }

        self.tab.evaluate(&start_render_script(options), false)?;

        let deadline = timing::scaled_timeout(self.timing.render_timeout_ms, attempt);
        let start = Instant::now();
        loop {
            if render_finished(&self.tab)? {
                return Ok(());
            }
            if start.elapsed() > deadline {
                log::warn!(
                    "render timeout exceeded after {}ms, capturing anyway",
                    deadline.as_millis()
                );
                return Ok(());
            }
        }
    }

    /// Capture one screenshot of the square viewport as RGBA
    pub fn screenshot(&self) -> CaptureResult<RgbaImage> {
        let clip = Viewport {
            x: 0.0,
            y: 0.0,
            width: f64::from(self.viewport),
            height: f64::from(self.viewport),
            scale: 1.0,
        };

        let png = self
            .tab
            .capture_screenshot(CaptureScreenshotFormatOption::Png, None, Some(clip), true)
            .map_err(|e| CaptureError::Capture(format!("screenshot failed: {}", e)))?;

        let img = image::load_from_memory(&png)?;
        Ok(img.to_rgba8())
    }

    /// Capture `count` successive frames of an animating scene.
    ///
    /// The render wait runs once per page load; frames are back-to-back
    /// screenshots of the live scene, not re-rendered states.
    pub fn screenshot_frames(&self, count: u32) -> CaptureResult<Vec<RgbaImage>> {
        let mut frames = Vec::with_capacity(count as usize);
        for _ in 0..count {
            frames.push(self.screenshot()?);
        }
        Ok(frames)
    }

    /// Viewport side length in pixels
    pub fn viewport(&self) -> u32 {
        self.viewport
    }
}

/// Accumulate response body sizes into the shared per-load counter.
///
/// Bodies that cannot be fetched (cache hits, aborted loads) are tolerated
/// and logged, matching the loader contract.
fn register_byte_counter(tab: &Arc<Tab>, counter: Arc<AtomicU64>) -> CaptureResult<()> {
    tab.register_response_handling(
        "page-size",
        Box::new(move |params, fetch_body| match fetch_body() {
            Ok(body) => {
                let len = if body.base_64_encoded {
                    // decoded size, not the base64 text length
                    body.body.len() as u64 * 3 / 4
                } else {
                    body.body.len() as u64
                };
                counter.fetch_add(len, Ordering::Relaxed);
            }
            Err(e) => {
                log::debug!(
                    "could not read response body for {}: {}",
                    params.response.url,
                    e
                );
            }
        }),
    )?;
    Ok(())
}

/// Surface in-page console output through the host logger.
///
/// Gallery pages prefix soft diagnostics with "Warning."; those become
/// warnings here, everything else is debug noise.
fn forward_page_console(tab: &Arc<Tab>) -> CaptureResult<()> {
    tab.enable_log()?;
    tab.add_event_listener(Arc::new(move |event: &Event| {
        if let Event::LogEntryAdded(entry) = event {
            let text = &entry.params.entry.text;
            if let Some(rest) = text.strip_prefix("Warning.") {
                log::warn!("page: {}", rest.trim());
            } else {
                log::debug!("page: {}", text);
            }
        }
    }))?;
    Ok(())
}

/// Script injecting capture options and flipping the render-started flag
fn start_render_script(options: &PageOptions) -> String {
    let background = options
        .background
        .map(|hex| format!("window.background = {};", hex))
        .unwrap_or_default();

    format!(
        "(() => {{ \
            window.animated = {animated}; \
            window.transparent = {transparent}; \
            {background} \
            window.__renderProbe = window.__renderProbe || {{ finished: false }}; \
            window.__renderProbe.started = true; \
        }})()",
        animated = options.animated,
        transparent = options.transparent,
        background = background,
    )
}

/// One poll of the render-finished flag
fn render_finished(tab: &Arc<Tab>) -> CaptureResult<bool> {
    let result = tab.evaluate(
        "(window.__renderProbe && window.__renderProbe.finished) === true",
        false,
    )?;
    Ok(matches!(
        result.value,
        Some(serde_json::Value::Bool(true))
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_render_script_sets_flags() {
        let script = start_render_script(&PageOptions {
            animated: true,
            background: Some(0xffffff),
            transparent: true,
        });
        assert!(script.contains("window.animated = true"));
        assert!(script.contains("window.transparent = true"));
        assert!(script.contains("window.background = 16777215;"));
        assert!(script.contains("__renderProbe.started = true"));
    }

    #[test]
    fn test_start_render_script_omits_unset_background() {
        let script = start_render_script(&PageOptions::default());
        assert!(!script.contains("window.background"));
        assert!(script.contains("window.animated = false"));
    }
}
