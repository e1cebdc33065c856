//! Per-page orchestration: bounded retries, mode dispatch, failure log.
//!
//! Each page walks load → render-wait → capture → (assemble | compare)
//! through an explicit attempt loop. Transient failures (navigation
//! timeout, capture failure, verification mismatch) are retried with
//! escalating timeouts and a fixed backoff between attempts; structural
//! results (size mismatch, missing baseline) end the page immediately.
//! A page that never succeeds lands in the failure log exactly once and
//! processing moves on; one bad page never aborts the batch.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use image::RgbaImage;

use crate::capture::{
    write_animation, write_still, BrowserSession, CaptureError, KeyColor, PageOptions, PageTarget,
    RenderMode,
};
use crate::config::{Config, DiffSettings};
use crate::diff::{self, Verdict};
use crate::store::{write_png, ArtifactStore};

/// What the run does with each captured frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunMode {
    /// Write capture artifacts (PNG or GIF) only
    Capture,
    /// Write each page's capture as its new baseline
    Record,
    /// Compare each page's capture against its stored baseline
    Verify,
}

/// Terminal outcome for one page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    /// Verification passed
    Pass,
    /// Artifact written (capture mode)
    Captured,
    /// Baseline written (record mode)
    Recorded,
    /// Failed verification or exhausted retries
    Fail,
    /// Capture and baseline dimensions differ; not retried
    SizeMismatch,
}

impl Outcome {
    /// Whether this outcome counts as a success for the exit code
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Pass | Outcome::Captured | Outcome::Recorded)
    }
}

/// One attempt's conclusion inside the retry loop
#[derive(Debug)]
pub enum AttemptOutcome {
    /// Terminal for this page; no further attempts
    Done(Outcome, Option<String>),
    /// Transient failure; try again if attempts remain
    Retry(String),
}

/// Result of processing one page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageReport {
    /// Page identifier
    pub id: String,

    /// Terminal outcome
    pub outcome: Outcome,

    /// Human-readable detail (failure reason, diff ratio, artifact path)
    pub detail: Option<String>,

    /// Attempts consumed (1-based)
    pub attempts: u32,
}

/// Append-only set of page ids that failed permanently
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FailureLog {
    pages: Vec<String>,
}

impl FailureLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failed page; duplicates are ignored
    pub fn record(&mut self, page_id: &str) {
        if !self.pages.iter().any(|p| p == page_id) {
            self.pages.push(page_id.to_string());
        }
    }

    /// Number of failed pages; doubles as the process exit code
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    /// Whether every page succeeded
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Failed page ids in recording order
    pub fn pages(&self) -> &[String] {
        &self.pages
    }
}

/// Summary of a whole run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Mode the run executed in
    pub mode: RunMode,

    /// When the run finished
    pub completed_at: chrono::DateTime<chrono::Utc>,

    /// Per-page results in processing order
    pub pages: Vec<PageReport>,

    /// Pages that failed permanently
    pub failures: FailureLog,
}

impl RunReport {
    /// Process exit code: 0 on full success, else the failed-page count
    pub fn exit_code(&self) -> i32 {
        self.failures.len().min(i32::MAX as usize) as i32
    }
}

/// Drive one page through bounded, sequential attempts.
///
/// `attempt_fn` receives the 0-based attempt index (which scales every
/// timeout downstream) and reports whether the page is done or should be
/// retried. Exhausting all attempts yields `Outcome::Fail` carrying the
/// last transient reason.
pub fn run_with_retries<F>(
    page_id: &str,
    max_attempts: u32,
    backoff: Duration,
    mut attempt_fn: F,
) -> PageReport
where
    F: FnMut(u32) -> AttemptOutcome,
{
    let mut last_reason = String::new();

    for attempt in 0..max_attempts {
        if attempt > 0 {
            std::thread::sleep(backoff);
        }

        match attempt_fn(attempt) {
            AttemptOutcome::Done(outcome, detail) => {
                return PageReport {
                    id: page_id.to_string(),
                    outcome,
                    detail,
                    attempts: attempt + 1,
                };
            }
            AttemptOutcome::Retry(reason) => {
                log::warn!(
                    "{}: attempt {}/{} failed: {}",
                    page_id,
                    attempt + 1,
                    max_attempts,
                    reason
                );
                last_reason = reason;
            }
        }
    }

    PageReport {
        id: page_id.to_string(),
        outcome: Outcome::Fail,
        detail: Some(format!(
            "exhausted {} attempts, last failure: {}",
            max_attempts, last_reason
        )),
        attempts: max_attempts,
    }
}

/// Map a capture error to retry or terminal failure.
///
/// Transient errors (navigation timeout, capture failure) may clear on the
/// next attempt; driver, I/O, and image errors mean the browser or the disk
/// is gone and another attempt cannot help.
fn attempt_error(err: CaptureError) -> AttemptOutcome {
    if err.is_transient() {
        AttemptOutcome::Retry(err.to_string())
    } else {
        AttemptOutcome::Done(Outcome::Fail, Some(err.to_string()))
    }
}

/// Settings shared by every page in a run
#[derive(Debug, Clone)]
pub struct RunnerSettings {
    /// What to do with captures
    pub mode: RunMode,
    /// Background color injected into pages, as 24-bit hex
    pub background: Option<u32>,
    /// Whether pages render transparently (enables chroma-key recovery)
    pub transparent: bool,
}

/// Drives the capture pipeline for a sequence of pages
pub struct Runner<'a> {
    session: &'a BrowserSession,
    store: &'a ArtifactStore,
    config: &'a Config,
    settings: RunnerSettings,
}

impl<'a> Runner<'a> {
    /// Create a runner over a live browser session and artifact store
    pub fn new(
        session: &'a BrowserSession,
        store: &'a ArtifactStore,
        config: &'a Config,
        settings: RunnerSettings,
    ) -> Self {
        Self {
            session,
            store,
            config,
            settings,
        }
    }

    /// Process every target in order, returning the run summary.
    ///
    /// Pages are strictly sequential within one worker; parallelism comes
    /// from sharding the page list across independent processes.
    pub fn run(&self, targets: &[PageTarget]) -> RunReport {
        let mut failures = FailureLog::new();
        let mut pages = Vec::with_capacity(targets.len());

        for (index, target) in targets.iter().enumerate() {
            println!("[{}/{}] {}", index + 1, targets.len(), target.id);

            let report = self.run_page(target);
            match &report.detail {
                Some(detail) => println!("  {:?}: {}", report.outcome, detail),
                None => println!("  {:?}", report.outcome),
            }

            if !report.outcome.is_success() {
                failures.record(&target.id);
            }
            pages.push(report);
        }

        RunReport {
            mode: self.settings.mode,
            completed_at: chrono::Utc::now(),
            pages,
            failures,
        }
    }

    /// Run one page through the bounded retry loop
    pub fn run_page(&self, target: &PageTarget) -> PageReport {
        let timing = &self.config.timing;
        run_with_retries(
            &target.id,
            timing.max_attempts,
            Duration::from_millis(timing.backoff_ms),
            |attempt| self.attempt(target, attempt),
        )
    }

    /// One attempt: load, wait, capture, then assemble or compare
    fn attempt(&self, target: &PageTarget, attempt: u32) -> AttemptOutcome {
        let bytes = match self.session.load_page(&target.id, attempt) {
            Ok(bytes) => bytes,
            Err(e) => return attempt_error(e),
        };

        let options = PageOptions {
            animated: target.mode == RenderMode::Animated,
            background: self.settings.background,
            transparent: self.settings.transparent,
        };
        if let Err(e) = self.session.wait_for_render(attempt, bytes, &options) {
            return attempt_error(e);
        }

        match self.settings.mode {
            RunMode::Capture => self.capture_attempt(target),
            RunMode::Record => self.record_attempt(target),
            RunMode::Verify => self.verify_attempt(target),
        }
    }

    /// Chroma key for transparency recovery, when enabled
    fn key_color(&self) -> Option<KeyColor> {
        self.settings.transparent.then(|| {
            self.settings
                .background
                .map(KeyColor::from_hex)
                .unwrap_or(KeyColor::WHITE)
        })
    }

    fn capture_attempt(&self, target: &PageTarget) -> AttemptOutcome {
        let path = self.store.capture_path(&target.id, target.mode);
        let result = match target.mode {
            RenderMode::Still => self
                .session
                .screenshot()
                .and_then(|frame| write_still(frame, &path, self.key_color())),
            RenderMode::Animated => self
                .session
                .screenshot_frames(self.config.capture.gif_frames)
                .and_then(|frames| {
                    write_animation(frames, &path, &self.config.capture, self.key_color())
                }),
        };

        match result {
            Ok(()) => AttemptOutcome::Done(Outcome::Captured, Some(path.display().to_string())),
            Err(e) => attempt_error(e),
        }
    }

    fn record_attempt(&self, target: &PageTarget) -> AttemptOutcome {
        let frame = match self.session.screenshot() {
            Ok(frame) => frame,
            Err(e) => return attempt_error(e),
        };

        match self.store.write_reference(&target.id, &frame) {
            Ok(path) => AttemptOutcome::Done(Outcome::Recorded, Some(path.display().to_string())),
            Err(e) => attempt_error(e),
        }
    }

    fn verify_attempt(&self, target: &PageTarget) -> AttemptOutcome {
        let frame = match self.session.screenshot() {
            Ok(frame) => frame,
            Err(e) => return attempt_error(e),
        };

        let backdrop = self
            .settings
            .background
            .map(KeyColor::from_hex)
            .unwrap_or(KeyColor::WHITE);
        verify_frame(self.store, &target.id, &frame, &self.config.diff, backdrop)
    }
}

/// Judge a captured frame against the page's stored baseline.
///
/// A missing baseline is a configuration problem: it ends the page as a
/// failure right away instead of burning retries. A `Fail` verdict retries
/// (a raced render can settle on the next attempt); `SizeMismatch` is
/// structural and terminal.
fn verify_frame(
    store: &ArtifactStore,
    page_id: &str,
    frame: &RgbaImage,
    settings: &DiffSettings,
    backdrop: KeyColor,
) -> AttemptOutcome {
    let reference = match store.load_reference(page_id) {
        Ok(Some(reference)) => reference,
        Ok(None) => {
            return AttemptOutcome::Done(
                Outcome::Fail,
                Some("no baseline recorded for this page".to_string()),
            );
        }
        Err(e) => return attempt_error(e),
    };

    let (result, overlay) = diff::compare(frame, &reference, settings, backdrop);

    if let Some(overlay) = &overlay {
        if let Err(e) = write_png(overlay, &store.diff_path(page_id)) {
            log::warn!("{}: could not write diff image: {}", page_id, e);
        }
    }

    match result.verdict {
        Verdict::Pass => AttemptOutcome::Done(
            Outcome::Pass,
            Some(format!("failed ratio {:.4}", result.failed_ratio)),
        ),
        Verdict::SizeMismatch => AttemptOutcome::Done(
            Outcome::SizeMismatch,
            Some(format!(
                "capture {}x{} vs baseline {}x{}",
                frame.width(),
                frame.height(),
                reference.width(),
                reference.height()
            )),
        ),
        Verdict::Fail => AttemptOutcome::Retry(format!(
            "{} pixels differ (ratio {:.4})",
            result.failed_pixels, result.failed_ratio
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    const NO_BACKOFF: Duration = Duration::ZERO;

    #[test]
    fn test_first_attempt_success() {
        let report = run_with_retries("cube", 3, NO_BACKOFF, |_| {
            AttemptOutcome::Done(Outcome::Pass, None)
        });
        assert_eq!(report.outcome, Outcome::Pass);
        assert_eq!(report.attempts, 1);
    }

    #[test]
    fn test_transient_failures_then_success() {
        // First two attempts time out, the third succeeds
        let report = run_with_retries("cube", 3, NO_BACKOFF, |attempt| {
            if attempt < 2 {
                AttemptOutcome::Retry("render timeout".to_string())
            } else {
                AttemptOutcome::Done(Outcome::Pass, None)
            }
        });
        assert_eq!(report.outcome, Outcome::Pass);
        assert_eq!(report.attempts, 3);
    }

    #[test]
    fn test_exhausted_attempts_fail_with_last_reason() {
        let mut calls = 0;
        let report = run_with_retries("cube", 3, NO_BACKOFF, |_| {
            calls += 1;
            AttemptOutcome::Retry(format!("failure {}", calls))
        });
        assert_eq!(calls, 3);
        assert_eq!(report.outcome, Outcome::Fail);
        assert_eq!(report.attempts, 3);
        assert!(report.detail.unwrap().contains("failure 3"));
    }

    #[test]
    fn test_structural_failure_not_retried() {
        let mut calls = 0;
        let report = run_with_retries("cube", 3, NO_BACKOFF, |_| {
            calls += 1;
            AttemptOutcome::Done(Outcome::SizeMismatch, None)
        });
        assert_eq!(calls, 1);
        assert_eq!(report.outcome, Outcome::SizeMismatch);
    }

    #[test]
    fn test_attempt_indices_are_zero_based_and_sequential() {
        let mut seen = Vec::new();
        let _ = run_with_retries("cube", 4, NO_BACKOFF, |attempt| {
            seen.push(attempt);
            AttemptOutcome::Retry("again".to_string())
        });
        assert_eq!(seen, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_failure_log_records_once() {
        let mut log = FailureLog::new();
        log.record("cube");
        log.record("cube");
        log.record("lights");
        assert_eq!(log.len(), 2);
        assert_eq!(log.pages(), ["cube", "lights"]);
    }

    #[test]
    fn test_outcome_success_classification() {
        assert!(Outcome::Pass.is_success());
        assert!(Outcome::Captured.is_success());
        assert!(Outcome::Recorded.is_success());
        assert!(!Outcome::Fail.is_success());
        assert!(!Outcome::SizeMismatch.is_success());
    }

    #[test]
    fn test_transient_error_retries() {
        let out = attempt_error(CaptureError::NavigationTimeout("cube".to_string()));
        assert!(matches!(out, AttemptOutcome::Retry(_)));

        let out = attempt_error(CaptureError::Capture("blank frame".to_string()));
        assert!(matches!(out, AttemptOutcome::Retry(_)));
    }

    #[test]
    fn test_browser_gone_error_is_terminal() {
        let out = attempt_error(CaptureError::Io(std::io::Error::other("disk full")));
        match out {
            AttemptOutcome::Done(outcome, detail) => {
                assert_eq!(outcome, Outcome::Fail);
                assert!(detail.unwrap().contains("disk full"));
            }
            other => panic!("expected terminal failure, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_baseline_fails_without_retry() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("out"), dir.path().join("refs"));
        store.init().unwrap();

        let frame = RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 255]));
        let settings = DiffSettings {
            pixel_threshold: 0.1,
            max_failed_ratio: 0.05,
        };

        let mut calls = 0;
        let report = run_with_retries("cube", 3, NO_BACKOFF, |_| {
            calls += 1;
            verify_frame(&store, "cube", &frame, &settings, KeyColor::WHITE)
        });

        // one attempt consumed, page logged once
        assert_eq!(calls, 1);
        assert_eq!(report.outcome, Outcome::Fail);
        assert!(report.detail.unwrap().contains("no baseline"));

        let mut failures = FailureLog::new();
        if !report.outcome.is_success() {
            failures.record(&report.id);
        }
        failures.record(&report.id);
        assert_eq!(failures.pages(), ["cube"]);
    }

    #[test]
    fn test_exit_code_counts_failures() {
        let mut failures = FailureLog::new();
        failures.record("a");
        failures.record("b");
        let report = RunReport {
            mode: RunMode::Verify,
            completed_at: chrono::Utc::now(),
            pages: Vec::new(),
            failures,
        };
        assert_eq!(report.exit_code(), 2);
    }
}
