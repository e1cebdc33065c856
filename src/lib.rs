//! Web Vision - WebGL gallery capture and visual regression testing.
//!
//! This crate provides:
//! - Headless Chromium capture of WebGL example pages
//! - Adaptive render waits scaled by payload size and retry attempt
//! - Still PNG and looped GIF artifacts with chroma-key transparency recovery
//! - Pixel-level comparison against stored baselines with tolerance thresholds
//! - Shardable page lists for parallel CI workers
//!
//! # Example
//!
//! ```rust,no_run
//! use web_vision::capture::BrowserSession;
//! use web_vision::config::Config;
//!
//! let config = Config::defaults();
//! let session = BrowserSession::launch(
//!     "http://localhost:8080",
//!     config.timing.clone(),
//!     &config.capture,
//!     true,
//! ).unwrap();
//! let bytes = session.load_page("cube", 0).unwrap();
//! session.wait_for_render(0, bytes, &Default::default()).unwrap();
//! let frame = session.screenshot().unwrap();
//! frame.save("cube.png").unwrap();
//! ```

pub mod capture;
pub mod config;
pub mod diff;
pub mod pages;
pub mod runner;
pub mod store;

// Re-export capture types and the browser session
pub use capture::{
    attempt_progress, recover_transparency, resource_size, scaled_timeout, write_animation,
    write_still, BrowserSession, CaptureError, CaptureResult, KeyColor, PageOptions, PageTarget,
    RenderMode,
};

// Re-export comparison types
pub use diff::{compare, DiffResult, Verdict};

// Re-export orchestration types
pub use runner::{
    run_with_retries, AttemptOutcome, FailureLog, Outcome, PageReport, RunMode, RunReport, Runner,
    RunnerSettings,
};

// Re-export sharding helpers and the artifact store
pub use pages::{discover_pages, shard_range};
pub use store::ArtifactStore;
