use clap::{Args, Parser, Subcommand};
use std::error::Error;
use std::path::PathBuf;

use web_vision::capture::BrowserSession;
use web_vision::config::Config;
use web_vision::pages::{discover_pages, shard_range};
use web_vision::runner::{RunMode, Runner, RunnerSettings};
use web_vision::store::ArtifactStore;
use web_vision::PageTarget;

/// Web Vision - WebGL gallery capture and visual regression testing
#[derive(Parser, Debug)]
#[command(
    name = "web-vision",
    about = "Capture WebGL example pages with headless Chromium and verify them against baselines",
    after_help = "ENVIRONMENT VARIABLES:\n\
        WEB_VISION_NETWORK_TIMEOUT   Base navigation timeout (ms)\n\
        WEB_VISION_NETWORK_TAX       Extra wait per downloaded payload (ms)\n\
        WEB_VISION_RENDER_TIMEOUT    Base render-completion timeout (ms)\n\
        WEB_VISION_MAX_ATTEMPTS      Attempts per page before giving up\n\
        WEB_VISION_VIEWPORT          Square screenshot side length (px)\n\
        WEB_VISION_OUTPUT_DIR        Directory for capture artifacts\n\
        WEB_VISION_REFERENCE_DIR     Directory for baseline images"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Capture each page as a PNG (or GIF with --animated)
    Capture {
        /// Capture an animated GIF instead of a still PNG
        #[arg(long)]
        animated: bool,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Capture each page and store it as the new baseline
    Record {
        #[command(flatten)]
        common: CommonArgs,
    },

    /// Capture each page and compare it against its stored baseline
    Verify {
        #[command(flatten)]
        common: CommonArgs,
    },
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// Base URL of the served example gallery
    #[arg(short = 'u', long, env = "WEB_VISION_BASE_URL", default_value = "http://localhost:8080")]
    base_url: String,

    /// Directory of example pages; every *.html file becomes a page id
    #[arg(short = 'd', long)]
    pages_dir: Option<PathBuf>,

    /// Explicit page ids (repeatable; overrides --pages-dir)
    #[arg(short = 'p', long = "page")]
    pages: Vec<String>,

    /// Index of this worker's shard
    #[arg(long, env = "WEB_VISION_SHARD_INDEX", default_value = "0")]
    shard_index: usize,

    /// Total number of worker shards
    #[arg(long, env = "WEB_VISION_SHARD_COUNT", default_value = "1")]
    shard_count: usize,

    /// Output directory for artifacts (default: WEB_VISION_OUTPUT_DIR or ./output)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Baseline directory (default: WEB_VISION_REFERENCE_DIR or ./references)
    #[arg(short, long)]
    references: Option<PathBuf>,

    /// Background color injected into pages, as hex (e.g. "202020")
    #[arg(long)]
    background: Option<String>,

    /// Render transparently and chroma-key the background out of captures
    #[arg(long)]
    transparent: bool,

    /// Run the browser with a visible window instead of headless
    #[arg(long)]
    visible: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Print the run report as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let (mode, animated, common) = match cli.command {
        Commands::Capture { animated, common } => (RunMode::Capture, animated, common),
        Commands::Record { common } => (RunMode::Record, false, common),
        Commands::Verify { common } => (RunMode::Verify, false, common),
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(
        if common.verbose { "debug" } else { "info" },
    ))
    .init();

    // The session and its Chromium child live inside `run`; `process::exit`
    // skips destructors, so the browser must already be gone by this point.
    let code = run(mode, animated, &common)?;
    std::process::exit(code);
}

/// Run the pipeline and return the process exit code.
///
/// Owns the browser session for its whole lifetime: when this returns, the
/// session has been dropped and the spawned Chromium has been shut down.
fn run(mode: RunMode, animated: bool, common: &CommonArgs) -> Result<i32, Box<dyn Error>> {
    let mut config = Config::from_env();
    if let Some(output) = &common.output {
        config.store.output_dir = output.display().to_string();
    }
    if let Some(references) = &common.references {
        config.store.reference_dir = references.display().to_string();
    }

    let background = common
        .background
        .as_deref()
        .map(parse_hex_color)
        .transpose()?;

    // Build the page list, then keep only this shard's contiguous slice
    let all_pages: Vec<String> = if !common.pages.is_empty() {
        common.pages.clone()
    } else if let Some(dir) = &common.pages_dir {
        discover_pages(dir)?
    } else {
        return Err("no pages given: use --page or --pages-dir".into());
    };

    if common.shard_count == 0 || common.shard_index >= common.shard_count {
        return Err(format!(
            "invalid shard {}/{}",
            common.shard_index, common.shard_count
        )
        .into());
    }

    let range = shard_range(all_pages.len(), common.shard_index, common.shard_count);
    let targets: Vec<PageTarget> = all_pages[range.clone()]
        .iter()
        .map(|id| {
            if animated {
                PageTarget::animated(id)
            } else {
                PageTarget::still(id)
            }
        })
        .collect();

    if !common.json {
        println!(
            "shard {}/{}: {} of {} pages",
            common.shard_index,
            common.shard_count,
            targets.len(),
            all_pages.len()
        );
    }

    let store = ArtifactStore::new(&config.store.output_dir, &config.store.reference_dir);
    store.init()?;

    let session = BrowserSession::launch(
        &common.base_url,
        config.timing.clone(),
        &config.capture,
        !common.visible,
    )?;

    let runner = Runner::new(
        &session,
        &store,
        &config,
        RunnerSettings {
            mode,
            background,
            transparent: common.transparent,
        },
    );
    let report = runner.run(&targets);

    store.write_manifest(&report)?;

    if common.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "\n{} pages processed, {} failed",
            report.pages.len(),
            report.failures.len()
        );
        for id in report.failures.pages() {
            println!("  failed: {}", id);
        }
    }

    Ok(report.exit_code())
}

fn parse_hex_color(hex: &str) -> Result<u32, Box<dyn Error>> {
    let hex = hex.trim_start_matches('#');
    if hex.len() != 6 {
        return Err("Color must be 6 hex digits (e.g., 'ff0000')".into());
    }
    Ok(u32::from_str_radix(hex, 16)?)
}
