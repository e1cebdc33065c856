pub mod assemble;
pub mod browser;
pub mod timing;
pub mod types;

pub use assemble::{recover_transparency, write_animation, write_still, KeyColor};
pub use browser::BrowserSession;
pub use timing::{attempt_progress, network_tax_delay, resource_size, scaled_timeout};
pub use types::{CaptureError, CaptureResult, PageOptions, PageTarget, RenderMode};
