pub mod app;
pub mod cli;
pub mod domain;
pub mod infra;
pub mod ui;

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber. Honors `RUST_LOG`; defaults to warnings only.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
