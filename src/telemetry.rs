//! Logging bootstrap shared by binaries

use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Initialize the global tracing subscriber for a binary.
///
/// `RUST_LOG`-style filtering is not layered on top; the level comes from
/// the CLI to keep the surface identical across deployments.
pub fn init_logging(level: &str) {
    let level = parse_level(level);
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .init();
}

fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}
