//! Tracing/logging setup shared by every binary.

/// Subscriber configuration and installation.
pub mod subscriber;

pub use subscriber::{LogConfig, LogFormat};

/// Initialize process-wide logging.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init(config: &LogConfig) {
    subscriber::init(config);
}
