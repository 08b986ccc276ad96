use env_logger::Env;
use log::{debug, error, info, log_enabled, warn, Level};

use crate::util::hex::escape_frame;

/// Frames longer than this are cut in the debug dump.
const MAX_LOGGED_FRAME_BYTES: usize = 256;

/// Initializes the logger with the `env_logger` crate.
///
/// Logs at `info` unless `RUST_LOG` says otherwise. Calling it more than once
/// is harmless.
pub fn init_logger() {
    let _ = env_logger::Builder::from_env(Env::default().default_filter_or("info")).try_init();
}

/// Logs an error message.
pub fn log_error(message: &str) {
    if log_enabled!(Level::Error) {
        error!("{message}");
    }
}

/// Logs a warning message.
pub fn log_warn(message: &str) {
    if log_enabled!(Level::Warn) {
        warn!("{message}");
    }
}

/// Logs an informational message.
pub fn log_info(message: &str) {
    if log_enabled!(Level::Info) {
        info!("{message}");
    }
}

/// Logs a debug message.
pub fn log_debug(message: &str) {
    if log_enabled!(Level::Debug) {
        debug!("{message}");
    }
}

/// Dumps a frame at debug level, control bytes shown as `<xx>`.
pub fn log_frame(prefix: &str, data: &[u8]) {
    if !log_enabled!(Level::Debug) {
        return;
    }
    if data.len() > MAX_LOGGED_FRAME_BYTES {
        debug!(
            "{prefix}: {} ... ({} bytes total)",
            escape_frame(&data[..MAX_LOGGED_FRAME_BYTES]),
            data.len()
        );
    } else {
        debug!("{prefix}: {}", escape_frame(data));
    }
}
