//! Tests for the logging helpers of the `pbm-rs` crate.

use pbm_rs::logging::{init_logger, log_debug, log_error, log_frame, log_info, log_warn};

/// Tests that the helpers do not panic once the logger is up.
#[test]
fn test_logging() {
    init_logger();
    log_error("This is an error message");
    log_warn("This is a warning message");
    log_info("This is an info message");
    log_debug("This is a debug message");
}

/// Tests that initializing twice is harmless.
#[test]
fn test_init_logger_twice() {
    init_logger();
    init_logger();
}

/// Tests that short, empty and oversized frames can all be dumped.
#[test]
fn test_log_frame() {
    init_logger();
    log_frame("Request", b"DeliciousABC012345 \x020400");
    log_frame("Empty", &[]);
    log_frame("Large", &[0x02; 2048]);
}
