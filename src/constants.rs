//! Pellet Burner Protocol Constants
//!
//! This module defines the wire constants of the NBE V13 (firmware 1005) UDP
//! protocol and the connection defaults used throughout the crate.

use std::time::Duration;

// ----------------------------------------------------------------------------
// Request frame
// ----------------------------------------------------------------------------

/// Application identifier sent in every request and echoed by the controller
pub const NBE_APP_ID: &[u8; 12] = b"DeliciousABC";

/// Encryption flag: a single space means plaintext
pub const NBE_ENCRYPTION_NONE: u8 = b' ';

/// Start-of-frame marker
pub const NBE_START_MARKER: u8 = 0x02;

/// End-of-frame marker
pub const NBE_END_MARKER: u8 = 0x04;

/// Unused request field, always sent verbatim
pub const NBE_EXTRA: &[u8; 4] = b"extr";

// Field widths
pub const NBE_APP_ID_LEN: usize = 12;
pub const NBE_SERIAL_LEN: usize = 6;
pub const NBE_FUNCTION_CODE_LEN: usize = 2;
pub const NBE_SEQUENCE_LEN: usize = 2;
pub const NBE_PASSWORD_LEN: usize = 10;
pub const NBE_TIMESTAMP_LEN: usize = 10;
pub const NBE_EXTRA_LEN: usize = 4;
pub const NBE_PAYLOAD_LEN_DIGITS: usize = 3;

/// Largest payload whose length fits the 3-digit length field
pub const NBE_MAX_PAYLOAD_LEN: usize = 999;

// ----------------------------------------------------------------------------
// Response frame offsets
// ----------------------------------------------------------------------------

/// Offset of the first payload byte in a response
pub const NBE_RESPONSE_PAYLOAD_OFFSET: usize = 27;

// ----------------------------------------------------------------------------
// Payload separators
// ----------------------------------------------------------------------------

pub const PAYLOAD_ITEM_SEPARATOR: char = ';';
pub const PAYLOAD_VALUE_PAIR_SEPARATOR: char = '=';
pub const PAYLOAD_LIST_SEPARATOR: char = ',';

// ----------------------------------------------------------------------------
// Connection defaults
// ----------------------------------------------------------------------------

pub const DEFAULT_LOCAL_PORT: u16 = 8483;
pub const DEFAULT_REMOTE_PORT: u16 = 8483;
pub const DEFAULT_REFRESH_MINUTES: u64 = 15;

/// Wildcard address used when no specific local interface is requested
pub const DEFAULT_LOCAL_ADDRESS: &str = "0.0.0.0";

/// Firmware 1005 does not answer requests sent from five-digit ports
pub const NBE_V13_1005_PORT_CEILING: u16 = 9999;

/// Mandatory delay before every send
pub const PACING_DELAY: Duration = Duration::from_millis(2000);

pub const RECEIVE_TIMEOUT: Duration = Duration::from_millis(3000);

pub const RECEIVE_BUFFER_SIZE: usize = 1024;

/// Total attempts per category when the controller does not answer
pub const MAX_ATTEMPTS_ON_TIMEOUT: usize = 4;

/// Delay before the first polling cycle after startup
pub const POLL_INITIAL_DELAY: Duration = Duration::from_secs(20);
