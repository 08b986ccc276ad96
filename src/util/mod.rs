//! # Utility Modules
//!
//! Helpers shared across the crate that are not specific to one protocol.

pub mod hex;

pub use hex::{encode_hex, escape_frame};
