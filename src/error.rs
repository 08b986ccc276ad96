//! # Pellet Burner Error Handling
//!
//! This module defines the PbmError enum, which represents the different error
//! types that can occur while talking to a burner controller, together with the
//! fieldless [`ErrorKind`] used to reason about the taxonomy without context.

use thiserror::Error;

/// Represents the different error types that can occur in the pbm-rs crate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PbmError {
    /// The configured protocol has no registered implementation.
    #[error("Unknown protocol: {0}")]
    UnknownProtocol(String),

    /// Every local port between `first` and `last` was unavailable.
    #[error("Unable to use local port between {first} and {last}")]
    UnableToBindLocalPort { first: u16, last: u16 },

    /// The local address could not be resolved.
    #[error("Unknown local address {0}")]
    UnknownLocalHost(String),

    /// The remote address could not be resolved.
    #[error("Unknown remote address {0}")]
    UnknownRemoteHost(String),

    #[error("Error sending request: {0}")]
    ErrorSending(String),

    #[error("Error receiving response: {0}")]
    ErrorReceiving(String),

    /// No datagram arrived within the receive timeout.
    #[error("Error receiving response because of timeout")]
    Timeout,

    /// A request frame could not be produced.
    #[error("Error building request: {0}")]
    InvalidRequest(String),

    /// The response did not belong to the request or could not be decoded.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// A frame field lies outside the received datagram.
    #[error("Unable to access data part between {offset}-{}", .offset + .len)]
    DataAccessError { offset: usize, len: usize },

    #[error("Unable to determine state. Received: '{state}' and '{substate}'")]
    UnknownBurnerState { state: String, substate: String },

    #[error("Unable to determine time of day from '{0}'")]
    UnableToDetermineTimeOfDay(String),

    /// The pacing delay before a send was cut short by a shutdown request.
    #[error("Pacing delay interrupted by shutdown")]
    SleepInterrupted,

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(String),
}

/// Fieldless view of [`PbmError`] for matching on the error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    UnknownProtocol,
    UnableToBindLocalPort,
    UnknownLocalHost,
    UnknownRemoteHost,
    ErrorSending,
    ErrorReceiving,
    Timeout,
    InvalidRequest,
    InvalidResponse,
    DataAccessError,
    UnknownBurnerState,
    UnableToDetermineTimeOfDay,
    SleepInterrupted,
    Configuration,
    Io,
}

impl PbmError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PbmError::UnknownProtocol(_) => ErrorKind::UnknownProtocol,
            PbmError::UnableToBindLocalPort { .. } => ErrorKind::UnableToBindLocalPort,
            PbmError::UnknownLocalHost(_) => ErrorKind::UnknownLocalHost,
            PbmError::UnknownRemoteHost(_) => ErrorKind::UnknownRemoteHost,
            PbmError::ErrorSending(_) => ErrorKind::ErrorSending,
            PbmError::ErrorReceiving(_) => ErrorKind::ErrorReceiving,
            PbmError::Timeout => ErrorKind::Timeout,
            PbmError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            PbmError::InvalidResponse(_) => ErrorKind::InvalidResponse,
            PbmError::DataAccessError { .. } => ErrorKind::DataAccessError,
            PbmError::UnknownBurnerState { .. } => ErrorKind::UnknownBurnerState,
            PbmError::UnableToDetermineTimeOfDay(_) => ErrorKind::UnableToDetermineTimeOfDay,
            PbmError::SleepInterrupted => ErrorKind::SleepInterrupted,
            PbmError::Configuration(_) => ErrorKind::Configuration,
            PbmError::Io(_) => ErrorKind::Io,
        }
    }

    /// Timeouts are transient and worth another attempt; nothing else is.
    pub fn is_timeout(&self) -> bool {
        matches!(self, PbmError::Timeout)
    }
}

impl From<std::io::Error> for PbmError {
    fn from(e: std::io::Error) -> Self {
        PbmError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for PbmError {
    fn from(e: serde_json::Error) -> Self {
        PbmError::Configuration(e.to_string())
    }
}
