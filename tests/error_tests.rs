//! Unit tests for the `PbmError` enum and its associated `Display` trait implementation.

use pbm_rs::error::{ErrorKind, PbmError};

/// Tests that the port range tried is part of the bind failure message.
#[test]
fn test_unable_to_bind_local_port_error() {
    let err = PbmError::UnableToBindLocalPort {
        first: 8483,
        last: 9999,
    };
    assert_eq!(err.to_string(), "Unable to use local port between 8483 and 9999");
    assert_eq!(err.kind(), ErrorKind::UnableToBindLocalPort);
}

/// Tests that the `DataAccessError` variant reports the accessed range.
#[test]
fn test_data_access_error() {
    let err = PbmError::DataAccessError { offset: 27, len: 50 };
    assert_eq!(err.to_string(), "Unable to access data part between 27-77");
}

/// Tests that the `UnknownBurnerState` variant quotes both fields.
#[test]
fn test_unknown_burner_state_error() {
    let err = PbmError::UnknownBurnerState {
        state: "x".into(),
        substate: "y".into(),
    };
    assert_eq!(
        err.to_string(),
        "Unable to determine state. Received: 'x' and 'y'"
    );
}

/// Tests that the `Timeout` variant is correctly formatted and retryable.
#[test]
fn test_timeout_error() {
    let err = PbmError::Timeout;
    assert_eq!(err.to_string(), "Error receiving response because of timeout");
    assert!(err.is_timeout());
    assert!(!PbmError::ErrorReceiving("reset".into()).is_timeout());
}

/// Tests that remote resolution failures name the address.
#[test]
fn test_unknown_remote_host_error() {
    let err = PbmError::UnknownRemoteHost("burner.local:8483".into());
    assert_eq!(err.to_string(), "Unknown remote address burner.local:8483");
    assert_eq!(err.kind(), ErrorKind::UnknownRemoteHost);
}

/// Tests the conversion from I/O errors.
#[test]
fn test_io_error_conversion() {
    let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
    let err = PbmError::from(io);
    assert_eq!(err.kind(), ErrorKind::Io);
    assert_eq!(err.to_string(), "I/O error: missing");
}
