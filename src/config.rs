//! # Connection Configuration
//!
//! [`BurnerConfig`] is the loadable, serde-backed form of the settings; it is
//! validated once into the immutable [`Options`] every session is built from.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_LOCAL_ADDRESS, DEFAULT_LOCAL_PORT, DEFAULT_REFRESH_MINUTES, DEFAULT_REMOTE_PORT,
};
use crate::error::PbmError;
use crate::protocol::ProtocolId;

/// Validated connection parameters. Immutable after construction.
#[derive(Clone, PartialEq, Eq)]
pub struct Options {
    local_address: String,
    local_port: u16,
    remote_address: String,
    remote_port: u16,
    protocol: ProtocolId,
    serial: String,
    password: String,
}

/// Maps the empty string and loopback names to the wildcard address, since the
/// controller answers to the interface address rather than to loopback.
fn normalize_local_address(address: &str) -> String {
    let trimmed = address.trim();
    if trimmed.is_empty()
        || trimmed.eq_ignore_ascii_case("localhost")
        || trimmed == "127.0.0.1"
    {
        DEFAULT_LOCAL_ADDRESS.to_string()
    } else {
        trimmed.to_string()
    }
}

impl Options {
    pub fn new(
        local_address: &str,
        local_port: u16,
        remote_address: &str,
        remote_port: u16,
        protocol: ProtocolId,
        serial: &str,
        password: &str,
    ) -> Result<Self, PbmError> {
        if local_port == 0 {
            return Err(PbmError::Configuration(
                "local port must be between 1 and 65535".into(),
            ));
        }
        if remote_port == 0 {
            return Err(PbmError::Configuration(
                "remote port must be between 1 and 65535".into(),
            ));
        }
        let remote_address = remote_address.trim();
        if remote_address.is_empty() {
            return Err(PbmError::Configuration("remote address is required".into()));
        }
        if !serial.is_ascii() {
            return Err(PbmError::Configuration("serial must be ASCII".into()));
        }
        if !password.is_ascii() {
            return Err(PbmError::Configuration("password must be ASCII".into()));
        }

        Ok(Options {
            local_address: normalize_local_address(local_address),
            local_port,
            remote_address: remote_address.to_string(),
            remote_port,
            protocol,
            serial: serial.to_string(),
            password: password.to_string(),
        })
    }

    pub fn local_address(&self) -> &str {
        &self.local_address
    }

    pub fn local_port(&self) -> u16 {
        self.local_port
    }

    pub fn remote_address(&self) -> &str {
        &self.remote_address
    }

    pub fn remote_port(&self) -> u16 {
        self.remote_port
    }

    pub fn protocol(&self) -> ProtocolId {
        self.protocol
    }

    pub fn serial(&self) -> &str {
        &self.serial
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("local_address", &self.local_address)
            .field("local_port", &self.local_port)
            .field("remote_address", &self.remote_address)
            .field("remote_port", &self.remote_port)
            .field("protocol", &self.protocol)
            .field("serial", &self.serial)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Settings as stored in a configuration file. Missing fields take defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BurnerConfig {
    pub local_address: String,
    pub local_port: u16,
    pub remote_address: String,
    pub remote_port: u16,
    pub serial: String,
    pub password: String,
    /// Minutes between polling cycles
    pub refresh_minutes: u64,
    pub protocol: ProtocolId,
}

impl Default for BurnerConfig {
    fn default() -> Self {
        BurnerConfig {
            local_address: String::new(),
            local_port: DEFAULT_LOCAL_PORT,
            remote_address: String::new(),
            remote_port: DEFAULT_REMOTE_PORT,
            serial: String::new(),
            password: String::new(),
            refresh_minutes: DEFAULT_REFRESH_MINUTES,
            protocol: ProtocolId::NbeV13_1005,
        }
    }
}

impl BurnerConfig {
    pub fn from_json_str(json: &str) -> Result<Self, PbmError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Loads settings from a JSON file. A file that cannot be read is an `Io`
    /// error, one that does not parse a `Configuration` error.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, PbmError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Validates the settings and produces the session options.
    pub fn to_options(&self) -> Result<Options, PbmError> {
        if self.refresh_minutes == 0 {
            return Err(PbmError::Configuration(
                "refresh interval must be at least one minute".into(),
            ));
        }
        Options::new(
            &self.local_address,
            self.local_port,
            &self.remote_address,
            self.remote_port,
            self.protocol,
            &self.serial,
            &self.password,
        )
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_minutes.saturating_mul(60))
    }
}
