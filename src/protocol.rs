//! Protocol Variant System for Burner Controllers
//!
//! Each controller firmware speaks its own dialect of the request/response
//! protocol. A dialect is one implementation of [`BurnerProtocol`], and the
//! [`ProtocolRegistry`] maps a [`ProtocolId`] to the implementation, so a new
//! firmware means registering one more type instead of touching shared code.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use crate::config::Options;
use crate::error::PbmError;
use crate::nbe::alarm::Alarm;
use crate::nbe::category::RequestCategory;
use crate::nbe::payload::ParsedPayload;
use crate::nbe::NbeV13_1005;
use crate::snapshot::SnapshotSchema;

/// Identifies a protocol dialect.
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProtocolId {
    /// NBE controllers with V13 software, firmware build 1005
    #[serde(rename = "nbe_v13_1005")]
    NbeV13_1005,
}

impl ProtocolId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProtocolId::NbeV13_1005 => "nbe_v13_1005",
        }
    }
}

impl fmt::Display for ProtocolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProtocolId {
    type Err = PbmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "nbe_v13_1005" => Ok(ProtocolId::NbeV13_1005),
            _ => Err(PbmError::UnknownProtocol(s.to_string())),
        }
    }
}

/// Capabilities a protocol dialect provides to the exchange and the monitor.
pub trait BurnerProtocol: Send + Sync {
    fn id(&self) -> ProtocolId;

    /// Highest local port the controller still answers to.
    fn local_port_ceiling(&self) -> u16;

    /// Categories fetched, in order, during one polling cycle.
    fn fetch_plan(&self) -> &'static [RequestCategory];

    /// Item ids behind the snapshot's typed accessors.
    fn snapshot_schema(&self) -> &'static SnapshotSchema;

    /// Serializes the request for `category`.
    fn build_request(
        &self,
        category: RequestCategory,
        options: &Options,
        sequence: u16,
        timestamp: i64,
    ) -> Result<Vec<u8>, PbmError>;

    /// Checks that `response` answers `request`.
    fn validate(&self, request: &[u8], response: &[u8]) -> Result<(), PbmError>;

    /// Extracts the items carried by a response to `category`.
    fn parse_response(
        &self,
        category: RequestCategory,
        response: &[u8],
    ) -> Result<ParsedPayload, PbmError>;

    /// Derives the alarm from the textual state fields.
    fn classify_alarm(&self, state: &str, substate: &str) -> Result<Alarm, PbmError>;
}

/// Registry of protocol implementations
#[derive(Default, Clone)]
pub struct ProtocolRegistry {
    inner: Arc<Mutex<HashMap<ProtocolId, Arc<dyn BurnerProtocol>>>>,
}

impl ProtocolRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ProtocolId, Arc<dyn BurnerProtocol>>> {
        // The map stays consistent even if a holder panicked.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a protocol implementation under its own id
    pub fn register(&self, protocol: Arc<dyn BurnerProtocol>) -> Result<(), PbmError> {
        let mut inner = self.lock();
        let id = protocol.id();

        if inner.contains_key(&id) {
            return Err(PbmError::Configuration(format!(
                "Protocol already registered: {id}"
            )));
        }

        inner.insert(id, protocol);
        Ok(())
    }

    pub fn get(&self, id: ProtocolId) -> Option<Arc<dyn BurnerProtocol>> {
        self.lock().get(&id).cloned()
    }

    pub fn is_registered(&self, id: ProtocolId) -> bool {
        self.lock().contains_key(&id)
    }

    /// Like [`get`](Self::get), but a missing protocol is an error.
    pub fn resolve(&self, id: ProtocolId) -> Result<Arc<dyn BurnerProtocol>, PbmError> {
        self.get(id)
            .ok_or_else(|| PbmError::UnknownProtocol(id.to_string()))
    }

    pub fn registered_protocols(&self) -> Vec<ProtocolId> {
        self.lock().keys().copied().collect()
    }

    /// Create a new registry with every built-in protocol registered
    pub fn with_defaults() -> Result<Self, PbmError> {
        let registry = Self::new();
        registry.register(Arc::new(NbeV13_1005::new()))?;
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_id_parsing() {
        assert_eq!(
            "NBE_V13_1005".parse::<ProtocolId>().unwrap(),
            ProtocolId::NbeV13_1005
        );
        let err = "nbe_v99".parse::<ProtocolId>().unwrap_err();
        assert_eq!(err, PbmError::UnknownProtocol("nbe_v99".into()));
    }

    #[test]
    fn test_registry_defaults() {
        let registry = ProtocolRegistry::with_defaults().unwrap();
        assert!(registry.is_registered(ProtocolId::NbeV13_1005));
        let protocol = registry.resolve(ProtocolId::NbeV13_1005).unwrap();
        assert_eq!(protocol.id(), ProtocolId::NbeV13_1005);
        assert_eq!(protocol.local_port_ceiling(), 9999);
    }

    #[test]
    fn test_registry_rejects_duplicates() {
        let registry = ProtocolRegistry::with_defaults().unwrap();
        let err = registry.register(Arc::new(NbeV13_1005::new())).unwrap_err();
        assert!(matches!(err, PbmError::Configuration(_)));
    }

    #[test]
    fn test_empty_registry_reports_unknown_protocol() {
        let registry = ProtocolRegistry::new();
        let err = registry.resolve(ProtocolId::NbeV13_1005).err().unwrap();
        assert_eq!(err.kind(), crate::error::ErrorKind::UnknownProtocol);
        assert!(registry.registered_protocols().is_empty());
    }
}
