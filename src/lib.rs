//! # pbm-rs - A Rust Crate for Monitoring Pellet Burner Controllers
//!
//! The pbm-rs crate talks to NBE pellet burner controllers over their UDP
//! protocol. It builds and validates the controller's framed requests, binds a
//! local port the controller accepts, paces and retries exchanges, parses the
//! two payload encodings and turns the controller's state fields into a stable
//! alarm code.
//!
//! ## Features
//!
//! - Frame codec for the NBE V13 (firmware 1005) request and response frames
//! - Pair-list and indexed-list payload parsing into flat key/value items
//! - UDP transport with local port fallback, mandatory pacing and receive timeout
//! - Bounded retry on timeout, response validation field by field
//! - Alarm classification from the burner's `(state, substate)` pair
//! - Polling cycles producing a [`Snapshot`] with typed accessors
//! - A canned-burner simulator for tests and local experiments
//!
//! ## Usage
//!
//! ```rust,no_run
//! use pbm_rs::{connect, init_logger, BurnerConfig, PbmError};
//!
//! # async fn run() -> Result<(), PbmError> {
//! init_logger();
//! let config = BurnerConfig::from_json_file("burner.json")?;
//! let mut monitor = connect(config.to_options()?, None)?;
//! let snapshot = monitor.poll_once().await?;
//! println!("Alarm: {:?}", snapshot.alarm_text());
//! # Ok(())
//! # }
//! ```

pub mod burner_monitor;
pub mod config;
pub mod constants;
pub mod error;
pub mod exchange;
pub mod logging;
pub mod nbe;
pub mod protocol;
pub mod simulator;
pub mod snapshot;
pub mod transport;
pub mod util;

pub use crate::error::{ErrorKind, PbmError};
pub use crate::logging::{init_logger, log_debug, log_error, log_info, log_warn};

pub use burner_monitor::{spawn_poller, BurnerMonitor, BurnerStatus, PollerConfig};
pub use config::{BurnerConfig, Options};
pub use exchange::{Exchange, ExchangeResponse};
pub use nbe::{classify, Alarm, RequestCategory, ResponseItem};
pub use protocol::{BurnerProtocol, ProtocolId, ProtocolRegistry};
pub use simulator::CannedBurner;
pub use snapshot::Snapshot;
pub use transport::{MockTransport, Transport, TransportConfig, UdpTransport};

/// Creates a monitor talking UDP to the burner described by `options`.
///
/// # Arguments
/// * `options` - Validated connection parameters
/// * `shutdown` - Optional shutdown signal; once it turns `true` the pacing
///   delay before the next send is cut short with `SleepInterrupted`
///
/// # Returns
/// * `Ok(BurnerMonitor)` - Monitor ready to discover and poll the burner
/// * `Err(PbmError)` - The selected protocol is not available
pub fn connect(
    options: Options,
    shutdown: Option<tokio::sync::watch::Receiver<bool>>,
) -> Result<BurnerMonitor<UdpTransport>, PbmError> {
    let registry = ProtocolRegistry::with_defaults()?;
    let protocol = registry.resolve(options.protocol())?;
    let config = TransportConfig::default().with_port_ceiling(protocol.local_port_ceiling());
    let mut transport = UdpTransport::new(options.clone(), config);
    if let Some(shutdown) = shutdown {
        transport = transport.with_shutdown(shutdown);
    }
    BurnerMonitor::new(options, transport, &registry)
}

/// Runs a single polling cycle against the configured burner.
///
/// # Arguments
/// * `config` - Connection settings
///
/// # Returns
/// * `Ok(Snapshot)` - Data of a complete, valid cycle
/// * `Err(PbmError)` - Discovery or fetching failed
pub async fn fetch_snapshot(config: &BurnerConfig) -> Result<Snapshot, PbmError> {
    let mut monitor = connect(config.to_options()?, None)?;
    monitor.poll_once().await.cloned()
}
