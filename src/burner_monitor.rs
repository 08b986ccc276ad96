//! # Burner Monitor
//!
//! The BurnerMonitor owns the session with one controller and runs polling
//! cycles against it: discover the burner when it is not known to be online,
//! fetch every category of the protocol's fetch plan into a fresh
//! [`Snapshot`], classify the alarm, and keep the last good snapshot.
//!
//! [`spawn_poller`] runs cycles on a tokio task. The monitor sits behind a
//! `tokio::sync::Mutex`, so at most one cycle talks to the controller at a time.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::{debug, error, info, warn};
use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use crate::config::{BurnerConfig, Options};
use crate::constants::{DEFAULT_REFRESH_MINUTES, POLL_INITIAL_DELAY};
use crate::error::PbmError;
use crate::exchange::Exchange;
use crate::nbe::category::RequestCategory;
use crate::protocol::ProtocolRegistry;
use crate::snapshot::Snapshot;
use crate::transport::udp::shutdown_requested;
use crate::transport::Transport;

/// Reachability of the burner as seen by the monitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum BurnerStatus {
    /// No cycle has run yet.
    Unknown,
    Online,
    /// The last cycle failed; carries the communication error.
    Offline(String),
}

impl fmt::Display for BurnerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BurnerStatus::Unknown => f.write_str("unknown"),
            BurnerStatus::Online => f.write_str("online"),
            BurnerStatus::Offline(reason) => write!(f, "offline: {reason}"),
        }
    }
}

pub struct BurnerMonitor<T: Transport> {
    exchange: Exchange<T>,
    status: BurnerStatus,
    last_snapshot: Option<Snapshot>,
}

impl<T: Transport> BurnerMonitor<T> {
    /// Creates a monitor for the protocol selected in `options`.
    pub fn new(options: Options, transport: T, registry: &ProtocolRegistry) -> Result<Self, PbmError> {
        let protocol = registry.resolve(options.protocol())?;
        Ok(Self::from_exchange(Exchange::new(options, protocol, transport)))
    }

    pub fn from_exchange(exchange: Exchange<T>) -> Self {
        BurnerMonitor {
            exchange,
            status: BurnerStatus::Unknown,
            last_snapshot: None,
        }
    }

    pub fn status(&self) -> &BurnerStatus {
        &self.status
    }

    /// The snapshot of the last successful cycle.
    pub fn last_snapshot(&self) -> Option<&Snapshot> {
        self.last_snapshot.as_ref()
    }

    pub fn exchange(&self) -> &Exchange<T> {
        &self.exchange
    }

    pub fn exchange_mut(&mut self) -> &mut Exchange<T> {
        &mut self.exchange
    }

    /// Runs discovery and updates the status with its outcome.
    pub async fn discover(&mut self, retry_on_fail: bool) -> Result<bool, PbmError> {
        match self.exchange.discover(retry_on_fail).await {
            Ok(true) => {
                info!("Burner discovered at {}", self.exchange.options().remote_address());
                self.status = BurnerStatus::Online;
                Ok(true)
            }
            Ok(false) => {
                self.go_offline(format!(
                    "Unable to discover burner at {}",
                    self.exchange.options().remote_address()
                ));
                Ok(false)
            }
            Err(PbmError::SleepInterrupted) => Err(PbmError::SleepInterrupted),
            Err(e) => {
                self.go_offline(format!("Unable to discover burner: {e}"));
                Err(e)
            }
        }
    }

    pub async fn discover_by_broadcast(&mut self, retry_on_fail: bool) -> Result<bool, PbmError> {
        self.exchange.discover_by_broadcast(retry_on_fail).await
    }

    /// Fetches every category of the fetch plan into a new snapshot.
    ///
    /// The snapshot is valid only if every category answered with data. The
    /// alarm is classified from the state fields of the operating data.
    pub async fn fetch_all(&mut self) -> Result<Snapshot, PbmError> {
        let protocol = Arc::clone(self.exchange.protocol());
        let mut snapshot = Snapshot::new(protocol.snapshot_schema());
        let mut valid = true;

        for &category in protocol.fetch_plan() {
            let response = self.exchange.get_data_with_retry(category).await?;
            if !response.valid {
                warn!("No data received for {category}");
                valid = false;
            }
            snapshot.extend(response.payload.items);

            if category != RequestCategory::OperatingData {
                continue;
            }
            let alarm = match (snapshot.burner_state(), snapshot.burner_substate()) {
                (Some(state), Some(substate)) => protocol.classify_alarm(state, substate)?,
                _ => {
                    warn!("Operating data carries no burner state");
                    continue;
                }
            };
            debug!("Alarm {}: {}", alarm.code, alarm.text);
            snapshot.set_alarm(alarm);
        }

        snapshot.finish(valid, Utc::now());
        Ok(snapshot)
    }

    /// Runs one polling cycle.
    ///
    /// On success the new snapshot replaces the previous one. On failure the
    /// burner is marked offline and the previous snapshot stays in place. A
    /// cycle abandoned because of shutdown leaves the status untouched.
    pub async fn poll_once(&mut self) -> Result<&Snapshot, PbmError> {
        if self.status != BurnerStatus::Online && !self.discover(true).await? {
            return Err(PbmError::InvalidResponse(
                "burner did not answer discovery".into(),
            ));
        }

        match self.fetch_all().await {
            Ok(snapshot) if snapshot.is_valid() => {
                info!(
                    "Fetched {} items from burner, alarm {:?}",
                    snapshot.items().len(),
                    snapshot.alarm_code()
                );
                self.status = BurnerStatus::Online;
                Ok(&*self.last_snapshot.insert(snapshot))
            }
            Ok(_) => {
                self.go_offline("Invalid response from remote host".to_string());
                Err(PbmError::InvalidResponse(
                    "incomplete data from burner".into(),
                ))
            }
            Err(PbmError::SleepInterrupted) => Err(PbmError::SleepInterrupted),
            Err(e) => {
                self.go_offline(format!("Unable to fetch data: {e}"));
                Err(e)
            }
        }
    }

    fn go_offline(&mut self, reason: String) {
        error!("{reason}");
        self.status = BurnerStatus::Offline(reason);
    }
}

/// Scheduling of the background poller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerConfig {
    /// Delay before the first cycle
    pub initial_delay: Duration,
    /// Delay between the end of one cycle and the start of the next
    pub interval: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        PollerConfig {
            initial_delay: POLL_INITIAL_DELAY,
            interval: Duration::from_secs(DEFAULT_REFRESH_MINUTES * 60),
        }
    }
}

impl From<&BurnerConfig> for PollerConfig {
    fn from(config: &BurnerConfig) -> Self {
        PollerConfig {
            interval: config.poll_interval(),
            ..PollerConfig::default()
        }
    }
}

/// Runs polling cycles on a tokio task until shutdown is requested.
pub fn spawn_poller<T: Transport + 'static>(
    monitor: Arc<Mutex<BurnerMonitor<T>>>,
    config: PollerConfig,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut delay = config.initial_delay;
        loop {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                true = shutdown_requested(&mut shutdown) => break,
            }

            let mut monitor = monitor.lock().await;
            match monitor.poll_once().await {
                Ok(snapshot) => debug!("Cycle complete, {} items", snapshot.items().len()),
                Err(PbmError::SleepInterrupted) => break,
                Err(e) => warn!("Cycle failed: {e}"),
            }
            drop(monitor);

            delay = config.interval;
        }
        info!("Poller stopped");
    })
}
