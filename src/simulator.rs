//! # Burner Simulator
//!
//! A stand-in controller that answers request frames with canned payloads. It
//! backs the in-process [`MockTransport`](crate::transport::MockTransport) and,
//! through [`serve_udp`], the `simulate` subcommand and the loopback tests.

use std::collections::HashMap;

use log::{debug, info, warn};
use tokio::net::UdpSocket;
use tokio::sync::watch;

use crate::constants::{NBE_APP_ID_LEN, RECEIVE_BUFFER_SIZE};
use crate::error::PbmError;
use crate::logging::log_frame;
use crate::nbe::category::RequestCategory;
use crate::nbe::frame::{RequestFrame, ResponseFrame};
use crate::util::hex::encode_hex;

/// Response code the controller sends with a successful answer.
pub const RESPONSE_CODE_OK: u8 = b'0';

/// Answers requests from a category → payload table.
#[derive(Debug, Clone, Default)]
pub struct CannedBurner {
    payloads: HashMap<RequestCategory, String>,
}

impl CannedBurner {
    /// A burner that knows no payloads and ignores every request.
    pub fn new() -> Self {
        Self::default()
    }

    /// A running burner with plausible values for every fetched category.
    pub fn with_defaults() -> Self {
        Self::new()
            .with_payload(RequestCategory::Discovery, "serial=12345;ip=192.168.1.50")
            .with_payload(
                RequestCategory::OperatingData,
                "boiler_temp=61.5;state=5;substate=0;content=800;power_pct=42;power_kw=10.5;time=21-01-05 05:23:11",
            )
            .with_payload(RequestCategory::AdvancedData, "boiler_setpoint=65;oxygen=10.2")
            .with_payload(
                RequestCategory::ConsumptionHours,
                "total_hours=0.5,0.4,0.4,0.3,1.2,1.5,2.0,1.8,1.1,0.9,0.7,0.6,0.6,0.7,0.8,1.0,1.3,1.6,1.9,2.1,1.7,1.2,0.9,0.6",
            )
            .with_payload(
                RequestCategory::SettingsHopper,
                "min_content=200;auger_consumption=6.5",
            )
            .with_payload(RequestCategory::SettingsBoiler, "temp=65;diff_over=5;diff_under=10")
            .with_payload(RequestCategory::SettingsCleaning, "trip_countdown=120")
    }

    pub fn with_payload(mut self, category: RequestCategory, payload: impl Into<String>) -> Self {
        self.set_payload(category, payload);
        self
    }

    pub fn set_payload(&mut self, category: RequestCategory, payload: impl Into<String>) {
        self.payloads.insert(category, payload.into());
    }

    pub fn remove_payload(&mut self, category: RequestCategory) {
        self.payloads.remove(&category);
    }

    /// Finds the category a request asks for by function code and payload.
    pub fn category_of(request: &RequestFrame) -> Option<RequestCategory> {
        let function_code = request.function_code_str();
        let payload = request.payload_str();
        RequestCategory::ALL.into_iter().find(|category| {
            category.function_code() == function_code && category.payload() == payload
        })
    }

    /// Builds the answer to a raw request, or `None` when the request is not
    /// understood and a real controller would stay silent.
    pub fn respond(&self, request: &[u8]) -> Option<Vec<u8>> {
        let request = match RequestFrame::decode(request) {
            Ok(request) => request,
            Err(e) => {
                debug!("Ignoring undecodable request: {e}");
                return None;
            }
        };
        let category = Self::category_of(&request)?;
        let payload = self.payloads.get(&category)?;
        match ResponseFrame::echoing(&request, RESPONSE_CODE_OK, payload.as_bytes()).encode() {
            Ok(response) => Some(response),
            Err(e) => {
                warn!("Unable to answer {category}: {e}");
                None
            }
        }
    }
}

/// Answers requests arriving on `socket` until shutdown is requested.
pub async fn serve_udp(
    socket: UdpSocket,
    burner: CannedBurner,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), PbmError> {
    info!("Simulated burner listening on {}", socket.local_addr()?);
    let mut buf = vec![0u8; RECEIVE_BUFFER_SIZE];
    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    info!("Simulated burner stopped");
                    return Ok(());
                }
            }
            received = socket.recv_from(&mut buf) => {
                let (len, peer) = received?;
                log_frame("Simulator request", &buf[..len]);
                match burner.respond(&buf[..len]) {
                    Some(response) => {
                        socket.send_to(&response, peer).await?;
                    }
                    None => debug!(
                        "No answer for request from {peer}, header {}",
                        encode_hex(&buf[..len.min(NBE_APP_ID_LEN)])
                    ),
                }
            }
        }
    }
}
