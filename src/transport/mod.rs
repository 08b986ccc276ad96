//! # Datagram Transport
//!
//! A [`Transport`] carries one request datagram to the controller and returns
//! the datagram it answers with. The production implementation is
//! [`udp::UdpTransport`]; [`mock::MockTransport`] answers in-process for tests.

pub mod mock;
pub mod udp;

use std::time::Duration;

use async_trait::async_trait;

use crate::constants::{NBE_V13_1005_PORT_CEILING, PACING_DELAY, RECEIVE_BUFFER_SIZE, RECEIVE_TIMEOUT};
use crate::error::PbmError;

pub use mock::MockTransport;
pub use udp::{bind_local_port, DatagramSocket, SocketBinder, UdpBinder, UdpTransport};

/// One request/response round trip.
#[async_trait]
pub trait Transport: Send {
    async fn exchange(&mut self, request: &[u8]) -> Result<Vec<u8>, PbmError>;
}

/// Timing and sizing of the UDP session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportConfig {
    /// Delay before every send, so the controller is never polled back to back
    pub pacing_delay: Duration,
    pub receive_timeout: Duration,
    pub receive_buffer_size: usize,
    /// Highest local port tried during port fallback
    pub local_port_ceiling: u16,
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig {
            pacing_delay: PACING_DELAY,
            receive_timeout: RECEIVE_TIMEOUT,
            receive_buffer_size: RECEIVE_BUFFER_SIZE,
            local_port_ceiling: NBE_V13_1005_PORT_CEILING,
        }
    }
}

impl TransportConfig {
    pub fn with_port_ceiling(mut self, ceiling: u16) -> Self {
        self.local_port_ceiling = ceiling;
        self
    }
}
