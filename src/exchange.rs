//! # Request/Response Exchange
//!
//! One logical exchange builds the request for a category, runs it over the
//! session's [`Transport`], checks that the answer belongs to the request and
//! parses its payload. Timeouts are retried a bounded number of times; every
//! other failure is returned to the caller straight away.

use std::sync::Arc;

use chrono::Utc;
use log::debug;

use crate::config::Options;
use crate::constants::MAX_ATTEMPTS_ON_TIMEOUT;
use crate::error::PbmError;
use crate::nbe::category::RequestCategory;
use crate::nbe::payload::ParsedPayload;
use crate::protocol::BurnerProtocol;
use crate::transport::Transport;

/// Outcome of one successful round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeResponse {
    pub category: RequestCategory,
    /// The raw response datagram
    pub frame: Vec<u8>,
    pub payload: ParsedPayload,
    /// The response matched the request and carried at least one item.
    pub valid: bool,
}

/// A session with one controller: options, protocol dialect and transport.
pub struct Exchange<T: Transport> {
    options: Options,
    protocol: Arc<dyn BurnerProtocol>,
    transport: T,
    sequence: u16,
    max_attempts: usize,
}

impl<T: Transport> Exchange<T> {
    pub fn new(options: Options, protocol: Arc<dyn BurnerProtocol>, transport: T) -> Self {
        Exchange {
            options,
            protocol,
            transport,
            sequence: 0,
            max_attempts: MAX_ATTEMPTS_ON_TIMEOUT,
        }
    }

    /// Sets the sequence number of the next request.
    pub fn with_sequence(mut self, sequence: u16) -> Self {
        self.sequence = sequence % 100;
        self
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn protocol(&self) -> &Arc<dyn BurnerProtocol> {
        &self.protocol
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    // Rolls over after 99, so a late answer to an earlier request fails validation.
    fn next_sequence(&mut self) -> u16 {
        let sequence = self.sequence;
        self.sequence = (self.sequence + 1) % 100;
        sequence
    }

    /// Runs a single exchange for `category`.
    ///
    /// A response that does not match the request is an `InvalidResponse`; a
    /// matching response without any parsable item is returned with
    /// `valid == false`.
    pub async fn send_and_receive(
        &mut self,
        category: RequestCategory,
    ) -> Result<ExchangeResponse, PbmError> {
        let sequence = self.next_sequence();
        let request = self.protocol.build_request(
            category,
            &self.options,
            sequence,
            Utc::now().timestamp(),
        )?;

        let frame = self.transport.exchange(&request).await?;
        self.protocol.validate(&request, &frame)?;
        let payload = self.protocol.parse_response(category, &frame)?;
        let valid = payload.is_success();

        debug!(
            "{category} exchange {sequence:02}: {} items, {} skipped",
            payload.items.len(),
            payload.skipped.len()
        );
        Ok(ExchangeResponse {
            category,
            frame,
            payload,
            valid,
        })
    }

    /// Checks whether the controller answers `category` with usable data.
    ///
    /// An empty or mismatching answer is retried once when `retry_on_fail` is
    /// set. Transport failures are returned as errors.
    pub async fn discover_by_category(
        &mut self,
        category: RequestCategory,
        retry_on_fail: bool,
    ) -> Result<bool, PbmError> {
        let attempts = if retry_on_fail { 2 } else { 1 };
        for attempt in 1..=attempts {
            match self.send_and_receive(category).await {
                Ok(response) if response.valid => return Ok(true),
                Ok(_) => debug!("{category} attempt {attempt}: response carried no data"),
                Err(PbmError::InvalidResponse(reason)) => {
                    debug!("{category} attempt {attempt}: {reason}")
                }
                Err(e) => return Err(e),
            }
        }
        Ok(false)
    }

    pub async fn discover(&mut self, retry_on_fail: bool) -> Result<bool, PbmError> {
        self.discover_by_category(RequestCategory::Discovery, retry_on_fail)
            .await
    }

    /// Broadcast discovery is declared by the protocol but not implemented, so
    /// this always fails with `InvalidRequest`.
    pub async fn discover_by_broadcast(&mut self, retry_on_fail: bool) -> Result<bool, PbmError> {
        self.discover_by_category(RequestCategory::DiscoveryBroadcast, retry_on_fail)
            .await
    }

    /// Like [`send_and_receive`](Self::send_and_receive), retried while the
    /// controller does not answer, up to four attempts in total.
    pub async fn get_data_with_retry(
        &mut self,
        category: RequestCategory,
    ) -> Result<ExchangeResponse, PbmError> {
        let mut attempt = 1;
        loop {
            match self.send_and_receive(category).await {
                Err(e) if e.is_timeout() && attempt < self.max_attempts => {
                    debug!(
                        "{category} timed out, attempt {attempt} of {}",
                        self.max_attempts
                    );
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nbe::frame::RequestFrame;
    use crate::nbe::NbeV13_1005;
    use crate::protocol::ProtocolId;
    use crate::transport::mock::{MockReply, MockTransport};

    fn exchange(transport: MockTransport) -> Exchange<MockTransport> {
        let options = Options::new(
            "",
            8483,
            "192.168.1.50",
            8483,
            ProtocolId::NbeV13_1005,
            "12345",
            "0123456789",
        )
        .unwrap();
        Exchange::new(options, Arc::new(NbeV13_1005::new()), transport)
    }

    fn sequences(transport: &MockTransport) -> Vec<[u8; 2]> {
        transport
            .requests()
            .iter()
            .map(|raw| RequestFrame::decode(raw).unwrap().sequence)
            .collect()
    }

    #[tokio::test]
    async fn test_send_and_receive_parses_payload() {
        let mut exchange = exchange(MockTransport::default());
        let response = exchange
            .send_and_receive(RequestCategory::SettingsBoiler)
            .await
            .unwrap();
        assert!(response.valid);
        assert_eq!(response.category, RequestCategory::SettingsBoiler);
        assert_eq!(response.payload.items[1].id, "diff_over");
    }

    #[tokio::test]
    async fn test_sequence_rolls_over() {
        let transport = MockTransport::default();
        let mut exchange = exchange(transport.clone()).with_sequence(98);
        for _ in 0..3 {
            exchange
                .send_and_receive(RequestCategory::OperatingData)
                .await
                .unwrap();
        }
        assert_eq!(sequences(&transport), vec![*b"98", *b"99", *b"00"]);
    }

    #[tokio::test]
    async fn test_mismatching_response_is_invalid_response() {
        let transport = MockTransport::default();
        transport.queue_reply(MockReply::WrongSequence);
        let mut exchange = exchange(transport);
        let err = exchange
            .send_and_receive(RequestCategory::OperatingData)
            .await
            .unwrap_err();
        assert!(matches!(err, PbmError::InvalidResponse(reason) if reason.contains("sequence")));
    }

    #[tokio::test]
    async fn test_truncated_response_is_data_access_error() {
        let transport = MockTransport::default();
        transport.queue_reply(MockReply::Raw(b"DeliciousABC12".to_vec()));
        let mut exchange = exchange(transport);
        let err = exchange
            .send_and_receive(RequestCategory::OperatingData)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::DataAccessError);
    }

    #[tokio::test]
    async fn test_discovery_retries_once_on_invalid_answer() {
        let transport = MockTransport::default();
        transport.queue_reply(MockReply::WrongSequence);
        let mut exchange = exchange(transport.clone());
        assert!(exchange.discover(true).await.unwrap());
        assert_eq!(transport.request_count(), 2);
    }

    #[tokio::test]
    async fn test_discovery_without_retry() {
        let transport = MockTransport::default();
        transport.set_payload(RequestCategory::Discovery, "");
        let mut exchange = exchange(transport.clone());
        assert!(!exchange.discover(false).await.unwrap());
        assert_eq!(transport.request_count(), 1);

        assert!(!exchange.discover(true).await.unwrap());
        assert_eq!(transport.request_count(), 3);
    }

    #[tokio::test]
    async fn test_discovery_propagates_transport_errors() {
        let transport = MockTransport::default();
        transport.queue_reply(MockReply::Error(PbmError::ErrorSending("unreachable".into())));
        let mut exchange = exchange(transport.clone());
        let err = exchange.discover(true).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::ErrorSending);
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn test_broadcast_discovery_is_unsupported() {
        let transport = MockTransport::default();
        let mut exchange = exchange(transport.clone());
        let err = exchange.discover_by_broadcast(true).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidRequest);
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_retry_does_not_apply_to_other_errors() {
        let transport = MockTransport::default();
        transport.queue_reply(MockReply::Error(PbmError::ErrorReceiving("reset".into())));
        let mut exchange = exchange(transport.clone());
        let err = exchange
            .get_data_with_retry(RequestCategory::OperatingData)
            .await
            .unwrap_err();
        assert_eq!(err, PbmError::ErrorReceiving("reset".into()));
        assert_eq!(transport.request_count(), 1);
    }
}
