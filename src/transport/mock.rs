//! Mock transport implementation for testing
//!
//! Answers requests in-process from a [`CannedBurner`] without touching the
//! network. Replies can be scripted ahead of time to inject timeouts, errors,
//! garbage datagrams or answers to the wrong request.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::PbmError;
use crate::nbe::category::RequestCategory;
use crate::nbe::frame::ResponseFrame;
use crate::simulator::CannedBurner;
use crate::transport::Transport;

/// How the mock answers one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockReply {
    /// Let the burner answer; a burner without an answer times out.
    Burner,
    /// Fail the exchange with the given error.
    Error(PbmError),
    /// Return these bytes verbatim.
    Raw(Vec<u8>),
    /// Let the burner answer, but with a sequence number of another request.
    WrongSequence,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Mock transport that records every request
#[derive(Clone)]
pub struct MockTransport {
    /// The simulated controller
    pub burner: Arc<Mutex<CannedBurner>>,
    /// Every request sent, in order
    pub requests: Arc<Mutex<Vec<Vec<u8>>>>,
    /// Scripted replies, consumed one per request before falling back to the burner
    pub script: Arc<Mutex<VecDeque<MockReply>>>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new(CannedBurner::with_defaults())
    }
}

impl MockTransport {
    pub fn new(burner: CannedBurner) -> Self {
        MockTransport {
            burner: Arc::new(Mutex::new(burner)),
            requests: Arc::new(Mutex::new(Vec::new())),
            script: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    /// Queue a reply for an upcoming request
    pub fn queue_reply(&self, reply: MockReply) {
        lock(&self.script).push_back(reply);
    }

    pub fn queue_timeouts(&self, count: usize) {
        for _ in 0..count {
            self.queue_reply(MockReply::Error(PbmError::Timeout));
        }
    }

    pub fn set_payload(&self, category: RequestCategory, payload: impl Into<String>) {
        lock(&self.burner).set_payload(category, payload);
    }

    pub fn remove_payload(&self, category: RequestCategory) {
        lock(&self.burner).remove_payload(category);
    }

    /// Get every request sent so far
    pub fn requests(&self) -> Vec<Vec<u8>> {
        lock(&self.requests).clone()
    }

    pub fn request_count(&self) -> usize {
        lock(&self.requests).len()
    }

    /// Forget recorded requests and pending scripted replies
    pub fn clear(&self) {
        lock(&self.requests).clear();
        lock(&self.script).clear();
    }

    fn burner_answer(&self, request: &[u8]) -> Result<Vec<u8>, PbmError> {
        lock(&self.burner).respond(request).ok_or(PbmError::Timeout)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn exchange(&mut self, request: &[u8]) -> Result<Vec<u8>, PbmError> {
        lock(&self.requests).push(request.to_vec());
        let reply = lock(&self.script).pop_front().unwrap_or(MockReply::Burner);
        match reply {
            MockReply::Burner => self.burner_answer(request),
            MockReply::Error(e) => Err(e),
            MockReply::Raw(bytes) => Ok(bytes),
            MockReply::WrongSequence => {
                let mut response = ResponseFrame::decode(&self.burner_answer(request)?)?;
                response.sequence = if response.sequence == *b"99" {
                    *b"00"
                } else {
                    *b"99"
                };
                response.encode()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nbe::frame::RequestFrame;

    fn request() -> Vec<u8> {
        RequestFrame::for_category(RequestCategory::OperatingData, "12345", "", 1, 1_600_000_000)
            .unwrap()
            .encode()
    }

    #[tokio::test]
    async fn test_answers_from_burner_and_records_requests() {
        let mut transport = MockTransport::default();
        let response = transport.exchange(&request()).await.unwrap();
        let frame = ResponseFrame::decode(&response).unwrap();
        assert!(String::from_utf8_lossy(&frame.payload).contains("state=5"));
        assert_eq!(transport.requests(), vec![request()]);
    }

    #[tokio::test]
    async fn test_scripted_replies_are_consumed_in_order() {
        let mut transport = MockTransport::default();
        transport.queue_timeouts(1);
        transport.queue_reply(MockReply::Raw(b"junk".to_vec()));

        assert_eq!(transport.exchange(&request()).await.unwrap_err(), PbmError::Timeout);
        assert_eq!(transport.exchange(&request()).await.unwrap(), b"junk".to_vec());
        assert!(transport.exchange(&request()).await.is_ok());
        assert_eq!(transport.request_count(), 3);
    }

    #[tokio::test]
    async fn test_missing_payload_times_out() {
        let mut transport = MockTransport::default();
        transport.remove_payload(RequestCategory::OperatingData);
        assert_eq!(transport.exchange(&request()).await.unwrap_err(), PbmError::Timeout);
    }

    #[tokio::test]
    async fn test_wrong_sequence() {
        let mut transport = MockTransport::default();
        transport.queue_reply(MockReply::WrongSequence);
        let response = transport.exchange(&request()).await.unwrap();
        assert_eq!(ResponseFrame::decode(&response).unwrap().sequence, *b"99");
    }
}
