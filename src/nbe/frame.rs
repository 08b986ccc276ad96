//! # NBE Frame Codec
//!
//! This module encodes requests into, and decodes responses from, the fixed-layout
//! frames exchanged with NBE V13 pellet burner controllers over UDP. The frames are
//! a text/binary hybrid: all fields are ASCII except the start and end markers.
//!
//! ## Request layout
//!
//! | field         | bytes | notes                                  |
//! |---------------|-------|----------------------------------------|
//! | app-id        | 12    | `DeliciousABC`                         |
//! | serial        | 6     | zero-padded                            |
//! | encryption    | 1     | `' '` (none)                           |
//! | start         | 1     | `0x02`                                 |
//! | function code | 2     | decimal text                           |
//! | sequence      | 2     | decimal text                           |
//! | password      | 10    | zero-padded                            |
//! | timestamp     | 10    | unix seconds as decimal text           |
//! | extra         | 4     | `extr`                                 |
//! | payload size  | 3     | decimal text, zero-padded              |
//! | payload       | n     |                                        |
//! | end           | 1     | `0x04`                                 |
//!
//! ## Response layout
//!
//! app-id `[0,12)`, serial `[12,18)`, start `18`, function code `[19,21)`,
//! sequence `[21,23)`, response code `23`, payload size `[24,27)`, payload
//! `[27,27+n)` and the end marker at `27+n`.
//!
//! Decoding uses `nom` on the received bytes only. A datagram that is too short
//! for a field yields [`PbmError::DataAccessError`]; a payload size that is not
//! decimal text yields [`PbmError::InvalidResponse`].

use crate::constants::{
    NBE_APP_ID, NBE_APP_ID_LEN, NBE_ENCRYPTION_NONE, NBE_END_MARKER, NBE_EXTRA, NBE_EXTRA_LEN,
    NBE_FUNCTION_CODE_LEN, NBE_MAX_PAYLOAD_LEN, NBE_PASSWORD_LEN, NBE_PAYLOAD_LEN_DIGITS,
    NBE_SEQUENCE_LEN, NBE_SERIAL_LEN, NBE_START_MARKER,
    NBE_TIMESTAMP_LEN,
};
use crate::error::PbmError;
use crate::nbe::category::{PayloadLayout, RequestCategory};
use bytes::{BufMut, BytesMut};
use nom::bytes::complete::take;
use nom::number::complete::be_u8;
use std::fmt;

/// A request frame ready to be sent to the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestFrame {
    pub app_id: [u8; NBE_APP_ID_LEN],
    pub serial: [u8; NBE_SERIAL_LEN],
    pub encryption: u8,
    pub start: u8,
    pub function_code: [u8; NBE_FUNCTION_CODE_LEN],
    pub sequence: [u8; NBE_SEQUENCE_LEN],
    pub password: [u8; NBE_PASSWORD_LEN],
    pub timestamp: [u8; NBE_TIMESTAMP_LEN],
    pub extra: [u8; NBE_EXTRA_LEN],
    pub payload: Vec<u8>,
    pub end: u8,
}

/// A response frame as received from the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseFrame {
    pub app_id: [u8; NBE_APP_ID_LEN],
    pub serial: [u8; NBE_SERIAL_LEN],
    pub start: u8,
    pub function_code: [u8; NBE_FUNCTION_CODE_LEN],
    pub sequence: [u8; NBE_SEQUENCE_LEN],
    pub response_code: u8,
    pub payload: Vec<u8>,
    pub end: u8,
}

/// The response fields that must echo the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameField {
    AppId,
    Serial,
    StartMarker,
    FunctionCode,
    SequenceNumber,
    EndMarker,
}

impl fmt::Display for FrameField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FrameField::AppId => "app-id",
            FrameField::Serial => "serial",
            FrameField::StartMarker => "start marker",
            FrameField::FunctionCode => "function code",
            FrameField::SequenceNumber => "sequence number",
            FrameField::EndMarker => "end marker",
        };
        f.write_str(name)
    }
}

/// Renders `text` into a fixed-width field the way the controller expects:
/// at most `N` characters, left-padded, with every space turned into `'0'`.
fn fixed_width<const N: usize>(text: &str, field: &str) -> Result<[u8; N], PbmError> {
    if !text.is_ascii() {
        return Err(PbmError::InvalidRequest(format!(
            "{field} must be ASCII text"
        )));
    }
    let truncated = &text.as_bytes()[..text.len().min(N)];
    let mut out = [b'0'; N];
    let pad = N - truncated.len();
    for (slot, byte) in out[pad..].iter_mut().zip(truncated) {
        *slot = if *byte == b' ' { b'0' } else { *byte };
    }
    Ok(out)
}

/// Copies exactly `N` bytes of decimal text into an array.
fn decimal_field<const N: usize>(value: u64, field: &str) -> Result<[u8; N], PbmError> {
    let width = N;
    let text = format!("{value:0width$}");
    text.as_bytes().try_into().map_err(|_| {
        PbmError::InvalidRequest(format!("{field} {value} does not fit {N} digits"))
    })
}

impl RequestFrame {
    /// Builds a request frame from its variable parts.
    pub fn new(
        function_code: &str,
        payload: &str,
        serial: &str,
        password: &str,
        sequence: u16,
        timestamp: i64,
    ) -> Result<Self, PbmError> {
        let function_code: [u8; NBE_FUNCTION_CODE_LEN] =
            function_code.as_bytes().try_into().map_err(|_| {
                PbmError::InvalidRequest(format!("function code '{function_code}' is not 2 bytes"))
            })?;
        if payload.len() > NBE_MAX_PAYLOAD_LEN {
            return Err(PbmError::InvalidRequest(format!(
                "payload of {} bytes exceeds {NBE_MAX_PAYLOAD_LEN}",
                payload.len()
            )));
        }
        let timestamp = u64::try_from(timestamp)
            .map_err(|_| PbmError::InvalidRequest(format!("negative timestamp {timestamp}")))?;

        Ok(RequestFrame {
            app_id: *NBE_APP_ID,
            serial: fixed_width(serial, "serial")?,
            encryption: NBE_ENCRYPTION_NONE,
            start: NBE_START_MARKER,
            function_code,
            sequence: decimal_field(u64::from(sequence % 100), "sequence number")?,
            password: fixed_width(password, "password")?,
            timestamp: decimal_field(timestamp, "timestamp")?,
            extra: *NBE_EXTRA,
            payload: payload.as_bytes().to_vec(),
            end: NBE_END_MARKER,
        })
    }

    /// Builds the request for a category from the category table.
    pub fn for_category(
        category: RequestCategory,
        serial: &str,
        password: &str,
        sequence: u16,
        timestamp: i64,
    ) -> Result<Self, PbmError> {
        let entry = category.entry();
        if entry.layout == PayloadLayout::Unsupported {
            return Err(PbmError::InvalidRequest(format!(
                "{category} requests are not implemented"
            )));
        }
        Self::new(
            entry.function_code,
            entry.payload,
            serial,
            password,
            sequence,
            timestamp,
        )
    }

    /// Serializes the frame into its on-wire representation.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(52 + self.payload.len());
        buf.put_slice(&self.app_id);
        buf.put_slice(&self.serial);
        buf.put_u8(self.encryption);
        buf.put_u8(self.start);
        buf.put_slice(&self.function_code);
        buf.put_slice(&self.sequence);
        buf.put_slice(&self.password);
        buf.put_slice(&self.timestamp);
        buf.put_slice(&self.extra);
        buf.put_slice(format!("{:03}", self.payload.len()).as_bytes());
        buf.put_slice(&self.payload);
        buf.put_u8(self.end);
        buf.to_vec()
    }

    /// Parses a request frame. Used by the simulator to answer requests.
    pub fn decode(input: &[u8]) -> Result<Self, PbmError> {
        let mut cursor = Cursor::new(input);
        let app_id = cursor.array::<NBE_APP_ID_LEN>()?;
        let serial = cursor.array::<NBE_SERIAL_LEN>()?;
        let encryption = cursor.byte()?;
        let start = cursor.byte()?;
        let function_code = cursor.array::<NBE_FUNCTION_CODE_LEN>()?;
        let sequence = cursor.array::<NBE_SEQUENCE_LEN>()?;
        let password = cursor.array::<NBE_PASSWORD_LEN>()?;
        let timestamp = cursor.array::<NBE_TIMESTAMP_LEN>()?;
        let extra = cursor.array::<NBE_EXTRA_LEN>()?;
        let payload_len = cursor.payload_len()?;
        let payload = cursor.bytes(payload_len)?.to_vec();
        let end = cursor.byte()?;

        Ok(RequestFrame {
            app_id,
            serial,
            encryption,
            start,
            function_code,
            sequence,
            password,
            timestamp,
            extra,
            payload,
            end,
        })
    }

    pub fn function_code_str(&self) -> String {
        String::from_utf8_lossy(&self.function_code).into_owned()
    }

    pub fn payload_str(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

impl ResponseFrame {
    /// Builds a response that echoes the identifying fields of `request`.
    pub fn echoing(request: &RequestFrame, response_code: u8, payload: &[u8]) -> Self {
        ResponseFrame {
            app_id: request.app_id,
            serial: request.serial,
            start: request.start,
            function_code: request.function_code,
            sequence: request.sequence,
            response_code,
            payload: payload.to_vec(),
            end: request.end,
        }
    }

    /// Serializes the frame. Fails when the payload does not fit the size field.
    pub fn encode(&self) -> Result<Vec<u8>, PbmError> {
        if self.payload.len() > NBE_MAX_PAYLOAD_LEN {
            return Err(PbmError::InvalidResponse(format!(
                "payload of {} bytes exceeds {NBE_MAX_PAYLOAD_LEN}",
                self.payload.len()
            )));
        }
        let mut buf = BytesMut::with_capacity(28 + self.payload.len());
        buf.put_slice(&self.app_id);
        buf.put_slice(&self.serial);
        buf.put_u8(self.start);
        buf.put_slice(&self.function_code);
        buf.put_slice(&self.sequence);
        buf.put_u8(self.response_code);
        buf.put_slice(format!("{:03}", self.payload.len()).as_bytes());
        buf.put_slice(&self.payload);
        buf.put_u8(self.end);
        Ok(buf.to_vec())
    }

    /// Parses a response datagram at the fixed offsets of the response layout.
    pub fn decode(input: &[u8]) -> Result<Self, PbmError> {
        let mut cursor = Cursor::new(input);
        let app_id = cursor.array::<NBE_APP_ID_LEN>()?;
        let serial = cursor.array::<NBE_SERIAL_LEN>()?;
        let start = cursor.byte()?;
        let function_code = cursor.array::<NBE_FUNCTION_CODE_LEN>()?;
        let sequence = cursor.array::<NBE_SEQUENCE_LEN>()?;
        let response_code = cursor.byte()?;
        let payload_len = cursor.payload_len()?;
        let payload = cursor.bytes(payload_len)?.to_vec();
        let end = cursor.byte()?;

        Ok(ResponseFrame {
            app_id,
            serial,
            start,
            function_code,
            sequence,
            response_code,
            payload,
            end,
        })
    }
}

/// Compares every identifying field of a response against its request and
/// returns the ones that differ. An empty list means the response is valid.
pub fn validate_response(request: &RequestFrame, response: &ResponseFrame) -> Vec<FrameField> {
    let checks = [
        (FrameField::AppId, request.app_id == response.app_id),
        (FrameField::Serial, request.serial == response.serial),
        (FrameField::StartMarker, request.start == response.start),
        (
            FrameField::FunctionCode,
            request.function_code == response.function_code,
        ),
        (
            FrameField::SequenceNumber,
            request.sequence == response.sequence,
        ),
        (FrameField::EndMarker, request.end == response.end),
    ];
    checks
        .into_iter()
        .filter(|(_, matches)| !matches)
        .map(|(field, _)| field)
        .collect()
}

/// Offset-tracking wrapper around the nom primitives so that a short datagram
/// reports where it ran out.
struct Cursor<'a> {
    input: &'a [u8],
    offset: usize,
}

impl<'a> Cursor<'a> {
    fn new(input: &'a [u8]) -> Self {
        Cursor { input, offset: 0 }
    }

    fn bytes(&mut self, len: usize) -> Result<&'a [u8], PbmError> {
        let (rest, taken) = take::<usize, &[u8], nom::error::Error<&[u8]>>(len)(self.input)
            .map_err(|_| PbmError::DataAccessError {
                offset: self.offset,
                len,
            })?;
        self.input = rest;
        self.offset += len;
        Ok(taken)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], PbmError> {
        let offset = self.offset;
        self.bytes(N)?
            .try_into()
            .map_err(|_| PbmError::DataAccessError { offset, len: N })
    }

    fn byte(&mut self) -> Result<u8, PbmError> {
        let (rest, value) = be_u8::<&[u8], nom::error::Error<&[u8]>>(self.input).map_err(|_| {
            PbmError::DataAccessError {
                offset: self.offset,
                len: 1,
            }
        })?;
        self.input = rest;
        self.offset += 1;
        Ok(value)
    }

    fn payload_len(&mut self) -> Result<usize, PbmError> {
        let digits = self.array::<NBE_PAYLOAD_LEN_DIGITS>()?;
        if !digits.iter().all(u8::is_ascii_digit) {
            return Err(PbmError::InvalidResponse(format!(
                "payload size '{}' is not decimal",
                String::from_utf8_lossy(&digits)
            )));
        }
        digits
            .iter()
            .try_fold(0usize, |acc, d| acc.checked_mul(10)?.checked_add(usize::from(d - b'0')))
            .ok_or_else(|| PbmError::InvalidResponse("payload size overflow".into()))
    }
}
