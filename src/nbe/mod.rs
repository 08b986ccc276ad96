//! The nbe module contains the components of the NBE controller protocol:
//! the request category table, frame codec, payload parser, alarm table and the
//! [`BurnerProtocol`](crate::protocol::BurnerProtocol) implementation tying them
//! together.

pub mod alarm;
pub mod category;
pub mod frame;
pub mod payload;
pub mod protocol;

pub use alarm::{classify, classify_text, Alarm};
pub use category::{PayloadLayout, RequestCategory};
pub use frame::{validate_response, FrameField, RequestFrame, ResponseFrame};
pub use payload::{parse_indexed_list, parse_pair_list, parse_payload, ParsedPayload, ResponseItem};
pub use protocol::NbeV13_1005;
