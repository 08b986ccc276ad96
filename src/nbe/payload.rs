//! # Payload Parsing
//!
//! Turns the payload section of a response into an ordered list of
//! [`ResponseItem`]s. Two layouts exist:
//!
//! - pair lists, `id1=value1;id2=value2`, used by operating, advanced and
//!   settings data
//! - indexed lists, `id=v0,v1,v2`, used by the consumption queries and expanded
//!   into `id0=v0`, `id1=v1`, ...
//!
//! Malformed pair-list segments are skipped and reported in
//! [`ParsedPayload::skipped`] rather than failing the whole payload; the
//! controller occasionally truncates the last field of a long payload.

use crate::constants::{PAYLOAD_ITEM_SEPARATOR, PAYLOAD_LIST_SEPARATOR, PAYLOAD_VALUE_PAIR_SEPARATOR};
use crate::nbe::category::{PayloadLayout, RequestCategory};
use log::warn;
use serde::Serialize;
use std::fmt;

/// One parsed value. `group` tells which category produced it, since ids are
/// only unique within a category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResponseItem {
    pub group: RequestCategory,
    pub id: String,
    pub value: String,
}

impl ResponseItem {
    pub fn new(group: RequestCategory, id: impl Into<String>, value: impl Into<String>) -> Self {
        ResponseItem {
            group,
            id: id.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for ResponseItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}={}", self.group, self.id, self.value)
    }
}

/// Result of parsing one payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedPayload {
    pub items: Vec<ResponseItem>,
    /// Segments that could not be turned into items.
    pub skipped: Vec<String>,
}

impl ParsedPayload {
    /// A payload counts as parsed when it produced at least one item.
    pub fn is_success(&self) -> bool {
        !self.items.is_empty()
    }
}

/// Parses `payload` with the layout the category's responses use.
pub fn parse_payload(category: RequestCategory, payload: &[u8]) -> ParsedPayload {
    let text = String::from_utf8_lossy(payload);
    match category.layout() {
        PayloadLayout::PairList => parse_pair_list(category, &text),
        PayloadLayout::IndexedList => parse_indexed_list(category, &text),
        PayloadLayout::Unsupported => ParsedPayload {
            items: Vec::new(),
            skipped: vec![text.into_owned()],
        },
    }
}

/// Parses `id1=value1;id2=value2;...`.
///
/// Empty segments (such as the one after a trailing `;`) are ignored. Segments
/// that do not contain exactly one `=` are skipped and reported.
pub fn parse_pair_list(group: RequestCategory, payload: &str) -> ParsedPayload {
    let mut parsed = ParsedPayload::default();
    for segment in payload.split(PAYLOAD_ITEM_SEPARATOR) {
        if segment.is_empty() {
            continue;
        }
        let mut parts = segment.split(PAYLOAD_VALUE_PAIR_SEPARATOR);
        match (parts.next(), parts.next(), parts.next()) {
            (Some(id), Some(value), None) => parsed.items.push(ResponseItem::new(group, id, value)),
            _ => {
                warn!("Skipping malformed {group} field '{segment}'");
                parsed.skipped.push(segment.to_string());
            }
        }
    }
    parsed
}

/// Parses `id=v0,v1,...` into items `id0=v0`, `id1=v1`, ...
///
/// Produces no items when the payload does not split into exactly one id and
/// one non-empty value list.
pub fn parse_indexed_list(group: RequestCategory, payload: &str) -> ParsedPayload {
    let mut parsed = ParsedPayload::default();
    if payload.is_empty() {
        return parsed;
    }
    let fields: Vec<&str> = payload.split(PAYLOAD_VALUE_PAIR_SEPARATOR).collect();
    let [id, values] = fields.as_slice() else {
        warn!("Malformed {group} list '{payload}'");
        parsed.skipped.push(payload.to_string());
        return parsed;
    };
    if values.is_empty() {
        warn!("Empty {group} list '{payload}'");
        parsed.skipped.push(payload.to_string());
        return parsed;
    }
    parsed.items = values
        .split(PAYLOAD_LIST_SEPARATOR)
        .enumerate()
        .map(|(index, value)| ResponseItem::new(group, format!("{id}{index}"), value))
        .collect();
    parsed
}

#[cfg(test)]
mod tests {
    use super::*;

    const OP: RequestCategory = RequestCategory::OperatingData;
    const HOURS: RequestCategory = RequestCategory::ConsumptionHours;

    fn pairs(parsed: &ParsedPayload) -> Vec<(&str, &str)> {
        parsed
            .items
            .iter()
            .map(|i| (i.id.as_str(), i.value.as_str()))
            .collect()
    }

    #[test]
    fn test_pair_list() {
        let parsed = parse_pair_list(OP, "a=1;b=2;c=3");
        assert_eq!(pairs(&parsed), vec![("a", "1"), ("b", "2"), ("c", "3")]);
        assert!(parsed.items.iter().all(|i| i.group == OP));
        assert!(parsed.skipped.is_empty());
        assert!(parsed.is_success());
    }

    #[test]
    fn test_pair_list_empty_payload_fails() {
        let parsed = parse_pair_list(OP, "");
        assert!(!parsed.is_success());
        assert!(parsed.skipped.is_empty());
    }

    #[test]
    fn test_pair_list_skips_malformed_fields() {
        let parsed = parse_pair_list(OP, "a=1;garbage;b=2;c=3=4;d=");
        assert_eq!(pairs(&parsed), vec![("a", "1"), ("b", "2"), ("d", "")]);
        assert_eq!(parsed.skipped, vec!["garbage".to_string(), "c=3=4".to_string()]);
    }

    #[test]
    fn test_pair_list_ignores_trailing_separator() {
        let parsed = parse_pair_list(OP, "a=1;");
        assert_eq!(pairs(&parsed), vec![("a", "1")]);
        assert!(parsed.skipped.is_empty());
    }

    #[test]
    fn test_indexed_list() {
        let parsed = parse_indexed_list(HOURS, "total_hours=5,10,15");
        assert_eq!(
            pairs(&parsed),
            vec![("total_hours0", "5"), ("total_hours1", "10"), ("total_hours2", "15")]
        );
        assert!(parsed.items.iter().all(|i| i.group == HOURS));
    }

    #[test]
    fn test_indexed_list_requires_single_separator() {
        assert!(!parse_indexed_list(HOURS, "total_hours5,10").is_success());
        assert!(!parse_indexed_list(HOURS, "a=1=2").is_success());
        assert!(!parse_indexed_list(HOURS, "").is_success());

        let parsed = parse_indexed_list(HOURS, "total_hours=");
        assert!(!parsed.is_success());
        assert_eq!(parsed.skipped, vec!["total_hours=".to_string()]);
    }

    #[test]
    fn test_parse_payload_dispatches_on_layout() {
        let parsed = parse_payload(HOURS, b"total_days=1,2");
        assert_eq!(pairs(&parsed), vec![("total_days0", "1"), ("total_days1", "2")]);

        let parsed = parse_payload(RequestCategory::SettingsBoiler, b"temp=65;diff_over=5");
        assert_eq!(pairs(&parsed), vec![("temp", "65"), ("diff_over", "5")]);

        let parsed = parse_payload(RequestCategory::DiscoveryBroadcast, b"a=1");
        assert!(!parsed.is_success());
    }

    #[test]
    fn test_item_display() {
        let item = ResponseItem::new(OP, "state", "5");
        assert_eq!(item.to_string(), "operating_data: state=5");
    }
}
