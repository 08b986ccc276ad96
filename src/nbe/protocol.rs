//! # NBE V13 (firmware 1005) Protocol
//!
//! Ties the frame codec, payload parser and alarm table together behind the
//! [`BurnerProtocol`] trait.

use log::debug;

use crate::config::Options;
use crate::constants::NBE_V13_1005_PORT_CEILING;
use crate::error::PbmError;
use crate::nbe::alarm::{classify_text, Alarm};
use crate::nbe::category::RequestCategory;
use crate::nbe::frame::{validate_response, RequestFrame, ResponseFrame};
use crate::nbe::payload::{parse_payload, ParsedPayload};
use crate::protocol::{BurnerProtocol, ProtocolId};
use crate::snapshot::SnapshotSchema;

/// Categories fetched per polling cycle. Consumption per day/month/year and
/// the misc/alarm settings are defined but have no consumer.
const FETCH_PLAN: [RequestCategory; 6] = [
    RequestCategory::OperatingData,
    RequestCategory::AdvancedData,
    RequestCategory::ConsumptionHours,
    RequestCategory::SettingsHopper,
    RequestCategory::SettingsBoiler,
    RequestCategory::SettingsCleaning,
];

const SCHEMA: SnapshotSchema = SnapshotSchema {
    state: "state",
    substate: "substate",
    device_time: "time",
    device_time_hour_offset: 9,
    current_temperature: "boiler_temp",
    target_temperature: "boiler_setpoint",
    temperature_limit_above: "diff_over",
    temperature_limit_below: "diff_under",
    silo_contents: "content",
    silo_minimum_contents: "min_content",
    auger_consumption: "auger_consumption",
    cleaning_countdown: "trip_countdown",
    power_output_percent: "power_pct",
    power_output_kw: "power_kw",
    hourly_consumption_prefix: "total_hours",
};

/// The NBE V13 dialect with firmware build 1005.
#[allow(non_camel_case_types)]
#[derive(Debug, Default, Clone, Copy)]
pub struct NbeV13_1005;

impl NbeV13_1005 {
    pub fn new() -> Self {
        NbeV13_1005
    }
}

impl BurnerProtocol for NbeV13_1005 {
    fn id(&self) -> ProtocolId {
        ProtocolId::NbeV13_1005
    }

    fn local_port_ceiling(&self) -> u16 {
        NBE_V13_1005_PORT_CEILING
    }

    fn fetch_plan(&self) -> &'static [RequestCategory] {
        &FETCH_PLAN
    }

    fn snapshot_schema(&self) -> &'static SnapshotSchema {
        &SCHEMA
    }

    fn build_request(
        &self,
        category: RequestCategory,
        options: &Options,
        sequence: u16,
        timestamp: i64,
    ) -> Result<Vec<u8>, PbmError> {
        let frame = RequestFrame::for_category(
            category,
            options.serial(),
            options.password(),
            sequence,
            timestamp,
        )?;
        Ok(frame.encode())
    }

    fn validate(&self, request: &[u8], response: &[u8]) -> Result<(), PbmError> {
        let request = RequestFrame::decode(request)?;
        let response = ResponseFrame::decode(response)?;
        let mismatches = validate_response(&request, &response);
        if mismatches.is_empty() {
            return Ok(());
        }
        let fields: Vec<String> = mismatches.iter().map(ToString::to_string).collect();
        debug!("Response does not match request: {}", fields.join(", "));
        Err(PbmError::InvalidResponse(format!(
            "mismatching {}",
            fields.join(", ")
        )))
    }

    fn parse_response(
        &self,
        category: RequestCategory,
        response: &[u8],
    ) -> Result<ParsedPayload, PbmError> {
        let frame = ResponseFrame::decode(response)?;
        Ok(parse_payload(category, &frame.payload))
    }

    fn classify_alarm(&self, state: &str, substate: &str) -> Result<Alarm, PbmError> {
        classify_text(state, substate)
    }
}
