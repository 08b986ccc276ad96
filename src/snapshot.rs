//! # Snapshot
//!
//! The accumulated result of one polling cycle: every parsed item of every
//! fetched category, the validity of the cycle, the classified alarm and the
//! time the cycle completed. Typed accessors resolve item ids through the
//! protocol's [`SnapshotSchema`], so the snapshot itself is dialect agnostic.

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::Serialize;

use crate::error::PbmError;
use crate::nbe::alarm::Alarm;
use crate::nbe::category::RequestCategory;
use crate::nbe::payload::ResponseItem;

/// Item ids a protocol dialect uses for the values the snapshot exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotSchema {
    pub state: &'static str,
    pub substate: &'static str,
    pub device_time: &'static str,
    /// Byte offset of the two-digit hour inside the device time.
    pub device_time_hour_offset: usize,
    pub current_temperature: &'static str,
    pub target_temperature: &'static str,
    pub temperature_limit_above: &'static str,
    pub temperature_limit_below: &'static str,
    pub silo_contents: &'static str,
    pub silo_minimum_contents: &'static str,
    pub auger_consumption: &'static str,
    pub cleaning_countdown: &'static str,
    pub power_output_percent: &'static str,
    pub power_output_kw: &'static str,
    /// Hourly consumption items are named `<prefix><hour>`.
    pub hourly_consumption_prefix: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    items: Vec<ResponseItem>,
    valid: bool,
    alarm: Option<Alarm>,
    fetched_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    schema: &'static SnapshotSchema,
}

impl Snapshot {
    /// Starts an empty, not yet valid snapshot.
    pub fn new(schema: &'static SnapshotSchema) -> Self {
        Snapshot {
            items: Vec::new(),
            valid: false,
            alarm: None,
            fetched_at: None,
            schema,
        }
    }

    /// Appends the items of one exchange. Items are never removed or reordered.
    pub fn extend(&mut self, items: impl IntoIterator<Item = ResponseItem>) {
        self.items.extend(items);
    }

    pub fn set_alarm(&mut self, alarm: Alarm) {
        self.alarm = Some(alarm);
    }

    /// Closes the cycle.
    pub fn finish(&mut self, valid: bool, fetched_at: DateTime<Utc>) {
        self.valid = valid;
        self.fetched_at = Some(fetched_at);
    }

    pub fn items(&self) -> &[ResponseItem] {
        &self.items
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn alarm(&self) -> Option<&Alarm> {
        self.alarm.as_ref()
    }

    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        self.fetched_at
    }

    pub fn schema(&self) -> &'static SnapshotSchema {
        self.schema
    }

    /// Value of the first item named `id`, compared case-insensitively.
    pub fn value(&self, id: &str) -> Option<&str> {
        self.items
            .iter()
            .find(|item| item.id.eq_ignore_ascii_case(id))
            .map(|item| item.value.as_str())
    }

    /// Like [`value`](Self::value), restricted to items of one category.
    pub fn value_in(&self, category: RequestCategory, id: &str) -> Option<&str> {
        self.items
            .iter()
            .find(|item| item.group == category && item.id.eq_ignore_ascii_case(id))
            .map(|item| item.value.as_str())
    }

    fn number(&self, id: &str) -> Option<f64> {
        let raw = self.value(id)?;
        match raw.trim().parse::<f64>() {
            Ok(value) => Some(value),
            Err(_) => {
                debug!("Item {id} is not numeric: '{raw}'");
                None
            }
        }
    }

    pub fn current_temperature(&self) -> Option<f64> {
        self.number(self.schema.current_temperature)
    }

    pub fn target_temperature(&self) -> Option<f64> {
        self.number(self.schema.target_temperature)
    }

    /// Degrees above the target at which the burner stops.
    pub fn temperature_limit_above(&self) -> Option<f64> {
        self.number(self.schema.temperature_limit_above)
    }

    /// Degrees below the target at which the burner starts.
    pub fn temperature_limit_below(&self) -> Option<f64> {
        self.number(self.schema.temperature_limit_below)
    }

    pub fn silo_contents(&self) -> Option<f64> {
        self.number(self.schema.silo_contents)
    }

    pub fn silo_minimum_contents(&self) -> Option<f64> {
        self.number(self.schema.silo_minimum_contents)
    }

    pub fn auger_consumption(&self) -> Option<f64> {
        self.number(self.schema.auger_consumption)
    }

    /// Silo contents left before the ash tray needs cleaning.
    pub fn cleaning_countdown(&self) -> Option<f64> {
        self.number(self.schema.cleaning_countdown)
    }

    pub fn power_output_percent(&self) -> Option<f64> {
        self.number(self.schema.power_output_percent)
    }

    pub fn power_output_kw(&self) -> Option<f64> {
        self.number(self.schema.power_output_kw)
    }

    pub fn device_time(&self) -> Option<&str> {
        self.value(self.schema.device_time)
    }

    /// State reported with the operating data. Other categories are ignored.
    pub fn burner_state(&self) -> Option<&str> {
        self.value_in(RequestCategory::OperatingData, self.schema.state)
    }

    pub fn burner_substate(&self) -> Option<&str> {
        self.value_in(RequestCategory::OperatingData, self.schema.substate)
    }

    pub fn alarm_code(&self) -> Option<i32> {
        self.alarm.as_ref().map(|alarm| alarm.code)
    }

    pub fn alarm_text(&self) -> Option<&str> {
        self.alarm.as_ref().map(|alarm| alarm.text.as_str())
    }

    /// Whether the silo contents dropped below the configured minimum.
    ///
    /// Unparsable values leave the flag unset rather than failing the snapshot.
    pub fn refill_needed(&self) -> Option<bool> {
        let contents = self.value(self.schema.silo_contents)?;
        let minimum = self.value(self.schema.silo_minimum_contents)?;
        match (contents.trim().parse::<i64>(), minimum.trim().parse::<i64>()) {
            (Ok(contents), Ok(minimum)) => Some(contents < minimum),
            _ => {
                warn!(
                    "Unable to compare silo contents '{contents}' with minimum '{minimum}'"
                );
                None
            }
        }
    }

    /// Consumption of the full hour before the device's current hour: at
    /// 23:15 device time this is the 22:00-22:59 period.
    pub fn previous_hour_consumption(&self) -> Result<Option<f64>, PbmError> {
        let Some(time) = self.device_time() else {
            return Ok(None);
        };
        let offset = self.schema.device_time_hour_offset;
        let hour = time
            .get(offset..offset + 2)
            .and_then(|hour| hour.parse::<u32>().ok())
            .filter(|hour| *hour < 24)
            .ok_or_else(|| PbmError::UnableToDetermineTimeOfDay(time.to_string()))?;
        let previous = (hour + 23) % 24;
        Ok(self.number(&format!(
            "{}{previous}",
            self.schema.hourly_consumption_prefix
        )))
    }
}
