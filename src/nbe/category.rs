//! # Request Categories
//!
//! Each category of operating data the controller can be asked for maps to a
//! function code, a payload template and the layout its response payload uses.
//! The mapping is a static table rather than branching logic, so adding a
//! category means adding one row.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How the payload of a response to a given category is laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadLayout {
    /// `id1=value1;id2=value2;...`
    PairList,
    /// `id=value0,value1,...`, expanded to `id0`, `id1`, ...
    IndexedList,
    /// Declared by the protocol but not implemented.
    Unsupported,
}

/// The fixed set of request types understood by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestCategory {
    Discovery,
    DiscoveryBroadcast,
    OperatingData,
    AdvancedData,
    ConsumptionHours,
    ConsumptionDays,
    ConsumptionMonths,
    ConsumptionYears,
    SettingsHopper,
    SettingsBoiler,
    SettingsCleaning,
    SettingsMisc,
    SettingsAlarm,
}

/// One row of the category table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryEntry {
    pub category: RequestCategory,
    pub function_code: &'static str,
    pub payload: &'static str,
    pub layout: PayloadLayout,
}

const CATEGORY_TABLE: [CategoryEntry; 13] = [
    CategoryEntry {
        category: RequestCategory::Discovery,
        function_code: "00",
        payload: "NBE_DISCOVERY",
        layout: PayloadLayout::PairList,
    },
    CategoryEntry {
        category: RequestCategory::DiscoveryBroadcast,
        function_code: "00",
        payload: "NBE Discovery",
        layout: PayloadLayout::Unsupported,
    },
    CategoryEntry {
        category: RequestCategory::OperatingData,
        function_code: "04",
        payload: "*",
        layout: PayloadLayout::PairList,
    },
    CategoryEntry {
        category: RequestCategory::AdvancedData,
        function_code: "05",
        payload: "*",
        layout: PayloadLayout::PairList,
    },
    CategoryEntry {
        category: RequestCategory::ConsumptionHours,
        function_code: "06",
        payload: "total_hours",
        layout: PayloadLayout::IndexedList,
    },
    CategoryEntry {
        category: RequestCategory::ConsumptionDays,
        function_code: "06",
        payload: "total_days",
        layout: PayloadLayout::IndexedList,
    },
    CategoryEntry {
        category: RequestCategory::ConsumptionMonths,
        function_code: "06",
        payload: "total_months",
        layout: PayloadLayout::IndexedList,
    },
    CategoryEntry {
        category: RequestCategory::ConsumptionYears,
        function_code: "06",
        payload: "total_years",
        layout: PayloadLayout::IndexedList,
    },
    CategoryEntry {
        category: RequestCategory::SettingsHopper,
        function_code: "01",
        payload: "hopper.*",
        layout: PayloadLayout::PairList,
    },
    CategoryEntry {
        category: RequestCategory::SettingsBoiler,
        function_code: "01",
        payload: "boiler.*",
        layout: PayloadLayout::PairList,
    },
    CategoryEntry {
        category: RequestCategory::SettingsCleaning,
        function_code: "01",
        payload: "cleaning.*",
        layout: PayloadLayout::PairList,
    },
    CategoryEntry {
        category: RequestCategory::SettingsMisc,
        function_code: "01",
        payload: "misc.*",
        layout: PayloadLayout::PairList,
    },
    CategoryEntry {
        category: RequestCategory::SettingsAlarm,
        function_code: "01",
        payload: "alarm.*",
        layout: PayloadLayout::PairList,
    },
];

impl RequestCategory {
    pub const ALL: [RequestCategory; 13] = [
        RequestCategory::Discovery,
        RequestCategory::DiscoveryBroadcast,
        RequestCategory::OperatingData,
        RequestCategory::AdvancedData,
        RequestCategory::ConsumptionHours,
        RequestCategory::ConsumptionDays,
        RequestCategory::ConsumptionMonths,
        RequestCategory::ConsumptionYears,
        RequestCategory::SettingsHopper,
        RequestCategory::SettingsBoiler,
        RequestCategory::SettingsCleaning,
        RequestCategory::SettingsMisc,
        RequestCategory::SettingsAlarm,
    ];

    /// Looks up the table row for this category.
    pub fn entry(self) -> &'static CategoryEntry {
        // The table is ordered like `ALL`, so the discriminant is the index.
        &CATEGORY_TABLE[self as usize]
    }

    pub fn function_code(self) -> &'static str {
        self.entry().function_code
    }

    pub fn payload(self) -> &'static str {
        self.entry().payload
    }

    pub fn layout(self) -> PayloadLayout {
        self.entry().layout
    }

    /// Stable lowercase name, used as the group of parsed items.
    pub fn name(self) -> &'static str {
        match self {
            RequestCategory::Discovery => "discovery",
            RequestCategory::DiscoveryBroadcast => "discovery_broadcast",
            RequestCategory::OperatingData => "operating_data",
            RequestCategory::AdvancedData => "advanced_data",
            RequestCategory::ConsumptionHours => "consumption_hours",
            RequestCategory::ConsumptionDays => "consumption_days",
            RequestCategory::ConsumptionMonths => "consumption_months",
            RequestCategory::ConsumptionYears => "consumption_years",
            RequestCategory::SettingsHopper => "settings_hopper",
            RequestCategory::SettingsBoiler => "settings_boiler",
            RequestCategory::SettingsCleaning => "settings_cleaning",
            RequestCategory::SettingsMisc => "settings_misc",
            RequestCategory::SettingsAlarm => "settings_alarm",
        }
    }
}

impl fmt::Display for RequestCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
