// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Parsers for Zendure property reports.
//!
//! Hubs publish their state on `<appKey>/<deviceKey>/properties/report`
//! (and echo written values on `.../properties/reply`). Both carry the
//! same JSON shape: a `properties` object with scalar values plus an
//! optional `packData` array with per-pack readings. This module turns
//! those payloads into [`StateChange`] lists.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::state::StateChange;
use crate::types::{AcMode, WorkState};

/// Kelvin offset for pack temperatures, which are reported in deci-Kelvin.
const KELVIN_OFFSET: f32 = 273.15;

/// A `properties/report` (or `properties/reply`) payload.
///
/// # Examples
///
/// ```
/// use zendure_link::telemetry::PropertyReport;
///
/// let json = r#"{"properties":{"electricLevel":47,"solarInputPower":310}}"#;
/// let report: PropertyReport = serde_json::from_str(json).unwrap();
/// let changes = report.to_state_changes();
/// assert_eq!(changes.len(), 2);
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PropertyReport {
    /// Unix timestamp of the report, if the hub includes one.
    #[serde(default)]
    timestamp: Option<i64>,

    /// Scalar hub properties.
    #[serde(default)]
    properties: Option<ReportedProperties>,

    /// Per-pack readings.
    #[serde(rename = "packData", default)]
    pack_data: Vec<PackReport>,
}

/// Scalar properties of a hub report.
///
/// Unknown fields are ignored so firmware additions don't break parsing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportedProperties {
    /// State of charge of the whole system (percent).
    #[serde(rename = "electricLevel", default)]
    electric_level: Option<u8>,

    /// Solar input power in Watts.
    #[serde(rename = "solarInputPower", default)]
    solar_input_power: Option<u16>,

    /// Power delivered to the home in Watts.
    #[serde(rename = "outputHomePower", default)]
    output_home_power: Option<u16>,

    /// Power drawn from the packs in Watts.
    #[serde(rename = "packInputPower", default)]
    pack_input_power: Option<u16>,

    /// Power charged into the packs in Watts.
    #[serde(rename = "outputPackPower", default)]
    output_pack_power: Option<u16>,

    /// Configured output limit in Watts.
    #[serde(rename = "outputLimit", default)]
    output_limit: Option<u16>,

    /// Configured input limit in Watts.
    #[serde(rename = "inputLimit", default)]
    input_limit: Option<u16>,

    /// AC mode (1 = input, 2 = output).
    #[serde(rename = "acMode", default)]
    ac_mode: Option<u8>,

    /// Smart matching mode (0/1).
    #[serde(rename = "smartMode", default)]
    smart_mode: Option<u8>,

    /// Hub working state (0 = standby, 1 = charging, 2 = discharging).
    #[serde(rename = "packState", default)]
    pack_state: Option<u8>,

    /// Charge ceiling in tenths of a percent (e.g. 1000 = 100%).
    #[serde(rename = "socSet", default)]
    soc_set: Option<u16>,

    /// Discharge floor in tenths of a percent.
    #[serde(rename = "minSoc", default)]
    min_soc: Option<u16>,
}

/// A single entry of the `packData` array.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PackReport {
    /// Pack serial number.
    #[serde(rename = "sn", default)]
    sn: Option<String>,

    /// State of charge in percent.
    #[serde(rename = "socLevel", default)]
    soc_level: Option<u8>,

    /// Power in Watts, positive while charging.
    #[serde(default)]
    power: Option<i32>,

    /// Highest cell temperature in deci-Kelvin (e.g. 2981 = 24.95 °C).
    #[serde(rename = "maxTemp", default)]
    max_temp: Option<u32>,

    /// Working state (0 = standby, 1 = charging, 2 = discharging).
    #[serde(default)]
    state: Option<u8>,
}

impl PropertyReport {
    /// Returns the report timestamp, if present and valid.
    #[must_use]
    pub fn reported_at(&self) -> Option<DateTime<Utc>> {
        self.timestamp.and_then(|ts| DateTime::from_timestamp(ts, 0))
    }

    /// Converts the report into a list of state changes.
    ///
    /// Fields absent from the payload produce no change; fields with wire
    /// values that don't decode (unknown mode numbers) are skipped.
    #[must_use]
    pub fn to_state_changes(&self) -> Vec<StateChange> {
        let mut changes = Vec::new();

        if let Some(props) = &self.properties {
            if let Some(v) = props.electric_level {
                changes.push(StateChange::ElectricLevel(v));
            }
            if let Some(v) = props.solar_input_power {
                changes.push(StateChange::SolarInput(v));
            }
            if let Some(v) = props.output_home_power {
                changes.push(StateChange::HomeOutput(v));
            }
            if let Some(v) = props.pack_input_power {
                changes.push(StateChange::PackInput(v));
            }
            if let Some(v) = props.output_pack_power {
                changes.push(StateChange::PackOutput(v));
            }
            if let Some(v) = props.output_limit {
                changes.push(StateChange::OutputLimit(v));
            }
            if let Some(v) = props.input_limit {
                changes.push(StateChange::InputLimit(v));
            }
            if let Some(mode) = props.ac_mode.and_then(AcMode::from_wire) {
                changes.push(StateChange::AcMode(mode));
            }
            if let Some(v) = props.smart_mode {
                changes.push(StateChange::SmartMode(v != 0));
            }
            if let Some(state) = props.pack_state.and_then(WorkState::from_wire) {
                changes.push(StateChange::WorkState(state));
            }
            if let Some(v) = props.soc_set {
                changes.push(StateChange::MaxSoc(tenths_to_percent(v)));
            }
            if let Some(v) = props.min_soc {
                changes.push(StateChange::MinSoc(tenths_to_percent(v)));
            }
        }

        for pack in &self.pack_data {
            // Entries without a serial can't be attributed to a pack
            let Some(serial) = &pack.sn else {
                continue;
            };
            changes.push(StateChange::Pack {
                serial: serial.clone(),
                soc: pack.soc_level,
                power: pack.power,
                temperature: pack.max_temp.map(deci_kelvin_to_celsius),
                state: pack.state.and_then(WorkState::from_wire),
            });
        }

        changes
    }
}

/// Converts tenths of a percent (0-1000) to percent, clamped to 100.
fn tenths_to_percent(tenths: u16) -> u8 {
    u8::try_from(tenths / 10).map_or(100, |v| v.min(100))
}

/// Converts a deci-Kelvin reading to degrees Celsius.
#[allow(clippy::cast_precision_loss)]
fn deci_kelvin_to_celsius(deci_kelvin: u32) -> f32 {
    deci_kelvin as f32 / 10.0 - KELVIN_OFFSET
}
