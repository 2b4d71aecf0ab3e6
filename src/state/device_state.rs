// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device state cache.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::types::{AcMode, PackState, WorkState};

use super::StateChange;

/// Tracked state of a Zendure hub.
///
/// This struct holds the last known state of a device: power flows, charge
/// levels, configured limits, and per-pack sub-states. All fields are
/// optional because state is unknown until the device reports it.
///
/// # Examples
///
/// ```
/// use zendure_link::state::{DeviceState, StateChange};
///
/// let mut state = DeviceState::new();
/// state.apply(&StateChange::ElectricLevel(72));
/// assert_eq!(state.electric_level(), Some(72));
/// ```
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DeviceState {
    /// State of charge of the whole system (percent).
    electric_level: Option<u8>,
    /// Solar input power in Watts.
    solar_input: Option<u16>,
    /// Power delivered to the home in Watts.
    home_output: Option<u16>,
    /// Power drawn from the packs in Watts.
    pack_input: Option<u16>,
    /// Power charged into the packs in Watts.
    pack_output: Option<u16>,
    /// Configured output limit in Watts.
    output_limit: Option<u16>,
    /// Configured input limit in Watts.
    input_limit: Option<u16>,
    /// AC mode.
    ac_mode: Option<AcMode>,
    /// Smart matching mode.
    smart_mode: Option<bool>,
    /// Hub working state.
    work_state: Option<WorkState>,
    /// Charge ceiling (percent).
    max_soc: Option<u8>,
    /// Discharge floor (percent).
    min_soc: Option<u8>,
    /// Battery packs keyed by serial number.
    packs: BTreeMap<String, PackState>,
    /// Timestamp of the last report that touched this state.
    last_report: Option<DateTime<Utc>>,
}

impl DeviceState {
    /// Creates a new empty device state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// State of charge of the whole system (percent).
    #[must_use]
    pub fn electric_level(&self) -> Option<u8> {
        self.electric_level
    }

    /// Solar input power in Watts.
    #[must_use]
    pub fn solar_input(&self) -> Option<u16> {
        self.solar_input
    }

    /// Power delivered to the home in Watts.
    #[must_use]
    pub fn home_output(&self) -> Option<u16> {
        self.home_output
    }

    /// Power drawn from the packs in Watts.
    #[must_use]
    pub fn pack_input(&self) -> Option<u16> {
        self.pack_input
    }

    /// Power charged into the packs in Watts.
    #[must_use]
    pub fn pack_output(&self) -> Option<u16> {
        self.pack_output
    }

    /// Configured output limit in Watts.
    #[must_use]
    pub fn output_limit(&self) -> Option<u16> {
        self.output_limit
    }

    /// Configured input limit in Watts.
    #[must_use]
    pub fn input_limit(&self) -> Option<u16> {
        self.input_limit
    }

    /// AC mode.
    #[must_use]
    pub fn ac_mode(&self) -> Option<AcMode> {
        self.ac_mode
    }

    /// Smart matching mode.
    #[must_use]
    pub fn smart_mode(&self) -> Option<bool> {
        self.smart_mode
    }

    /// Hub working state.
    #[must_use]
    pub fn work_state(&self) -> Option<WorkState> {
        self.work_state
    }

    /// Charge ceiling (percent).
    #[must_use]
    pub fn max_soc(&self) -> Option<u8> {
        self.max_soc
    }

    /// Discharge floor (percent).
    #[must_use]
    pub fn min_soc(&self) -> Option<u8> {
        self.min_soc
    }

    /// Returns the state of a pack by serial number.
    #[must_use]
    pub fn pack(&self, serial: &str) -> Option<&PackState> {
        self.packs.get(serial)
    }

    /// Returns all known packs as (serial, state) pairs.
    pub fn packs(&self) -> impl Iterator<Item = (&str, &PackState)> {
        self.packs.iter().map(|(sn, p)| (sn.as_str(), p))
    }

    /// Number of packs that have reported.
    #[must_use]
    pub fn pack_count(&self) -> usize {
        self.packs.len()
    }

    /// Timestamp of the last report that touched this state.
    #[must_use]
    pub fn last_report(&self) -> Option<DateTime<Utc>> {
        self.last_report
    }

    /// Records the time of the report currently being applied.
    ///
    /// Kept separate from [`apply`](Self::apply) so that a report carrying
    /// only already-known values still counts as device liveness.
    pub fn mark_reported(&mut self, at: DateTime<Utc>) {
        self.last_report = Some(at);
    }

    /// Returns `true` if the hub has reported at least once.
    #[must_use]
    pub fn has_reported(&self) -> bool {
        self.last_report.is_some()
    }

    /// Applies a state change and returns whether the state actually changed.
    ///
    /// # Returns
    ///
    /// Returns `true` if the state was modified, `false` if it was already
    /// at the target value.
    pub fn apply(&mut self, change: &StateChange) -> bool {
        // Helper macro for optional scalar fields
        macro_rules! set_if_changed {
            ($field:ident, $value:expr) => {{
                if self.$field == Some(*$value) {
                    false
                } else {
                    self.$field = Some(*$value);
                    true
                }
            }};
        }

        match change {
            StateChange::ElectricLevel(v) => set_if_changed!(electric_level, v),
            StateChange::SolarInput(v) => set_if_changed!(solar_input, v),
            StateChange::HomeOutput(v) => set_if_changed!(home_output, v),
            StateChange::PackInput(v) => set_if_changed!(pack_input, v),
            StateChange::PackOutput(v) => set_if_changed!(pack_output, v),
            StateChange::OutputLimit(v) => set_if_changed!(output_limit, v),
            StateChange::InputLimit(v) => set_if_changed!(input_limit, v),
            StateChange::AcMode(v) => set_if_changed!(ac_mode, v),
            StateChange::SmartMode(v) => set_if_changed!(smart_mode, v),
            StateChange::WorkState(v) => set_if_changed!(work_state, v),
            StateChange::MaxSoc(v) => set_if_changed!(max_soc, v),
            StateChange::MinSoc(v) => set_if_changed!(min_soc, v),
            StateChange::Pack {
                serial,
                soc,
                power,
                temperature,
                state,
            } => {
                let pack = self.packs.entry(serial.clone()).or_default();
                let mut changed = false;

                macro_rules! update_pack_field {
                    ($field:ident) => {
                        if let Some(v) = $field {
                            if pack.$field != Some(*v) {
                                pack.$field = Some(*v);
                                changed = true;
                            }
                        }
                    };
                }

                update_pack_field!(soc);
                update_pack_field!(power);
                update_pack_field!(temperature);
                update_pack_field!(state);

                changed
            }
            StateChange::Batch(changes) => {
                let mut any_changed = false;
                for c in changes {
                    if self.apply(c) {
                        any_changed = true;
                    }
                }
                any_changed
            }
        }
    }

    /// Clears all state, resetting to unknown.
    pub fn clear(&mut self) {
        *self = Self::new();
    }
}
