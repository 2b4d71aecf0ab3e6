// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! State change representation.
//!
//! State changes are discrete deltas applied to a
//! [`DeviceState`](super::DeviceState), produced either from periodic
//! device reports or from command replies.

use crate::types::{AcMode, WorkState};

/// Represents a change in device state.
///
/// Applying a change that matches the cached value is a no-op; see
/// [`DeviceState::apply`](super::DeviceState::apply).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum StateChange {
    /// State of charge of the whole system changed (percent, 0-100).
    ElectricLevel(u8),

    /// Solar input power changed (Watts).
    SolarInput(u16),

    /// Power delivered to the home changed (Watts).
    HomeOutput(u16),

    /// Power drawn from the packs changed (Watts).
    PackInput(u16),

    /// Power charged into the packs changed (Watts).
    PackOutput(u16),

    /// Configured output limit changed (Watts).
    OutputLimit(u16),

    /// Configured input limit changed (Watts).
    InputLimit(u16),

    /// AC mode changed.
    AcMode(AcMode),

    /// Smart matching mode toggled.
    SmartMode(bool),

    /// Hub working state changed.
    WorkState(WorkState),

    /// Charge ceiling changed (percent, 0-100).
    MaxSoc(u8),

    /// Discharge floor changed (percent, 0-100).
    MinSoc(u8),

    /// A battery pack reported new values.
    Pack {
        /// Serial number of the pack.
        serial: String,
        /// State of charge in percent, if reported.
        soc: Option<u8>,
        /// Power in Watts (positive charging), if reported.
        power: Option<i32>,
        /// Highest cell temperature in degrees Celsius, if reported.
        temperature: Option<f32>,
        /// Working state, if reported.
        state: Option<WorkState>,
    },

    /// Multiple changes from a single report.
    Batch(Vec<StateChange>),
}

impl StateChange {
    /// Creates a batch from a list of changes, flattening nested batches.
    #[must_use]
    pub fn batch(changes: Vec<StateChange>) -> Self {
        let mut flat = Vec::with_capacity(changes.len());
        for change in changes {
            match change {
                Self::Batch(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        Self::Batch(flat)
    }

    /// Returns `true` if this change carries no effective content.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Batch(changes) if changes.is_empty())
    }
}
