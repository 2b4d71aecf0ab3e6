// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Shared value types for Zendure device properties.

use serde::{Deserialize, Serialize};

/// AC behaviour of a hub with a bidirectional inverter.
///
/// Matches the integer encoding used in device reports (`acMode`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AcMode {
    /// Charge the packs from the grid.
    Input,
    /// Feed stored energy to the home.
    Output,
}

impl AcMode {
    /// Decodes the wire value (1 = input, 2 = output).
    #[must_use]
    pub fn from_wire(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Input),
            2 => Some(Self::Output),
            _ => None,
        }
    }

    /// Returns the wire encoding of this mode.
    #[must_use]
    pub fn to_wire(self) -> u8 {
        match self {
            Self::Input => 1,
            Self::Output => 2,
        }
    }
}

/// Working state of a hub or a battery pack.
///
/// Matches the integer encoding used in device reports (`packState`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkState {
    /// Idle, neither charging nor discharging.
    Standby,
    /// Energy is flowing into the packs.
    Charging,
    /// Energy is flowing out of the packs.
    Discharging,
}

impl WorkState {
    /// Decodes the wire value (0 = standby, 1 = charging, 2 = discharging).
    #[must_use]
    pub fn from_wire(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Standby),
            1 => Some(Self::Charging),
            2 => Some(Self::Discharging),
            _ => None,
        }
    }
}

impl std::fmt::Display for WorkState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Standby => "standby",
            Self::Charging => "charging",
            Self::Discharging => "discharging",
        };
        write!(f, "{s}")
    }
}

/// State of a single battery pack attached to a hub.
///
/// All fields are optional because packs report fields independently.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackState {
    /// State of charge in percent (0-100).
    pub soc: Option<u8>,
    /// Power in Watts; positive while charging, negative while discharging.
    pub power: Option<i32>,
    /// Highest cell temperature in degrees Celsius.
    pub temperature: Option<f32>,
    /// Working state of the pack.
    pub state: Option<WorkState>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ac_mode_wire_round_trip() {
        assert_eq!(AcMode::from_wire(1), Some(AcMode::Input));
        assert_eq!(AcMode::from_wire(2), Some(AcMode::Output));
        assert_eq!(AcMode::from_wire(0), None);
        assert_eq!(AcMode::Output.to_wire(), 2);
    }

    #[test]
    fn work_state_from_wire() {
        assert_eq!(WorkState::from_wire(0), Some(WorkState::Standby));
        assert_eq!(WorkState::from_wire(1), Some(WorkState::Charging));
        assert_eq!(WorkState::from_wire(2), Some(WorkState::Discharging));
        assert_eq!(WorkState::from_wire(9), None);
    }

    #[test]
    fn work_state_display() {
        assert_eq!(WorkState::Discharging.to_string(), "discharging");
    }
}
