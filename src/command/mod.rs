// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Zendure property-write commands.
//!
//! Hubs are controlled by writing properties: the manager publishes a JSON
//! payload to `iot/<appKey>/<deviceKey>/properties/write` and the device
//! echoes the accepted values on `.../properties/reply`.
//!
//! # Available Commands
//!
//! | Command | Property | Purpose |
//! |---------|----------|---------|
//! | [`SetOutputLimit`] | `outputLimit` | Cap power fed to the home |
//! | [`SetInputLimit`] | `inputLimit` | Cap grid charge power |
//! | [`SetAcMode`] | `acMode` | Switch between grid charge / discharge |
//! | [`SetSmartMode`] | `smartMode` | Toggle demand-matching mode |
//! | [`SetMaxSoc`] | `socSet` | Charge ceiling |
//! | [`SetMinSoc`] | `minSoc` | Discharge floor |
//!
//! # Examples
//!
//! ```
//! use zendure_link::command::{Command, SetOutputLimit};
//!
//! let cmd = SetOutputLimit::new(800);
//! assert_eq!(cmd.property(), "outputLimit");
//! assert_eq!(
//!     cmd.write_payload().to_string(),
//!     r#"{"properties":{"outputLimit":800}}"#
//! );
//! ```

use serde_json::{Value, json};

use crate::types::AcMode;

/// A property write that can be sent to a Zendure hub.
pub trait Command {
    /// Returns the property name this command writes.
    fn property(&self) -> &'static str;

    /// Returns the wire value for the property.
    fn value(&self) -> Value;

    /// Builds the full `properties/write` payload.
    fn write_payload(&self) -> Value {
        json!({ "properties": { self.property(): self.value() } })
    }
}

/// Sets the output (home feed) power limit in Watts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetOutputLimit(u16);

impl SetOutputLimit {
    /// Creates a command capping the home feed at `watts`.
    #[must_use]
    pub fn new(watts: u16) -> Self {
        Self(watts)
    }

    /// The requested limit in Watts.
    #[must_use]
    pub fn watts(&self) -> u16 {
        self.0
    }
}

impl Command for SetOutputLimit {
    fn property(&self) -> &'static str {
        "outputLimit"
    }

    fn value(&self) -> Value {
        json!(self.0)
    }
}

/// Sets the input (grid charge) power limit in Watts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetInputLimit(u16);

impl SetInputLimit {
    /// Creates a command capping grid charging at `watts`.
    #[must_use]
    pub fn new(watts: u16) -> Self {
        Self(watts)
    }

    /// The requested limit in Watts.
    #[must_use]
    pub fn watts(&self) -> u16 {
        self.0
    }
}

impl Command for SetInputLimit {
    fn property(&self) -> &'static str {
        "inputLimit"
    }

    fn value(&self) -> Value {
        json!(self.0)
    }
}

/// Sets the AC mode of the hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetAcMode(AcMode);

impl SetAcMode {
    /// Creates a command switching the hub to `mode`.
    #[must_use]
    pub fn new(mode: AcMode) -> Self {
        Self(mode)
    }
}

impl Command for SetAcMode {
    fn property(&self) -> &'static str {
        "acMode"
    }

    fn value(&self) -> Value {
        json!(self.0.to_wire())
    }
}

/// Toggles the demand-matching (smart) mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetSmartMode(bool);

impl SetSmartMode {
    /// Creates a command enabling or disabling smart mode.
    #[must_use]
    pub fn new(enabled: bool) -> Self {
        Self(enabled)
    }
}

impl Command for SetSmartMode {
    fn property(&self) -> &'static str {
        "smartMode"
    }

    fn value(&self) -> Value {
        json!(u8::from(self.0))
    }
}

/// Sets the charge ceiling in percent.
///
/// Encoded on the wire in tenths of a percent, matching reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetMaxSoc(u8);

impl SetMaxSoc {
    /// Creates a command setting the charge ceiling to `percent`.
    #[must_use]
    pub fn new(percent: u8) -> Self {
        Self(percent.min(100))
    }
}

impl Command for SetMaxSoc {
    fn property(&self) -> &'static str {
        "socSet"
    }

    fn value(&self) -> Value {
        json!(u16::from(self.0) * 10)
    }
}

/// Sets the discharge floor in percent.
///
/// Encoded on the wire in tenths of a percent, matching reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetMinSoc(u8);

impl SetMinSoc {
    /// Creates a command setting the discharge floor to `percent`.
    #[must_use]
    pub fn new(percent: u8) -> Self {
        Self(percent.min(100))
    }
}

impl Command for SetMinSoc {
    fn property(&self) -> &'static str {
        "minSoc"
    }

    fn value(&self) -> Value {
        json!(u16::from(self.0) * 10)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_limit_payload() {
        let cmd = SetOutputLimit::new(600);
        assert_eq!(cmd.watts(), 600);
        assert_eq!(
            cmd.write_payload(),
            json!({"properties": {"outputLimit": 600}})
        );
    }

    #[test]
    fn ac_mode_uses_wire_encoding() {
        let cmd = SetAcMode::new(AcMode::Input);
        assert_eq!(cmd.write_payload(), json!({"properties": {"acMode": 1}}));
    }

    #[test]
    fn smart_mode_encodes_as_integer() {
        assert_eq!(
            SetSmartMode::new(true).write_payload(),
            json!({"properties": {"smartMode": 1}})
        );
        assert_eq!(
            SetSmartMode::new(false).write_payload(),
            json!({"properties": {"smartMode": 0}})
        );
    }

    #[test]
    fn soc_commands_encode_in_tenths() {
        assert_eq!(
            SetMaxSoc::new(90).write_payload(),
            json!({"properties": {"socSet": 900}})
        );
        assert_eq!(
            SetMinSoc::new(10).write_payload(),
            json!({"properties": {"minSoc": 100}})
        );
    }

    #[test]
    fn soc_commands_clamp_to_100() {
        assert_eq!(
            SetMaxSoc::new(150).write_payload(),
            json!({"properties": {"socSet": 1000}})
        );
    }
}
