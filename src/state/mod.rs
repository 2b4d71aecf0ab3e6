// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device state tracking.
//!
//! [`DeviceState`] is the last-known-state cache for a single hub. It is
//! mutated exclusively through [`StateChange`] values produced by telemetry
//! parsing, which makes change detection (and therefore event emission)
//! uniform across the refresh and command paths.

mod device_state;
mod state_change;

pub use device_state::DeviceState;
pub use state_change::StateChange;
