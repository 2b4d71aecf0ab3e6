// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Account-level device management.
//!
//! [`ZendureManager`] is the entry point of the library: it owns the
//! cloud session, the broker link, and the per-device state caches.

mod config;
mod managed_device;
mod zendure_manager;

pub use config::{ManagerConfig, ReconnectionPolicy};
pub use zendure_manager::{
    INPUT_LIMIT_MAX, MAX_SOC_MIN, MIN_SOC_MAX, OUTPUT_LIMIT_MAX, ZendureManager,
};
