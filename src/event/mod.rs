// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Event types and the event bus.
//!
//! The manager broadcasts [`DeviceEvent`]s through an [`EventBus`] backed by
//! a tokio broadcast channel. Subscribers receive device lifecycle events,
//! cloud link status changes, and state updates.

mod device_event;
mod device_id;
mod event_bus;

pub use device_event::DeviceEvent;
pub use device_id::DeviceId;
pub use event_bus::EventBus;
