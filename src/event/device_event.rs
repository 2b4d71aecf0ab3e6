// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device event types.

use crate::state::{DeviceState, StateChange};

use super::DeviceId;

/// Events emitted by the manager.
///
/// These events notify subscribers about device lifecycle changes, cloud
/// link status, and state updates. The cloud link is shared by all devices
/// of a manager, so [`DeviceEvent::LinkChanged`] carries no device ID.
#[derive(Debug, Clone)]
pub enum DeviceEvent {
    /// A device was discovered from the cloud account and added.
    DeviceAdded {
        /// The ID of the added device.
        device_id: DeviceId,
    },

    /// A device was removed from the manager (unload).
    DeviceRemoved {
        /// The ID of the removed device.
        device_id: DeviceId,
    },

    /// The cloud MQTT link went up or down.
    LinkChanged {
        /// Whether the link is now connected.
        connected: bool,
        /// Error message if the link dropped due to an error.
        error: Option<String>,
    },

    /// Device state changed.
    ///
    /// Emitted whenever a device report or a command reply updates the
    /// state cache.
    StateChanged {
        /// The ID of the device.
        device_id: DeviceId,
        /// The specific change that occurred.
        change: StateChange,
        /// The complete new state of the device.
        new_state: DeviceState,
    },
}

impl DeviceEvent {
    /// Returns the device ID associated with this event, if any.
    ///
    /// Link events concern the whole manager and return `None`.
    #[must_use]
    pub fn device_id(&self) -> Option<DeviceId> {
        match self {
            Self::DeviceAdded { device_id }
            | Self::DeviceRemoved { device_id }
            | Self::StateChanged { device_id, .. } => Some(*device_id),
            Self::LinkChanged { .. } => None,
        }
    }

    /// Returns `true` if this is a device lifecycle event (added/removed).
    #[must_use]
    pub fn is_lifecycle(&self) -> bool {
        matches!(self, Self::DeviceAdded { .. } | Self::DeviceRemoved { .. })
    }

    /// Returns `true` if this is a link status event.
    #[must_use]
    pub fn is_link(&self) -> bool {
        matches!(self, Self::LinkChanged { .. })
    }

    /// Returns `true` if this is a state change event.
    #[must_use]
    pub fn is_state_change(&self) -> bool {
        matches!(self, Self::StateChanged { .. })
    }

    /// Creates a device added event.
    #[must_use]
    pub fn device_added(device_id: DeviceId) -> Self {
        Self::DeviceAdded { device_id }
    }

    /// Creates a device removed event.
    #[must_use]
    pub fn device_removed(device_id: DeviceId) -> Self {
        Self::DeviceRemoved { device_id }
    }

    /// Creates a link-up event.
    #[must_use]
    pub fn link_up() -> Self {
        Self::LinkChanged {
            connected: true,
            error: None,
        }
    }

    /// Creates a link-down event.
    #[must_use]
    pub fn link_down() -> Self {
        Self::LinkChanged {
            connected: false,
            error: None,
        }
    }

    /// Creates a link-down event with an error message.
    #[must_use]
    pub fn link_down_with_error(error: impl Into<String>) -> Self {
        Self::LinkChanged {
            connected: false,
            error: Some(error.into()),
        }
    }

    /// Creates a state changed event.
    #[must_use]
    pub fn state_changed(device_id: DeviceId, change: StateChange, new_state: DeviceState) -> Self {
        Self::StateChanged {
            device_id,
            change,
            new_state,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_events_carry_device_id() {
        let id = DeviceId::new();
        assert_eq!(DeviceEvent::device_added(id).device_id(), Some(id));
        assert_eq!(DeviceEvent::device_removed(id).device_id(), Some(id));
    }

    #[test]
    fn link_events_have_no_device_id() {
        assert_eq!(DeviceEvent::link_up().device_id(), None);
        assert_eq!(DeviceEvent::link_down().device_id(), None);
    }

    #[test]
    fn event_kind_predicates() {
        let id = DeviceId::new();
        assert!(DeviceEvent::device_added(id).is_lifecycle());
        assert!(DeviceEvent::link_up().is_link());
        assert!(!DeviceEvent::link_up().is_lifecycle());
    }

    #[test]
    fn link_down_with_error_keeps_message() {
        let event = DeviceEvent::link_down_with_error("broker unreachable");
        match event {
            DeviceEvent::LinkChanged { connected, error } => {
                assert!(!connected);
                assert_eq!(error.as_deref(), Some("broker unreachable"));
            }
            _ => panic!("expected link event"),
        }
    }
}
