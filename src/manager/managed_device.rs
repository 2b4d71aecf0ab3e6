// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-device bookkeeping inside the manager.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Notify, watch};

use crate::api::DeviceInfo;
use crate::event::DeviceId;
use crate::state::{DeviceState, StateChange};

/// One device managed by a [`ZendureManager`](super::ZendureManager).
///
/// Holds the cached state, a watch channel for state observers, and the
/// notifier used to wake writers when the device acknowledges a command.
pub(crate) struct ManagedDevice {
    id: DeviceId,
    pub(crate) info: DeviceInfo,
    pub(crate) state: DeviceState,
    state_tx: watch::Sender<DeviceState>,
    pub(crate) reply_notify: Arc<Notify>,
}

impl ManagedDevice {
    pub(crate) fn new(info: DeviceInfo) -> Self {
        let state = DeviceState::new();
        let (state_tx, _) = watch::channel(state.clone());
        Self {
            id: DeviceId::new(),
            info,
            state,
            state_tx,
            reply_notify: Arc::new(Notify::new()),
        }
    }

    pub(crate) fn id(&self) -> DeviceId {
        self.id
    }

    pub(crate) fn display_name(&self) -> &str {
        self.info.display_name()
    }

    /// Returns a receiver observing this device's state.
    pub(crate) fn watch_state(&self) -> watch::Receiver<DeviceState> {
        self.state_tx.subscribe()
    }

    /// Applies a state change to the cache, returning `true` if any
    /// value actually changed. Observers are only woken on change.
    pub(crate) fn apply_state_change(&mut self, change: &StateChange) -> bool {
        let changed = self.state.apply(change);
        if changed {
            self.state_tx.send_replace(self.state.clone());
        }
        changed
    }

    /// Records that the device reported, waking all state observers even
    /// when no value changed. Refresh waits rely on this wakeup.
    pub(crate) fn mark_reported(&mut self, at: DateTime<Utc>) {
        self.state.mark_reported(at);
        self.state_tx.send_replace(self.state.clone());
    }
}

impl std::fmt::Debug for ManagedDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedDevice")
            .field("id", &self.id)
            .field("device_key", &self.info.device_key)
            .field("name", &self.display_name())
            .finish_non_exhaustive()
    }
}
