// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Update-listener registry for config entries.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use super::ConfigEntry;

/// Identifies a registered update listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type ListenerFn = Arc<dyn Fn(&ConfigEntry) + Send + Sync>;

/// Registry of callbacks invoked when a config entry is updated.
///
/// Callbacks run synchronously on the notifying thread; keep them
/// short (the setup flow registers one that just requests a reload).
#[derive(Default)]
pub struct UpdateListeners {
    next_id: AtomicU64,
    listeners: RwLock<HashMap<ListenerId, ListenerFn>>,
}

impl UpdateListeners {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a callback to run when an entry is updated.
    pub fn on_entry_updated<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&ConfigEntry) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().insert(id, Arc::new(listener));
        id
    }

    /// Removes a callback. Removing an unknown ID is a no-op.
    pub fn remove(&self, id: ListenerId) {
        self.listeners.write().remove(&id);
    }

    /// Invokes all registered callbacks with the updated entry.
    pub fn notify(&self, entry: &ConfigEntry) {
        let listeners: Vec<ListenerFn> = self.listeners.read().values().cloned().collect();
        for listener in listeners {
            listener(entry);
        }
    }

    /// Returns the number of registered callbacks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    /// Returns `true` if no callbacks are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }
}

impl std::fmt::Debug for UpdateListeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateListeners")
            .field("listeners", &self.len())
            .finish_non_exhaustive()
    }
}
