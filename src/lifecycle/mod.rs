// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Config-entry lifecycle glue.
//!
//! Hosts embedding this library keep one [`ConfigEntry`] per Zendure
//! account. This module provides the operations a host calls over the
//! entry's lifetime: [`setup_entry`] wires platforms and loads the
//! manager, [`unload_entry`] tears everything down, [`migrate_entry`]
//! upgrades stored entries, and [`remove_device`] vetoes manual device
//! removal. The host side of the boundary is the [`PlatformHost`]
//! trait; the manager side is [`ManagedLifecycle`].

mod listeners;

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::event::DeviceId;
use crate::manager::{ManagerConfig, ZendureManager};

pub use listeners::{ListenerId, UpdateListeners};

/// Current config entry version.
pub const ENTRY_VERSION: u32 = 1;
/// Current config entry minor version.
pub const ENTRY_MINOR_VERSION: u32 = 2;

/// Entity platforms served by this integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    /// Binary on/off observations (link status, pack presence).
    BinarySensor,
    /// Numeric settings (power limits, SoC bounds).
    Number,
    /// Enumerated settings (AC mode).
    Select,
    /// Numeric observations (power flows, charge level).
    Sensor,
    /// Boolean settings (smart mode).
    Switch,
}

/// All platforms a config entry is forwarded to.
pub const PLATFORMS: [Platform; 5] = [
    Platform::BinarySensor,
    Platform::Number,
    Platform::Select,
    Platform::Sensor,
    Platform::Switch,
];

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::BinarySensor => "binary_sensor",
            Self::Number => "number",
            Self::Select => "select",
            Self::Sensor => "sensor",
            Self::Switch => "switch",
        };
        f.write_str(name)
    }
}

/// Stored configuration for one Zendure account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigEntry {
    /// Host-assigned entry identifier.
    pub entry_id: String,
    /// Schema version of the stored data.
    pub version: u32,
    /// Schema minor version of the stored data.
    pub minor_version: u32,
    /// Cloud account name (e-mail address).
    pub account: String,
    /// Cloud account password.
    pub password: String,
    /// Optional poll interval override, in seconds.
    pub poll_interval_secs: Option<u64>,
}

impl ConfigEntry {
    /// Creates an entry at the current schema version.
    #[must_use]
    pub fn new(
        entry_id: impl Into<String>,
        account: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            entry_id: entry_id.into(),
            version: ENTRY_VERSION,
            minor_version: ENTRY_MINOR_VERSION,
            account: account.into(),
            password: password.into(),
            poll_interval_secs: None,
        }
    }

    /// Builds a manager configuration from this entry.
    #[must_use]
    pub fn manager_config(&self) -> ManagerConfig {
        let mut config = ManagerConfig::new(self.account.clone(), self.password.clone());
        if let Some(secs) = self.poll_interval_secs {
            config = config.with_poll_interval(Duration::from_secs(secs));
        }
        config
    }
}

/// Errors returned by [`setup_entry`].
#[derive(Debug, Error)]
pub enum SetupError {
    /// The cloud is unreachable or rejected the credentials; the host
    /// should retry the setup later.
    #[error("account connection is not ready")]
    NotReady,

    /// The host failed to forward the entry to a platform.
    #[error("platform setup failed: {0}")]
    Platform(String),

    /// The entry is broken in a way a retry will not fix.
    #[error("config entry setup failed: {0}")]
    Failed(String),
}

/// Host-side operations the lifecycle needs.
///
/// Implemented by the embedding application; all methods are
/// synchronous dispatches into the host's own machinery.
pub trait PlatformHost: Send + Sync {
    /// Forwards the entry to the given entity platforms.
    ///
    /// # Errors
    ///
    /// Returns a message describing the platform that failed.
    fn forward_setups(
        &self,
        entry: &ConfigEntry,
        platforms: &[Platform],
    ) -> std::result::Result<(), String>;

    /// Unloads the entry from the given entity platforms. Returns
    /// `false` if any platform refused to unload.
    fn unload_platforms(&self, entry: &ConfigEntry, platforms: &[Platform]) -> bool;

    /// Schedules a reload of the entry.
    fn request_reload(&self, entry_id: &str);
}

/// Manager-side operations the lifecycle needs.
///
/// [`ZendureManager`] implements this; tests substitute stubs.
pub trait ManagedLifecycle: Send + Sync + 'static {
    /// Connects the account. `Ok(false)` means "retry later".
    fn load(&self) -> impl Future<Output = crate::Result<bool>> + Send;

    /// Releases all resources. Must be idempotent.
    fn unload(&self) -> impl Future<Output = ()> + Send;

    /// Populates the state cache after loading.
    fn first_refresh(&self) -> impl Future<Output = crate::Result<()>> + Send;
}

impl ManagedLifecycle for ZendureManager {
    async fn load(&self) -> crate::Result<bool> {
        ZendureManager::load(self).await
    }

    async fn unload(&self) {
        ZendureManager::unload(self).await;
    }

    async fn first_refresh(&self) -> crate::Result<()> {
        ZendureManager::first_refresh(self).await
    }
}

/// Everything a loaded config entry holds at runtime.
#[derive(Debug)]
pub struct RuntimeData<M> {
    /// The loaded manager.
    pub manager: Arc<M>,
    listener: ListenerId,
}

impl<M> RuntimeData<M> {
    /// Returns the update-listener registration held by this entry.
    #[must_use]
    pub fn listener(&self) -> ListenerId {
        self.listener
    }
}

/// Sets up a config entry: forwards platforms, loads the manager,
/// performs the initial refresh and registers the reload listener.
///
/// On any failure the partially-built state is torn down before
/// returning, so the host observes either a fully-loaded entry or
/// nothing.
///
/// # Errors
///
/// Returns [`SetupError::NotReady`] when the account cannot be reached
/// right now, [`SetupError::Platform`] when the host fails to forward
/// a platform, and [`SetupError::Failed`] for non-retryable problems.
pub async fn setup_entry<H, M>(
    host: &Arc<H>,
    listeners: &UpdateListeners,
    entry: &ConfigEntry,
    manager: Arc<M>,
) -> std::result::Result<RuntimeData<M>, SetupError>
where
    H: PlatformHost + 'static,
    M: ManagedLifecycle,
{
    tracing::debug!(entry_id = %entry.entry_id, "Setting up config entry");
    host.forward_setups(entry, &PLATFORMS)
        .map_err(SetupError::Platform)?;

    let loaded = match manager.load().await {
        Ok(loaded) => loaded,
        Err(err) => {
            tracing::error!(entry_id = %entry.entry_id, error = %err, "Account setup failed");
            teardown(host.as_ref(), entry, manager.as_ref()).await;
            return Err(SetupError::Failed(err.to_string()));
        }
    };
    if !loaded {
        tracing::warn!(entry_id = %entry.entry_id, "Account connection is not ready");
        teardown(host.as_ref(), entry, manager.as_ref()).await;
        return Err(SetupError::NotReady);
    }

    if let Err(err) = manager.first_refresh().await {
        tracing::warn!(entry_id = %entry.entry_id, error = %err, "Initial refresh failed");
        teardown(host.as_ref(), entry, manager.as_ref()).await;
        return Err(SetupError::NotReady);
    }

    let listener = {
        let host = Arc::clone(host);
        listeners.on_entry_updated(move |entry| {
            tracing::debug!(entry_id = %entry.entry_id, "Config entry updated, reloading");
            host.request_reload(&entry.entry_id);
        })
    };

    tracing::info!(entry_id = %entry.entry_id, "Config entry loaded");
    Ok(RuntimeData { manager, listener })
}

async fn teardown<H, M>(host: &H, entry: &ConfigEntry, manager: &M)
where
    H: PlatformHost + ?Sized,
    M: ManagedLifecycle,
{
    host.unload_platforms(entry, &PLATFORMS);
    manager.unload().await;
}

/// Unloads a config entry.
///
/// Returns `true` when the entry was fully unloaded; the caller drops
/// the [`RuntimeData`] afterwards. Returns `false` when a platform
/// refused to unload, in which case the entry stays loaded and nothing
/// is released.
pub async fn unload_entry<H, M>(
    host: &H,
    listeners: &UpdateListeners,
    entry: &ConfigEntry,
    runtime: &RuntimeData<M>,
) -> bool
where
    H: PlatformHost,
    M: ManagedLifecycle,
{
    tracing::debug!(entry_id = %entry.entry_id, "Unloading config entry");
    if !host.unload_platforms(entry, &PLATFORMS) {
        tracing::error!(entry_id = %entry.entry_id, "Platform unload failed, entry stays loaded");
        return false;
    }

    runtime.manager.unload().await;
    listeners.remove(runtime.listener);
    tracing::info!(entry_id = %entry.entry_id, "Config entry unloaded");
    true
}

/// Migrates a stored config entry to the current schema.
///
/// Returns `false` when the entry has an unknown version; the host
/// must refuse to load it. Idempotent for entries that are already
/// current.
pub fn migrate_entry(entry: &mut ConfigEntry) -> bool {
    match entry.version {
        1 => {
            if entry.minor_version < 1 {
                entry.minor_version = ENTRY_MINOR_VERSION;
                tracing::info!(
                    entry_id = %entry.entry_id,
                    minor_version = entry.minor_version,
                    "Migrated config entry"
                );
            }
            true
        }
        version => {
            tracing::error!(
                entry_id = %entry.entry_id,
                version,
                "Cannot migrate config entry from unknown version"
            );
            false
        }
    }
}

/// Decides whether the host may remove a device from a loaded entry.
///
/// Devices mirror the cloud account; removing one locally would only
/// make it reappear at the next discovery, so removal is always
/// refused.
#[must_use]
pub fn remove_device(entry: &ConfigEntry, device_id: DeviceId) -> bool {
    tracing::debug!(
        entry_id = %entry.entry_id,
        device_id = %device_id,
        "Refusing manual device removal"
    );
    false
}
