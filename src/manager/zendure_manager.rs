// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The central manager for a Zendure cloud account.

use std::collections::HashMap;
use std::pin::pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::{Mutex, RwLock, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::api::{CloudClient, DeviceInfo};
use crate::command::{
    Command, SetAcMode, SetInputLimit, SetMaxSoc, SetMinSoc, SetOutputLimit, SetSmartMode,
};
use crate::error::{ApiError, DeviceError, Error, ProtocolError, Result};
use crate::event::{DeviceEvent, DeviceId, EventBus};
use crate::protocol::{InboundMessage, LinkStatus, MqttLink, TopicKind};
use crate::state::DeviceState;
use crate::telemetry::PropertyReport;
use crate::types::AcMode;

use super::config::ManagerConfig;
use super::managed_device::ManagedDevice;

/// Highest output (home feed) limit a hub accepts, in Watts.
pub const OUTPUT_LIMIT_MAX: u16 = 1200;
/// Highest input (grid charge) limit a hub accepts, in Watts.
pub const INPUT_LIMIT_MAX: u16 = 900;
/// Lowest accepted charge ceiling, in percent.
pub const MAX_SOC_MIN: u8 = 40;
/// Highest accepted discharge floor, in percent.
pub const MIN_SOC_MAX: u8 = 60;

type DeviceMap = Arc<RwLock<HashMap<DeviceId, ManagedDevice>>>;
type KeyIndex = Arc<RwLock<HashMap<String, DeviceId>>>;

/// Manages all Zendure devices of one cloud account.
///
/// The manager logs in to the cloud REST API, discovers the account's
/// devices, and opens a single MQTT link to the cloud broker over which
/// all device reports arrive and all property writes are sent. Device
/// state is cached and can be read synchronously, observed through a
/// watch channel, or followed through the event bus.
///
/// # Examples
///
/// ```no_run
/// use zendure_link::manager::{ManagerConfig, ZendureManager};
///
/// # async fn example() -> zendure_link::Result<()> {
/// let manager = ZendureManager::new(ManagerConfig::new("user@example.com", "secret"))?;
/// if manager.load().await? {
///     manager.first_refresh().await?;
///     for id in manager.device_ids().await {
///         println!("{id}: {:?}", manager.get_state(id).await);
///     }
/// }
/// manager.unload().await;
/// # Ok(())
/// # }
/// ```
pub struct ZendureManager {
    config: ManagerConfig,
    cloud: CloudClient,
    devices: DeviceMap,
    key_index: KeyIndex,
    event_bus: EventBus,
    link: Mutex<Option<Arc<MqttLink>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    shutdown_tx: watch::Sender<bool>,
    lifecycle_lock: Mutex<()>,
    refresh_lock: Mutex<()>,
    refresh_generation: AtomicU64,
    loaded: AtomicBool,
}

impl ZendureManager {
    /// Creates a new manager for the given account.
    ///
    /// No network activity happens until [`load`](Self::load) is called.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: ManagerConfig) -> Result<Self> {
        let cloud = CloudClient::new(config.api.clone()).map_err(Error::Api)?;
        let (shutdown_tx, _) = watch::channel(false);

        Ok(Self {
            config,
            cloud,
            devices: Arc::new(RwLock::new(HashMap::new())),
            key_index: Arc::new(RwLock::new(HashMap::new())),
            event_bus: EventBus::new(),
            link: Mutex::new(None),
            tasks: Mutex::new(Vec::new()),
            shutdown_tx,
            lifecycle_lock: Mutex::new(()),
            refresh_lock: Mutex::new(()),
            refresh_generation: AtomicU64::new(0),
            loaded: AtomicBool::new(false),
        })
    }

    /// Returns `true` if the manager is loaded.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::Acquire)
    }

    /// Returns `true` if the broker link is currently up.
    pub async fn is_linked(&self) -> bool {
        self.link
            .lock()
            .await
            .as_ref()
            .is_some_and(|link| link.is_connected())
    }

    /// Subscribes to device events.
    #[must_use]
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<DeviceEvent> {
        self.event_bus.subscribe()
    }

    /// Logs in, discovers devices and opens the broker link.
    ///
    /// Returns `Ok(true)` once the account is loaded. Returns
    /// `Ok(false)` when the cloud is unreachable or rejects the
    /// credentials; the attempt leaves no partial state behind and can
    /// simply be retried later. Loading an already-loaded manager is a
    /// no-op returning `Ok(true)`.
    ///
    /// # Errors
    ///
    /// Returns an error for conditions a retry will not fix, such as a
    /// malformed cloud response.
    pub async fn load(&self) -> Result<bool> {
        let _lifecycle = self.lifecycle_lock.lock().await;
        if self.loaded.load(Ordering::Acquire) {
            return Ok(true);
        }

        tracing::debug!(account = %self.config.account, "Opening cloud connection");
        let credentials = match self
            .cloud
            .login(&self.config.account, &self.config.password)
            .await
        {
            Ok(credentials) => credentials,
            Err(
                err @ (ApiError::Http(_)
                | ApiError::AuthenticationFailed
                | ApiError::UnexpectedStatus { .. }),
            ) => {
                tracing::warn!(error = %err, "Cloud login failed");
                return Ok(false);
            }
            Err(err) => return Err(Error::Api(err)),
        };

        let infos = match self.cloud.device_list().await {
            Ok(infos) => infos,
            // A 401 here means the session expired between login and
            // discovery; that is as transient as a failed login
            Err(
                err @ (ApiError::Http(_)
                | ApiError::AuthenticationFailed
                | ApiError::UnexpectedStatus { .. }),
            ) => {
                tracing::warn!(error = %err, "Device discovery failed");
                self.cloud.clear_session();
                return Ok(false);
            }
            Err(err) => {
                self.cloud.clear_session();
                return Err(Error::Api(err));
            }
        };
        if infos.is_empty() {
            tracing::warn!("Account has no devices");
        }

        let (inbound_tx, inbound_rx) = mpsc::channel(256);
        let link = match MqttLink::connect(
            &credentials,
            self.config.reconnection.clone(),
            inbound_tx,
        )
        .await
        {
            Ok(link) => Arc::new(link),
            Err(err) => {
                tracing::warn!(error = %err, "Broker connection failed");
                self.cloud.clear_session();
                return Ok(false);
            }
        };

        // Populate the registry only after the link is up, so a failed
        // load never leaves devices behind.
        {
            let mut devices = self.devices.write().await;
            let mut index = self.key_index.write().await;
            for info in infos {
                let device = ManagedDevice::new(info);
                tracing::info!(
                    device_id = %device.id(),
                    device_key = %device.info.device_key,
                    name = %device.display_name(),
                    "Discovered device"
                );
                index.insert(device.info.device_key.clone(), device.id());
                self.event_bus.publish(DeviceEvent::device_added(device.id()));
                devices.insert(device.id(), device);
            }
        }

        self.shutdown_tx.send_replace(false);
        let mut tasks = self.tasks.lock().await;
        tasks.push(tokio::spawn(run_inbound(
            Arc::clone(&self.devices),
            Arc::clone(&self.key_index),
            self.event_bus.clone(),
            inbound_rx,
        )));
        tasks.push(tokio::spawn(run_status_watch(
            link.status(),
            self.event_bus.clone(),
            self.shutdown_tx.subscribe(),
        )));
        tasks.push(tokio::spawn(run_poll(
            Arc::clone(&link),
            Arc::clone(&self.devices),
            self.config.poll_interval,
            self.shutdown_tx.subscribe(),
        )));
        drop(tasks);

        *self.link.lock().await = Some(link);
        self.loaded.store(true, Ordering::Release);
        tracing::info!("Manager loaded");
        Ok(true)
    }

    /// Releases all resources held by the manager.
    ///
    /// Stops background tasks, closes the broker link, clears the
    /// device registry and drops the cloud session. Idempotent:
    /// unloading an unloaded manager is a no-op.
    pub async fn unload(&self) {
        let _lifecycle = self.lifecycle_lock.lock().await;
        if !self.loaded.swap(false, Ordering::AcqRel) {
            return;
        }
        tracing::debug!("Unloading manager");

        self.shutdown_tx.send_replace(true);
        let link = self.link.lock().await.take();
        if let Some(link) = link {
            link.close().await;
        }

        let tasks: Vec<_> = self.tasks.lock().await.drain(..).collect();
        for task in tasks {
            let _ = task.await;
        }

        let removed: Vec<DeviceId> = {
            let mut devices = self.devices.write().await;
            self.key_index.write().await.clear();
            devices.drain().map(|(id, _)| id).collect()
        };
        for id in removed {
            self.event_bus.publish(DeviceEvent::device_removed(id));
        }

        self.cloud.clear_session();
        tracing::info!("Manager unloaded");
    }

    /// Performs the initial refresh after loading.
    ///
    /// # Errors
    ///
    /// Returns an error if the manager is not loaded or a device fails
    /// to report within the refresh window.
    pub async fn first_refresh(&self) -> Result<()> {
        self.refresh().await
    }

    /// Asks every device for a fresh report and waits for the replies.
    ///
    /// Concurrent callers are coalesced: a caller that arrives while a
    /// refresh is in flight waits for that refresh instead of issuing a
    /// second round of requests.
    ///
    /// # Errors
    ///
    /// Returns an error if the manager is not loaded or a device fails
    /// to report within the refresh window.
    pub async fn refresh(&self) -> Result<()> {
        let entry_generation = self.refresh_generation.load(Ordering::Acquire);
        let _guard = self.refresh_lock.lock().await;
        if self.refresh_generation.load(Ordering::Acquire) != entry_generation {
            // A refresh completed while we waited for the lock
            return Ok(());
        }
        self.refresh_inner().await?;
        self.refresh_generation.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    async fn refresh_inner(&self) -> Result<()> {
        let link = self.link.lock().await.clone().ok_or(Error::NotLoaded)?;

        // Snapshot the watch receivers before requesting, so a fast
        // reply can never slip past the wait.
        let mut waits = Vec::new();
        {
            let devices = self.devices.read().await;
            for device in devices.values() {
                let mut rx = device.watch_state();
                rx.mark_unchanged();
                waits.push((device.info.device_key.clone(), rx));
            }
        }

        for (device_key, _) in &waits {
            link.request_report(device_key)
                .await
                .map_err(Error::Protocol)?;
        }

        let timeout = self.config.refresh_timeout;
        for (device_key, mut rx) in waits {
            match tokio::time::timeout(timeout, rx.changed()).await {
                Ok(Ok(())) => {}
                Ok(Err(_)) | Err(_) => {
                    tracing::warn!(device_key = %device_key, "No report within refresh window");
                    return Err(Error::Protocol(ProtocolError::Timeout(
                        timeout.as_millis().try_into().unwrap_or(u64::MAX),
                    )));
                }
            }
        }
        Ok(())
    }

    /// Returns the IDs of all managed devices.
    pub async fn device_ids(&self) -> Vec<DeviceId> {
        self.devices.read().await.keys().copied().collect()
    }

    /// Returns the number of managed devices.
    pub async fn device_count(&self) -> usize {
        self.devices.read().await.len()
    }

    /// Returns the cloud record for a device, if it exists.
    pub async fn device_info(&self, device_id: DeviceId) -> Option<DeviceInfo> {
        self.devices
            .read()
            .await
            .get(&device_id)
            .map(|device| device.info.clone())
    }

    /// Returns a snapshot of a device's cached state.
    pub async fn get_state(&self, device_id: DeviceId) -> Option<DeviceState> {
        self.devices
            .read()
            .await
            .get(&device_id)
            .map(|device| device.state.clone())
    }

    /// Returns a watch receiver observing a device's state.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeviceNotFound`] if the device is not managed.
    pub async fn watch_device(&self, device_id: DeviceId) -> Result<watch::Receiver<DeviceState>> {
        self.devices
            .read()
            .await
            .get(&device_id)
            .map(ManagedDevice::watch_state)
            .ok_or(Error::DeviceNotFound)
    }

    /// Sets the output (home feed) power limit in Watts.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is out of range, the manager is
    /// not loaded, the device is unknown, or the device does not reply
    /// within the write window.
    pub async fn set_output_limit(&self, device_id: DeviceId, watts: u16) -> Result<()> {
        if watts > OUTPUT_LIMIT_MAX {
            return Err(Error::Device(DeviceError::ValueOutOfRange {
                property: "outputLimit",
                min: 0,
                max: OUTPUT_LIMIT_MAX,
                actual: watts,
            }));
        }
        self.dispatch(device_id, &SetOutputLimit::new(watts)).await
    }

    /// Sets the input (grid charge) power limit in Watts.
    ///
    /// # Errors
    ///
    /// See [`set_output_limit`](Self::set_output_limit).
    pub async fn set_input_limit(&self, device_id: DeviceId, watts: u16) -> Result<()> {
        if watts > INPUT_LIMIT_MAX {
            return Err(Error::Device(DeviceError::ValueOutOfRange {
                property: "inputLimit",
                min: 0,
                max: INPUT_LIMIT_MAX,
                actual: watts,
            }));
        }
        self.dispatch(device_id, &SetInputLimit::new(watts)).await
    }

    /// Switches the hub between grid charge and discharge.
    ///
    /// # Errors
    ///
    /// See [`set_output_limit`](Self::set_output_limit).
    pub async fn set_ac_mode(&self, device_id: DeviceId, mode: AcMode) -> Result<()> {
        self.dispatch(device_id, &SetAcMode::new(mode)).await
    }

    /// Toggles demand-matching (smart) mode.
    ///
    /// # Errors
    ///
    /// See [`set_output_limit`](Self::set_output_limit).
    pub async fn set_smart_mode(&self, device_id: DeviceId, enabled: bool) -> Result<()> {
        self.dispatch(device_id, &SetSmartMode::new(enabled)).await
    }

    /// Sets the charge ceiling in percent.
    ///
    /// # Errors
    ///
    /// See [`set_output_limit`](Self::set_output_limit).
    pub async fn set_max_soc(&self, device_id: DeviceId, percent: u8) -> Result<()> {
        if !(MAX_SOC_MIN..=100).contains(&percent) {
            return Err(Error::Device(DeviceError::ValueOutOfRange {
                property: "socSet",
                min: u16::from(MAX_SOC_MIN),
                max: 100,
                actual: u16::from(percent),
            }));
        }
        self.dispatch(device_id, &SetMaxSoc::new(percent)).await
    }

    /// Sets the discharge floor in percent.
    ///
    /// # Errors
    ///
    /// See [`set_output_limit`](Self::set_output_limit).
    pub async fn set_min_soc(&self, device_id: DeviceId, percent: u8) -> Result<()> {
        if percent > MIN_SOC_MAX {
            return Err(Error::Device(DeviceError::ValueOutOfRange {
                property: "minSoc",
                min: 0,
                max: u16::from(MIN_SOC_MAX),
                actual: u16::from(percent),
            }));
        }
        self.dispatch(device_id, &SetMinSoc::new(percent)).await
    }

    /// Publishes a property write and waits for the device reply.
    async fn dispatch<C: Command + Sync>(&self, device_id: DeviceId, command: &C) -> Result<()> {
        let link = self.link.lock().await.clone().ok_or(Error::NotLoaded)?;

        let (device_key, notify) = {
            let devices = self.devices.read().await;
            let device = devices.get(&device_id).ok_or(Error::DeviceNotFound)?;
            (device.info.device_key.clone(), Arc::clone(&device.reply_notify))
        };

        // Register for the reply before publishing
        let mut notified = pin!(notify.notified());
        notified.as_mut().enable();

        tracing::debug!(
            device_id = %device_id,
            property = command.property(),
            value = %command.value(),
            "Dispatching property write"
        );
        link.write_properties(&device_key, &command.write_payload())
            .await
            .map_err(Error::Protocol)?;

        let timeout = self.config.write_timeout;
        tokio::time::timeout(timeout, notified).await.map_err(|_| {
            tracing::warn!(device_id = %device_id, property = command.property(), "No write reply");
            Error::Protocol(ProtocolError::Timeout(
                timeout.as_millis().try_into().unwrap_or(u64::MAX),
            ))
        })?;
        Ok(())
    }
}

impl std::fmt::Debug for ZendureManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZendureManager")
            .field("account", &self.config.account)
            .field("loaded", &self.is_loaded())
            .finish_non_exhaustive()
    }
}

/// Routes inbound report/reply messages into the state cache.
///
/// Runs until the message channel is closed (link shutdown).
async fn run_inbound(
    devices: DeviceMap,
    key_index: KeyIndex,
    event_bus: EventBus,
    mut inbound_rx: mpsc::Receiver<InboundMessage>,
) {
    while let Some(message) = inbound_rx.recv().await {
        handle_inbound(&devices, &key_index, &event_bus, message).await;
    }
    tracing::debug!("Inbound routing stopped");
}

async fn handle_inbound(
    devices: &DeviceMap,
    key_index: &KeyIndex,
    event_bus: &EventBus,
    message: InboundMessage,
) {
    tracing::trace!(
        device_key = %message.device_key,
        kind = ?message.kind,
        payload = %message.payload,
        "Processing device message"
    );

    let report: PropertyReport = match serde_json::from_str(&message.payload) {
        Ok(report) => report,
        Err(err) => {
            tracing::warn!(
                device_key = %message.device_key,
                error = %err,
                "Discarding malformed payload"
            );
            return;
        }
    };

    let device_id = {
        let index = key_index.read().await;
        index.get(&message.device_key).copied()
    };
    let Some(device_id) = device_id else {
        tracing::trace!(device_key = %message.device_key, "Report from unmanaged device");
        return;
    };

    let reported_at = report.reported_at().unwrap_or_else(chrono::Utc::now);
    let changes = report.to_state_changes();

    let (applied, new_state) = {
        let mut devices = devices.write().await;
        let Some(device) = devices.get_mut(&device_id) else {
            return;
        };

        let mut applied = Vec::new();
        for change in changes {
            if device.apply_state_change(&change) {
                applied.push(change);
            }
        }
        device.mark_reported(reported_at);

        if message.kind == TopicKind::Reply {
            device.reply_notify.notify_waiters();
        }
        (applied, device.state.clone())
    };

    for change in applied {
        event_bus.publish(DeviceEvent::state_changed(
            device_id,
            change,
            new_state.clone(),
        ));
    }
}

/// Mirrors broker link status onto the event bus.
async fn run_status_watch(
    mut status_rx: watch::Receiver<LinkStatus>,
    event_bus: EventBus,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            changed = status_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let status = status_rx.borrow_and_update().clone();
                match status {
                    LinkStatus::Connected => event_bus.publish(DeviceEvent::link_up()),
                    LinkStatus::Disconnected { error: Some(error) } => {
                        event_bus.publish(DeviceEvent::link_down_with_error(error));
                    }
                    LinkStatus::Disconnected { error: None } => {
                        event_bus.publish(DeviceEvent::link_down());
                    }
                    LinkStatus::Closed => {
                        event_bus.publish(DeviceEvent::link_down());
                        break;
                    }
                    LinkStatus::Connecting => {}
                }
            }
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    break;
                }
            }
        }
    }
    tracing::debug!("Status watch stopped");
}

/// Periodically asks every device for a fresh report.
async fn run_poll(
    link: Arc<MqttLink>,
    devices: DeviceMap,
    interval: std::time::Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let keys: Vec<String> = devices
                    .read()
                    .await
                    .values()
                    .map(|device| device.info.device_key.clone())
                    .collect();
                for device_key in keys {
                    if let Err(err) = link.request_report(&device_key).await {
                        tracing::warn!(device_key = %device_key, error = %err, "Poll request failed");
                    }
                }
            }
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    break;
                }
            }
        }
    }
    tracing::debug!("Poll loop stopped");
}
