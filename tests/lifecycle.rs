// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Integration tests for the config-entry lifecycle.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;
use zendure_link::lifecycle::{
    self, ConfigEntry, ManagedLifecycle, Platform, PlatformHost, SetupError, UpdateListeners,
    PLATFORMS,
};
use zendure_link::{DeviceId, Error};

/// Records host calls and tracks how many platforms are active.
#[derive(Default)]
struct MockHost {
    active_platforms: Mutex<Vec<Platform>>,
    reload_requests: Mutex<Vec<String>>,
    fail_forward: AtomicBool,
    fail_unload: AtomicBool,
}

impl MockHost {
    fn active_platform_count(&self) -> usize {
        self.active_platforms.lock().len()
    }

    fn reload_count(&self) -> usize {
        self.reload_requests.lock().len()
    }
}

impl PlatformHost for MockHost {
    fn forward_setups(
        &self,
        _entry: &ConfigEntry,
        platforms: &[Platform],
    ) -> Result<(), String> {
        if self.fail_forward.load(Ordering::SeqCst) {
            return Err("sensor platform failed".to_owned());
        }
        self.active_platforms.lock().extend_from_slice(platforms);
        Ok(())
    }

    fn unload_platforms(&self, _entry: &ConfigEntry, _platforms: &[Platform]) -> bool {
        if self.fail_unload.load(Ordering::SeqCst) {
            return false;
        }
        self.active_platforms.lock().clear();
        true
    }

    fn request_reload(&self, entry_id: &str) {
        self.reload_requests.lock().push(entry_id.to_owned());
    }
}

/// Scriptable manager stand-in.
#[derive(Debug, Default)]
struct StubManager {
    load_result: AtomicBool,
    refresh_fails: AtomicBool,
    loaded: AtomicBool,
    refreshed: AtomicBool,
    unload_calls: AtomicUsize,
}

impl StubManager {
    fn ready() -> Self {
        let stub = Self::default();
        stub.load_result.store(true, Ordering::SeqCst);
        stub
    }

    fn not_ready() -> Self {
        Self::default()
    }
}

impl ManagedLifecycle for StubManager {
    async fn load(&self) -> zendure_link::Result<bool> {
        let ok = self.load_result.load(Ordering::SeqCst);
        self.loaded.store(ok, Ordering::SeqCst);
        Ok(ok)
    }

    async fn unload(&self) {
        self.loaded.store(false, Ordering::SeqCst);
        self.unload_calls.fetch_add(1, Ordering::SeqCst);
    }

    async fn first_refresh(&self) -> zendure_link::Result<()> {
        if self.refresh_fails.load(Ordering::SeqCst) {
            return Err(Error::NotLoaded);
        }
        self.refreshed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

fn entry() -> ConfigEntry {
    ConfigEntry::new("entry-1", "user@example.com", "secret")
}

#[tokio::test]
async fn setup_loads_manager_and_forwards_all_platforms() {
    let host = Arc::new(MockHost::default());
    let listeners = UpdateListeners::new();
    let manager = Arc::new(StubManager::ready());

    let runtime = lifecycle::setup_entry(&host, &listeners, &entry(), Arc::clone(&manager))
        .await
        .unwrap();

    assert_eq!(host.active_platform_count(), PLATFORMS.len());
    assert!(manager.loaded.load(Ordering::SeqCst));
    assert!(manager.refreshed.load(Ordering::SeqCst));
    assert_eq!(listeners.len(), 1);
    assert!(Arc::ptr_eq(&runtime.manager, &manager));
}

#[tokio::test]
async fn unreachable_account_leaves_nothing_behind() {
    let host = Arc::new(MockHost::default());
    let listeners = UpdateListeners::new();
    let manager = Arc::new(StubManager::not_ready());

    let err = lifecycle::setup_entry(&host, &listeners, &entry(), Arc::clone(&manager))
        .await
        .unwrap_err();

    assert!(matches!(err, SetupError::NotReady));
    // No platforms stay active, so no entities exist for the entry
    assert_eq!(host.active_platform_count(), 0);
    assert_eq!(manager.unload_calls.load(Ordering::SeqCst), 1);
    assert!(listeners.is_empty());
}

#[tokio::test]
async fn failed_initial_refresh_is_not_ready() {
    let host = Arc::new(MockHost::default());
    let listeners = UpdateListeners::new();
    let manager = Arc::new(StubManager::ready());
    manager.refresh_fails.store(true, Ordering::SeqCst);

    let err = lifecycle::setup_entry(&host, &listeners, &entry(), Arc::clone(&manager))
        .await
        .unwrap_err();

    assert!(matches!(err, SetupError::NotReady));
    assert_eq!(host.active_platform_count(), 0);
    assert!(!manager.loaded.load(Ordering::SeqCst));
}

#[tokio::test]
async fn failed_platform_forward_aborts_setup() {
    let host = Arc::new(MockHost::default());
    host.fail_forward.store(true, Ordering::SeqCst);
    let listeners = UpdateListeners::new();
    let manager = Arc::new(StubManager::ready());

    let err = lifecycle::setup_entry(&host, &listeners, &entry(), Arc::clone(&manager))
        .await
        .unwrap_err();

    assert!(matches!(err, SetupError::Platform(_)));
    // The manager was never loaded
    assert!(!manager.loaded.load(Ordering::SeqCst));
}

#[tokio::test]
async fn entry_update_requests_a_reload() {
    let host = Arc::new(MockHost::default());
    let listeners = UpdateListeners::new();
    let manager = Arc::new(StubManager::ready());

    let _runtime = lifecycle::setup_entry(&host, &listeners, &entry(), manager)
        .await
        .unwrap();

    listeners.notify(&entry());
    assert_eq!(host.reload_count(), 1);
    assert_eq!(host.reload_requests.lock()[0], "entry-1");
}

#[tokio::test]
async fn unload_releases_everything_once() {
    let host = Arc::new(MockHost::default());
    let listeners = UpdateListeners::new();
    let manager = Arc::new(StubManager::ready());

    let runtime = lifecycle::setup_entry(&host, &listeners, &entry(), Arc::clone(&manager))
        .await
        .unwrap();

    assert!(lifecycle::unload_entry(host.as_ref(), &listeners, &entry(), &runtime).await);
    assert_eq!(host.active_platform_count(), 0);
    assert_eq!(manager.unload_calls.load(Ordering::SeqCst), 1);
    assert!(listeners.is_empty());

    // A second manager unload is harmless
    manager.unload().await;
    assert_eq!(manager.unload_calls.load(Ordering::SeqCst), 2);
    assert!(!manager.loaded.load(Ordering::SeqCst));
}

#[tokio::test]
async fn refused_platform_unload_keeps_entry_loaded() {
    let host = Arc::new(MockHost::default());
    let listeners = UpdateListeners::new();
    let manager = Arc::new(StubManager::ready());

    let runtime = lifecycle::setup_entry(&host, &listeners, &entry(), Arc::clone(&manager))
        .await
        .unwrap();

    host.fail_unload.store(true, Ordering::SeqCst);
    assert!(!lifecycle::unload_entry(host.as_ref(), &listeners, &entry(), &runtime).await);

    // Nothing was released
    assert!(manager.loaded.load(Ordering::SeqCst));
    assert_eq!(manager.unload_calls.load(Ordering::SeqCst), 0);
    assert_eq!(listeners.len(), 1);
}

#[tokio::test]
async fn migration_from_initial_minor_version() {
    let mut stored = entry();
    stored.minor_version = 0;

    assert!(lifecycle::migrate_entry(&mut stored));
    assert_eq!(stored.version, 1);
    assert_eq!(stored.minor_version, 2);
    // Everything else is carried over untouched
    assert_eq!(stored.account, "user@example.com");
    assert_eq!(stored.password, "secret");
    assert_eq!(stored.entry_id, "entry-1");

    // Running the migration again changes nothing
    let before = stored.clone();
    assert!(lifecycle::migrate_entry(&mut stored));
    assert_eq!(stored, before);
}

#[tokio::test]
async fn unknown_entry_version_fails_closed() {
    let mut stored = entry();
    stored.version = 99;
    assert!(!lifecycle::migrate_entry(&mut stored));
}

#[tokio::test]
async fn device_removal_is_refused() {
    assert!(!lifecycle::remove_device(&entry(), DeviceId::new()));
}
