// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `Zendure` Link - A Rust library to manage Zendure SolarFlow devices.
//!
//! This library talks to the Zendure cloud on behalf of one account: it
//! logs in over the REST API, discovers the account's hubs, and keeps a
//! single MQTT link to the cloud broker over which device reports
//! arrive and property writes are sent.
//!
//! # Supported Features
//!
//! - **Device discovery**: All hubs of the account, straight from the cloud
//! - **Live telemetry**: Solar input, home output, charge level, per-pack data
//! - **Control**: Power limits, AC mode, smart mode, SoC bounds
//! - **Events**: Broadcast stream of state changes and link status
//!
//! # Quick Start
//!
//! ```no_run
//! use zendure_link::{ManagerConfig, ZendureManager};
//!
//! #[tokio::main]
//! async fn main() -> zendure_link::Result<()> {
//!     let manager = ZendureManager::new(ManagerConfig::new("user@example.com", "secret"))?;
//!
//!     // Log in, discover devices, open the broker link
//!     if !manager.load().await? {
//!         eprintln!("cloud not reachable, try again later");
//!         return Ok(());
//!     }
//!
//!     // Wait for every device to report once
//!     manager.first_refresh().await?;
//!
//!     for id in manager.device_ids().await {
//!         let state = manager.get_state(id).await.unwrap_or_default();
//!         println!("{id}: charge {:?}%", state.electric_level());
//!     }
//!
//!     manager.unload().await;
//!     Ok(())
//! }
//! ```
//!
//! # Observing State
//!
//! Every device has a watch channel carrying its full state, and the
//! manager broadcasts [`DeviceEvent`]s for individual changes:
//!
//! ```no_run
//! use zendure_link::{DeviceEvent, ManagerConfig, ZendureManager};
//!
//! #[tokio::main]
//! async fn main() -> zendure_link::Result<()> {
//!     let manager = ZendureManager::new(ManagerConfig::new("user@example.com", "secret"))?;
//!     manager.load().await?;
//!
//!     let mut events = manager.subscribe();
//!     while let Ok(event) = events.recv().await {
//!         if let DeviceEvent::StateChanged { device_id, change, .. } = event {
//!             println!("{device_id}: {change:?}");
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Embedding
//!
//! Hosts that manage config entries (setup, unload, migration) use the
//! [`lifecycle`] module instead of driving the manager directly.

pub mod api;
pub mod command;
pub mod error;
pub mod event;
pub mod lifecycle;
pub mod manager;
pub mod protocol;
pub mod state;
pub mod telemetry;
pub mod types;

pub use api::{ApiConfig, CloudClient, DeviceInfo, MqttCredentials};
pub use error::{ApiError, DeviceError, Error, ParseError, ProtocolError, Result};
pub use event::{DeviceEvent, DeviceId, EventBus};
pub use lifecycle::{
    ConfigEntry, ManagedLifecycle, Platform, PlatformHost, RuntimeData, SetupError,
    UpdateListeners, PLATFORMS,
};
pub use manager::{ManagerConfig, ReconnectionPolicy, ZendureManager};
pub use state::{DeviceState, StateChange};
pub use telemetry::PropertyReport;
pub use types::{AcMode, PackState, WorkState};
