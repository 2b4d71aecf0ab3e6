// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! MQTT link to the Zendure cloud broker.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;

use crate::api::MqttCredentials;
use crate::error::ProtocolError;
use crate::manager::ReconnectionPolicy;

use super::topic::{ParsedTopic, read_topic, reply_filter, report_filter, write_topic};

/// Global counter for generating unique client IDs.
static CLIENT_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Keep-alive interval for the broker connection.
const KEEP_ALIVE: Duration = Duration::from_secs(30);

/// An inbound device message delivered to the manager.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// Device key parsed from the topic.
    pub device_key: String,
    /// Whether this is a report or a write reply.
    pub kind: super::TopicKind,
    /// Raw JSON payload.
    pub payload: String,
}

/// Status of the broker link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkStatus {
    /// Initial connection attempt in progress.
    Connecting,
    /// Link is up.
    Connected,
    /// Link dropped; reconnection may be in progress.
    Disconnected {
        /// Error message, if the drop was caused by an error.
        error: Option<String>,
    },
    /// Link was closed deliberately (or gave up reconnecting).
    Closed,
}

impl LinkStatus {
    /// Returns `true` if the link is up.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

/// One MQTT connection to the cloud broker, shared by all devices of an
/// account.
///
/// The link owns a background task that drives the rumqttc event loop:
/// it forwards report/reply publishes to the manager through a channel,
/// tracks connection status in a watch channel, and retries per
/// [`ReconnectionPolicy`] when the connection drops.
#[derive(Debug)]
pub struct MqttLink {
    client: AsyncClient,
    app_key: String,
    status_rx: watch::Receiver<LinkStatus>,
    shutdown_tx: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl MqttLink {
    /// Connects to the broker and starts the event-loop task.
    ///
    /// Inbound device messages are delivered on `inbound_tx`. Note that
    /// the broker connection is established asynchronously; observe
    /// [`status`](Self::status) for the actual link state.
    ///
    /// # Errors
    ///
    /// Returns an error if the subscriptions cannot be queued.
    pub async fn connect(
        credentials: &MqttCredentials,
        policy: ReconnectionPolicy,
        inbound_tx: mpsc::Sender<InboundMessage>,
    ) -> Result<Self, ProtocolError> {
        // Unique client ID (PID + counter to avoid broker-side conflicts)
        let counter = CLIENT_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
        let client_id = format!("zendure_link_{}_{}", std::process::id(), counter);

        let mut options = MqttOptions::new(client_id, &credentials.host, credentials.port);
        options.set_credentials(&credentials.username, &credentials.password);
        options.set_keep_alive(KEEP_ALIVE);
        options.set_clean_session(true);

        let (client, event_loop) = AsyncClient::new(options, 64);

        let report = report_filter(&credentials.app_key);
        let reply = reply_filter(&credentials.app_key);
        client
            .subscribe(&report, QoS::AtLeastOnce)
            .await
            .map_err(ProtocolError::Mqtt)?;
        client
            .subscribe(&reply, QoS::AtLeastOnce)
            .await
            .map_err(ProtocolError::Mqtt)?;

        let (status_tx, status_rx) = watch::channel(LinkStatus::Connecting);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(run_event_loop(
            event_loop,
            client.clone(),
            vec![report, reply],
            inbound_tx,
            status_tx,
            policy,
            shutdown_rx,
        ));

        Ok(Self {
            client,
            app_key: credentials.app_key.clone(),
            status_rx,
            shutdown_tx,
            task: Mutex::new(Some(task)),
        })
    }

    /// Returns a watch receiver for the link status.
    #[must_use]
    pub fn status(&self) -> watch::Receiver<LinkStatus> {
        self.status_rx.clone()
    }

    /// Returns `true` if the link is currently up.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.status_rx.borrow().is_connected()
    }

    /// Asks a device to publish a full state report.
    ///
    /// # Errors
    ///
    /// Returns an error if the publish cannot be queued.
    pub async fn request_report(&self, device_key: &str) -> Result<(), ProtocolError> {
        let topic = read_topic(&self.app_key, device_key);
        let payload = serde_json::json!({ "properties": ["getAll"] }).to_string();

        tracing::debug!(topic = %topic, "Requesting device report");

        self.client
            .publish(topic, QoS::AtLeastOnce, false, payload)
            .await
            .map_err(ProtocolError::Mqtt)
    }

    /// Publishes a property write to a device.
    ///
    /// # Errors
    ///
    /// Returns an error if the publish cannot be queued.
    pub async fn write_properties(
        &self,
        device_key: &str,
        payload: &serde_json::Value,
    ) -> Result<(), ProtocolError> {
        let topic = write_topic(&self.app_key, device_key);
        let body = payload.to_string();

        tracing::debug!(topic = %topic, payload = %body, "Publishing property write");

        self.client
            .publish(topic, QoS::AtLeastOnce, false, body)
            .await
            .map_err(ProtocolError::Mqtt)
    }

    /// Closes the link and waits for the event-loop task to stop.
    ///
    /// Idempotent: closing an already-closed link is a no-op.
    pub async fn close(&self) {
        let _ = self.shutdown_tx.send(true);
        // Wake the event loop so it observes the shutdown promptly
        let _ = self.client.disconnect().await;

        if let Some(task) = self.task.lock().await.take() {
            let _ = task.await;
        }
    }
}

/// Drives the rumqttc event loop until shutdown.
async fn run_event_loop(
    mut event_loop: EventLoop,
    client: AsyncClient,
    filters: Vec<String>,
    inbound_tx: mpsc::Sender<InboundMessage>,
    status_tx: watch::Sender<LinkStatus>,
    policy: ReconnectionPolicy,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    tracing::debug!("Starting MQTT event loop");
    let mut attempt: u32 = 0;

    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    break;
                }
            }
            event = event_loop.poll() => match event {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    tracing::info!("Broker connection established");
                    attempt = 0;
                    // Sessions are clean, so re-issue subscriptions on
                    // every (re)connect unless the broker kept them
                    if !ack.session_present {
                        for filter in &filters {
                            if let Err(e) = client.try_subscribe(filter, QoS::AtLeastOnce) {
                                tracing::warn!(filter = %filter, error = %e, "Resubscribe failed");
                            }
                        }
                    }
                    status_tx.send_replace(LinkStatus::Connected);
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    let payload = String::from_utf8_lossy(&publish.payload).into_owned();
                    let Some(parsed) = ParsedTopic::parse(&publish.topic) else {
                        tracing::trace!(topic = %publish.topic, "Ignoring unparseable topic");
                        continue;
                    };

                    let message = InboundMessage {
                        device_key: parsed.device_key.to_string(),
                        kind: parsed.kind,
                        payload,
                    };
                    if inbound_tx.send(message).await.is_err() {
                        // Manager dropped its receiver; nothing left to do
                        break;
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    if *shutdown_rx.borrow() {
                        break;
                    }

                    status_tx.send_replace(LinkStatus::Disconnected {
                        error: Some(e.to_string()),
                    });

                    if !policy.enabled {
                        tracing::warn!(error = %e, "Link dropped, reconnection disabled");
                        break;
                    }
                    if let Some(max) = policy.max_retries
                        && attempt >= max
                    {
                        tracing::error!(attempts = attempt, "Giving up on reconnection");
                        break;
                    }

                    let delay = policy.delay_for_attempt(attempt);
                    attempt += 1;
                    tracing::warn!(
                        error = %e,
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "Link dropped, retrying"
                    );

                    tokio::select! {
                        () = tokio::time::sleep(delay) => {}
                        _ = shutdown_rx.changed() => {
                            if *shutdown_rx.borrow() {
                                break;
                            }
                        }
                    }
                }
            }
        }
    }

    status_tx.send_replace(LinkStatus::Closed);
    tracing::debug!("MQTT event loop stopped");
}
