// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! End-to-end manager tests using wiremock for the cloud REST API and
//! mockforge-mqtt as an embedded broker, with a simulated hub answering
//! report requests and property writes over the broker.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use mockforge_mqtt::broker::MqttConfig;
use mockforge_mqtt::start_mqtt_server;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use tokio::time::sleep;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use zendure_link::api::ApiConfig;
use zendure_link::manager::{ManagerConfig, ZendureManager};

const APP_KEY: &str = "appkey-1";
const DEVICE_KEY: &str = "devkey-1";

/// Helper to find an available port for testing.
fn get_test_port() -> u16 {
    use std::sync::atomic::AtomicU16;
    static PORT_COUNTER: AtomicU16 = AtomicU16::new(18950);
    PORT_COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// Starts a mock MQTT broker on the given port.
async fn start_mock_broker(port: u16) {
    let config = MqttConfig {
        port,
        host: "127.0.0.1".to_string(),
        ..Default::default()
    };

    tokio::spawn(async move {
        let _ = start_mqtt_server(config).await;
    });

    // Give the broker time to start, bind to port, and be ready to accept connections
    sleep(Duration::from_millis(500)).await;
}

/// Connects a simulated hub to the broker: answers report requests with
/// a fixed telemetry report and echoes property writes as replies.
/// Counts the report requests it receives.
async fn start_device_sim(port: u16, read_count: Arc<AtomicUsize>) {
    let mut options = MqttOptions::new("hub-sim", "127.0.0.1", port);
    options.set_keep_alive(Duration::from_secs(10));
    let (client, mut event_loop) = AsyncClient::new(options, 16);

    client
        .subscribe(
            format!("iot/{APP_KEY}/{DEVICE_KEY}/properties/read"),
            QoS::AtLeastOnce,
        )
        .await
        .unwrap();
    client
        .subscribe(
            format!("iot/{APP_KEY}/{DEVICE_KEY}/properties/write"),
            QoS::AtLeastOnce,
        )
        .await
        .unwrap();

    tokio::spawn(async move {
        while let Ok(event) = event_loop.poll().await {
            let Event::Incoming(Packet::Publish(publish)) = event else {
                continue;
            };

            if publish.topic.ends_with("/read") {
                read_count.fetch_add(1, Ordering::SeqCst);
                let report = serde_json::json!({
                    "properties": { "electricLevel": 81, "solarInputPower": 240 }
                });
                let _ = client
                    .publish(
                        format!("{APP_KEY}/{DEVICE_KEY}/properties/report"),
                        QoS::AtLeastOnce,
                        false,
                        report.to_string(),
                    )
                    .await;
            } else if publish.topic.ends_with("/write") {
                let _ = client
                    .publish(
                        format!("{APP_KEY}/{DEVICE_KEY}/properties/reply"),
                        QoS::AtLeastOnce,
                        false,
                        publish.payload.to_vec(),
                    )
                    .await;
            }
        }
    });

    // Let the simulator finish its subscriptions
    sleep(Duration::from_millis(300)).await;
}

fn login_body(broker_port: u16) -> serde_json::Value {
    serde_json::json!({
        "success": true,
        "data": {
            "accessToken": "token-123",
            "appKey": APP_KEY,
            "iotUrl": "127.0.0.1",
            "iotPort": broker_port,
            "iotUser": "mqtt-user",
            "iotPwd": "mqtt-pass"
        }
    })
}

fn device_list_body() -> serde_json::Value {
    serde_json::json!({
        "success": true,
        "data": [{
            "deviceKey": DEVICE_KEY,
            "productKey": "prodkey-1",
            "productName": "SolarFlow Hub 2000",
            "deviceName": "Garage Hub"
        }]
    })
}

async fn mount_cloud(server: &MockServer, broker_port: u16) {
    Mock::given(method("POST"))
        .and(path("/auth/app/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(login_body(broker_port)))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/productModule/device/queryDeviceListByConsumerId"))
        .respond_with(ResponseTemplate::new(200).set_body_json(device_list_body()))
        .mount(server)
        .await;
}

fn manager_for(server: &MockServer) -> ZendureManager {
    ZendureManager::new(
        ManagerConfig::new("user@example.com", "secret")
            .with_api(ApiConfig::new().with_base_url(server.uri()))
            // Keep the periodic poll out of the way of the assertions
            .with_poll_interval(Duration::from_secs(3600))
            .with_refresh_timeout(Duration::from_secs(5)),
    )
    .unwrap()
}

#[tokio::test]
async fn load_refresh_read_unload_roundtrip() {
    let broker_port = get_test_port();
    start_mock_broker(broker_port).await;
    let read_count = Arc::new(AtomicUsize::new(0));
    start_device_sim(broker_port, Arc::clone(&read_count)).await;

    let server = MockServer::start().await;
    mount_cloud(&server, broker_port).await;

    let manager = manager_for(&server);
    assert!(manager.load().await.unwrap());
    assert!(manager.is_loaded());
    assert_eq!(manager.device_count().await, 1);

    // The initial refresh blocks until the hub has reported
    manager.first_refresh().await.unwrap();

    let id = manager.device_ids().await[0];
    let state = manager.get_state(id).await.unwrap();
    assert_eq!(state.electric_level(), Some(81));
    assert_eq!(state.solar_input(), Some(240));
    assert!(state.has_reported());

    manager.unload().await;
    assert!(!manager.is_loaded());
    assert_eq!(manager.device_count().await, 0);

    // A second unload finds nothing left to release
    manager.unload().await;
    assert!(!manager.is_loaded());
}

#[tokio::test]
async fn reloading_a_loaded_manager_is_a_noop() {
    let broker_port = get_test_port();
    start_mock_broker(broker_port).await;

    let server = MockServer::start().await;
    // Exactly one login and one discovery: the second load must not
    // touch the cloud again
    Mock::given(method("POST"))
        .and(path("/auth/app/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(login_body(broker_port)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/productModule/device/queryDeviceListByConsumerId"))
        .respond_with(ResponseTemplate::new(200).set_body_json(device_list_body()))
        .expect(1)
        .mount(&server)
        .await;

    let manager = manager_for(&server);
    assert!(manager.load().await.unwrap());
    assert!(manager.load().await.unwrap());
    assert_eq!(manager.device_count().await, 1);

    manager.unload().await;
}

#[tokio::test]
async fn concurrent_refreshes_are_coalesced() {
    let broker_port = get_test_port();
    start_mock_broker(broker_port).await;
    let read_count = Arc::new(AtomicUsize::new(0));
    start_device_sim(broker_port, Arc::clone(&read_count)).await;

    let server = MockServer::start().await;
    mount_cloud(&server, broker_port).await;

    let manager = manager_for(&server);
    assert!(manager.load().await.unwrap());

    let (first, second) = tokio::join!(manager.refresh(), manager.refresh());
    first.unwrap();
    second.unwrap();

    // Both callers complete, but only one round of report requests
    // reaches the hub
    sleep(Duration::from_millis(200)).await;
    assert_eq!(read_count.load(Ordering::SeqCst), 1);

    manager.unload().await;
}

#[tokio::test]
async fn expired_session_during_discovery_is_retryable() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/app/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(login_body(1883)))
        .mount(&server)
        .await;
    // Session died between login and discovery
    Mock::given(method("POST"))
        .and(path("/productModule/device/queryDeviceListByConsumerId"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let manager = manager_for(&server);
    assert!(!manager.load().await.unwrap());
    assert!(!manager.is_loaded());
    assert_eq!(manager.device_count().await, 0);
}
