// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Integration tests for the cloud REST client using wiremock.

use std::time::Duration;

use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use zendure_link::api::{ApiConfig, CloudClient};
use zendure_link::error::ApiError;

fn client_for(server: &MockServer) -> CloudClient {
    CloudClient::new(
        ApiConfig::new()
            .with_base_url(server.uri())
            .with_timeout(Duration::from_secs(2)),
    )
    .unwrap()
}

fn login_body() -> serde_json::Value {
    serde_json::json!({
        "success": true,
        "data": {
            "accessToken": "token-123",
            "appKey": "appkey-1",
            "iotUrl": "mq.example.com",
            "iotPort": 1883,
            "iotUser": "mqtt-user",
            "iotPwd": "mqtt-pass"
        }
    })
}

mod login {
    use super::*;

    #[tokio::test]
    async fn success_returns_broker_credentials() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/auth/app/token"))
            .and(body_json(serde_json::json!({
                "account": "user@example.com",
                "password": "secret"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(login_body()))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let credentials = client.login("user@example.com", "secret").await.unwrap();

        assert_eq!(credentials.host, "mq.example.com");
        assert_eq!(credentials.port, 1883);
        assert_eq!(credentials.username, "mqtt-user");
        assert_eq!(credentials.app_key, "appkey-1");
        assert!(client.has_session());
    }

    #[tokio::test]
    async fn http_401_is_authentication_failure() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/auth/app/token"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client.login("user@example.com", "wrong").await.unwrap_err();
        assert!(matches!(err, ApiError::AuthenticationFailed));
        assert!(!client.has_session());
    }

    #[tokio::test]
    async fn envelope_401_is_authentication_failure() {
        let server = MockServer::start().await;

        // The cloud reports bad credentials with HTTP 200 and code 401
        Mock::given(method("POST"))
            .and(path("/auth/app/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": false,
                "code": 401,
                "msg": "account or password error"
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client.login("user@example.com", "wrong").await.unwrap_err();
        assert!(matches!(err, ApiError::AuthenticationFailed));
    }

    #[tokio::test]
    async fn server_error_is_unexpected_status() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/auth/app/token"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client.login("user@example.com", "secret").await.unwrap_err();
        assert!(matches!(err, ApiError::UnexpectedStatus { status: 503, .. }));
    }

    #[tokio::test]
    async fn missing_data_is_malformed() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/auth/app/token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "success": true })),
            )
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client.login("user@example.com", "secret").await.unwrap_err();
        assert!(matches!(err, ApiError::MalformedResponse(_)));
    }
}

mod device_list {
    use super::*;

    async fn mount_login(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/auth/app/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(login_body()))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn requires_a_session() {
        let server = MockServer::start().await;
        let client = client_for(&server);

        let err = client.device_list().await.unwrap_err();
        assert!(matches!(err, ApiError::NoSession));
    }

    #[tokio::test]
    async fn sends_bearer_token_and_parses_devices() {
        let server = MockServer::start().await;
        mount_login(&server).await;

        Mock::given(method("POST"))
            .and(path("/productModule/device/queryDeviceListByConsumerId"))
            .and(header("authorization", "Bearer token-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "data": [
                    {
                        "deviceKey": "devkey-1",
                        "productKey": "prodkey-1",
                        "productName": "SolarFlow Hub 2000",
                        "deviceName": "Garage Hub",
                        "snNumber": "SN-0001"
                    },
                    {
                        "deviceKey": "devkey-2",
                        "productKey": "prodkey-1"
                    }
                ]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        client.login("user@example.com", "secret").await.unwrap();

        let devices = client.device_list().await.unwrap();
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].device_key, "devkey-1");
        assert_eq!(devices[0].display_name(), "Garage Hub");
        // Sparse record falls back to the device key
        assert_eq!(devices[1].display_name(), "devkey-2");
        assert_eq!(devices[1].serial, None);
    }

    #[tokio::test]
    async fn empty_account_yields_no_devices() {
        let server = MockServer::start().await;
        mount_login(&server).await;

        Mock::given(method("POST"))
            .and(path("/productModule/device/queryDeviceListByConsumerId"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "success": true, "data": [] })),
            )
            .mount(&server)
            .await;

        let client = client_for(&server);
        client.login("user@example.com", "secret").await.unwrap();
        assert!(client.device_list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn expired_session_is_cleared() {
        let server = MockServer::start().await;
        mount_login(&server).await;

        Mock::given(method("POST"))
            .and(path("/productModule/device/queryDeviceListByConsumerId"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = client_for(&server);
        client.login("user@example.com", "secret").await.unwrap();
        assert!(client.has_session());

        let err = client.device_list().await.unwrap_err();
        assert!(matches!(err, ApiError::AuthenticationFailed));
        assert!(!client.has_session());
    }
}
