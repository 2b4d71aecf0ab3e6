// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Zendure cloud REST client.
//!
//! The cloud is the entry point for everything else: logging in yields a
//! session token plus the per-account MQTT credentials, and the device
//! list query yields the hubs bound to the account. All device telemetry
//! and control then flows over MQTT.

use std::time::Duration;

use parking_lot::RwLock;
use reqwest::Client;
use serde::Deserialize;

use crate::error::ApiError;

/// Default Zendure cloud endpoint.
pub const DEFAULT_BASE_URL: &str = "https://app.zendure.tech/v2";

/// Login endpoint path.
const LOGIN_PATH: &str = "/auth/app/token";

/// Device list endpoint path.
const DEVICE_LIST_PATH: &str = "/productModule/device/queryDeviceListByConsumerId";

/// Configuration for the cloud client.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use zendure_link::api::ApiConfig;
///
/// let config = ApiConfig::new()
///     .with_base_url("https://app.zendure.tech/v2")
///     .with_timeout(Duration::from_secs(5));
/// ```
#[derive(Debug, Clone)]
pub struct ApiConfig {
    base_url: String,
    timeout: Duration,
}

impl ApiConfig {
    /// Default request timeout.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Creates a configuration pointing at the production cloud.
    #[must_use]
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    /// Overrides the base URL (used by tests and regional endpoints).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// MQTT broker credentials handed out by the cloud at login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MqttCredentials {
    /// Broker hostname.
    pub host: String,
    /// Broker port.
    pub port: u16,
    /// Broker username.
    pub username: String,
    /// Broker password.
    pub password: String,
    /// Account application key; first segment of every topic.
    pub app_key: String,
}

/// A device record from the cloud device list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeviceInfo {
    /// Broker routing key for this device.
    #[serde(rename = "deviceKey")]
    pub device_key: String,
    /// Product family key.
    #[serde(rename = "productKey")]
    pub product_key: String,
    /// Human-readable product name (e.g. "SolarFlow Hub 2000").
    #[serde(rename = "productName", default)]
    pub product_name: Option<String>,
    /// User-assigned device name.
    #[serde(rename = "deviceName", default)]
    pub name: Option<String>,
    /// Device serial number.
    #[serde(rename = "snNumber", default)]
    pub serial: Option<String>,
}

impl DeviceInfo {
    /// Returns the name to show for this device: the user-assigned name,
    /// falling back to the product name, then the device key.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.product_name.as_deref())
            .unwrap_or(&self.device_key)
    }
}

/// Standard cloud response envelope.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    msg: Option<String>,
    data: Option<T>,
}

/// Payload of a successful login.
#[derive(Debug, Deserialize)]
struct LoginData {
    #[serde(rename = "accessToken")]
    access_token: String,
    #[serde(rename = "appKey")]
    app_key: String,
    #[serde(rename = "iotUrl")]
    iot_url: String,
    #[serde(rename = "iotPort", default = "default_iot_port")]
    iot_port: u16,
    #[serde(rename = "iotUser")]
    iot_user: String,
    #[serde(rename = "iotPwd")]
    iot_pwd: String,
}

fn default_iot_port() -> u16 {
    1883
}

/// Active cloud session.
#[derive(Debug, Clone)]
struct Session {
    token: String,
}

/// Client for the Zendure cloud REST API.
///
/// The client is cheap to share behind an `Arc`; the session token is kept
/// in interior-mutable storage so `&self` methods can refresh it.
#[derive(Debug)]
pub struct CloudClient {
    http: Client,
    config: ApiConfig,
    session: RwLock<Option<Session>>,
}

impl CloudClient {
    /// Creates a new cloud client.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(config: ApiConfig) -> Result<Self, ApiError> {
        let http = Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            http,
            config,
            session: RwLock::new(None),
        })
    }

    /// Returns `true` if a login session is active.
    #[must_use]
    pub fn has_session(&self) -> bool {
        self.session.read().is_some()
    }

    /// Drops the active session, if any.
    pub fn clear_session(&self) {
        *self.session.write() = None;
    }

    /// Logs in with account credentials.
    ///
    /// On success the session token is stored for subsequent calls and the
    /// per-account MQTT credentials are returned.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::AuthenticationFailed`] if the cloud rejects the
    /// credentials, or a transport/format error otherwise.
    pub async fn login(
        &self,
        account: &str,
        password: &str,
    ) -> Result<MqttCredentials, ApiError> {
        let url = format!("{}{LOGIN_PATH}", self.config.base_url);

        tracing::debug!(url = %url, account = %account, "Logging in to cloud");

        let response = self
            .http
            .post(&url)
            .json(&serde_json::json!({
                "account": account,
                "password": password,
            }))
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ApiError::AuthenticationFailed);
        }
        if !status.is_success() {
            return Err(ApiError::UnexpectedStatus {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let envelope: Envelope<LoginData> = response.json().await?;
        if !envelope.success {
            // The cloud reports credential failures with HTTP 200
            if envelope.code == Some(401) {
                return Err(ApiError::AuthenticationFailed);
            }
            return Err(ApiError::MalformedResponse(
                envelope.msg.unwrap_or_else(|| "login not successful".to_string()),
            ));
        }

        let data = envelope
            .data
            .ok_or_else(|| ApiError::MalformedResponse("login data missing".to_string()))?;

        *self.session.write() = Some(Session {
            token: data.access_token,
        });

        tracing::info!(broker = %data.iot_url, "Cloud login succeeded");

        Ok(MqttCredentials {
            host: data.iot_url,
            port: data.iot_port,
            username: data.iot_user,
            password: data.iot_pwd,
            app_key: data.app_key,
        })
    }

    /// Fetches the devices bound to the logged-in account.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NoSession`] if called before a successful login.
    pub async fn device_list(&self) -> Result<Vec<DeviceInfo>, ApiError> {
        let token = self
            .session
            .read()
            .as_ref()
            .map(|s| s.token.clone())
            .ok_or(ApiError::NoSession)?;

        let url = format!("{}{DEVICE_LIST_PATH}", self.config.base_url);

        tracing::debug!(url = %url, "Querying device list");

        let response = self.http.post(&url).bearer_auth(token).send().await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            // Session expired; caller should log in again
            self.clear_session();
            return Err(ApiError::AuthenticationFailed);
        }
        if !status.is_success() {
            return Err(ApiError::UnexpectedStatus {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let envelope: Envelope<Vec<DeviceInfo>> = response.json().await?;
        if !envelope.success {
            return Err(ApiError::MalformedResponse(
                envelope
                    .msg
                    .unwrap_or_else(|| "device list not successful".to_string()),
            ));
        }

        let devices = envelope.data.unwrap_or_default();
        tracing::debug!(count = devices.len(), "Device list received");
        Ok(devices)
    }
}
