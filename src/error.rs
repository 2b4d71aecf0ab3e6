// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the `zendure_link` library.
//!
//! This module provides a layered error hierarchy for handling failures
//! across the library: cloud API access, MQTT communication, payload
//! parsing, and device operations.

use thiserror::Error;

/// The main error type for this library.
///
/// This enum encompasses all possible errors that can occur when managing
/// Zendure devices through the cloud.
#[derive(Debug, Error)]
pub enum Error {
    /// Error occurred while talking to the Zendure cloud API.
    #[error("cloud API error: {0}")]
    Api(#[from] ApiError),

    /// Error occurred during MQTT communication.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Error occurred while parsing a payload.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// Error occurred during device operations.
    #[error("device error: {0}")]
    Device(#[from] DeviceError),

    /// Device was not found in the manager.
    #[error("device not found")]
    DeviceNotFound,

    /// The manager is not loaded (no live connection).
    #[error("manager is not loaded")]
    NotLoaded,
}

/// Errors related to the Zendure cloud REST API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The HTTP request itself failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The cloud rejected the account credentials.
    #[error("authentication failed")]
    AuthenticationFailed,

    /// The cloud returned a non-success status code.
    #[error("unexpected status {status}: {message}")]
    UnexpectedStatus {
        /// HTTP status code returned by the cloud.
        status: u16,
        /// Response body or status reason.
        message: String,
    },

    /// The response body did not have the expected shape.
    #[error("malformed API response: {0}")]
    MalformedResponse(String),

    /// No session token is available (login has not run or expired).
    #[error("no active session")]
    NoSession,
}

/// Errors related to MQTT communication with the cloud broker.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// MQTT connection or publish failed.
    #[error("MQTT error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),

    /// Connection to the broker failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Request timed out.
    #[error("request timed out after {0} ms")]
    Timeout(u64),

    /// Invalid broker URL or address.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Internal channel was closed.
    #[error("channel closed: {0}")]
    ChannelClosed(String),
}

/// Errors related to parsing cloud and device payloads.
#[derive(Debug, Error)]
pub enum ParseError {
    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Expected field is missing from the payload.
    #[error("missing field: {0}")]
    MissingField(String),

    /// Unexpected payload format.
    #[error("unexpected payload format: {0}")]
    UnexpectedFormat(String),
}

/// Errors related to device operations.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// A property value is outside the range the device accepts.
    #[error("{property} value {actual} is out of range [{min}, {max}]")]
    ValueOutOfRange {
        /// The property being written.
        property: &'static str,
        /// Minimum accepted value.
        min: u16,
        /// Maximum accepted value.
        max: u16,
        /// The value that was provided.
        actual: u16,
    },

    /// The device rejected a property write.
    #[error("write rejected: {0}")]
    WriteRejected(String),

    /// Device configuration from the cloud is incomplete or invalid.
    #[error("invalid device record: {0}")]
    InvalidRecord(String),
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_error_display() {
        let err = DeviceError::ValueOutOfRange {
            property: "outputLimit",
            min: 0,
            max: 1200,
            actual: 2000,
        };
        assert_eq!(
            err.to_string(),
            "outputLimit value 2000 is out of range [0, 1200]"
        );
    }

    #[test]
    fn error_from_api_error() {
        let err: Error = ApiError::AuthenticationFailed.into();
        assert!(matches!(err, Error::Api(ApiError::AuthenticationFailed)));
    }

    #[test]
    fn parse_error_display() {
        let err = ParseError::MissingField("deviceKey".to_string());
        assert_eq!(err.to_string(), "missing field: deviceKey");
    }

    #[test]
    fn protocol_timeout_display() {
        let err = ProtocolError::Timeout(5000);
        assert_eq!(err.to_string(), "request timed out after 5000 ms");
    }
}
