// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Manager configuration types.

use std::time::Duration;

use crate::api::ApiConfig;

/// Configuration for a [`ZendureManager`](super::ZendureManager).
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use zendure_link::manager::ManagerConfig;
///
/// let config = ManagerConfig::new("user@example.com", "secret")
///     .with_poll_interval(Duration::from_secs(30));
/// ```
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Cloud account name (e-mail address).
    pub account: String,
    /// Cloud account password.
    pub password: String,
    /// Cloud REST endpoint configuration.
    pub api: ApiConfig,
    /// Interval between periodic report requests.
    pub poll_interval: Duration,
    /// How long a refresh waits for each device to report.
    pub refresh_timeout: Duration,
    /// How long a property write waits for the device reply.
    pub write_timeout: Duration,
    /// Reconnection policy for the broker link.
    pub reconnection: ReconnectionPolicy,
}

impl ManagerConfig {
    /// Default interval between periodic report requests.
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);
    /// Default per-device refresh wait.
    pub const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(5);
    /// Default reply wait for property writes.
    pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

    /// Creates a configuration for the given cloud account.
    #[must_use]
    pub fn new(account: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            password: password.into(),
            api: ApiConfig::new(),
            poll_interval: Self::DEFAULT_POLL_INTERVAL,
            refresh_timeout: Self::DEFAULT_REFRESH_TIMEOUT,
            write_timeout: Self::DEFAULT_WRITE_TIMEOUT,
            reconnection: ReconnectionPolicy::default(),
        }
    }

    /// Sets the cloud endpoint configuration.
    #[must_use]
    pub fn with_api(mut self, api: ApiConfig) -> Self {
        self.api = api;
        self
    }

    /// Sets the periodic poll interval.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the per-device refresh wait.
    #[must_use]
    pub fn with_refresh_timeout(mut self, timeout: Duration) -> Self {
        self.refresh_timeout = timeout;
        self
    }

    /// Sets the reply wait for property writes.
    #[must_use]
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Sets the reconnection policy.
    #[must_use]
    pub fn with_reconnection(mut self, policy: ReconnectionPolicy) -> Self {
        self.reconnection = policy;
        self
    }
}

/// Configuration for automatic broker reconnection.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use zendure_link::manager::ReconnectionPolicy;
///
/// // Default policy (enabled with exponential backoff)
/// let policy = ReconnectionPolicy::default();
///
/// // Disable reconnection
/// let policy = ReconnectionPolicy::disabled();
///
/// // Custom policy
/// let policy = ReconnectionPolicy::new()
///     .with_max_retries(5)
///     .with_initial_delay(Duration::from_millis(500))
///     .with_max_delay(Duration::from_secs(30));
/// ```
#[derive(Debug, Clone)]
pub struct ReconnectionPolicy {
    /// Whether automatic reconnection is enabled.
    pub enabled: bool,
    /// Maximum number of retries before giving up (None = infinite).
    pub max_retries: Option<u32>,
    /// Initial delay between retry attempts.
    pub initial_delay: Duration,
    /// Maximum delay between retry attempts (for exponential backoff).
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f32,
}

impl ReconnectionPolicy {
    /// Creates a new reconnection policy with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a disabled reconnection policy.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Sets the maximum number of retries.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Sets infinite retries.
    #[must_use]
    pub fn with_infinite_retries(mut self) -> Self {
        self.max_retries = None;
        self
    }

    /// Sets the initial delay between retry attempts.
    #[must_use]
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the maximum delay between retry attempts.
    #[must_use]
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff multiplier.
    #[must_use]
    pub fn with_backoff_multiplier(mut self, multiplier: f32) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Returns the delay to wait before the given retry attempt.
    ///
    /// Grows exponentially from `initial_delay`, capped at `max_delay`.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        // Saturate the exponent so large attempt counts can't overflow
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let factor = f64::from(self.backoff_multiplier).powi(exponent);

        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let millis = (self.initial_delay.as_millis() as f64 * factor)
            .min(self.max_delay.as_millis() as f64) as u64;

        Duration::from_millis(millis)
    }
}

impl Default for ReconnectionPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            max_retries: None,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
        }
    }
}
