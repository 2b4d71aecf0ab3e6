// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Topic construction and parsing for the Zendure broker.
//!
//! Topic layout:
//! - Device → cloud: `<appKey>/<deviceKey>/properties/report`
//! - Device → cloud: `<appKey>/<deviceKey>/properties/reply`
//! - Cloud → device: `iot/<appKey>/<deviceKey>/properties/read`
//! - Cloud → device: `iot/<appKey>/<deviceKey>/properties/write`

/// Kind of an inbound device message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicKind {
    /// Periodic or solicited state report.
    Report,
    /// Echo of a property write.
    Reply,
}

/// A parsed inbound topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedTopic<'a> {
    /// The device key segment.
    pub device_key: &'a str,
    /// The message kind.
    pub kind: TopicKind,
}

impl<'a> ParsedTopic<'a> {
    /// Parses an inbound topic of the form
    /// `<appKey>/<deviceKey>/properties/<kind>`.
    ///
    /// Returns `None` for topics that don't match the device message
    /// layout (other traffic on the shared broker is ignored).
    #[must_use]
    pub fn parse(topic: &'a str) -> Option<Self> {
        let mut parts = topic.split('/');
        let _app_key = parts.next()?;
        let device_key = parts.next()?;
        if parts.next()? != "properties" {
            return None;
        }
        let kind = match parts.next()? {
            "report" => TopicKind::Report,
            "reply" => TopicKind::Reply,
            _ => return None,
        };
        if parts.next().is_some() || device_key.is_empty() {
            return None;
        }
        Some(Self { device_key, kind })
    }
}

/// Subscription filter matching all report topics of an account.
#[must_use]
pub fn report_filter(app_key: &str) -> String {
    format!("{app_key}/+/properties/report")
}

/// Subscription filter matching all reply topics of an account.
#[must_use]
pub fn reply_filter(app_key: &str) -> String {
    format!("{app_key}/+/properties/reply")
}

/// Topic for requesting a state report from a device.
#[must_use]
pub fn read_topic(app_key: &str, device_key: &str) -> String {
    format!("iot/{app_key}/{device_key}/properties/read")
}

/// Topic for writing properties to a device.
#[must_use]
pub fn write_topic(app_key: &str, device_key: &str) -> String {
    format!("iot/{app_key}/{device_key}/properties/write")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_report_topic() {
        let parsed = ParsedTopic::parse("appkey1/devkey1/properties/report").unwrap();
        assert_eq!(parsed.device_key, "devkey1");
        assert_eq!(parsed.kind, TopicKind::Report);
    }

    #[test]
    fn parse_reply_topic() {
        let parsed = ParsedTopic::parse("appkey1/devkey1/properties/reply").unwrap();
        assert_eq!(parsed.kind, TopicKind::Reply);
    }

    #[test]
    fn parse_rejects_foreign_topics() {
        assert!(ParsedTopic::parse("appkey1/devkey1/ota/progress").is_none());
        assert!(ParsedTopic::parse("appkey1/devkey1/properties/write").is_none());
        assert!(ParsedTopic::parse("appkey1/devkey1/properties/report/extra").is_none());
        assert!(ParsedTopic::parse("short/topic").is_none());
        assert!(ParsedTopic::parse("").is_none());
    }

    #[test]
    fn outbound_topics() {
        assert_eq!(
            read_topic("app", "dev"),
            "iot/app/dev/properties/read"
        );
        assert_eq!(
            write_topic("app", "dev"),
            "iot/app/dev/properties/write"
        );
    }

    #[test]
    fn filters_use_single_level_wildcard() {
        assert_eq!(report_filter("app"), "app/+/properties/report");
        assert_eq!(reply_filter("app"), "app/+/properties/reply");
    }
}
