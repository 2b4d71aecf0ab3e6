// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! MQTT protocol plumbing for the Zendure cloud broker.
//!
//! All devices of an account share one broker connection. Inbound
//! messages (reports and write replies) are parsed by topic and handed
//! to the manager through a channel; outbound traffic is property read
//! requests and property writes.

mod mqtt;
mod topic;

pub use mqtt::{InboundMessage, LinkStatus, MqttLink};
pub use topic::{ParsedTopic, TopicKind, read_topic, reply_filter, report_filter, write_topic};
