/********************************************************************************
 * Copyright (c) 2026 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

use chrono::{DateTime, TimeZone, Utc};
use integration_test_utils::RecordingGateway;
use mq_streamer::{ChannelSpec, ChannelStreamer, Measurement};
use std::sync::Arc;
use std::time::Duration;

pub(crate) const BROKER: &str = "home";

pub(crate) fn start_streamer(
    specs: Vec<ChannelSpec>,
    rows: &[(&str, &str, &str, &str)],
    gateway: Arc<RecordingGateway>,
) -> ChannelStreamer {
    ChannelStreamer::with_tokio_timers(specs, integration_test_utils::field_mapping(rows), gateway)
        .expect("streamer should start")
}

/// Fixed measurement timestamp `offset_secs` after a reference instant.
#[allow(dead_code)]
pub(crate) fn stamp(offset_secs: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap() + chrono::Duration::seconds(offset_secs)
}

pub(crate) fn measurement(topic: &str, value: &str, offset_secs: i64) -> Measurement {
    Measurement::new(BROKER, topic, value, stamp(offset_secs))
}

#[allow(dead_code)]
pub(crate) async fn sleep_secs(secs: u64) {
    tokio::time::sleep(Duration::from_secs(secs)).await;
}

#[allow(dead_code)]
pub(crate) async fn sleep_millis(millis: u64) {
    tokio::time::sleep(Duration::from_millis(millis)).await;
}
