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

use mq_streamer::{ChannelSpec, FieldMapping, FieldTarget, SourceKey, UpdateType};
use std::time::Duration;

/// Builds a valid channel spec, panicking on invalid test input.
pub fn channel_spec(
    id: &str,
    update_type: UpdateType,
    rate_secs: u64,
    wait_secs: u64,
    fields: &[&str],
) -> ChannelSpec {
    ChannelSpec::new(
        id,
        update_type,
        Duration::from_secs(rate_secs),
        Duration::from_secs(wait_secs),
        fields.iter().copied(),
    )
    .expect("test channel spec should be valid")
}

/// Builds a mapping from `(broker, topic, channel, field)` rows.
pub fn field_mapping(rows: &[(&str, &str, &str, &str)]) -> FieldMapping {
    rows.iter()
        .map(|(broker, topic, channel, field)| {
            (
                SourceKey::new(*broker, *topic),
                FieldTarget::new(*channel, *field),
            )
        })
        .collect()
}
