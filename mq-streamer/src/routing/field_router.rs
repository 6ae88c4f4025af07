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

//! Field router that fans measurements out to channel workers.

use crate::data_plane::channel_worker::ChannelHandle;
use crate::error::StreamerError;
use crate::model::{FieldMapping, FieldTarget, Measurement};
use crate::observability::events;
use crate::routing::MeasurementListener;
use std::collections::HashMap;
use tracing::{trace, warn, Level};

const COMPONENT: &str = "field_router";

/// Static lookup from `(broker, topic)` to the channel handles consuming it.
pub struct FieldRouter {
    mapping: FieldMapping,
    channels: HashMap<String, ChannelHandle>,
}

impl FieldRouter {
    /// Builds the router. Fails when the mapping targets a channel without a handle.
    pub fn new(
        mapping: FieldMapping,
        channels: HashMap<String, ChannelHandle>,
    ) -> Result<Self, StreamerError> {
        if let Some((_, target)) = mapping
            .iter()
            .find(|(_, target)| !channels.contains_key(&target.channel))
        {
            return Err(StreamerError::UnknownChannel(target.channel.clone()));
        }

        Ok(Self { mapping, channels })
    }

    /// Destinations of a measurement. Empty for unmapped sources.
    pub fn route(&self, measurement: &Measurement) -> &[FieldTarget] {
        self.mapping
            .targets(&measurement.broker, &measurement.topic)
    }

    /// Hands the measurement to every consuming channel and returns how many accepted it.
    pub fn deliver(&self, measurement: Measurement) -> usize {
        let targets = self.route(&measurement);
        if targets.is_empty() {
            trace!(
                event = events::ROUTE_UNMAPPED,
                component = COMPONENT,
                broker = measurement.broker.as_str(),
                topic = measurement.topic.as_str(),
                "no channel consumes this topic"
            );
            return 0;
        }

        if tracing::enabled!(Level::TRACE) {
            trace!(
                event = events::ROUTE_FANOUT,
                component = COMPONENT,
                source = %measurement.source_key(),
                targets = targets.len(),
                "routing measurement"
            );
        }

        let mut delivered = 0;
        for target in targets {
            let Some(handle) = self.channels.get(&target.channel) else {
                continue;
            };
            match handle.ingest(
                target.field.as_str(),
                measurement.value.as_str(),
                measurement.timestamp,
            ) {
                Ok(()) => delivered += 1,
                Err(err) => warn!(
                    event = events::ROUTE_CHANNEL_CLOSED,
                    component = COMPONENT,
                    channel = target.channel.as_str(),
                    field = target.field.as_str(),
                    err = %err,
                    "channel no longer accepts measurements"
                ),
            }
        }
        delivered
    }
}

impl MeasurementListener for FieldRouter {
    fn on_measurement(&self, measurement: Measurement) {
        self.deliver(measurement);
    }
}
