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

//! Shared data model: measurements, channel specs, field mappings and composed updates.

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::time::Duration;

/// Smallest accepted rate interval for any channel.
pub const MIN_RATE_INTERVAL: Duration = Duration::from_secs(1);

/// Upper bound of fields a single remote record can carry.
pub const MAX_CHANNEL_FIELDS: usize = 8;

/// Identifies one `(broker, topic)` data stream.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct SourceKey {
    pub broker: String,
    pub topic: String,
}

impl SourceKey {
    pub fn new(broker: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            broker: broker.into(),
            topic: topic.into(),
        }
    }
}

impl Display for SourceKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.broker, self.topic)
    }
}

/// One `(channel, field)` destination of a routed measurement.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct FieldTarget {
    pub channel: String,
    pub field: String,
}

impl FieldTarget {
    pub fn new(channel: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            field: field.into(),
        }
    }
}

/// A single raw value received from a broker topic.
#[derive(Clone, Debug, PartialEq)]
pub struct Measurement {
    pub broker: String,
    pub topic: String,
    pub value: String,
    pub timestamp: DateTime<Utc>,
}

impl Measurement {
    pub fn new(
        broker: impl Into<String>,
        topic: impl Into<String>,
        value: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            broker: broker.into(),
            topic: topic.into(),
            value: value.into(),
            timestamp,
        }
    }

    /// Builds a measurement stamped with the current wall-clock time.
    pub fn now(broker: impl Into<String>, topic: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(broker, topic, value, Utc::now())
    }

    pub fn source_key(&self) -> SourceKey {
        SourceKey::new(self.broker.as_str(), self.topic.as_str())
    }
}

/// Aggregation policy of a channel.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum UpdateType {
    /// Emit immediately, then ignore everything until the rate interval has passed.
    Blackout,
    /// Keep the latest value per field and emit on the rate timer.
    Buffered,
    /// Keep a running mean per field and emit on the rate timer.
    Average,
    /// Queue every change and emit them one by one, paced by the rate interval.
    ///
    /// Queues are not bounded: a source publishing faster than one value per rate
    /// interval makes its field's queue grow, and a warning is logged every
    /// 64 queued changes.
    OnChange,
}

impl UpdateType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateType::Blackout => "blackout",
            UpdateType::Buffered => "buffered",
            UpdateType::Average => "average",
            UpdateType::OnChange => "onchange",
        }
    }
}

impl Display for UpdateType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct UnknownUpdateType(pub String);

impl Display for UnknownUpdateType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown update type: {}", self.0)
    }
}

impl Error for UnknownUpdateType {}

impl FromStr for UpdateType {
    type Err = UnknownUpdateType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "blackout" => Ok(UpdateType::Blackout),
            "buffered" => Ok(UpdateType::Buffered),
            "average" => Ok(UpdateType::Average),
            "onchange" => Ok(UpdateType::OnChange),
            _ => Err(UnknownUpdateType(s.to_string())),
        }
    }
}

/// Reasons a [`ChannelSpec`] is refused.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum InvalidChannelSpec {
    RateTooShort { rate: Duration, minimum: Duration },
    NoFields,
    TooManyFields(usize),
}

impl Display for InvalidChannelSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            InvalidChannelSpec::RateTooShort { rate, minimum } => write!(
                f,
                "rate interval {}s is below the minimum of {}s",
                rate.as_secs_f64(),
                minimum.as_secs_f64()
            ),
            InvalidChannelSpec::NoFields => write!(f, "channel declares no fields"),
            InvalidChannelSpec::TooManyFields(count) => write!(
                f,
                "channel declares {count} fields, at most {MAX_CHANNEL_FIELDS} are supported"
            ),
        }
    }
}

impl Error for InvalidChannelSpec {}

/// Static per-channel configuration. Immutable once built.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ChannelSpec {
    id: String,
    update_type: UpdateType,
    rate_interval: Duration,
    wait_interval: Duration,
    required_fields: BTreeSet<String>,
}

impl ChannelSpec {
    pub fn new<I, F>(
        id: impl Into<String>,
        update_type: UpdateType,
        rate_interval: Duration,
        wait_interval: Duration,
        required_fields: I,
    ) -> Result<Self, InvalidChannelSpec>
    where
        I: IntoIterator<Item = F>,
        F: Into<String>,
    {
        if rate_interval < MIN_RATE_INTERVAL {
            return Err(InvalidChannelSpec::RateTooShort {
                rate: rate_interval,
                minimum: MIN_RATE_INTERVAL,
            });
        }

        let required_fields: BTreeSet<String> =
            required_fields.into_iter().map(Into::into).collect();
        if required_fields.is_empty() {
            return Err(InvalidChannelSpec::NoFields);
        }
        if required_fields.len() > MAX_CHANNEL_FIELDS {
            return Err(InvalidChannelSpec::TooManyFields(required_fields.len()));
        }

        Ok(Self {
            id: id.into(),
            update_type,
            rate_interval,
            wait_interval,
            required_fields,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn update_type(&self) -> UpdateType {
        self.update_type
    }

    pub fn rate_interval(&self) -> Duration {
        self.rate_interval
    }

    pub fn wait_interval(&self) -> Duration {
        self.wait_interval
    }

    /// A zero wait interval means waiting for missing fields without a deadline.
    pub fn waits_indefinitely(&self) -> bool {
        self.wait_interval.is_zero()
    }

    pub fn required_fields(&self) -> &BTreeSet<String> {
        &self.required_fields
    }
}

/// Static `(broker, topic) -> [(channel, field)]` routing table.
#[derive(Clone, Debug, Default)]
pub struct FieldMapping {
    routes: HashMap<String, HashMap<String, Vec<FieldTarget>>>,
}

impl FieldMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a destination for a source. Returns `false` if it was already mapped.
    pub fn insert(&mut self, source: SourceKey, target: FieldTarget) -> bool {
        let targets = self
            .routes
            .entry(source.broker)
            .or_default()
            .entry(source.topic)
            .or_default();
        if targets.contains(&target) {
            return false;
        }
        targets.push(target);
        true
    }

    pub fn targets(&self, broker: &str, topic: &str) -> &[FieldTarget] {
        self.routes
            .get(broker)
            .and_then(|topics| topics.get(topic))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (SourceKey, &FieldTarget)> + '_ {
        self.routes.iter().flat_map(|(broker, topics)| {
            topics.iter().flat_map(move |(topic, targets)| {
                targets
                    .iter()
                    .map(move |target| (SourceKey::new(broker.as_str(), topic.as_str()), target))
            })
        })
    }

    pub fn len(&self) -> usize {
        self.routes
            .values()
            .flat_map(HashMap::values)
            .map(Vec::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FromIterator<(SourceKey, FieldTarget)> for FieldMapping {
    fn from_iter<T: IntoIterator<Item = (SourceKey, FieldTarget)>>(iter: T) -> Self {
        let mut mapping = FieldMapping::new();
        for (source, target) in iter {
            mapping.insert(source, target);
        }
        mapping
    }
}

/// The record emitted for one channel in one cycle.
#[derive(Clone, Debug, PartialEq)]
pub struct ComposedUpdate {
    pub channel: String,
    /// Timestamp of the newest measurement that contributed to this record.
    pub timestamp: DateTime<Utc>,
    pub fields: BTreeMap<String, String>,
}

impl ComposedUpdate {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}
