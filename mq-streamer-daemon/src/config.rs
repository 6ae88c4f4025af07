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

//! Daemon configuration: JSON5 file format, validation and resolution into the
//! streamer's channel specs and field mapping.

use mq_streamer::{
    ChannelSpec, FieldMapping, FieldTarget, InvalidChannelSpec, SourceKey, UnknownUpdateType,
    UpdateType,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Smallest update rate ThingSpeak accepts for one channel.
pub const THINGSPEAK_MIN_UPDATE_RATE: Duration = Duration::from_secs(15);

pub const DEFAULT_THINGSPEAK_URL: &str = "https://api.thingspeak.com";
pub const DEFAULT_PHANT_URL: &str = "https://data.sparkfun.com";

const THINGSPEAK_FIELDS: [&str; 8] = [
    "field1", "field2", "field3", "field4", "field5", "field6", "field7", "field8",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unable to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unable to parse config file: {0}")]
    Parse(#[from] json5::Error),
    #[error("at least one broker has to be configured")]
    NoBrokers,
    #[error("at least one enabled channel has to be configured")]
    NoChannels,
    #[error("broker {0} is configured more than once")]
    DuplicateBroker(String),
    #[error("channel {0} is configured more than once")]
    DuplicateChannel(String),
    #[error("broker {0}: at least one topic subscription has to be defined")]
    NoTopics(String),
    #[error("broker {0}: user and password have to be given together")]
    IncompleteCredentials(String),
    #[error("channel {0}: phant channels require an id")]
    MissingPhantId(String),
    #[error("channel {channel}: {field} is not a ThingSpeak field (field1..field8)")]
    InvalidThingSpeakField { channel: String, field: String },
    #[error("channel {channel}: update rate {rate}s is below the ThingSpeak minimum of {minimum}s")]
    ThingSpeakRateTooShort {
        channel: String,
        rate: u64,
        minimum: u64,
    },
    #[error("channel {channel}: field {field} references unknown broker {broker}")]
    UnknownBroker {
        channel: String,
        field: String,
        broker: String,
    },
    #[error("channel {channel}: {source}")]
    UpdateType {
        channel: String,
        #[source]
        source: UnknownUpdateType,
    },
    #[error("channel {channel}: {source}")]
    InvalidChannel {
        channel: String,
        #[source]
        source: InvalidChannelSpec,
    },
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub(crate) brokers: Vec<BrokerConfig>,
    pub(crate) channels: Vec<ChannelConfig>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct BrokerConfig {
    pub(crate) name: String,
    #[serde(default = "default_host")]
    pub(crate) host: String,
    #[serde(default = "default_port")]
    pub(crate) port: u16,
    #[serde(default)]
    pub(crate) user: Option<String>,
    #[serde(default)]
    pub(crate) password: Option<String>,
    pub(crate) topics: Vec<String>,
}

impl BrokerConfig {
    /// Credentials when both halves are configured.
    pub(crate) fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.user, &self.password) {
            (Some(user), Some(password)) => Some((user.as_str(), password.as_str())),
            _ => None,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    ThingSpeak,
    Phant,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct ChannelConfig {
    pub(crate) name: String,
    /// Disabled channels are kept in the file but neither validated nor started.
    #[serde(default = "default_enabled")]
    pub(crate) enabled: bool,
    #[serde(rename = "type")]
    pub(crate) kind: ChannelKind,
    #[serde(default)]
    pub(crate) id: Option<String>,
    pub(crate) key: String,
    pub(crate) update_type: String,
    /// Seconds between updates.
    pub(crate) update_rate: u64,
    /// Seconds to wait for missing fields, `0` waits until all are present.
    #[serde(default)]
    pub(crate) wait_interval: u64,
    /// `field name -> [broker, topic]`.
    pub(crate) fields: BTreeMap<String, (String, String)>,
    #[serde(default)]
    pub(crate) base_url: Option<String>,
}

/// Remote side of one channel, as the HTTP gateway needs it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteChannel {
    pub kind: ChannelKind,
    pub id: Option<String>,
    pub key: String,
    pub base_url: String,
}

/// Everything the daemon needs after a configuration was accepted.
#[derive(Debug)]
pub struct DaemonSetup {
    pub specs: Vec<ChannelSpec>,
    pub mapping: FieldMapping,
    pub brokers: Vec<BrokerConfig>,
    pub remotes: BTreeMap<String, RemoteChannel>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    1883
}

fn default_enabled() -> bool {
    true
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json5(&contents)
    }

    pub fn from_json5(contents: &str) -> Result<Self, ConfigError> {
        Ok(json5::from_str(contents)?)
    }

    /// Rejects configurations the streamer cannot run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.brokers.is_empty() {
            return Err(ConfigError::NoBrokers);
        }
        if !self.channels.iter().any(|channel| channel.enabled) {
            return Err(ConfigError::NoChannels);
        }

        let mut broker_names = HashSet::new();
        for broker in &self.brokers {
            if !broker_names.insert(broker.name.as_str()) {
                return Err(ConfigError::DuplicateBroker(broker.name.clone()));
            }
            if broker.topics.is_empty() {
                return Err(ConfigError::NoTopics(broker.name.clone()));
            }
            if broker.user.is_some() != broker.password.is_some() {
                return Err(ConfigError::IncompleteCredentials(broker.name.clone()));
            }
        }

        let mut channel_names = HashSet::new();
        for channel in &self.channels {
            if !channel_names.insert(channel.name.as_str()) {
                return Err(ConfigError::DuplicateChannel(channel.name.clone()));
            }
            if channel.enabled {
                channel.validate(&broker_names)?;
            }
        }
        Ok(())
    }

    /// Validates and converts the configuration into streamer inputs.
    pub fn resolve(self) -> Result<DaemonSetup, ConfigError> {
        self.validate()?;

        let mut specs = Vec::with_capacity(self.channels.len());
        let mut mapping = FieldMapping::new();
        let mut remotes = BTreeMap::new();
        for channel in self.channels.into_iter().filter(|channel| channel.enabled) {
            specs.push(channel.spec()?);
            for (field, (broker, topic)) in &channel.fields {
                mapping.insert(
                    SourceKey::new(broker.as_str(), topic.as_str()),
                    FieldTarget::new(channel.name.as_str(), field.as_str()),
                );
            }
            remotes.insert(channel.name.clone(), channel.remote());
        }

        Ok(DaemonSetup {
            specs,
            mapping,
            brokers: self.brokers,
            remotes,
        })
    }
}

impl ChannelConfig {
    fn validate(&self, brokers: &HashSet<&str>) -> Result<(), ConfigError> {
        match self.kind {
            ChannelKind::Phant => {
                if self.id.as_deref().map_or(true, str::is_empty) {
                    return Err(ConfigError::MissingPhantId(self.name.clone()));
                }
            }
            ChannelKind::ThingSpeak => {
                if self.update_rate < THINGSPEAK_MIN_UPDATE_RATE.as_secs() {
                    return Err(ConfigError::ThingSpeakRateTooShort {
                        channel: self.name.clone(),
                        rate: self.update_rate,
                        minimum: THINGSPEAK_MIN_UPDATE_RATE.as_secs(),
                    });
                }
                if let Some(field) = self
                    .fields
                    .keys()
                    .find(|field| !THINGSPEAK_FIELDS.contains(&field.as_str()))
                {
                    return Err(ConfigError::InvalidThingSpeakField {
                        channel: self.name.clone(),
                        field: field.clone(),
                    });
                }
            }
        }

        for (field, (broker, _)) in &self.fields {
            if !brokers.contains(broker.as_str()) {
                return Err(ConfigError::UnknownBroker {
                    channel: self.name.clone(),
                    field: field.clone(),
                    broker: broker.clone(),
                });
            }
        }

        self.spec().map(|_| ())
    }

    fn spec(&self) -> Result<ChannelSpec, ConfigError> {
        let update_type: UpdateType =
            self.update_type
                .parse()
                .map_err(|source| ConfigError::UpdateType {
                    channel: self.name.clone(),
                    source,
                })?;

        ChannelSpec::new(
            self.name.as_str(),
            update_type,
            Duration::from_secs(self.update_rate),
            Duration::from_secs(self.wait_interval),
            self.fields.keys().map(String::as_str),
        )
        .map_err(|source| ConfigError::InvalidChannel {
            channel: self.name.clone(),
            source,
        })
    }

    fn remote(&self) -> RemoteChannel {
        let base_url = self.base_url.clone().unwrap_or_else(|| {
            match self.kind {
                ChannelKind::ThingSpeak => DEFAULT_THINGSPEAK_URL,
                ChannelKind::Phant => DEFAULT_PHANT_URL,
            }
            .to_string()
        });
        RemoteChannel {
            kind: self.kind,
            id: self.id.clone(),
            key: self.key.clone(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ChannelKind, Config, ConfigError, DEFAULT_THINGSPEAK_URL};
    use mq_streamer::{InvalidChannelSpec, UpdateType};
    use std::time::Duration;

    const SAMPLE: &str = r#"{
        brokers: [
            { name: "home", topics: ["sensor/#"] },
            { name: "office", host: "10.0.0.2", port: 1884, user: "u", password: "p", topics: ["desk/+"] },
        ],
        channels: [
            {
                name: "living-room",
                type: "thingspeak",
                key: "WRITEKEY",
                update_type: "Buffered",
                update_rate: 15,
                wait_interval: 5,
                fields: {
                    field1: ["home", "sensor/temp"],
                    field2: ["office", "desk/hum"],
                },
            },
            {
                name: "garage",
                type: "phant",
                id: "public-key",
                key: "private-key",
                update_type: "blackout",
                update_rate: 2,
                fields: { door: ["home", "garage/door"] },
                base_url: "http://localhost:8080/",
            },
        ],
    }"#;

    fn sample() -> Config {
        Config::from_json5(SAMPLE).expect("sample config should parse")
    }

    #[test]
    fn sample_config_resolves() {
        let setup = sample().resolve().expect("sample config should be valid");

        assert_eq!(setup.specs.len(), 2);
        let living_room = &setup.specs[0];
        assert_eq!(living_room.id(), "living-room");
        assert_eq!(living_room.update_type(), UpdateType::Buffered);
        assert_eq!(living_room.wait_interval(), Duration::from_secs(5));
        assert!(setup.specs[1].waits_indefinitely());

        assert_eq!(setup.mapping.targets("home", "sensor/temp").len(), 1);
        assert_eq!(setup.mapping.targets("office", "desk/hum")[0].field, "field2");
        assert_eq!(setup.mapping.len(), 3);

        assert_eq!(setup.brokers[0].host, "127.0.0.1");
        assert_eq!(setup.brokers[0].port, 1883);
        assert_eq!(setup.brokers[1].credentials(), Some(("u", "p")));

        assert_eq!(setup.remotes["living-room"].base_url, DEFAULT_THINGSPEAK_URL);
        assert_eq!(setup.remotes["garage"].kind, ChannelKind::Phant);
        assert_eq!(setup.remotes["garage"].base_url, "http://localhost:8080");
    }

    #[test]
    fn shipped_sample_config_is_valid() {
        let config = Config::from_json5(include_str!("../config/mq-streamer.json5"))
            .expect("shipped config should parse");
        let setup = config.resolve().expect("shipped config should be valid");
        assert_eq!(setup.specs.len(), 2);
        assert_eq!(setup.brokers.len(), 2);
    }

    #[test]
    fn disabled_channels_are_skipped() {
        let mut config = sample();
        config.channels[1].enabled = false;
        // Not validated while disabled.
        config.channels[1].id = None;

        let setup = config.resolve().expect("disabled channel should be skipped");
        assert_eq!(setup.specs.len(), 1);
        assert_eq!(setup.specs[0].id(), "living-room");
        assert!(setup.mapping.targets("home", "garage/door").is_empty());
        assert!(!setup.remotes.contains_key("garage"));
    }

    #[test]
    fn all_channels_disabled_is_rejected() {
        let mut config = sample();
        for channel in &mut config.channels {
            channel.enabled = false;
        }
        assert!(matches!(config.validate(), Err(ConfigError::NoChannels)));
    }

    #[test]
    fn enabled_flag_parses_and_defaults_to_true() {
        let config = Config::from_json5(
            r#"{
                brokers: [{ name: "home", topics: ["a"] }],
                channels: [
                    { name: "on", type: "phant", id: "p", key: "k", update_type: "buffered",
                      update_rate: 5, fields: { f: ["home", "a"] } },
                    { name: "off", enabled: false, type: "phant", id: "p", key: "k",
                      update_type: "buffered", update_rate: 5, fields: { f: ["home", "a"] } },
                ],
            }"#,
        )
        .unwrap();
        assert!(config.channels[0].enabled);
        assert!(!config.channels[1].enabled);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let result = Config::from_json5(r#"{ brokers: [], channels: [], extra: 1 }"#);
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn thingspeak_rate_below_minimum_is_rejected() {
        let mut config = sample();
        config.channels[0].update_rate = 10;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ThingSpeakRateTooShort { rate: 10, minimum: 15, .. })
        ));
    }

    #[test]
    fn thingspeak_field_names_are_checked() {
        let mut config = sample();
        let source = config.channels[0].fields.remove("field2").unwrap();
        config.channels[0].fields.insert("humidity".to_string(), source);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidThingSpeakField { field, .. }) if field == "humidity"
        ));
    }

    #[test]
    fn phant_channel_requires_id() {
        let mut config = sample();
        config.channels[1].id = None;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingPhantId(channel)) if channel == "garage"
        ));
    }

    #[test]
    fn credentials_must_come_in_pairs() {
        let mut config = sample();
        config.brokers[1].password = None;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::IncompleteCredentials(broker)) if broker == "office"
        ));
    }

    #[test]
    fn fields_must_reference_known_brokers() {
        let mut config = sample();
        config.channels[1]
            .fields
            .insert("window".to_string(), ("attic".to_string(), "w".to_string()));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnknownBroker { broker, .. }) if broker == "attic"
        ));
    }

    #[test]
    fn unknown_update_type_is_rejected() {
        let mut config = sample();
        config.channels[1].update_type = "sometimes".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::UpdateType { .. })));
    }

    #[test]
    fn phant_channel_with_too_many_fields_is_rejected() {
        let mut config = sample();
        for n in 0..8 {
            config.channels[1].fields.insert(
                format!("extra{n}"),
                ("home".to_string(), format!("extra/{n}")),
            );
        }
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidChannel {
                source: InvalidChannelSpec::TooManyFields(9),
                ..
            })
        ));
    }

    #[test]
    fn duplicate_names_and_empty_sections_are_rejected() {
        let mut config = sample();
        config.brokers.push(config.brokers[0].clone());
        assert!(matches!(config.validate(), Err(ConfigError::DuplicateBroker(_))));

        let mut config = sample();
        config.channels.push(config.channels[0].clone());
        assert!(matches!(config.validate(), Err(ConfigError::DuplicateChannel(_))));

        let mut config = sample();
        config.brokers[0].topics.clear();
        assert!(matches!(config.validate(), Err(ConfigError::NoTopics(_))));

        let mut config = sample();
        config.channels.clear();
        assert!(matches!(config.validate(), Err(ConfigError::NoChannels)));
    }
}
