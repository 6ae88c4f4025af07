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

//! MQTT ingress: one receiver task per configured broker.

use crate::config::BrokerConfig;
use mq_streamer::observability::events;
use mq_streamer::{Measurement, MeasurementListener};
use rumqttc::{
    AsyncClient, ConnectionError, Event, MqttOptions, Packet, Publish, QoS, SubscribeFilter,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const COMPONENT: &str = "broker_receiver";

pub const KEEP_ALIVE: Duration = Duration::from_secs(60);
pub const RECONNECT_DELAY: Duration = Duration::from_secs(5);
const REQUEST_CHANNEL_CAPACITY: usize = 16;

static CLIENT_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// `mq-streamer-<pid>-<n>`, unique within the process.
pub(crate) fn next_client_id() -> String {
    let n = CLIENT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("mq-streamer-{}-{n}", std::process::id())
}

pub(crate) fn mqtt_options(broker: &BrokerConfig) -> MqttOptions {
    let mut options = MqttOptions::new(next_client_id(), broker.host.as_str(), broker.port);
    options.set_keep_alive(KEEP_ALIVE);
    if let Some((user, password)) = broker.credentials() {
        options.set_credentials(user, password);
    }
    options
}

/// Converts a publish into a measurement. Payloads that are not UTF-8 are dropped.
pub(crate) fn measurement_from_publish(broker: &str, publish: &Publish) -> Option<Measurement> {
    let value = std::str::from_utf8(&publish.payload).ok()?;
    Some(Measurement::now(broker, publish.topic.as_str(), value))
}

/// Subscribes to a broker's topics and feeds every received value to a listener.
pub struct BrokerReceiver {
    broker: BrokerConfig,
    listener: Arc<dyn MeasurementListener>,
    shutdown: CancellationToken,
}

impl BrokerReceiver {
    pub fn new(
        broker: BrokerConfig,
        listener: Arc<dyn MeasurementListener>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            broker,
            listener,
            shutdown,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(self) {
        let (client, mut event_loop) =
            AsyncClient::new(mqtt_options(&self.broker), REQUEST_CHANNEL_CAPACITY);
        info!(
            event = events::BROKER_RECEIVER_START,
            component = COMPONENT,
            broker = self.broker.name.as_str(),
            host = self.broker.host.as_str(),
            port = self.broker.port,
            topics = self.broker.topics.len(),
            "starting broker receiver"
        );

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                polled = event_loop.poll() => match polled {
                    Ok(event) => self.on_event(&client, event),
                    Err(err) => self.on_connection_error(err).await,
                },
            }
        }

        let _ = client.try_disconnect();
        info!(
            event = events::BROKER_RECEIVER_STOP,
            component = COMPONENT,
            broker = self.broker.name.as_str(),
            "broker receiver stopped"
        );
    }

    fn on_event(&self, client: &AsyncClient, event: Event) {
        match event {
            Event::Incoming(Packet::ConnAck(_)) => {
                info!(
                    event = events::BROKER_CONNECTED,
                    component = COMPONENT,
                    broker = self.broker.name.as_str(),
                    "connected, subscribing"
                );
                // Subscriptions do not survive a reconnect with a clean session.
                self.subscribe(client);
            }
            Event::Incoming(Packet::Publish(publish)) => self.on_publish(&publish),
            _ => {}
        }
    }

    fn subscribe(&self, client: &AsyncClient) {
        let filters = self
            .broker
            .topics
            .iter()
            .map(|topic| SubscribeFilter::new(topic.clone(), QoS::AtMostOnce));
        if let Err(err) = client.try_subscribe_many(filters) {
            warn!(
                event = events::BROKER_SUBSCRIBE_FAILED,
                component = COMPONENT,
                broker = self.broker.name.as_str(),
                err = %err,
                "unable to subscribe to topics"
            );
        }
    }

    fn on_publish(&self, publish: &Publish) {
        let Some(measurement) = measurement_from_publish(&self.broker.name, publish) else {
            warn!(
                event = events::BROKER_PAYLOAD_INVALID,
                component = COMPONENT,
                broker = self.broker.name.as_str(),
                topic = publish.topic.as_str(),
                "dropping payload that is not valid UTF-8"
            );
            return;
        };
        debug!(
            component = COMPONENT,
            broker = self.broker.name.as_str(),
            topic = publish.topic.as_str(),
            "received measurement"
        );
        self.listener.on_measurement(measurement);
    }

    async fn on_connection_error(&self, err: ConnectionError) {
        warn!(
            event = events::BROKER_CONNECTION_ERROR,
            component = COMPONENT,
            broker = self.broker.name.as_str(),
            err = %err,
            retry_in_s = RECONNECT_DELAY.as_secs(),
            "broker connection failed"
        );
        // The next poll reconnects.
        tokio::select! {
            _ = self.shutdown.cancelled() => {}
            _ = tokio::time::sleep(RECONNECT_DELAY) => {}
        }
    }
}
