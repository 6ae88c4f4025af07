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

use async_trait::async_trait;
use mq_streamer::{ComposedUpdate, DispatchError, DispatchGateway};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::Instant;

/// One call of [`RecordingGateway::send`].
#[derive(Clone, Debug)]
pub struct Delivery {
    /// Instant the gateway was called, on tokio's (possibly paused) clock.
    pub at: Instant,
    pub update: ComposedUpdate,
}

/// Gateway that records every update it is asked to send.
///
/// It can be configured to fail every send or to take a while before answering.
pub struct RecordingGateway {
    deliveries: UnboundedSender<Delivery>,
    send_count: AtomicUsize,
    fail: bool,
    delay: Duration,
}

impl RecordingGateway {
    /// Gateway that accepts every update.
    pub fn accepting() -> (Arc<Self>, DeliveryLog) {
        Self::build(false, Duration::ZERO)
    }

    /// Gateway that records and then rejects every update.
    pub fn failing() -> (Arc<Self>, DeliveryLog) {
        Self::build(true, Duration::ZERO)
    }

    /// Gateway that answers successfully after `delay`.
    pub fn with_delay(delay: Duration) -> (Arc<Self>, DeliveryLog) {
        Self::build(false, delay)
    }

    fn build(fail: bool, delay: Duration) -> (Arc<Self>, DeliveryLog) {
        let (deliveries, receiver) = mpsc::unbounded_channel();
        let gateway = Arc::new(Self {
            deliveries,
            send_count: AtomicUsize::new(0),
            fail,
            delay,
        });
        let log = DeliveryLog {
            receiver,
            started: Instant::now(),
        };
        (gateway, log)
    }

    pub fn sent_count(&self) -> usize {
        self.send_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DispatchGateway for RecordingGateway {
    async fn send(&self, update: &ComposedUpdate) -> Result<(), DispatchError> {
        self.send_count.fetch_add(1, Ordering::SeqCst);
        let _ = self.deliveries.send(Delivery {
            at: Instant::now(),
            update: update.clone(),
        });

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            return Err(DispatchError::Transport(
                "recording gateway refuses".to_string(),
            ));
        }
        Ok(())
    }
}

/// Receiving side of a [`RecordingGateway`].
pub struct DeliveryLog {
    receiver: UnboundedReceiver<Delivery>,
    started: Instant,
}

impl DeliveryLog {
    /// Instant the gateway was created; the origin for [`DeliveryLog::offset`].
    pub fn started(&self) -> Instant {
        self.started
    }

    /// Time between gateway creation and `delivery`.
    pub fn offset(&self, delivery: &Delivery) -> Duration {
        delivery.at.duration_since(self.started)
    }

    /// Waits for the next delivery. Panics if the gateway is gone.
    pub async fn next(&mut self) -> Delivery {
        self.receiver
            .recv()
            .await
            .expect("recording gateway dropped before the expected delivery")
    }

    /// Waits up to `limit` for the next delivery.
    pub async fn next_within(&mut self, limit: Duration) -> Option<Delivery> {
        tokio::time::timeout(limit, self.receiver.recv())
            .await
            .ok()
            .flatten()
    }

    /// Deliveries already recorded, without waiting.
    pub fn drain(&mut self) -> Vec<Delivery> {
        let mut drained = Vec::new();
        while let Ok(delivery) = self.receiver.try_recv() {
            drained.push(delivery);
        }
        drained
    }
}
