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

//! Channel worker: the single owner of one channel's accumulator.
//!
//! Measurements, timer fires, dispatch reports and stats queries all arrive on the
//! same mailbox and are applied strictly one after another, so the accumulator never
//! sees two entry points interleave.

use crate::accumulator::{ChannelAccumulator, ChannelError, ChannelStats, Effect};
use crate::error::StreamerError;
use crate::gateway::DispatchError;
use crate::model::{ChannelSpec, ComposedUpdate};
use crate::observability::{events, fields};
use crate::timing::{TimerHandle, TimerKind, TimerRequest, TimerToken, TimingCoordinator};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender, WeakUnboundedSender};
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

const COMPONENT: &str = "channel_worker";

/// Messages accepted by a channel worker's mailbox.
#[derive(Debug)]
pub(crate) enum ChannelCommand {
    Ingest {
        field: String,
        value: String,
        timestamp: DateTime<Utc>,
    },
    TimerFired {
        kind: TimerKind,
        token: TimerToken,
    },
    DispatchDone(Result<(), DispatchError>),
    Stats(oneshot::Sender<ChannelStats>),
    Shutdown,
}

/// Cloneable address of a running channel worker.
#[derive(Clone, Debug)]
pub struct ChannelHandle {
    channel: Arc<str>,
    mailbox: UnboundedSender<ChannelCommand>,
}

impl ChannelHandle {
    pub(crate) fn new(channel: &str, mailbox: UnboundedSender<ChannelCommand>) -> Self {
        Self {
            channel: Arc::from(channel),
            mailbox,
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Queues one field value for the channel. Never blocks.
    pub fn ingest(
        &self,
        field: impl Into<String>,
        value: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Result<(), StreamerError> {
        self.send(ChannelCommand::Ingest {
            field: field.into(),
            value: value.into(),
            timestamp,
        })
    }

    /// Reads the channel's counters after every previously queued command was applied.
    pub async fn stats(&self) -> Result<ChannelStats, StreamerError> {
        let (reply, response) = oneshot::channel();
        self.send(ChannelCommand::Stats(reply))?;
        response
            .await
            .map_err(|_| StreamerError::ChannelClosed(self.channel.to_string()))
    }

    /// Asks the worker to stop. Partially accumulated data is dropped.
    pub fn shutdown(&self) -> Result<(), StreamerError> {
        self.send(ChannelCommand::Shutdown)
    }

    pub fn is_closed(&self) -> bool {
        self.mailbox.is_closed()
    }

    fn send(&self, command: ChannelCommand) -> Result<(), StreamerError> {
        self.mailbox
            .send(command)
            .map_err(|_| StreamerError::ChannelClosed(self.channel.to_string()))
    }
}

pub(crate) struct ChannelWorker {
    accumulator: ChannelAccumulator,
    mailbox: UnboundedReceiver<ChannelCommand>,
    reply_to: WeakUnboundedSender<ChannelCommand>,
    coordinator: Arc<dyn TimingCoordinator>,
    timers: HashMap<TimerKind, TimerHandle>,
    next_token: TimerToken,
    dispatch_queue: UnboundedSender<ComposedUpdate>,
}

impl ChannelWorker {
    /// Creates the worker and the handle addressing it.
    pub(crate) fn new(
        spec: ChannelSpec,
        coordinator: Arc<dyn TimingCoordinator>,
        dispatch_queue: UnboundedSender<ComposedUpdate>,
    ) -> (Self, ChannelHandle) {
        let (sender, mailbox) = mpsc::unbounded_channel();
        let handle = ChannelHandle::new(spec.id(), sender.clone());
        let worker = Self {
            accumulator: ChannelAccumulator::new(spec),
            mailbox,
            reply_to: sender.downgrade(),
            coordinator,
            timers: HashMap::new(),
            next_token: 0,
            dispatch_queue,
        };
        (worker, handle)
    }

    pub(crate) fn reply_to(&self) -> WeakUnboundedSender<ChannelCommand> {
        self.reply_to.clone()
    }

    /// Applies mailbox commands until shutdown, an invariant violation, or every
    /// handle is gone.
    pub(crate) async fn run(mut self) {
        info!(
            event = events::CHANNEL_WORKER_START,
            component = COMPONENT,
            channel = self.accumulator.channel(),
            "channel worker started"
        );

        let reason = loop {
            let Some(command) = self.mailbox.recv().await else {
                break fields::REASON_MAILBOX_CLOSED;
            };

            let applied = match command {
                ChannelCommand::Ingest {
                    field,
                    value,
                    timestamp,
                } => self
                    .accumulator
                    .ingest(&field, value, timestamp, Instant::now()),
                ChannelCommand::TimerFired { kind, token } => self.on_timer_fired(kind, token),
                ChannelCommand::DispatchDone(result) => {
                    self.accumulator.on_dispatch_result(&result);
                    Ok(Vec::new())
                }
                ChannelCommand::Stats(reply) => {
                    let _ = reply.send(self.accumulator.stats().clone());
                    Ok(Vec::new())
                }
                ChannelCommand::Shutdown => break fields::REASON_SHUTDOWN,
            };

            match applied {
                Ok(effects) => self.apply(effects),
                Err(err) => {
                    self.report_violation(&err);
                    break fields::REASON_INVARIANT_VIOLATION;
                }
            }
        };

        self.timers.clear();
        info!(
            event = events::CHANNEL_WORKER_STOP,
            component = COMPONENT,
            channel = self.accumulator.channel(),
            reason,
            "channel worker stopped"
        );
    }

    fn on_timer_fired(
        &mut self,
        kind: TimerKind,
        token: TimerToken,
    ) -> Result<Vec<Effect>, ChannelError> {
        let current = self.timers.get(&kind).map(TimerHandle::token);
        if current != Some(token) {
            debug!(
                event = events::CHANNEL_TIMER_STALE,
                component = COMPONENT,
                channel = self.accumulator.channel(),
                timer = %kind,
                token,
                "dropping fire of a superseded timer"
            );
            return Ok(Vec::new());
        }

        self.timers.remove(&kind);
        self.accumulator.on_timer(kind, Instant::now())
    }

    fn apply(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Arm(kind, duration) => self.arm(kind, duration),
                Effect::Cancel(kind) => {
                    self.timers.remove(&kind);
                }
                Effect::Emit(update) => self.emit(update),
            }
        }
    }

    fn arm(&mut self, kind: TimerKind, duration: std::time::Duration) {
        self.next_token += 1;
        let token = self.next_token;
        let reply_to = self.reply_to.clone();
        let fired_kind = kind.clone();

        let handle = self.coordinator.arm(
            TimerRequest {
                channel: self.accumulator.channel().to_string(),
                kind: kind.clone(),
                token,
                duration,
            },
            Box::new(move || {
                if let Some(mailbox) = reply_to.upgrade() {
                    let _ = mailbox.send(ChannelCommand::TimerFired {
                        kind: fired_kind,
                        token,
                    });
                }
            }),
        );

        // Replacing a handle drops, and so cancels, the superseded timer.
        self.timers.insert(kind, handle);
    }

    fn emit(&mut self, update: ComposedUpdate) {
        debug!(
            event = events::CHANNEL_EMIT,
            component = COMPONENT,
            channel = update.channel.as_str(),
            fields = fields::format_field_names(&update).as_str(),
            timestamp = %update.timestamp,
            "handing update to dispatch"
        );

        if self.dispatch_queue.send(update).is_err() {
            warn!(
                event = events::CHANNEL_DISPATCH_QUEUE_CLOSED,
                component = COMPONENT,
                channel = self.accumulator.channel(),
                reason = fields::REASON_DISPATCH_QUEUE_CLOSED,
                "dispatch worker is gone, update dropped"
            );
            self.accumulator
                .on_dispatch_result(&Err(DispatchError::Transport(
                    fields::REASON_DISPATCH_QUEUE_CLOSED.to_string(),
                )));
        }
    }

    fn report_violation(&self, err: &ChannelError) {
        error!(
            event = events::CHANNEL_INVARIANT_VIOLATION,
            component = COMPONENT,
            channel = self.accumulator.channel(),
            err = %err,
            "timer invariant violated, stopping channel"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::{ChannelCommand, ChannelWorker};
    use crate::error::StreamerError;
    use crate::model::{ChannelSpec, UpdateType};
    use crate::timing::{TimerKind, TokioTimingCoordinator};
    use chrono::Utc;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn spec(update_type: UpdateType) -> ChannelSpec {
        ChannelSpec::new(
            "worker-test",
            update_type,
            Duration::from_secs(15),
            Duration::from_secs(5),
            ["field1", "field2"],
        )
        .expect("valid channel spec")
    }

    #[tokio::test(start_paused = true)]
    async fn stale_timer_token_is_ignored() {
        let (dispatch_tx, mut dispatch_rx) = mpsc::unbounded_channel();
        let (worker, handle) = ChannelWorker::new(
            spec(UpdateType::Buffered),
            Arc::new(TokioTimingCoordinator::new()),
            dispatch_tx,
        );
        let mailbox = worker.reply_to().upgrade().expect("worker mailbox is open");
        let task = tokio::spawn(worker.run());

        handle.ingest("field1", "1", Utc::now()).unwrap();
        handle.ingest("field2", "2", Utc::now()).unwrap();
        mailbox
            .send(ChannelCommand::TimerFired {
                kind: TimerKind::Rate,
                token: 9_999,
            })
            .unwrap();

        let stats = handle.stats().await.unwrap();
        assert_eq!(stats.emitted, 0);
        assert!(dispatch_rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_secs(15)).await;
        let update = dispatch_rx.recv().await.expect("rate timer emits");
        assert_eq!(update.fields.len(), 2);

        handle.shutdown().unwrap();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn timer_conflict_stops_only_the_affected_channel() {
        let coordinator = Arc::new(TokioTimingCoordinator::new());

        let (broken_tx, mut broken_rx) = mpsc::unbounded_channel();
        let (mut broken, broken_handle) =
            ChannelWorker::new(spec(UpdateType::Buffered), coordinator.clone(), broken_tx);
        // Rate must not be armed while wait is.
        broken.accumulator.mark_armed(TimerKind::Wait);
        let broken_task = tokio::spawn(broken.run());

        let (healthy_tx, mut healthy_rx) = mpsc::unbounded_channel();
        let (healthy, healthy_handle) =
            ChannelWorker::new(spec(UpdateType::Blackout), coordinator, healthy_tx);
        let healthy_task = tokio::spawn(healthy.run());

        broken_handle.ingest("field1", "1", Utc::now()).unwrap();
        broken_task.await.unwrap();

        assert!(broken_handle.is_closed());
        assert!(matches!(
            broken_handle.ingest("field2", "2", Utc::now()),
            Err(StreamerError::ChannelClosed(_))
        ));
        assert!(broken_rx.recv().await.is_none());

        healthy_handle.ingest("field1", "open", Utc::now()).unwrap();
        let update = healthy_rx.recv().await.expect("healthy channel still emits");
        assert_eq!(update.field("field1"), Some("open"));
        assert_eq!(healthy_handle.stats().await.unwrap().emitted, 1);

        healthy_handle.shutdown().unwrap();
        healthy_task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn handle_reports_closed_channel_after_shutdown() {
        let (dispatch_tx, _dispatch_rx) = mpsc::unbounded_channel();
        let (worker, handle) = ChannelWorker::new(
            spec(UpdateType::Blackout),
            Arc::new(TokioTimingCoordinator::new()),
            dispatch_tx,
        );
        let task = tokio::spawn(worker.run());

        handle.shutdown().unwrap();
        task.await.unwrap();

        assert!(handle.is_closed());
        assert!(matches!(
            handle.ingest("field1", "1", Utc::now()),
            Err(StreamerError::ChannelClosed(channel)) if channel == "worker-test"
        ));
        assert!(handle.stats().await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn closed_dispatch_queue_counts_as_failure() {
        let (dispatch_tx, dispatch_rx) = mpsc::unbounded_channel();
        drop(dispatch_rx);
        let (worker, handle) = ChannelWorker::new(
            spec(UpdateType::Blackout),
            Arc::new(TokioTimingCoordinator::new()),
            dispatch_tx,
        );
        tokio::spawn(worker.run());

        handle.ingest("field1", "1", Utc::now()).unwrap();
        let stats = handle.stats().await.unwrap();

        assert_eq!(stats.emitted, 1);
        assert_eq!(stats.dispatch_failures, 1);
    }
}
