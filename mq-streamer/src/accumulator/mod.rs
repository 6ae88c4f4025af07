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

//! Channel accumulator layer.
//!
//! Owns the per-channel state machine: field state, the active update policy and the
//! rate/wait timer decisions. The accumulator performs no I/O. Every entry point
//! returns the [`Effect`]s the owning channel worker must carry out (arm or cancel a
//! timer, hand a composed update to dispatch), which keeps the timing logic testable
//! without a runtime.
//!
//! Phases:
//!
//! - `Idle`: nothing unconsumed, no timer armed.
//! - `Collecting`: at least one field present, rate timer armed.
//! - `Waiting`: rate elapsed with fields missing. The wait timer is armed unless the
//!   channel waits indefinitely.

pub(crate) mod policy;

use crate::gateway::DispatchError;
use crate::model::{ChannelSpec, ComposedUpdate, UpdateType};
use crate::observability::events;
use crate::timing::TimerKind;
use chrono::{DateTime, Utc};
use policy::ChannelPolicy;
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

const COMPONENT: &str = "channel_accumulator";

/// An on-change backlog warning is logged each time a field's queue reaches another
/// multiple of this length.
pub(crate) const ON_CHANGE_BACKLOG_WARN_STEP: usize = 64;

/// Per-channel counters, readable through [`crate::ChannelHandle::stats`].
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ChannelStats {
    /// Measurements stored into the channel state.
    pub accepted: u64,
    /// Measurements dropped: blackout window, unknown field or unconvertible value.
    pub ignored: u64,
    /// Records handed to dispatch, partial ones included.
    pub emitted: u64,
    /// Records emitted after the wait interval with fields still missing.
    pub partial: u64,
    /// Records the gateway reported as failed.
    pub dispatch_failures: u64,
}

/// Internal-consistency failures of a channel's timer bookkeeping.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum ChannelError {
    TimerConflict {
        channel: String,
        requested: TimerKind,
        armed: TimerKind,
    },
}

impl Display for ChannelError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelError::TimerConflict {
                channel,
                requested,
                armed,
            } => write!(
                f,
                "channel {channel}: cannot arm {requested} timer while {armed} timer is armed"
            ),
        }
    }
}

impl Error for ChannelError {}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Phase {
    Idle,
    Collecting,
    Waiting { timer_armed: bool },
}

/// Side effects requested by the accumulator.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Effect {
    Arm(TimerKind, Duration),
    Cancel(TimerKind),
    Emit(ComposedUpdate),
}

pub(crate) type Effects = Vec<Effect>;

pub(crate) struct ChannelAccumulator {
    spec: ChannelSpec,
    policy: ChannelPolicy,
    present: BTreeSet<String>,
    armed: BTreeSet<TimerKind>,
    phase: Phase,
    last_emit: Option<Instant>,
    stats: ChannelStats,
}

impl ChannelAccumulator {
    pub(crate) fn new(spec: ChannelSpec) -> Self {
        Self {
            policy: ChannelPolicy::for_update_type(spec.update_type()),
            spec,
            present: BTreeSet::new(),
            armed: BTreeSet::new(),
            phase: Phase::Idle,
            last_emit: None,
            stats: ChannelStats::default(),
        }
    }

    pub(crate) fn channel(&self) -> &str {
        self.spec.id()
    }

    pub(crate) fn stats(&self) -> &ChannelStats {
        &self.stats
    }

    #[cfg(test)]
    pub(crate) fn phase(&self) -> Phase {
        self.phase
    }

    /// Marks a timer as armed without emitting an effect.
    #[cfg(test)]
    pub(crate) fn mark_armed(&mut self, kind: TimerKind) {
        self.armed.insert(kind);
    }

    /// `true` when the state is indistinguishable from a freshly created accumulator.
    pub(crate) fn is_idle(&self) -> bool {
        self.phase == Phase::Idle
            && self.present.is_empty()
            && self.armed.is_empty()
            && self.policy.is_empty()
    }

    fn is_complete(&self) -> bool {
        self.present == *self.spec.required_fields()
    }

    /// Applies one measurement of `field` according to the channel's update policy.
    pub(crate) fn ingest(
        &mut self,
        field: &str,
        value: String,
        timestamp: DateTime<Utc>,
        now: Instant,
    ) -> Result<Effects, ChannelError> {
        if !self.spec.required_fields().contains(field) {
            debug!(
                event = events::CHANNEL_FIELD_UNDECLARED,
                component = COMPONENT,
                channel = self.channel(),
                field,
                "dropping value for undeclared field"
            );
            self.stats.ignored += 1;
            return Ok(Vec::new());
        }

        match self.spec.update_type() {
            UpdateType::Blackout => Ok(self.ingest_blackout(field, value, timestamp, now)),
            UpdateType::OnChange => self.ingest_on_change(field, value, timestamp),
            UpdateType::Buffered | UpdateType::Average => {
                self.ingest_timed(field, value, timestamp, now)
            }
        }
    }

    fn ingest_blackout(
        &mut self,
        field: &str,
        value: String,
        timestamp: DateTime<Utc>,
        now: Instant,
    ) -> Effects {
        let window_open = self
            .last_emit
            .map_or(true, |last| now.duration_since(last) >= self.spec.rate_interval());

        if !window_open {
            trace!(
                event = events::CHANNEL_MEASUREMENT_IGNORED,
                component = COMPONENT,
                channel = self.channel(),
                field,
                "blackout window active"
            );
            self.stats.ignored += 1;
            return Vec::new();
        }

        self.store(field, value, timestamp);
        self.emit(now, false).map(Effect::Emit).into_iter().collect()
    }

    fn ingest_on_change(
        &mut self,
        field: &str,
        value: String,
        timestamp: DateTime<Utc>,
    ) -> Result<Effects, ChannelError> {
        self.store(field, value, timestamp);

        let backlog = self.policy.pending_changes(field);
        if backlog % ON_CHANGE_BACKLOG_WARN_STEP == 0 {
            warn!(
                event = events::CHANNEL_ONCHANGE_BACKLOG,
                component = COMPONENT,
                channel = self.channel(),
                field,
                backlog,
                rate_s = self.spec.rate_interval().as_secs_f64(),
                "on-change queue grows faster than it drains"
            );
        }

        let drain = TimerKind::Drain(field.to_string());
        let mut effects = Vec::new();
        if !self.armed.contains(&drain) {
            self.arm(drain, self.spec.rate_interval(), &mut effects)?;
        }
        self.phase = Phase::Collecting;
        Ok(effects)
    }

    fn ingest_timed(
        &mut self,
        field: &str,
        value: String,
        timestamp: DateTime<Utc>,
        now: Instant,
    ) -> Result<Effects, ChannelError> {
        if !self.store(field, value, timestamp) {
            return Ok(Vec::new());
        }

        let mut effects = Vec::new();
        match self.phase {
            Phase::Idle => {
                self.arm(TimerKind::Rate, self.spec.rate_interval(), &mut effects)?;
                self.phase = Phase::Collecting;
            }
            Phase::Collecting => {}
            Phase::Waiting { timer_armed } => {
                if self.is_complete() {
                    if timer_armed {
                        self.disarm(TimerKind::Wait, &mut effects);
                    }
                    effects.extend(self.emit(now, false).map(Effect::Emit));
                }
            }
        }
        Ok(effects)
    }

    /// Reacts to a timer the worker confirmed as current.
    pub(crate) fn on_timer(&mut self, kind: TimerKind, now: Instant) -> Result<Effects, ChannelError> {
        if !self.armed.remove(&kind) {
            debug!(
                event = events::CHANNEL_TIMER_STALE,
                component = COMPONENT,
                channel = self.channel(),
                timer = %kind,
                "ignoring fire of a timer that is not armed"
            );
            return Ok(Vec::new());
        }

        match kind {
            TimerKind::Rate => self.on_rate_elapsed(now),
            TimerKind::Wait => Ok(self.emit(now, true).map(Effect::Emit).into_iter().collect()),
            TimerKind::Drain(field) => self.on_drain_elapsed(field, now),
        }
    }

    fn on_rate_elapsed(&mut self, now: Instant) -> Result<Effects, ChannelError> {
        let mut effects = Vec::new();
        if self.is_complete() {
            effects.extend(self.emit(now, false).map(Effect::Emit));
        } else if self.spec.waits_indefinitely() {
            self.phase = Phase::Waiting { timer_armed: false };
        } else {
            self.arm(TimerKind::Wait, self.spec.wait_interval(), &mut effects)?;
            self.phase = Phase::Waiting { timer_armed: true };
        }
        Ok(effects)
    }

    fn on_drain_elapsed(&mut self, field: String, now: Instant) -> Result<Effects, ChannelError> {
        let mut effects = Vec::new();

        if let Some(change) = self.policy.pop_change(&field) {
            let update = ComposedUpdate {
                channel: self.channel().to_string(),
                timestamp: change.timestamp,
                fields: BTreeMap::from([(field.clone(), change.value)]),
            };
            self.record_emit(now, false);
            effects.push(Effect::Emit(update));
        }

        if self.policy.has_pending_change(&field) {
            self.arm(
                TimerKind::Drain(field),
                self.spec.rate_interval(),
                &mut effects,
            )?;
        } else {
            self.present.remove(&field);
            if self.armed.is_empty() {
                self.phase = Phase::Idle;
            }
        }
        Ok(effects)
    }

    /// Records the gateway's verdict for one previously emitted update. The channel
    /// state was already reset at emit time, whatever the outcome.
    pub(crate) fn on_dispatch_result(&mut self, result: &Result<(), DispatchError>) {
        if result.is_err() {
            self.stats.dispatch_failures += 1;
        }
    }

    /// Stores a value through the policy. Returns `false` when the policy refused it.
    fn store(&mut self, field: &str, value: String, timestamp: DateTime<Utc>) -> bool {
        match self.policy.store(field, value, timestamp) {
            Ok(()) => {
                self.present.insert(field.to_string());
                self.stats.accepted += 1;
                true
            }
            Err(rejected) => {
                warn!(
                    event = events::CHANNEL_VALUE_REJECTED,
                    component = COMPONENT,
                    channel = self.channel(),
                    field,
                    reason = %rejected,
                    "rejecting value"
                );
                self.stats.ignored += 1;
                false
            }
        }
    }

    /// Composes the present fields and resets the channel to `Idle`.
    fn emit(&mut self, now: Instant, partial: bool) -> Option<ComposedUpdate> {
        if partial {
            info!(
                event = events::CHANNEL_EMIT_PARTIAL,
                component = COMPONENT,
                channel = self.spec.id(),
                present = self.present.len(),
                required = self.spec.required_fields().len(),
                "wait interval elapsed, emitting partial update"
            );
        }
        let update = self.policy.compose(self.spec.id(), &self.present);

        self.present.clear();
        self.phase = Phase::Idle;
        if update.is_some() {
            self.record_emit(now, partial);
        }
        update
    }

    fn record_emit(&mut self, now: Instant, partial: bool) {
        self.last_emit = Some(now);
        self.stats.emitted += 1;
        if partial {
            self.stats.partial += 1;
        }
    }

    fn arm(
        &mut self,
        kind: TimerKind,
        duration: Duration,
        effects: &mut Effects,
    ) -> Result<(), ChannelError> {
        let conflicting = match &kind {
            TimerKind::Rate | TimerKind::Wait => self
                .armed
                .iter()
                .find(|armed| matches!(armed, TimerKind::Rate | TimerKind::Wait)),
            TimerKind::Drain(_) => self.armed.get(&kind),
        };
        if let Some(armed) = conflicting {
            return Err(ChannelError::TimerConflict {
                channel: self.channel().to_string(),
                requested: kind,
                armed: armed.clone(),
            });
        }

        self.armed.insert(kind.clone());
        effects.push(Effect::Arm(kind, duration));
        Ok(())
    }

    fn disarm(&mut self, kind: TimerKind, effects: &mut Effects) {
        if self.armed.remove(&kind) {
            effects.push(Effect::Cancel(kind));
        }
    }
}
