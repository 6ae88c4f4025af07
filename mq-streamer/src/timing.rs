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

//! Timing coordinator.
//!
//! Provides single-shot, cancellable timers for the channel workers. The coordinator
//! only schedules callbacks; deciding whether a fire is still relevant belongs to the
//! owning channel worker, which compares the fire token against the timer it armed last.
//!
//! Tests drive the [`TokioTimingCoordinator`] with tokio's paused clock
//! (`#[tokio::test(start_paused = true)]`) to get a deterministic, manually advanced
//! timeline.

use std::fmt::{Display, Formatter};
use std::time::Duration;
use tokio::task::AbortHandle;
use tracing::trace;

/// Identifies which timer of a channel fired.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum TimerKind {
    /// Rate interval elapsed.
    Rate,
    /// Bounded wait for missing fields elapsed.
    Wait,
    /// Pacing timer of one on-change field queue.
    Drain(String),
}

impl Display for TimerKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            TimerKind::Rate => f.write_str("rate"),
            TimerKind::Wait => f.write_str("wait"),
            TimerKind::Drain(field) => write!(f, "drain:{field}"),
        }
    }
}

/// Monotonic per-channel arm counter used to recognise stale fires.
pub type TimerToken = u64;

/// Callback invoked exactly once when a timer elapses.
pub type TimerCallback = Box<dyn FnOnce() + Send + 'static>;

/// Everything a coordinator needs to know about a timer being armed.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TimerRequest {
    pub channel: String,
    pub kind: TimerKind,
    pub token: TimerToken,
    pub duration: Duration,
}

/// Cancellation handle of one armed timer. Dropping the handle cancels the timer.
pub struct TimerHandle {
    token: TimerToken,
    cancel: Option<Box<dyn FnOnce() + Send + 'static>>,
}

impl TimerHandle {
    pub fn new(token: TimerToken, cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            token,
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn token(&self) -> TimerToken {
        self.token
    }

    /// Cancels the timer. Calling it more than once has no further effect.
    pub fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Scheduling facility used by channel workers.
pub trait TimingCoordinator: Send + Sync {
    /// Schedules `on_fire` to run once after `request.duration`.
    fn arm(&self, request: TimerRequest, on_fire: TimerCallback) -> TimerHandle;
}

/// Coordinator backed by one `tokio::time::sleep` task per armed timer.
///
/// Must be used from within a tokio runtime.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioTimingCoordinator;

impl TokioTimingCoordinator {
    pub fn new() -> Self {
        Self
    }
}

impl TimingCoordinator for TokioTimingCoordinator {
    fn arm(&self, request: TimerRequest, on_fire: TimerCallback) -> TimerHandle {
        trace!(
            channel = request.channel.as_str(),
            timer = %request.kind,
            token = request.token,
            duration_ms = request.duration.as_millis() as u64,
            "arming timer"
        );

        let duration = request.duration;
        let task = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            on_fire();
        });
        let abort_handle: AbortHandle = task.abort_handle();

        TimerHandle::new(request.token, move || abort_handle.abort())
    }
}

#[cfg(test)]
mod tests {
    use super::{TimerKind, TimerRequest, TimingCoordinator, TokioTimingCoordinator};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn request(token: u64, secs: u64) -> TimerRequest {
        TimerRequest {
            channel: "test-channel".to_string(),
            kind: TimerKind::Rate,
            token,
            duration: Duration::from_secs(secs),
        }
    }

    fn counting_callback(counter: &Arc<AtomicUsize>) -> Box<dyn FnOnce() + Send> {
        let counter = counter.clone();
        Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[tokio::test(start_paused = true)]
    async fn timer_fires_once_after_duration() {
        let coordinator = TokioTimingCoordinator::new();
        let fired = Arc::new(AtomicUsize::new(0));

        let _handle = coordinator.arm(request(1, 15), counting_callback(&fired));

        tokio::time::sleep(Duration::from_millis(14_999)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_timer_never_fires() {
        let coordinator = TokioTimingCoordinator::new();
        let fired = Arc::new(AtomicUsize::new(0));

        let mut handle = coordinator.arm(request(7, 5), counting_callback(&fired));
        assert_eq!(handle.token(), 7);
        tokio::time::sleep(Duration::from_secs(2)).await;
        handle.cancel();
        handle.cancel();

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_handle_cancels_timer() {
        let coordinator = TokioTimingCoordinator::new();
        let fired = Arc::new(AtomicUsize::new(0));

        drop(coordinator.arm(request(3, 1), counting_callback(&fired)));

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn timer_kind_display_names_drain_field() {
        assert_eq!(TimerKind::Drain("field2".to_string()).to_string(), "drain:field2");
        assert_eq!(TimerKind::Wait.to_string(), "wait");
    }
}
