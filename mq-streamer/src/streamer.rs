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

use crate::accumulator::ChannelStats;
use crate::data_plane::channel_worker::ChannelHandle;
use crate::error::StreamerError;
use crate::gateway::DispatchGateway;
use crate::model::{ChannelSpec, FieldMapping, Measurement};
use crate::observability::events;
use crate::routing::field_router::FieldRouter;
use crate::routing::MeasurementListener;
use crate::runtime::worker_runtime::{spawn_channel_workers, ChannelTasks};
use crate::timing::{TimingCoordinator, TokioTimingCoordinator};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::info;

const COMPONENT: &str = "channel_streamer";

/// Runs one channel worker pair per configured channel and routes measurements to them.
pub struct ChannelStreamer {
    router: Arc<FieldRouter>,
    channels: HashMap<String, ChannelHandle>,
    tasks: Vec<ChannelTasks>,
}

impl ChannelStreamer {
    /// Validates the configuration and spawns every channel's workers on the current
    /// tokio runtime.
    ///
    /// # Errors
    ///
    /// [`StreamerError::DuplicateChannel`] when two specs share an id and
    /// [`StreamerError::UnknownChannel`] when the mapping targets an undeclared channel.
    /// Nothing is spawned in either case.
    pub fn start(
        specs: impl IntoIterator<Item = ChannelSpec>,
        mapping: FieldMapping,
        gateway: Arc<dyn DispatchGateway>,
        coordinator: Arc<dyn TimingCoordinator>,
    ) -> Result<Self, StreamerError> {
        let specs: Vec<ChannelSpec> = specs.into_iter().collect();

        {
            let mut seen = HashSet::new();
            for spec in &specs {
                if !seen.insert(spec.id()) {
                    return Err(StreamerError::DuplicateChannel(spec.id().to_string()));
                }
            }
            let unknown = mapping
                .iter()
                .find(|(_, target)| !seen.contains(target.channel.as_str()))
                .map(|(_, target)| target.channel.clone());
            if let Some(channel) = unknown {
                return Err(StreamerError::UnknownChannel(channel));
            }
        }

        let channel_count = specs.len();
        let route_count = mapping.len();
        let mut channels = HashMap::with_capacity(channel_count);
        let mut tasks = Vec::with_capacity(channel_count);
        for spec in specs {
            let id = spec.id().to_string();
            let (handle, channel_tasks) =
                spawn_channel_workers(spec, gateway.clone(), coordinator.clone());
            channels.insert(id, handle);
            tasks.push(channel_tasks);
        }

        let router = Arc::new(FieldRouter::new(mapping, channels.clone())?);

        info!(
            event = events::STREAMER_START,
            component = COMPONENT,
            channels = channel_count,
            routes = route_count,
            "channel streamer started"
        );

        Ok(Self {
            router,
            channels,
            tasks,
        })
    }

    /// [`ChannelStreamer::start`] with real tokio timers.
    pub fn with_tokio_timers(
        specs: impl IntoIterator<Item = ChannelSpec>,
        mapping: FieldMapping,
        gateway: Arc<dyn DispatchGateway>,
    ) -> Result<Self, StreamerError> {
        Self::start(
            specs,
            mapping,
            gateway,
            Arc::new(TokioTimingCoordinator::new()),
        )
    }

    /// Routes one measurement. Returns how many channels accepted it.
    pub fn deliver(&self, measurement: Measurement) -> usize {
        self.router.deliver(measurement)
    }

    /// Listener to hand to measurement sources.
    pub fn listener(&self) -> Arc<dyn MeasurementListener> {
        self.router.clone()
    }

    pub fn router(&self) -> &FieldRouter {
        &self.router
    }

    pub fn channel(&self, id: &str) -> Option<&ChannelHandle> {
        self.channels.get(id)
    }

    pub fn channel_ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.channels.keys().map(String::as_str)
    }

    pub async fn channel_stats(&self, id: &str) -> Result<ChannelStats, StreamerError> {
        self.channels
            .get(id)
            .ok_or_else(|| StreamerError::UnknownChannel(id.to_string()))?
            .stats()
            .await
    }

    /// Stops every channel and waits for their workers. Updates already handed to
    /// dispatch are still sent; unconsumed field values are dropped.
    pub async fn shutdown(self) {
        for handle in self.channels.values() {
            // A channel that stopped on its own has nothing left to shut down.
            let _ = handle.shutdown();
        }
        for tasks in self.tasks {
            tasks.join().await;
        }

        info!(
            event = events::STREAMER_SHUTDOWN,
            component = COMPONENT,
            channels = self.channels.len(),
            "channel streamer stopped"
        );
    }
}
