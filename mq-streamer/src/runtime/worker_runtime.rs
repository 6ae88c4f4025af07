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

//! Runtime helper for spawning a channel's worker pair.

use crate::data_plane::channel_worker::{ChannelHandle, ChannelWorker};
use crate::data_plane::dispatch_worker::DispatchWorker;
use crate::gateway::DispatchGateway;
use crate::model::ChannelSpec;
use crate::timing::TimingCoordinator;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Tasks backing one channel.
pub(crate) struct ChannelTasks {
    pub(crate) channel: JoinHandle<()>,
    pub(crate) dispatch: JoinHandle<()>,
}

impl ChannelTasks {
    /// Waits until both workers have stopped.
    pub(crate) async fn join(self) {
        let _ = self.channel.await;
        let _ = self.dispatch.await;
    }
}

/// Spawns the channel worker and its dispatch worker on the current tokio runtime.
///
/// The dispatch worker ends on its own once the channel worker stops and the update
/// queue is drained.
pub(crate) fn spawn_channel_workers(
    spec: ChannelSpec,
    gateway: Arc<dyn DispatchGateway>,
    coordinator: Arc<dyn TimingCoordinator>,
) -> (ChannelHandle, ChannelTasks) {
    let channel = spec.id().to_string();
    let (dispatch_queue, updates) = mpsc::unbounded_channel();
    let (worker, handle) = ChannelWorker::new(spec, coordinator, dispatch_queue);
    let report_to = worker.reply_to();

    let dispatch = tokio::spawn(DispatchWorker::dispatch_loop(
        channel, gateway, updates, report_to,
    ));
    let channel = tokio::spawn(worker.run());

    (handle, ChannelTasks { channel, dispatch })
}
