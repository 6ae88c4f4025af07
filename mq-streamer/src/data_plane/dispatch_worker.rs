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

//! Dispatch worker that forwards a channel's composed updates to the gateway.

use crate::data_plane::channel_worker::ChannelCommand;
use crate::gateway::DispatchGateway;
use crate::model::ComposedUpdate;
use crate::observability::{events, fields};
use std::sync::Arc;
use tokio::sync::mpsc::{UnboundedReceiver, WeakUnboundedSender};
use tracing::{debug, info, warn, Level};

const COMPONENT: &str = "dispatch_worker";

struct FormattedUpdateFields {
    fields: String,
    timestamp: String,
}

impl FormattedUpdateFields {
    fn from_update(update: &ComposedUpdate) -> Self {
        Self {
            fields: fields::format_field_names(update),
            timestamp: update.timestamp.to_rfc3339(),
        }
    }
}

pub(crate) struct DispatchWorker;

impl DispatchWorker {
    /// Sends every queued update in order and reports each outcome to the channel.
    ///
    /// Runs until the channel worker drops its end of the queue.
    pub(crate) async fn dispatch_loop(
        channel: String,
        gateway: Arc<dyn DispatchGateway>,
        mut updates: UnboundedReceiver<ComposedUpdate>,
        report_to: WeakUnboundedSender<ChannelCommand>,
    ) {
        while let Some(update) = updates.recv().await {
            let mut update_fields =
                tracing::enabled!(Level::DEBUG).then(|| FormattedUpdateFields::from_update(&update));

            if let Some(formatted) = update_fields.as_ref() {
                debug!(
                    event = events::DISPATCH_SEND_ATTEMPT,
                    component = COMPONENT,
                    channel = channel.as_str(),
                    fields = formatted.fields.as_str(),
                    timestamp = formatted.timestamp.as_str(),
                    "attempting dispatch"
                );
            }

            let result = gateway.send(&update).await;
            match &result {
                Ok(()) => {
                    if let Some(formatted) = update_fields.as_ref() {
                        debug!(
                            event = events::DISPATCH_SEND_OK,
                            component = COMPONENT,
                            channel = channel.as_str(),
                            fields = formatted.fields.as_str(),
                            timestamp = formatted.timestamp.as_str(),
                            "dispatch succeeded"
                        );
                    }
                }
                Err(err) => {
                    let formatted = update_fields
                        .get_or_insert_with(|| FormattedUpdateFields::from_update(&update));
                    warn!(
                        event = events::DISPATCH_SEND_FAILED,
                        component = COMPONENT,
                        channel = channel.as_str(),
                        fields = formatted.fields.as_str(),
                        timestamp = formatted.timestamp.as_str(),
                        err = %err,
                        "dispatch failed, update dropped"
                    );
                }
            }

            let Some(mailbox) = report_to.upgrade() else {
                continue;
            };
            let _ = mailbox.send(ChannelCommand::DispatchDone(result));
        }

        info!(
            event = events::DISPATCH_RECV_CLOSED,
            component = COMPONENT,
            channel = channel.as_str(),
            reason = fields::REASON_DISPATCH_QUEUE_CLOSED,
            "update queue closed; stopping dispatch loop"
        );
    }
}
