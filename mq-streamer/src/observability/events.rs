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

//! Canonical structured event names used across `mq-streamer`.

// Routing events.
pub const ROUTE_UNMAPPED: &str = "route_unmapped";
pub const ROUTE_FANOUT: &str = "route_fanout";
pub const ROUTE_CHANNEL_CLOSED: &str = "route_channel_closed";

// Channel worker events.
pub const CHANNEL_WORKER_START: &str = "channel_worker_start";
pub const CHANNEL_WORKER_STOP: &str = "channel_worker_stop";
pub const CHANNEL_TIMER_STALE: &str = "channel_timer_stale";
pub const CHANNEL_EMIT: &str = "channel_emit";
pub const CHANNEL_EMIT_PARTIAL: &str = "channel_emit_partial";
pub const CHANNEL_FIELD_UNDECLARED: &str = "channel_field_undeclared";
pub const CHANNEL_VALUE_REJECTED: &str = "channel_value_rejected";
pub const CHANNEL_MEASUREMENT_IGNORED: &str = "channel_measurement_ignored";
pub const CHANNEL_ONCHANGE_BACKLOG: &str = "channel_onchange_backlog";
pub const CHANNEL_INVARIANT_VIOLATION: &str = "channel_invariant_violation";
pub const CHANNEL_DISPATCH_QUEUE_CLOSED: &str = "channel_dispatch_queue_closed";

// Dispatch worker events.
pub const DISPATCH_SEND_ATTEMPT: &str = "dispatch_send_attempt";
pub const DISPATCH_SEND_OK: &str = "dispatch_send_ok";
pub const DISPATCH_SEND_FAILED: &str = "dispatch_send_failed";
pub const DISPATCH_RECV_CLOSED: &str = "dispatch_recv_closed";

// Broker ingress events.
pub const BROKER_RECEIVER_START: &str = "broker_receiver_start";
pub const BROKER_CONNECTED: &str = "broker_connected";
pub const BROKER_SUBSCRIBE_FAILED: &str = "broker_subscribe_failed";
pub const BROKER_PAYLOAD_INVALID: &str = "broker_payload_invalid";
pub const BROKER_CONNECTION_ERROR: &str = "broker_connection_error";
pub const BROKER_RECEIVER_STOP: &str = "broker_receiver_stop";

// Streamer lifecycle events.
pub const STREAMER_START: &str = "streamer_start";
pub const STREAMER_SHUTDOWN: &str = "streamer_shutdown";
pub const DAEMON_CONFIG_LOADED: &str = "daemon_config_loaded";
