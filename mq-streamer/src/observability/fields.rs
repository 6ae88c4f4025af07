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

//! Canonical structured field keys and value-format helpers.

use crate::model::ComposedUpdate;

pub const EVENT: &str = "event";
pub const COMPONENT: &str = "component";
pub const CHANNEL: &str = "channel";
pub const FIELD: &str = "field";
pub const BROKER: &str = "broker";
pub const TOPIC: &str = "topic";
pub const TIMER: &str = "timer";
pub const TOKEN: &str = "token";
pub const FIELDS: &str = "fields";
pub const REASON: &str = "reason";
pub const ERR: &str = "err";

pub const NONE: &str = "none";
pub const REASON_MAILBOX_CLOSED: &str = "mailbox_closed";
pub const REASON_DISPATCH_QUEUE_CLOSED: &str = "dispatch_queue_closed";
pub const REASON_SHUTDOWN: &str = "shutdown";
pub const REASON_INVARIANT_VIOLATION: &str = "invariant_violation";

/// Renders the field names of an update as `a,b,c`, or `none` when empty.
pub fn format_field_names(update: &ComposedUpdate) -> String {
    if update.fields.is_empty() {
        return NONE.to_string();
    }
    update
        .fields
        .keys()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(",")
}
