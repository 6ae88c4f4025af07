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

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Failures surfaced by the [`crate::ChannelStreamer`] facade and channel handles.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum StreamerError {
    /// Two channel specs share one id.
    DuplicateChannel(String),
    /// A field mapping targets a channel that was never configured.
    UnknownChannel(String),
    /// The channel worker has stopped and no longer accepts commands.
    ChannelClosed(String),
}

impl Display for StreamerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamerError::DuplicateChannel(channel) => {
                write!(f, "channel {channel} is configured more than once")
            }
            StreamerError::UnknownChannel(channel) => {
                write!(f, "field mapping references unknown channel {channel}")
            }
            StreamerError::ChannelClosed(channel) => write!(f, "channel {channel} is closed"),
        }
    }
}

impl Error for StreamerError {}
