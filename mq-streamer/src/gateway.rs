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

use crate::model::ComposedUpdate;
use async_trait::async_trait;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Why a composed update could not be delivered. Opaque to the accumulators beyond
/// success or failure.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DispatchError {
    /// The request never produced a usable response.
    Transport(String),
    /// The remote service answered but refused the update.
    Rejected { status: u16, body: String },
}

impl Display for DispatchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            DispatchError::Transport(reason) => write!(f, "transport failure: {reason}"),
            DispatchError::Rejected { status, body } => {
                write!(f, "update rejected with status {status}: {body}")
            }
        }
    }
}

impl Error for DispatchError {}

///
/// [`DispatchGateway`] delivers composed updates to the remote sink that backs a channel.
///
/// The gateway owns every transport-level detail (encoding, credentials, channel
/// flavour). It is called from a per-channel dispatch worker, never from inside a
/// channel's accumulator, so a slow remote call does not hold up ingestion.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use mq_streamer::{ComposedUpdate, DispatchError, DispatchGateway};
///
/// struct StdoutGateway;
///
/// #[async_trait]
/// impl DispatchGateway for StdoutGateway {
///     async fn send(&self, update: &ComposedUpdate) -> Result<(), DispatchError> {
///         println!("{}: {:?}", update.channel, update.fields);
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait DispatchGateway: Send + Sync {
    async fn send(&self, update: &ComposedUpdate) -> Result<(), DispatchError>;
}
