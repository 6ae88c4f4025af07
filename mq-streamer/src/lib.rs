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

//! # mq-streamer
//! `mq-streamer` collects single-value measurements published on message-broker topics
//! and turns them into periodic, rate-limited multi-field updates for remote
//! data-logging channels.
//!
//! Typical usage is API-first and centered on [`ChannelStreamer`]: build the
//! [`ChannelSpec`]s and the [`FieldMapping`], plug in a [`DispatchGateway`] and feed
//! [`Measurement`]s through [`ChannelStreamer::deliver`] or the
//! [`MeasurementListener`] returned by [`ChannelStreamer::listener`].
//!
//! ## Quick start
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use async_trait::async_trait;
//! use mq_streamer::{
//!     ChannelSpec, ChannelStreamer, ComposedUpdate, DispatchError, DispatchGateway,
//!     FieldMapping, FieldTarget, Measurement, SourceKey, UpdateType,
//! };
//!
//! struct PrintGateway;
//!
//! #[async_trait]
//! impl DispatchGateway for PrintGateway {
//!     async fn send(&self, update: &ComposedUpdate) -> Result<(), DispatchError> {
//!         println!("{} {:?}", update.channel, update.fields);
//!         Ok(())
//!     }
//! }
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let living_room = ChannelSpec::new(
//!     "living-room",
//!     UpdateType::Buffered,
//!     Duration::from_secs(15),
//!     Duration::from_secs(5),
//!     ["field1", "field2"],
//! )
//! .unwrap();
//!
//! let mut mapping = FieldMapping::new();
//! mapping.insert(
//!     SourceKey::new("home", "sensor/temperature"),
//!     FieldTarget::new("living-room", "field1"),
//! );
//! mapping.insert(
//!     SourceKey::new("home", "sensor/humidity"),
//!     FieldTarget::new("living-room", "field2"),
//! );
//!
//! let streamer =
//!     ChannelStreamer::with_tokio_timers([living_room], mapping, Arc::new(PrintGateway)).unwrap();
//! assert_eq!(
//!     streamer.deliver(Measurement::now("home", "sensor/temperature", "21.5")),
//!     1
//! );
//! assert_eq!(streamer.deliver(Measurement::now("home", "sensor/pressure", "1013")), 0);
//! streamer.shutdown().await;
//! # });
//! ```
//!
//! ## Update types
//!
//! - [`UpdateType::Blackout`]: the first measurement after a quiet period is sent right
//!   away, everything within the following rate interval is discarded.
//! - [`UpdateType::Buffered`]: the latest value per field is sent when the rate interval
//!   elapses.
//! - [`UpdateType::Average`]: the mean of the numeric values per field is sent when the
//!   rate interval elapses.
//! - [`UpdateType::OnChange`]: every value is queued and sent on its own, one per rate
//!   interval per field.
//!
//! Buffered and average channels wait up to the wait interval for missing fields once
//! the rate interval has elapsed and then send what they have. A zero wait interval
//! waits until every field is present.
//!
//! ## Concurrency
//!
//! Each channel is owned by a single worker task that applies measurements and timer
//! fires in arrival order. Channels never share state, and remote delivery runs on a
//! separate dispatch task per channel.
//!
//! ## Logging
//!
//! The crate uses `tracing` for logs/events.
//! Library code emits events and does not initialize a global subscriber. Binaries
//! and tests are responsible for one-time `tracing_subscriber` initialization.

mod accumulator;
pub use accumulator::ChannelStats;

mod data_plane;
pub use data_plane::channel_worker::ChannelHandle;

mod error;
pub use error::StreamerError;

mod gateway;
pub use gateway::{DispatchError, DispatchGateway};

mod model;
pub use model::{
    ChannelSpec, ComposedUpdate, FieldMapping, FieldTarget, InvalidChannelSpec, Measurement,
    SourceKey, UnknownUpdateType, UpdateType, MAX_CHANNEL_FIELDS, MIN_RATE_INTERVAL,
};

#[doc(hidden)]
pub mod observability;

mod routing;
pub use routing::field_router::FieldRouter;
pub use routing::MeasurementListener;

mod runtime;

mod streamer;
pub use streamer::ChannelStreamer;

pub mod timing;
pub use timing::{TimerHandle, TimerKind, TimerRequest, TimingCoordinator, TokioTimingCoordinator};
