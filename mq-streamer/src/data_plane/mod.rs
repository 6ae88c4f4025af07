//! Data-plane layer.
//!
//! Owns the per-channel execution: a channel worker that applies measurements and
//! timer fires to the accumulator one at a time, and a dispatch worker that talks to
//! the gateway so a slow remote call never holds up ingestion.
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use async_trait::async_trait;
//! use mq_streamer::{
//!     ChannelSpec, ChannelStreamer, ComposedUpdate, DispatchError, DispatchGateway,
//!     FieldMapping, FieldTarget, SourceKey, UpdateType,
//! };
//!
//! # struct NullGateway;
//! #
//! # #[async_trait]
//! # impl DispatchGateway for NullGateway {
//! #     async fn send(&self, _update: &ComposedUpdate) -> Result<(), DispatchError> {
//! #         Ok(())
//! #     }
//! # }
//! #
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let spec = ChannelSpec::new(
//!     "garage",
//!     UpdateType::Blackout,
//!     Duration::from_secs(30),
//!     Duration::ZERO,
//!     ["field1"],
//! )
//! .unwrap();
//! let mapping: FieldMapping = [(
//!     SourceKey::new("home", "garage/door"),
//!     FieldTarget::new("garage", "field1"),
//! )]
//! .into_iter()
//! .collect();
//!
//! // Every channel gets its own worker pair; handles address the channel worker.
//! let streamer = ChannelStreamer::with_tokio_timers([spec], mapping, Arc::new(NullGateway)).unwrap();
//! let handle = streamer.channel("garage").unwrap();
//! handle.ingest("field1", "open", chrono::Utc::now()).unwrap();
//! assert_eq!(handle.stats().await.unwrap().emitted, 1);
//! streamer.shutdown().await;
//! # });
//! ```

pub(crate) mod channel_worker;
pub(crate) mod dispatch_worker;
