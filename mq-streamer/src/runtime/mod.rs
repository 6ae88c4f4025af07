//! Runtime integration layer.
//!
//! Keeps task spawning in one place so the rest of the crate does not reach for the
//! tokio runtime directly.

pub(crate) mod worker_runtime;
