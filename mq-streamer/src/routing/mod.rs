//! Routing layer.
//!
//! Resolves which `(channel, field)` slots consume a `(broker, topic)` measurement and
//! fans the value out to the matching channel workers. The mapping is fixed at
//! startup and read without synchronization.

pub(crate) mod field_router;

use crate::model::Measurement;

///
/// [`MeasurementListener`] is the entry point a measurement source calls for every
/// value it receives.
///
/// Implementations must not block: sources call it from their own receive loops.
pub trait MeasurementListener: Send + Sync {
    fn on_measurement(&self, measurement: Measurement);
}
