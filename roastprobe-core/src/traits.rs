//! Collaborator traits
//!
//! The sampler talks to hardware and transports only through these two
//! traits. Keep them narrow: a sensor answers one quantity at a time, a sink
//! accepts one encoded channel value at a time.

use crate::channels::{Quantity, TelemetryChannel};
use crate::codec::WireValue;
use crate::errors::{SensorFault, SinkError};

/// Source of physical readings
///
/// Follows the `embedded-hal` convention: `nb::Error::WouldBlock` means "no
/// fresh value yet" and the caller keeps the previous one, while
/// `nb::Error::Other` is a fault that marks the reading absent this cycle.
pub trait SensorSource {
    /// Current value of `quantity`
    fn read(&mut self, quantity: Quantity) -> nb::Result<f64, SensorFault>;
}

/// Destination for encoded channel values
pub trait TelemetrySink {
    /// Publish `value` for `channel`
    fn push(&mut self, channel: &TelemetryChannel, value: WireValue) -> Result<(), SinkError>;
}

impl<S: SensorSource + ?Sized> SensorSource for &mut S {
    fn read(&mut self, quantity: Quantity) -> nb::Result<f64, SensorFault> {
        (**self).read(quantity)
    }
}

impl<T: TelemetrySink + ?Sized> TelemetrySink for &mut T {
    fn push(&mut self, channel: &TelemetryChannel, value: WireValue) -> Result<(), SinkError> {
        (**self).push(channel, value)
    }
}
