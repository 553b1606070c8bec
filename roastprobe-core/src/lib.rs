//! Core engine for RoastProbe
//!
//! Infers heater and fan power of a phase-controlled coffee roaster from edge
//! timing, and turns every reading into the fixed-point wire format the
//! telemetry transports carry.
//!
//! Key constraints:
//! - Edge recording is wait-free (callable from interrupt or callback context)
//! - No heap allocation anywhere in the crate
//! - Builds without `std` for microcontroller targets
//!
//! ```
//! use roastprobe_core::{
//!     CalibrationCurve, EdgeKind, EdgeTimestampStore, PhaseDelayResolver, Tick,
//! };
//! use roastprobe_core::curve::{FAN_CURVE_POINTS, HEATER_CURVE_POINTS};
//!
//! let edges = EdgeTimestampStore::new();
//! edges.record(EdgeKind::Reference, Tick(10_000));
//! edges.record(EdgeKind::TriggerA, Tick(11_450));
//!
//! let heater = CalibrationCurve::new(&HEATER_CURVE_POINTS)?;
//! let fan = CalibrationCurve::new(&FAN_CURVE_POINTS)?;
//! let levels = PhaseDelayResolver::new(&edges).power_levels(Tick(12_000), &heater, &fan);
//!
//! assert_eq!(levels.heater, 7.0);
//! assert_eq!(roastprobe_core::codec::encode(Some(levels.heater))?, [0xBC, 0x02, 0, 0]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod channels;
pub mod codec;
pub mod curve;
pub mod edges;
pub mod errors;
pub mod phase;
pub mod sampler;
pub mod time;
pub mod traits;

// Public API
pub use channels::{co2_density, Quantity, ReadingKind, TelemetryChannel};
pub use codec::WireValue;
pub use curve::{interpolate, CalibrationCurve, CurvePoint};
pub use edges::{EdgeKind, EdgeTimestampStore};
pub use errors::{ChannelError, CodecError, CurveError, SensorFault, SinkError};
pub use phase::{PhaseDelayResolver, PowerLevels, REFERENCE_TIMEOUT};
pub use sampler::{CycleReport, Sampler};
pub use time::{Tick, TickDelta, TickSource};
pub use traits::{SensorSource, TelemetrySink};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_exists() {
        assert!(!VERSION.is_empty());
    }
}
