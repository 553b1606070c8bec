//! Error Types for the Probe Core
//!
//! ## Design Philosophy
//!
//! The core runs inside a sampling loop that must never stop because a single
//! channel misbehaved, so errors here are small, `Copy`, and carry only
//! `&'static str` context. They are either fatal at startup (a bad calibration
//! curve) or absorbed by the caller for one cycle (a value that does not fit
//! the wire format, a sensor that did not answer, a sink that refused a write).
//!
//! ## Error Categories
//!
//! ### Configuration (fatal at load time)
//! - `CurveError`: calibration curve violates its invariants
//! - `ChannelError`: telemetry channel definition does not fit its fields
//!
//! ### Per-cycle (absorbed, logged)
//! - `CodecError`: reading cannot be represented as value×100 in an `i32`
//! - `SensorFault`: a collaborator failed to deliver a reading
//! - `SinkError`: a telemetry sink rejected an update
//!
//! ## Handling Strategy
//!
//! ```rust
//! use roastprobe_core::{codec, CodecError};
//!
//! fn wire_bytes(reading: Option<f64>) -> [u8; 4] {
//!     match codec::encode(reading) {
//!         Ok(bytes) => bytes,
//!         // Doesn't fit on the wire: report the channel as absent this cycle
//!         Err(CodecError::Overflow { .. }) | Err(CodecError::NotFinite) => [0; 4],
//!     }
//! }
//!
//! assert_eq!(wire_bytes(Some(1.0e12)), [0, 0, 0, 0]);
//! ```

use thiserror_no_std::Error;

/// Calibration curve rejected at load time
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum CurveError {
    /// Fewer than two points cannot describe a segment
    #[error("Calibration curve needs at least 2 points, got {points}")]
    TooFewPoints {
        /// Points supplied
        points: usize,
    },

    /// More points than the fixed-capacity table holds
    #[error("Calibration curve holds at most {max} points, got {points}")]
    TooManyPoints {
        /// Points supplied
        points: usize,
        /// Table capacity
        max: usize,
    },

    /// Delays must strictly increase from fastest to slowest firing
    #[error("Delay {delay_ms}ms at index {index} does not exceed previous {previous_ms}ms")]
    NotIncreasing {
        /// Offending point
        index: usize,
        /// Its delay
        delay_ms: f64,
        /// Delay of the point before it
        previous_ms: f64,
    },

    /// NaN or infinite delay or level
    #[error("Calibration point {index} is not a finite number")]
    NotFinite {
        /// Offending point
        index: usize,
    },

    /// Level outside the active 1-9 scale
    #[error("Level {level} at index {index} outside [{min}, {max}]")]
    LevelOutOfRange {
        /// Offending point
        index: usize,
        /// Its level
        level: f64,
        /// Lowest active level
        min: f64,
        /// Highest level
        max: f64,
    },
}

/// Telemetry channel definition rejected at load time
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelError {
    /// Label longer than the fixed-capacity field
    #[error("Channel label is {len} bytes, limit is {max}")]
    LabelTooLong {
        /// Label length
        len: usize,
        /// Field capacity
        max: usize,
    },

    /// BLE UUID longer than the canonical 36-character form
    #[error("BLE UUID is {len} bytes, limit is {max}")]
    UuidTooLong {
        /// UUID length
        len: usize,
        /// Field capacity
        max: usize,
    },

    /// RDP channels are numbered from 1
    #[error("RDP channel numbers start at 1")]
    ZeroRdpChannel,

    /// More channels than the sampler table holds
    #[error("Sampler holds at most {max} channels")]
    TooManyChannels {
        /// Table capacity
        max: usize,
    },
}

/// Reading cannot be carried by the fixed-point wire format
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum CodecError {
    /// value×100 does not fit in a signed 32-bit integer
    #[error("Value {value} overflows the x100 fixed-point range")]
    Overflow {
        /// The physical reading
        value: f64,
    },

    /// NaN or infinity
    #[error("Value is not a finite number")]
    NotFinite,
}

/// Sensor collaborator could not deliver a reading this cycle
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorFault {
    /// Device did not answer on its bus
    #[error("Sensor not responding: {reason}")]
    NotResponding {
        /// Short description from the driver
        reason: &'static str,
    },

    /// Device is not fitted or failed to initialise
    #[error("Sensor unavailable")]
    Unavailable,
}

/// Telemetry sink rejected an update
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkError {
    /// Transport-level write failed
    #[error("Sink write failed: {reason}")]
    WriteFailed {
        /// Short description from the transport
        reason: &'static str,
    },

    /// Sink is not ready to accept values (e.g. not associated yet)
    #[error("Sink not ready")]
    NotReady,
}

#[cfg(feature = "defmt")]
impl defmt::Format for CurveError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::TooFewPoints { points } =>
                defmt::write!(fmt, "Curve needs 2+ points, got {}", points),
            Self::TooManyPoints { points, max } =>
                defmt::write!(fmt, "Curve holds {} points, got {}", max, points),
            Self::NotIncreasing { index, delay_ms, previous_ms } =>
                defmt::write!(fmt, "Delay {}ms at {} <= {}ms", delay_ms, index, previous_ms),
            Self::NotFinite { index } =>
                defmt::write!(fmt, "Point {} not finite", index),
            Self::LevelOutOfRange { index, level, min, max } =>
                defmt::write!(fmt, "Level {} at {} outside [{}, {}]", level, index, min, max),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ChannelError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::LabelTooLong { len, max } => defmt::write!(fmt, "Label {} > {}", len, max),
            Self::UuidTooLong { len, max } => defmt::write!(fmt, "UUID {} > {}", len, max),
            Self::ZeroRdpChannel => defmt::write!(fmt, "RDP channel 0"),
            Self::TooManyChannels { max } => defmt::write!(fmt, "More than {} channels", max),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for CodecError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::Overflow { value } => defmt::write!(fmt, "Value {} overflows x100", value),
            Self::NotFinite => defmt::write!(fmt, "Value not finite"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for SensorFault {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::NotResponding { reason } => defmt::write!(fmt, "Sensor not responding: {}", reason),
            Self::Unavailable => defmt::write!(fmt, "Sensor unavailable"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for SinkError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::WriteFailed { reason } => defmt::write!(fmt, "Sink write failed: {}", reason),
            Self::NotReady => defmt::write!(fmt, "Sink not ready"),
        }
    }
}
