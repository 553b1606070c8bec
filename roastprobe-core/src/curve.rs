//! Calibration Curves: Phase Delay to Power Level
//!
//! ## Background
//!
//! A phase-controlled (TRIAC) load is powered by firing part-way through each
//! AC half-cycle. The later the trigger fires after the zero crossing, the less
//! of the waveform reaches the load:
//!
//! ```text
//!          fast firing (max power)        slow firing (min power)
//!   ┌──────┐                       ┌──────┐
//!   │ ░░░░░│                       │    ░░│
//!  ─┘ ░░░░░└─────               ───┘    ░░└─────
//!   ^ ^                            ^    ^
//!   zc trigger (0.8 ms)            zc   trigger (2.9 ms)
//! ```
//!
//! The roaster's controller exposes a 1–9 dial. A curve maps measured delays
//! back onto that dial using a handful of calibration points taken by setting
//! the dial and reading the delay.
//!
//! ## Algorithm
//!
//! Piecewise-linear interpolation over the calibration points, with clamping
//! at both ends:
//!
//! 1. Faster than the first point → first level (max power)
//! 2. Inside segment `(p[i], p[i+1]]` → linear blend, rounded to 0.1
//! 3. Slower than the last point → last level (min power, still "on")
//!
//! "Off" (level 0) is never produced here. Only the reference-signal timeout in
//! [`crate::phase`] decides that the device is off.
//!
//! ## Memory
//!
//! Points live in a fixed-capacity `heapless::Vec`, 16 bytes per point, 256
//! bytes per curve at full capacity. No heap allocation.
//!
//! ```rust
//! use roastprobe_core::curve::CalibrationCurve;
//!
//! let heater = CalibrationCurve::new(&[(0.8, 9.0), (2.1, 5.0), (2.9, 1.0)])?;
//!
//! assert_eq!(heater.interpolate(1.45), 7.0); // midpoint of first segment
//! assert_eq!(heater.interpolate(0.5), 9.0);  // faster than calibrated: max
//! assert_eq!(heater.interpolate(5.0), 1.0);  // slower than calibrated: floor
//! # Ok::<(), roastprobe_core::errors::CurveError>(())
//! ```

use heapless::Vec;

use crate::errors::CurveError;

// Macro for optional logging
#[cfg(feature = "log")]
macro_rules! log_trace {
    ($($arg:tt)*) => { log::trace!($($arg)*) };
}

#[cfg(not(feature = "log"))]
macro_rules! log_trace {
    ($($arg:tt)*) => {};
}

/// Maximum calibration points per curve
pub const MAX_CURVE_POINTS: usize = 16;

/// Lowest level an active load can report
pub const MIN_ACTIVE_LEVEL: f64 = 1.0;

/// Highest level on the dial
pub const MAX_LEVEL: f64 = 9.0;

/// Result type for curve construction
pub type CurveResult<T> = Result<T, CurveError>;

/// One calibration measurement
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurvePoint {
    /// Trigger delay after zero-cross (milliseconds)
    pub delay_ms: f64,
    /// Dial setting that produced it (1.0 - 9.0)
    pub level: f64,
}

/// Validated, immutable calibration curve for one load
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationCurve {
    points: Vec<CurvePoint, MAX_CURVE_POINTS>,
}

impl CalibrationCurve {
    /// Build a curve from `(delay_ms, level)` pairs, fastest firing first
    ///
    /// Rejects curves with fewer than two points, non-finite values, delays
    /// that do not strictly increase, or levels outside 1–9.
    pub fn new(points: &[(f64, f64)]) -> CurveResult<Self> {
        if points.len() < 2 {
            return Err(CurveError::TooFewPoints { points: points.len() });
        }
        if points.len() > MAX_CURVE_POINTS {
            return Err(CurveError::TooManyPoints {
                points: points.len(),
                max: MAX_CURVE_POINTS,
            });
        }

        let mut validated: Vec<CurvePoint, MAX_CURVE_POINTS> = Vec::new();
        for (index, &(delay_ms, level)) in points.iter().enumerate() {
            if !delay_ms.is_finite() || !level.is_finite() {
                return Err(CurveError::NotFinite { index });
            }
            if !(MIN_ACTIVE_LEVEL..=MAX_LEVEL).contains(&level) {
                return Err(CurveError::LevelOutOfRange {
                    index,
                    level,
                    min: MIN_ACTIVE_LEVEL,
                    max: MAX_LEVEL,
                });
            }
            if let Some(prev) = validated.last().copied() {
                if delay_ms <= prev.delay_ms {
                    return Err(CurveError::NotIncreasing {
                        index,
                        delay_ms,
                        previous_ms: prev.delay_ms,
                    });
                }
            }
            // Capacity checked above
            let _ = validated.push(CurvePoint { delay_ms, level });
        }

        Ok(Self { points: validated })
    }

    /// Calibration points, fastest firing first
    pub fn points(&self) -> &[CurvePoint] {
        &self.points
    }

    /// Level reported for delays at or below the first point
    pub fn max_level(&self) -> f64 {
        self.points[0].level
    }

    /// Level reported for delays at or beyond the last point
    pub fn floor_level(&self) -> f64 {
        self.points[self.points.len() - 1].level
    }

    /// Map a trigger delay (ms) to a power level
    pub fn interpolate(&self, delay_ms: f64) -> f64 {
        interpolate(delay_ms, self)
    }
}

/// Map a trigger delay (ms) onto `curve`
///
/// Faster than the first point clamps to the first level, slower than the
/// last point clamps to the floor. In between the result is a linear blend of
/// the enclosing segment rounded to one decimal place.
pub fn interpolate(delay_ms: f64, curve: &CalibrationCurve) -> f64 {
    let points = curve.points();
    let first = points[0];

    if delay_ms <= first.delay_ms {
        return first.level;
    }

    for segment in points.windows(2) {
        let (lo, hi) = (segment[0], segment[1]);
        if lo.delay_ms < delay_ms && delay_ms <= hi.delay_ms {
            let fraction = (delay_ms - lo.delay_ms) / (hi.delay_ms - lo.delay_ms);
            let level = lo.level + (hi.level - lo.level) * fraction;
            return round_tenths(level);
        }
    }

    log_trace!(
        "Delay {}ms beyond slowest calibration point {}ms, clamped to floor",
        delay_ms,
        curve.points()[points.len() - 1].delay_ms
    );
    curve.floor_level()
}

/// Round to one decimal place, ties away from zero
fn round_tenths(value: f64) -> f64 {
    libm::round(value * 10.0) / 10.0
}

/// Production heater calibration
pub const HEATER_CURVE_POINTS: [(f64, f64); 3] = [
    (0.8, 9.0), // fast firing = max power
    (2.1, 5.0),
    (2.9, 1.0), // slow firing = min power
];

/// Production fan calibration
pub const FAN_CURVE_POINTS: [(f64, f64); 3] = [
    (2.0, 9.0),
    (3.9, 5.0),
    (4.7, 1.0),
];
