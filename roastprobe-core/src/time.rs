//! Tick arithmetic for edge timing
//!
//! Edge timestamps come from a free-running microsecond counter that is only
//! 32 bits wide. On a Raspberry Pi GPIO daemon this counter wraps roughly every
//! 71.6 minutes, and a roast easily runs longer than that, so every difference
//! between two ticks must be taken modulo 2^32:
//!
//! ```text
//! earlier = 0xFFFF_FF9C   (u32::MAX - 99)
//! later   = 0x0000_0384   (900)
//! later.wrapping_sub(earlier) = 1000 µs
//! ```
//!
//! The result is correct as long as the real interval is shorter than one full
//! wrap, which is always true for a 60 Hz reference (8.3 ms half-cycles) and the
//! 200 ms signal timeout.

use core::fmt;
use core::time::Duration;

/// Microseconds per millisecond.
pub const US_PER_MS: u32 = 1000;

/// A raw microsecond tick sampled from the edge counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tick(pub u32);

impl Tick {
    /// Wraparound-safe elapsed time from `earlier` to `self`.
    pub const fn since(self, earlier: Tick) -> TickDelta {
        TickDelta(self.0.wrapping_sub(earlier.0))
    }

    /// Tick `delta` after this one, wrapping like the hardware counter.
    pub const fn offset(self, delta: TickDelta) -> Tick {
        Tick(self.0.wrapping_add(delta.0))
    }
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// Elapsed microseconds between two ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TickDelta(pub u32);

impl TickDelta {
    /// Zero-length interval
    pub const ZERO: Self = Self(0);

    /// Build from whole milliseconds, saturating at the counter width.
    pub const fn from_millis(ms: u32) -> Self {
        Self(ms.saturating_mul(US_PER_MS))
    }

    /// Build from a `Duration`, saturating at the counter width.
    pub fn from_duration(duration: Duration) -> Self {
        let us = duration.as_micros();
        if us > u32::MAX as u128 {
            Self(u32::MAX)
        } else {
            Self(us as u32)
        }
    }

    /// Raw microseconds
    pub const fn as_micros(self) -> u32 {
        self.0
    }

    /// Fractional milliseconds, the unit calibration curves are written in.
    pub fn as_millis_f64(self) -> f64 {
        self.0 as f64 / US_PER_MS as f64
    }

    /// As a `Duration`
    pub const fn as_duration(self) -> Duration {
        Duration::from_micros(self.0 as u64)
    }
}

impl fmt::Display for TickDelta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}us", self.0)
    }
}

/// Source of edge ticks
///
/// Implementations must be cheap and non-blocking: `now()` is called from
/// the sampling loop and, on some platforms, from edge callbacks.
pub trait TickSource: Send + Sync {
    /// Current value of the free-running counter.
    fn now(&self) -> Tick;
}

/// Microseconds since construction, truncated to 32 bits (requires std)
#[cfg(feature = "std")]
#[derive(Debug, Clone)]
pub struct MonotonicTicks {
    origin: std::time::Instant,
}

#[cfg(feature = "std")]
impl MonotonicTicks {
    /// Counter starting at zero now
    pub fn new() -> Self {
        Self { origin: std::time::Instant::now() }
    }

    /// Start the counter at `offset` instead of zero. Useful to exercise
    /// wraparound without waiting 71 minutes.
    pub fn with_offset(offset: Duration) -> Self {
        let origin = std::time::Instant::now()
            .checked_sub(offset)
            .unwrap_or_else(std::time::Instant::now);
        Self { origin }
    }
}

#[cfg(feature = "std")]
impl Default for MonotonicTicks {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "std")]
impl TickSource for MonotonicTicks {
    fn now(&self) -> Tick {
        // Truncation is the wrap.
        Tick(self.origin.elapsed().as_micros() as u32)
    }
}

/// Manually driven tick source for tests and replay
#[derive(Debug, Default)]
pub struct ManualTicks {
    current: core::sync::atomic::AtomicU32,
}

impl ManualTicks {
    /// Counter starting at `start`
    pub const fn new(start: u32) -> Self {
        Self { current: core::sync::atomic::AtomicU32::new(start) }
    }

    /// Jump to `tick`
    pub fn set(&self, tick: Tick) {
        self.current.store(tick.0, core::sync::atomic::Ordering::Relaxed);
    }

    /// Move forward, wrapping at the counter width.
    pub fn advance(&self, delta: TickDelta) -> Tick {
        let prev = self
            .current
            .fetch_add(delta.0, core::sync::atomic::Ordering::Relaxed);
        Tick(prev.wrapping_add(delta.0))
    }
}

impl TickSource for ManualTicks {
    fn now(&self) -> Tick {
        Tick(self.current.load(core::sync::atomic::Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn difference_across_wrap() {
        let earlier = Tick(u32::MAX - 99);
        let later = Tick(900);
        assert_eq!(later.since(earlier), TickDelta(1000));
    }

    #[test]
    fn offset_wraps() {
        assert_eq!(Tick(u32::MAX).offset(TickDelta(1)), Tick(0));
    }

    #[test]
    fn millis_conversion() {
        assert_eq!(TickDelta(1450).as_millis_f64(), 1.45);
        assert_eq!(TickDelta::from_millis(200), TickDelta(200_000));
        assert_eq!(TickDelta::from_millis(u32::MAX), TickDelta(u32::MAX));
    }

    #[test]
    fn duration_conversion_saturates() {
        assert_eq!(TickDelta::from_duration(Duration::from_millis(3)), TickDelta(3000));
        assert_eq!(
            TickDelta::from_duration(Duration::from_secs(10_000)),
            TickDelta(u32::MAX)
        );
    }

    #[test]
    fn manual_ticks_advance() {
        let ticks = ManualTicks::new(u32::MAX - 10);
        let now = ticks.advance(TickDelta(20));
        assert_eq!(now, Tick(9));
        assert_eq!(ticks.now(), Tick(9));
    }
}
