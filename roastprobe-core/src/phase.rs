//! Phase-delay resolution and "device off" detection
//!
//! The resolver is a read-only view over an [`EdgeTimestampStore`]. It turns
//! raw ticks into the two things the sampler needs: how long ago the last
//! zero-cross happened (to decide whether the roaster is powered at all) and
//! the trigger delays that feed the calibration curves.
//!
//! A missing reference is not an error. If the zero-cross detector has gone
//! quiet for longer than [`REFERENCE_TIMEOUT`] the roaster is switched off and
//! both loads report level 0.

use crate::curve::CalibrationCurve;
use crate::edges::{EdgeKind, EdgeTimestampStore};
use crate::time::{Tick, TickDelta};

/// Reference silence after which the device is considered off
///
/// At 60 Hz this is about twelve missed cycles.
pub const REFERENCE_TIMEOUT: TickDelta = TickDelta::from_millis(200);

/// Level reported for a load while the device is off
pub const POWER_OFF: f64 = 0.0;

/// Heater and fan levels resolved together for one sample cycle
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PowerLevels {
    /// Heater level, 0.0 (off) or 1.0 - 9.0
    pub heater: f64,
    /// Fan level, 0.0 (off) or 1.0 - 9.0
    pub fan: f64,
}

impl PowerLevels {
    /// Both loads off
    pub const OFF: Self = Self { heater: POWER_OFF, fan: POWER_OFF };

    /// Both loads at [`POWER_OFF`]
    pub fn is_off(&self) -> bool {
        self.heater == POWER_OFF && self.fan == POWER_OFF
    }
}

/// Derives delays and power levels from recorded edges
#[derive(Debug, Clone, Copy)]
pub struct PhaseDelayResolver<'a> {
    edges: &'a EdgeTimestampStore,
    timeout: TickDelta,
}

impl<'a> PhaseDelayResolver<'a> {
    /// Resolver using the default [`REFERENCE_TIMEOUT`]
    pub fn new(edges: &'a EdgeTimestampStore) -> Self {
        Self::with_timeout(edges, REFERENCE_TIMEOUT)
    }

    /// Resolver with a custom reference timeout
    pub fn with_timeout(edges: &'a EdgeTimestampStore, timeout: TickDelta) -> Self {
        Self { edges, timeout }
    }

    /// Reference silence tolerated before reporting off
    pub fn timeout(&self) -> TickDelta {
        self.timeout
    }

    /// Delay associated with `kind`
    ///
    /// - `Reference`: time elapsed from the last zero-cross to `now`
    /// - triggers: the delay captured when the trigger fired, measured against
    ///   the reference that preceded it
    ///
    /// `None` if the needed edge was never recorded.
    pub fn delay_to(&self, kind: EdgeKind, now: Tick) -> Option<TickDelta> {
        match kind {
            EdgeKind::Reference => self.edges.read(EdgeKind::Reference).map(|r| now.since(r)),
            EdgeKind::TriggerA | EdgeKind::TriggerB => self.edges.trigger_delay(kind),
        }
    }

    /// `false` when no reference was ever seen, or the last one is older than
    /// `timeout`
    pub fn is_device_active(&self, now: Tick, timeout: TickDelta) -> bool {
        match self.delay_to(EdgeKind::Reference, now) {
            Some(elapsed) => elapsed <= timeout,
            None => false,
        }
    }

    /// Heater and fan levels at `now`
    ///
    /// Both are [`POWER_OFF`] while the reference is absent. With the reference
    /// present, a trigger that has not fired yet counts as zero delay and so
    /// reports the curve's maximum level.
    pub fn power_levels(
        &self,
        now: Tick,
        heater: &CalibrationCurve,
        fan: &CalibrationCurve,
    ) -> PowerLevels {
        if !self.is_device_active(now, self.timeout) {
            return PowerLevels::OFF;
        }

        let level = |kind: EdgeKind, curve: &CalibrationCurve| {
            let delay = self.delay_to(kind, now).unwrap_or(TickDelta::ZERO);
            curve.interpolate(delay.as_millis_f64())
        };

        PowerLevels {
            heater: level(EdgeKind::TriggerA, heater),
            fan: level(EdgeKind::TriggerB, fan),
        }
    }
}
