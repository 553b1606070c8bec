//! One sample cycle
//!
//! ```text
//!   SensorSource ──read──┐
//!                        ├──▶ value ──encode_or_absent──▶ WireValue ──push──▶ TelemetrySink
//!   EdgeTimestampStore ──┘        (per channel)
//!     (PhaseDelayResolver + CalibrationCurve, once per cycle)
//! ```
//!
//! A cycle never fails as a whole. Each channel degrades independently:
//!
//! | Outcome                      | Published value            |
//! |------------------------------|----------------------------|
//! | fresh reading                | the reading                |
//! | `nb::Error::WouldBlock`      | the channel's last value   |
//! | `nb::Error::Other(fault)`    | absent                     |
//! | not representable on wire    | absent                     |
//! | reference signal timed out   | power channels report 0.0  |
//!
//! Sink errors are counted in the [`CycleReport`] and the loop moves on to
//! the next channel.

use heapless::Vec;

use crate::channels::{co2_density, Load, Quantity, ReadingSource, TelemetryChannel};
use crate::codec::encode_or_absent;
use crate::curve::CalibrationCurve;
use crate::edges::EdgeTimestampStore;
use crate::errors::ChannelError;
use crate::phase::{PhaseDelayResolver, PowerLevels, REFERENCE_TIMEOUT};
use crate::time::{Tick, TickDelta};
use crate::traits::{SensorSource, TelemetrySink};

#[cfg(feature = "log")]
macro_rules! log_debug {
    ($($arg:tt)*) => { log::debug!($($arg)*) };
}

#[cfg(not(feature = "log"))]
macro_rules! log_debug {
    ($($arg:tt)*) => {};
}

#[cfg(feature = "log")]
macro_rules! log_warn {
    ($($arg:tt)*) => { log::warn!($($arg)*) };
}

#[cfg(not(feature = "log"))]
macro_rules! log_warn {
    ($($arg:tt)*) => {};
}

/// Maximum channels a sampler publishes
pub const MAX_CHANNELS: usize = 16;

const QUANTITIES: usize = 5;

/// What one cycle did
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CycleReport {
    /// Values accepted by the sink (absent values included)
    pub published: usize,
    /// Channels that had no value this cycle
    pub absent: usize,
    /// Pushes the sink rejected
    pub sink_failures: usize,
    /// Power levels resolved for this cycle
    pub power: PowerLevels,
}

/// Per-cycle outcome of asking the sensor source for a quantity
#[derive(Debug, Clone, Copy, PartialEq)]
enum Sample {
    Fresh(f64),
    Stale,
    Fault,
}

/// Reads, encodes and publishes every configured channel
#[derive(Debug, Clone)]
pub struct Sampler {
    channels: Vec<TelemetryChannel, MAX_CHANNELS>,
    heater: CalibrationCurve,
    fan: CalibrationCurve,
    timeout: TickDelta,
    cycles: u32,
}

impl Sampler {
    /// Sampler over `channels`, in publish order
    pub fn new<I>(
        channels: I,
        heater: CalibrationCurve,
        fan: CalibrationCurve,
    ) -> Result<Self, ChannelError>
    where
        I: IntoIterator<Item = TelemetryChannel>,
    {
        let mut table = Vec::new();
        for channel in channels {
            table
                .push(channel)
                .map_err(|_| ChannelError::TooManyChannels { max: MAX_CHANNELS })?;
        }
        Ok(Self {
            channels: table,
            heater,
            fan,
            timeout: REFERENCE_TIMEOUT,
            cycles: 0,
        })
    }

    /// Override the reference-signal timeout
    pub fn with_timeout(mut self, timeout: TickDelta) -> Self {
        self.timeout = timeout;
        self
    }

    /// Configured channels with their last values
    pub fn channels(&self) -> &[TelemetryChannel] {
        &self.channels
    }

    /// Cycles run so far (wrapping)
    pub fn cycles(&self) -> u32 {
        self.cycles
    }

    /// Run one cycle at `now`
    pub fn run_cycle<S, K>(
        &mut self,
        sensors: &mut S,
        edges: &EdgeTimestampStore,
        now: Tick,
        sink: &mut K,
    ) -> CycleReport
    where
        S: SensorSource + ?Sized,
        K: TelemetrySink + ?Sized,
    {
        let power = PhaseDelayResolver::with_timeout(edges, self.timeout)
            .power_levels(now, &self.heater, &self.fan);
        let mut samples: [Option<Sample>; QUANTITIES] = [None; QUANTITIES];
        let mut report = CycleReport { power, ..CycleReport::default() };

        for channel in self.channels.iter_mut() {
            let value = match channel.kind().source() {
                ReadingSource::Sensor(quantity) => {
                    match sample(sensors, &mut samples, quantity) {
                        Sample::Fresh(v) => Some(v),
                        Sample::Stale => channel.last_value,
                        Sample::Fault => None,
                    }
                }
                ReadingSource::Co2Density => {
                    let ppm = sample(sensors, &mut samples, Quantity::Co2Ppm);
                    let temp = sample(sensors, &mut samples, Quantity::ExhaustTemperature);
                    match (ppm, temp) {
                        (Sample::Fresh(ppm), Sample::Fresh(t)) => Some(co2_density(ppm, t)),
                        (Sample::Fault, _) | (_, Sample::Fault) => None,
                        _ => channel.last_value,
                    }
                }
                ReadingSource::Power(Load::Heater) => Some(power.heater),
                ReadingSource::Power(Load::Fan) => Some(power.fan),
            };

            let wire = encode_or_absent(value);
            channel.last_value = if wire.is_absent() { None } else { value };
            if wire.is_absent() {
                report.absent += 1;
            }

            match sink.push(channel, wire) {
                Ok(()) => report.published += 1,
                Err(_err) => {
                    log_warn!("Channel '{}' not published: {}", channel.label(), _err);
                    report.sink_failures += 1;
                }
            }
        }

        self.cycles = self.cycles.wrapping_add(1);
        log_debug!(
            "Cycle {}: {} published, {} absent, {} failed",
            self.cycles,
            report.published,
            report.absent,
            report.sink_failures
        );
        report
    }
}

/// Read `quantity` at most once per cycle
fn sample<S: SensorSource + ?Sized>(
    sensors: &mut S,
    cache: &mut [Option<Sample>; QUANTITIES],
    quantity: Quantity,
) -> Sample {
    let slot = &mut cache[quantity_index(quantity)];
    if let Some(cached) = *slot {
        return cached;
    }
    let result = match sensors.read(quantity) {
        Ok(value) => Sample::Fresh(value),
        Err(nb::Error::WouldBlock) => Sample::Stale,
        Err(nb::Error::Other(_fault)) => {
            log_debug!("{:?} unavailable this cycle: {}", quantity, _fault);
            Sample::Fault
        }
    };
    *slot = Some(result);
    result
}

const fn quantity_index(quantity: Quantity) -> usize {
    match quantity {
        Quantity::Thermocouple => 0,
        Quantity::ExhaustTemperature => 1,
        Quantity::AmbientTemperature => 2,
        Quantity::RelativeHumidity => 3,
        Quantity::Co2Ppm => 4,
    }
}
