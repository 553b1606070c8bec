//! Simulated hardware
//!
//! Stand-ins for the thermocouple amplifier, the CO2/humidity sensor and the
//! zero-cross and trigger inputs, so the probe runs end to end on any
//! machine.

use std::f64::consts::FRAC_PI_2;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use roastprobe_core::{
    EdgeKind, EdgeTimestampStore, Quantity, SensorFault, SensorSource, TickDelta, TickSource,
};

use crate::config::SimulationConfig;

const ROOM_C: f64 = 20.0;
const DROP_C: f64 = 230.0;
const EXHAUST_RATIO: f64 = 1.15;
const EXHAUST_MAX_C: f64 = 250.0;
const AMBIENT_C: f64 = 22.0;
const HUMIDITY_START: f64 = 60.0;
const HUMIDITY_END: f64 = 20.0;
const CO2_START_PPM: f64 = 400.0;
const CO2_END_PPM: f64 = 1400.0;

/// Sensor readings following a fixed roast profile
///
/// Bean temperature rises from room temperature to drop temperature along a
/// quarter sine over `roast_duration`, then holds.
#[derive(Debug, Clone)]
pub struct SimulatedSensors {
    started: Instant,
    roast_duration: Duration,
}

impl SimulatedSensors {
    pub fn new(roast_duration: Duration) -> Self {
        Self { started: Instant::now(), roast_duration }
    }

    /// Roast progress in `[0, 1]` after `elapsed`
    pub fn progress(&self, elapsed: Duration) -> f64 {
        if self.roast_duration.is_zero() {
            return 1.0;
        }
        (elapsed.as_secs_f64() / self.roast_duration.as_secs_f64()).clamp(0.0, 1.0)
    }

    /// Value of `quantity` at `elapsed` into the roast
    pub fn reading_at(&self, quantity: Quantity, elapsed: Duration) -> f64 {
        let progress = self.progress(elapsed);
        let bean = ROOM_C + (DROP_C - ROOM_C) * (progress * FRAC_PI_2).sin();
        match quantity {
            Quantity::Thermocouple => bean,
            Quantity::ExhaustTemperature => (bean * EXHAUST_RATIO).min(EXHAUST_MAX_C),
            Quantity::AmbientTemperature => AMBIENT_C,
            Quantity::RelativeHumidity => HUMIDITY_START + (HUMIDITY_END - HUMIDITY_START) * progress,
            Quantity::Co2Ppm => CO2_START_PPM + (CO2_END_PPM - CO2_START_PPM) * progress,
        }
    }
}

impl SensorSource for SimulatedSensors {
    fn read(&mut self, quantity: Quantity) -> nb::Result<f64, SensorFault> {
        Ok(self.reading_at(quantity, self.started.elapsed()))
    }
}

fn delay_ticks(ms: f64) -> TickDelta {
    TickDelta((ms * 1000.0).round() as u32)
}

/// Zero-cross and trigger edge generator on its own thread
///
/// Every half line cycle it records a reference edge at the current tick and
/// both trigger edges at their configured delays after it.
pub struct SimulatedPhase {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<u64>>,
}

impl SimulatedPhase {
    /// Start generating edges into `edges`
    pub fn spawn<T>(
        config: &SimulationConfig,
        edges: Arc<EdgeTimestampStore>,
        ticks: T,
    ) -> io::Result<Self>
    where
        T: TickSource + 'static,
    {
        let half_cycle = Duration::try_from_secs_f64(0.5 / config.line_frequency_hz)
            .map_err(|e| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("line frequency {} Hz: {}", config.line_frequency_hz, e),
                )
            })?;
        let heater = delay_ticks(config.heater_delay_ms);
        let fan = delay_ticks(config.fan_delay_ms);
        let stop = Arc::new(AtomicBool::new(false));
        let flag = stop.clone();

        let handle = std::thread::Builder::new()
            .name("phase-sim".into())
            .spawn(move || {
                let mut emitted = 0u64;
                let mut next = Instant::now();
                while !flag.load(Ordering::Acquire) {
                    let reference = ticks.now();
                    edges.record(EdgeKind::Reference, reference);
                    edges.record(EdgeKind::TriggerA, reference.offset(heater));
                    edges.record(EdgeKind::TriggerB, reference.offset(fan));
                    emitted += 1;

                    next += half_cycle;
                    let now = Instant::now();
                    if next > now {
                        std::thread::sleep(next - now);
                    } else {
                        next = now;
                    }
                }
                emitted
            })?;

        info!(
            "Simulated phase at {} Hz: heater {}, fan {}",
            config.line_frequency_hz, heater, fan
        );
        Ok(Self { stop, handle: Some(handle) })
    }

    /// Stop the thread and wait for it, returning the number of half cycles
    /// simulated
    pub fn stop(mut self) -> u64 {
        self.shutdown()
    }

    fn shutdown(&mut self) -> u64 {
        self.stop.store(true, Ordering::Release);
        match self.handle.take().map(JoinHandle::join) {
            Some(Ok(emitted)) => {
                debug!("Phase simulator stopped after {} half cycles", emitted);
                emitted
            }
            Some(Err(_)) => {
                warn!("Phase simulator thread panicked");
                0
            }
            None => 0,
        }
    }
}

impl Drop for SimulatedPhase {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.shutdown();
        }
    }
}
