//! Shared fixtures for core integration tests
//!
//! - `ScriptedSensors`: per-quantity queues of canned `nb::Result`s
//! - `RecordingSink`: keeps every push, can be told to reject some channels
//! - `PhaseScript`: drives an `EdgeTimestampStore` like a 60 Hz line would

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};

use roastprobe_core::{
    curve::{FAN_CURVE_POINTS, HEATER_CURVE_POINTS},
    time::ManualTicks,
    CalibrationCurve, EdgeKind, EdgeTimestampStore, Quantity, ReadingKind, SensorFault,
    SensorSource, SinkError, TelemetryChannel, TelemetrySink, Tick, TickDelta, TickSource,
    WireValue,
};

/// Sensor source answering from per-quantity scripts
///
/// When a script runs dry the quantity keeps returning its last answer.
#[derive(Default)]
pub struct ScriptedSensors {
    scripts: HashMap<Quantity, VecDeque<nb::Result<f64, SensorFault>>>,
    last: HashMap<Quantity, nb::Result<f64, SensorFault>>,
    pub reads: usize,
}

impl ScriptedSensors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(mut self, quantity: Quantity, answers: &[nb::Result<f64, SensorFault>]) -> Self {
        self.scripts.entry(quantity).or_default().extend(answers.iter().cloned());
        self
    }

    pub fn always(self, quantity: Quantity, value: f64) -> Self {
        self.script(quantity, &[Ok(value)])
    }
}

impl SensorSource for ScriptedSensors {
    fn read(&mut self, quantity: Quantity) -> nb::Result<f64, SensorFault> {
        self.reads += 1;
        let next = self.scripts.get_mut(&quantity).and_then(VecDeque::pop_front);
        match next {
            Some(answer) => {
                self.last.insert(quantity, answer.clone());
                answer
            }
            None => self
                .last
                .get(&quantity)
                .cloned()
                .unwrap_or(Err(nb::Error::Other(SensorFault::Unavailable))),
        }
    }
}

/// One accepted push
#[derive(Debug, Clone, PartialEq)]
pub struct Pushed {
    pub label: String,
    pub kind: ReadingKind,
    pub value: WireValue,
}

/// Sink that records everything it accepts
#[derive(Default)]
pub struct RecordingSink {
    pub pushed: Vec<Pushed>,
    pub reject_labels: Vec<String>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rejecting(label: &str) -> Self {
        Self { reject_labels: vec![label.to_string()], ..Self::default() }
    }

    /// Values pushed for `label`, oldest first
    pub fn values_for(&self, label: &str) -> Vec<Option<f64>> {
        self.pushed
            .iter()
            .filter(|p| p.label == label)
            .map(|p| p.value.as_f64())
            .collect()
    }
}

impl TelemetrySink for RecordingSink {
    fn push(&mut self, channel: &TelemetryChannel, value: WireValue) -> Result<(), SinkError> {
        if self.reject_labels.iter().any(|l| l == channel.label()) {
            return Err(SinkError::WriteFailed { reason: "rejected by test" });
        }
        self.pushed.push(Pushed {
            label: channel.label().to_string(),
            kind: channel.kind(),
            value,
        });
        Ok(())
    }
}

/// Half-cycle length of a 60 Hz line (µs)
pub const HALF_CYCLE_60HZ: TickDelta = TickDelta(8_333);

/// Drives edges the way the zero-cross detector and TRIAC gates would
pub struct PhaseScript<'a> {
    pub ticks: ManualTicks,
    pub edges: &'a EdgeTimestampStore,
}

impl<'a> PhaseScript<'a> {
    pub fn new(edges: &'a EdgeTimestampStore, start: u32) -> Self {
        Self { ticks: ManualTicks::new(start), edges }
    }

    /// Emit `cycles` half-cycles with the given trigger delays
    pub fn run(&self, cycles: u32, heater_delay: Option<TickDelta>, fan_delay: Option<TickDelta>) {
        for _ in 0..cycles {
            let zero_cross = self.ticks.now();
            self.edges.record(EdgeKind::Reference, zero_cross);
            if let Some(delay) = heater_delay {
                self.edges.record(EdgeKind::TriggerA, zero_cross.offset(delay));
            }
            if let Some(delay) = fan_delay {
                self.edges.record(EdgeKind::TriggerB, zero_cross.offset(delay));
            }
            self.ticks.advance(HALF_CYCLE_60HZ);
        }
    }

    /// Let time pass with the line switched off
    pub fn silence(&self, duration: TickDelta) -> Tick {
        self.ticks.advance(duration)
    }

    pub fn now(&self) -> Tick {
        self.ticks.now()
    }
}

pub fn heater_curve() -> CalibrationCurve {
    CalibrationCurve::new(&HEATER_CURVE_POINTS).unwrap()
}

pub fn fan_curve() -> CalibrationCurve {
    CalibrationCurve::new(&FAN_CURVE_POINTS).unwrap()
}

/// The production channel table without transport routing
pub fn production_channels() -> Vec<TelemetryChannel> {
    [
        ("Bean Temp", ReadingKind::BeanTemperature),
        ("Exhaust", ReadingKind::ExhaustTemperature),
        ("Humidity", ReadingKind::RelativeHumidity),
        ("CO2", ReadingKind::Co2Density),
        ("Heater Set", ReadingKind::HeaterPower),
        ("Fan Speed", ReadingKind::FanPower),
    ]
    .into_iter()
    .map(|(label, kind)| TelemetryChannel::new(label, kind).unwrap())
    .collect()
}
