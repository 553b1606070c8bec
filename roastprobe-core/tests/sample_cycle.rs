//! Integration tests for the sampling cycle
//!
//! Edges in, encoded channel values out, with sensors and sinks replaced by
//! scripted fixtures.

mod common;

use roastprobe_core::{
    codec, EdgeKind, EdgeTimestampStore, Quantity, SensorFault, Sampler, TickDelta,
    REFERENCE_TIMEOUT,
};

use common::{
    fan_curve, heater_curve, production_channels, PhaseScript, RecordingSink, ScriptedSensors,
};

fn production_sampler() -> Sampler {
    Sampler::new(production_channels(), heater_curve(), fan_curve()).unwrap()
}

fn roasting_sensors() -> ScriptedSensors {
    ScriptedSensors::new()
        .always(Quantity::Thermocouple, 23.456)
        .always(Quantity::ExhaustTemperature, 25.0)
        .always(Quantity::RelativeHumidity, 55.0)
        .always(Quantity::Co2Ppm, 1000.0)
}

#[test]
fn full_cycle_publishes_every_channel() {
    let edges = EdgeTimestampStore::new();
    let phase = PhaseScript::new(&edges, 0);
    phase.run(12, Some(TickDelta(1_450)), Some(TickDelta(3_900)));

    let mut sampler = production_sampler();
    let mut sensors = roasting_sensors();
    let mut sink = RecordingSink::new();

    let report = sampler.run_cycle(&mut sensors, &edges, phase.now(), &mut sink);

    assert_eq!(report.published, 6);
    assert_eq!(report.absent, 0);
    assert_eq!(report.sink_failures, 0);
    assert_eq!(sink.values_for("Bean Temp"), vec![Some(23.46)]);
    assert_eq!(sink.values_for("Humidity"), vec![Some(55.0)]);
    assert_eq!(sink.values_for("CO2"), vec![Some(1.8)]);
    assert_eq!(sink.values_for("Heater Set"), vec![Some(7.0)]);
    assert_eq!(sink.values_for("Fan Speed"), vec![Some(5.0)]);
}

#[test]
fn bean_temperature_bytes_on_the_wire() {
    let edges = EdgeTimestampStore::new();
    let mut sampler = production_sampler();
    let mut sink = RecordingSink::new();
    sampler.run_cycle(&mut roasting_sensors(), &edges, PhaseScript::new(&edges, 0).now(), &mut sink);

    let bean = sink.pushed.iter().find(|p| p.label == "Bean Temp").unwrap();
    assert_eq!(bean.value.to_le_bytes(), [0x2A, 0x09, 0x00, 0x00]);
    assert_eq!(codec::decode(bean.value.to_le_bytes()), 23.46);
}

#[test]
fn roaster_switched_off_reports_zero_power() {
    let edges = EdgeTimestampStore::new();
    let phase = PhaseScript::new(&edges, 0);
    phase.run(30, Some(TickDelta(800)), Some(TickDelta(2_000)));

    let mut sampler = production_sampler();
    let mut sensors = roasting_sensors();
    let mut sink = RecordingSink::new();

    let report = sampler.run_cycle(&mut sensors, &edges, phase.now(), &mut sink);
    assert_eq!((report.power.heater, report.power.fan), (9.0, 9.0));

    // Mains cut: no zero-cross for 250ms
    let now = phase.silence(TickDelta::from_millis(250));
    let report = sampler.run_cycle(&mut sensors, &edges, now, &mut sink);
    assert!(report.power.is_off());
    assert_eq!(sink.values_for("Heater Set"), vec![Some(9.0), Some(0.0)]);
    assert_eq!(sink.values_for("Fan Speed"), vec![Some(9.0), Some(0.0)]);
}

#[test]
fn power_survives_counter_wrap() {
    let edges = EdgeTimestampStore::new();
    // Start just before the 32-bit counter rolls over
    let phase = PhaseScript::new(&edges, u32::MAX - 20_000);
    phase.run(5, Some(TickDelta(2_100)), Some(TickDelta(4_700)));
    assert!(phase.now().0 < 30_000, "counter should have wrapped");

    let mut sampler = production_sampler();
    let report =
        sampler.run_cycle(&mut roasting_sensors(), &edges, phase.now(), &mut RecordingSink::new());
    assert_eq!((report.power.heater, report.power.fan), (5.0, 1.0));
}

#[test]
fn transient_faults_affect_only_their_cycle() {
    let edges = EdgeTimestampStore::new();
    let mut sampler = production_sampler();
    let mut sink = RecordingSink::new();
    let mut sensors = roasting_sensors().script(
        Quantity::Thermocouple,
        &[
            Ok(150.0),
            Err(nb::Error::Other(SensorFault::NotResponding { reason: "spi timeout" })),
            Err(nb::Error::WouldBlock),
            Ok(151.5),
        ],
    );
    // `always` queued 23.456 first; drain it
    let now = PhaseScript::new(&edges, 0).now();
    sampler.run_cycle(&mut sensors, &edges, now, &mut sink);
    sink.pushed.clear();

    for _ in 0..4 {
        sampler.run_cycle(&mut sensors, &edges, now, &mut sink);
    }

    assert_eq!(
        sink.values_for("Bean Temp"),
        // fault -> absent, then WouldBlock reuses the last known value, which
        // the fault cleared
        vec![Some(150.0), None, None, Some(151.5)]
    );
}

#[test]
fn would_block_keeps_previous_reading() {
    let edges = EdgeTimestampStore::new();
    let mut sampler = production_sampler();
    let mut sink = RecordingSink::new();
    let mut sensors = ScriptedSensors::new()
        .script(Quantity::Thermocouple, &[Ok(201.25), Err(nb::Error::WouldBlock)])
        .always(Quantity::ExhaustTemperature, 90.0)
        .always(Quantity::RelativeHumidity, 30.0)
        .always(Quantity::Co2Ppm, 900.0);
    let now = PhaseScript::new(&edges, 0).now();

    sampler.run_cycle(&mut sensors, &edges, now, &mut sink);
    sampler.run_cycle(&mut sensors, &edges, now, &mut sink);

    assert_eq!(sink.values_for("Bean Temp"), vec![Some(201.25), Some(201.25)]);
}

#[test]
fn failing_sink_channel_does_not_block_others() {
    let edges = EdgeTimestampStore::new();
    let mut sampler = production_sampler();
    let mut sink = RecordingSink::rejecting("Exhaust");
    let report = sampler.run_cycle(
        &mut roasting_sensors(),
        &edges,
        PhaseScript::new(&edges, 0).now(),
        &mut sink,
    );

    assert_eq!(report.sink_failures, 1);
    assert_eq!(report.published, 5);
    assert!(sink.values_for("Exhaust").is_empty());
}

#[test]
fn reset_store_reads_as_device_off() {
    let edges = EdgeTimestampStore::new();
    let phase = PhaseScript::new(&edges, 0);
    phase.run(3, Some(TickDelta(1_450)), None);
    edges.reset();
    assert_eq!(edges.read(EdgeKind::Reference), None);

    let mut sampler = production_sampler().with_timeout(REFERENCE_TIMEOUT);
    let report =
        sampler.run_cycle(&mut roasting_sensors(), &edges, phase.now(), &mut RecordingSink::new());
    assert!(report.power.is_off());
}
