//! Task orchestration
//!
//! ```text
//!   phase-sim thread ──record──▶ EdgeTimestampStore
//!                                      │
//!   sampling loop (interval) ──run_cycle──▶ BleSink ─▶ LoggingCharacteristic
//!                                      └──▶ FrameSink ─▶ TelemetryFrame
//!                                                            │
//!   RDP task (RdpConnector::run) ◀───────────────────────────┘
//! ```
//!
//! Both loops stop on the context's shutdown signal. The phase thread is
//! joined and the context torn down after they return, whatever the outcome.

use std::time::{Duration, Instant};

use log::{info, warn};
use roastprobe_connectors::ble::{
    LoggingCharacteristic, MANUFACTURER_NAME, SENSING_CHARACTERISTICS, UUID_CHAR_MANUF_NAME,
    UUID_CHAR_SERIAL_NUM,
};
use roastprobe_connectors::rdp::{bind_rdp_socket, FrameSink, HandshakeSession, RdpConnector, RdpError};
use roastprobe_connectors::{BleError, BleSink, ConnectionStats, Connector, TelemetryFrame};
use roastprobe_core::{CycleReport, Sampler, TelemetrySink, TickSource};
use tokio::time::MissedTickBehavior;

use crate::config::{ConfigError, TransportKind};
use crate::context::ProbeContext;
use crate::sim::{SimulatedPhase, SimulatedSensors};

/// Errors that end a run
#[derive(thiserror::Error, Debug)]
pub enum RunError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("BLE error: {0}")]
    Ble(#[from] BleError),

    #[error("RDP error: {0}")]
    Rdp(#[from] RdpError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("RDP task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// What a run did, logged on exit
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub cycles: u32,
    pub last_cycle: Option<CycleReport>,
    pub transport: ConnectionStats,
    /// Half line cycles the phase simulator produced
    pub half_cycles: u64,
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} cycles, {} half cycles simulated; {}", self.cycles, self.half_cycles, self.transport)
    }
}

/// Run the probe until the context's shutdown signal fires
pub async fn run(ctx: ProbeContext) -> Result<RunSummary, RunError> {
    let config = ctx.config();
    let mut sampler = ctx.sampler()?;
    let sensors = SimulatedSensors::new(Duration::from_secs(config.simulation.roast_duration_s));
    let phase = SimulatedPhase::spawn(&config.simulation, ctx.edges().clone(), ctx.ticks().clone())?;

    let outcome = match config.transport {
        TransportKind::Ble => run_ble(&ctx, &mut sampler, sensors).await,
        TransportKind::Rdp => run_rdp(&ctx, &mut sampler, sensors).await,
    };

    let half_cycles = phase.stop();
    ctx.teardown();

    let (last_cycle, transport) = outcome?;
    let summary = RunSummary { cycles: sampler.cycles(), last_cycle, transport, half_cycles };
    info!("Run finished: {}", summary);
    Ok(summary)
}

async fn run_ble(
    ctx: &ProbeContext,
    sampler: &mut Sampler,
    mut sensors: SimulatedSensors,
) -> Result<(Option<CycleReport>, ConnectionStats), RunError> {
    let mut sink = BleSink::new();
    for channel in sampler.channels() {
        if let Some(uuid) = channel.ble_uuid() {
            sink.register(uuid, LoggingCharacteristic::new(channel.label()));
        }
    }
    // Unused profile characteristics still exist on the peripheral
    for uuid in SENSING_CHARACTERISTICS {
        if !sink.is_registered(uuid) {
            sink.register(uuid, LoggingCharacteristic::new(uuid));
        }
    }

    // Device information service, written once
    sink.register(UUID_CHAR_MANUF_NAME, LoggingCharacteristic::new("Manufacturer"));
    sink.register(UUID_CHAR_SERIAL_NUM, LoggingCharacteristic::new("Serial Number"));
    sink.send(UUID_CHAR_MANUF_NAME, MANUFACTURER_NAME.as_bytes())?;
    sink.send(UUID_CHAR_SERIAL_NUM, ctx.config().serial.as_bytes())?;

    info!(
        "RBP peripheral '{}' ({}, serial {}): {} characteristics",
        ctx.config().server_name,
        MANUFACTURER_NAME,
        ctx.config().serial,
        sink.len()
    );

    let last = sample_loop(ctx, sampler, &mut sensors, &mut sink).await;
    Ok((last, sink.stats().clone()))
}

async fn run_rdp(
    ctx: &ProbeContext,
    sampler: &mut Sampler,
    mut sensors: SimulatedSensors,
) -> Result<(Option<CycleReport>, ConnectionStats), RunError> {
    let config = ctx.config();
    let socket = bind_rdp_socket(config.rdp.port).await?;
    let session = HandshakeSession::new(config.rdp.session_config(&config.serial), Instant::now());
    let frame = TelemetryFrame::shared();

    let mut connector = RdpConnector::new(socket, session, frame.clone());
    let shutdown = ctx.shutdown_signal();
    let task = tokio::spawn(async move { connector.run(shutdown).await });

    let mut sink = FrameSink::new(frame);
    let last = sample_loop(ctx, sampler, &mut sensors, &mut sink).await;

    let stats = task.await??;
    Ok((last, stats))
}

/// Sample every `sample_interval` until shutdown
async fn sample_loop<K: TelemetrySink>(
    ctx: &ProbeContext,
    sampler: &mut Sampler,
    sensors: &mut SimulatedSensors,
    sink: &mut K,
) -> Option<CycleReport> {
    let mut interval = tokio::time::interval(ctx.config().sample_interval());
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut shutdown = ctx.shutdown_signal();
    let mut last: Option<CycleReport> = None;

    while !*shutdown.borrow() {
        tokio::select! {
            _ = interval.tick() => {
                let report = sampler.run_cycle(sensors, ctx.edges(), ctx.ticks().now(), sink);
                let was_off = last.map_or(true, |r| r.power.is_off());
                if was_off != report.power.is_off() {
                    info!("Roaster power {}", if report.power.is_off() { "off" } else { "on" });
                }
                if report.sink_failures > 0 {
                    warn!("{} of {} channels failed to publish", report.sink_failures, sampler.channels().len());
                }
                last = Some(report);
            }
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
    last
}
