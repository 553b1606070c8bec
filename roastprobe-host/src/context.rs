//! Process-scoped state
//!
//! One [`ProbeContext`] is created at startup from a validated
//! configuration. It owns the edge store the phase thread writes and the
//! sampling loop reads, the tick source both agree on, and the shutdown
//! signal every task listens to. [`ProbeContext::teardown`] runs last.

use std::sync::Arc;

use log::{debug, info};
use roastprobe_core::sampler::MAX_CHANNELS;
use roastprobe_core::time::MonotonicTicks;
use roastprobe_core::{EdgeTimestampStore, Sampler};
use tokio::sync::watch;

use crate::config::{ConfigError, ProbeConfig};

/// Cloneable trigger for a context's shutdown signal
#[derive(Debug, Clone)]
pub struct ShutdownHandle(Arc<watch::Sender<bool>>);

impl ShutdownHandle {
    /// Ask every task to stop; idempotent
    pub fn trigger(&self) {
        self.0.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.0.borrow()
    }
}

/// Shared state for one probe process
#[derive(Debug)]
pub struct ProbeContext {
    config: ProbeConfig,
    edges: Arc<EdgeTimestampStore>,
    ticks: MonotonicTicks,
    shutdown: ShutdownHandle,
}

impl ProbeContext {
    /// Validate `config` and set up process state
    pub fn new(config: ProbeConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let (tx, _rx) = watch::channel(false);
        info!(
            "Probe '{}' serial {}: {} channels over {}",
            config.server_name,
            config.serial,
            config.channels.len(),
            config.transport
        );
        Ok(Self {
            config,
            edges: Arc::new(EdgeTimestampStore::new()),
            ticks: MonotonicTicks::new(),
            shutdown: ShutdownHandle(Arc::new(tx)),
        })
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    pub fn edges(&self) -> &Arc<EdgeTimestampStore> {
        &self.edges
    }

    pub fn ticks(&self) -> &MonotonicTicks {
        &self.ticks
    }

    /// Sampler over the configured channels and curves
    pub fn sampler(&self) -> Result<Sampler, ConfigError> {
        let channels = self.config.telemetry_channels()?;
        let count = channels.len();
        let sampler = Sampler::new(channels, self.config.heater_curve()?, self.config.fan_curve()?)
            .map_err(|_| ConfigError::TooManyChannels { count, max: MAX_CHANNELS })?;
        Ok(sampler.with_timeout(self.config.reference_timeout()))
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// New receiver for the shutdown signal
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown.0.subscribe()
    }

    /// Release process state; the edge store reads as "never recorded"
    /// afterwards
    pub fn teardown(self) {
        self.shutdown.trigger();
        debug!("Edge store had {} edges recorded", self.edges.edge_count());
        self.edges.reset();
        info!("Probe '{}' stopped", self.config.server_name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roastprobe_core::{EdgeKind, Tick};

    #[test]
    fn rejects_invalid_config() {
        let config = ProbeConfig { serial: String::new(), ..ProbeConfig::default() };
        assert!(matches!(ProbeContext::new(config), Err(ConfigError::EmptySerial)));
    }

    #[test]
    fn sampler_uses_configured_channels() {
        let ctx = ProbeContext::new(ProbeConfig::default()).unwrap();
        let sampler = ctx.sampler().unwrap();
        assert_eq!(sampler.channels().len(), ctx.config().channels.len());
        assert_eq!(sampler.channels()[0].label(), "Bean Temp");
    }

    #[test]
    fn shutdown_reaches_every_subscriber() {
        let ctx = ProbeContext::new(ProbeConfig::default()).unwrap();
        let a = ctx.shutdown_signal();
        let b = ctx.shutdown_signal();
        let handle = ctx.shutdown_handle();

        assert!(!handle.is_triggered());
        handle.trigger();
        handle.trigger();
        assert!(*a.borrow() && *b.borrow());
    }

    #[test]
    fn teardown_resets_edges() {
        let ctx = ProbeContext::new(ProbeConfig::default()).unwrap();
        let edges = ctx.edges().clone();
        edges.record(EdgeKind::Reference, Tick(10));
        edges.record(EdgeKind::TriggerA, Tick(1460));

        let handle = ctx.shutdown_handle();
        ctx.teardown();
        assert!(handle.is_triggered());
        assert_eq!(edges.read(EdgeKind::Reference), None);
        assert_eq!(edges.trigger_delay(EdgeKind::TriggerA), None);
    }
}
