//! Latest RDP channel values, shared between the sampler and the connector

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use log::trace;
use roastprobe_core::{SinkError, TelemetryChannel, TelemetrySink, WireValue};

use super::envelope::TempEvent;

/// Frame shared between the sampling loop and the connector task
pub type SharedFrame = Arc<Mutex<TelemetryFrame>>;

/// One RDP channel slot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameEntry {
    /// Value rounded to 0.01, `None` if absent this cycle
    pub value: Option<f64>,
    pub meta_type: Option<u16>,
}

/// Most recent value per RDP channel, ordered by channel number
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetryFrame {
    entries: BTreeMap<u16, FrameEntry>,
    updates: u64,
}

impl TelemetryFrame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedFrame {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Overwrite channel `channel`
    pub fn set(&mut self, channel: u16, value: Option<f64>, meta_type: Option<u16>) {
        self.entries.insert(channel, FrameEntry { value, meta_type });
        self.updates += 1;
    }

    pub fn get(&self, channel: u16) -> Option<&FrameEntry> {
        self.entries.get(&channel)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total `set` calls since creation
    pub fn updates(&self) -> u64 {
        self.updates
    }

    /// TEMP events for every channel, lowest channel first
    pub fn events(&self) -> Vec<TempEvent> {
        self.entries
            .iter()
            .map(|(&channel, entry)| TempEvent::new(channel, entry.value, entry.meta_type))
            .collect()
    }
}

/// Lock a shared frame, recovering from a poisoned mutex
pub fn lock_frame(frame: &SharedFrame) -> MutexGuard<'_, TelemetryFrame> {
    frame.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// [`TelemetrySink`] that stores RDP-routed channels into a [`SharedFrame`]
#[derive(Debug, Clone)]
pub struct FrameSink {
    frame: SharedFrame,
}

impl FrameSink {
    pub fn new(frame: SharedFrame) -> Self {
        Self { frame }
    }

    pub fn frame(&self) -> &SharedFrame {
        &self.frame
    }
}

impl TelemetrySink for FrameSink {
    fn push(&mut self, channel: &TelemetryChannel, value: WireValue) -> Result<(), SinkError> {
        let Some(number) = channel.rdp_channel() else {
            trace!("'{}' has no RDP channel, skipped", channel.label());
            return Ok(());
        };
        lock_frame(&self.frame).set(number, value.as_f64(), channel.meta_type());
        Ok(())
    }
}
