//! RBP: telemetry over BLE GATT characteristics
//!
//! ## Overview
//!
//! Each channel is a 4-byte characteristic in the RBP sensing service. The
//! sampler writes the fixed-point encoding, the GATT server notifies the
//! central. All RBP UUIDs share one base and differ in a 16-bit mask:
//!
//! ```text
//! 4ac9 XXXX -0b71-11e8-b8f5-b827ebe1d493
//!      ^^^^ mask: 0000 service, 0001 bean temp, 0002 exhaust, ...
//! ```
//!
//! ## Characteristic Registry
//!
//! The GATT server itself lives outside this crate. Whoever creates the
//! characteristics registers a handle for each UUID with [`BleSink::register`];
//! the sink then routes every channel by its `ble_uuid`. Channels whose UUID
//! has nothing registered are skipped silently, so a probe with a missing
//! sensor still publishes the rest.
//!
//! ```rust
//! use roastprobe_connectors::ble::{BleSink, LoggingCharacteristic, UUID_CHAR_USER_2};
//!
//! let mut sink = BleSink::new();
//! sink.register(UUID_CHAR_USER_2, LoggingCharacteristic::new("Heater Set"));
//! assert!(sink.is_registered(&UUID_CHAR_USER_2.to_uppercase()));
//! ```

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::{Arc, Mutex};

use log::{debug, trace, warn};
use roastprobe_core::{SinkError, TelemetryChannel, TelemetrySink, WireValue};
use thiserror::Error;

use crate::{ConnectionStats, Connector};

/// Build an RBP UUID from its 16-bit mask
pub fn rbp_uuid(mask: &str) -> String {
    format!("4ac9{mask}-0b71-11e8-b8f5-b827ebe1d493")
}

/// RBP sensing service
pub const UUID_SERVICE_RBP_SENSING: &str = "4ac90000-0b71-11e8-b8f5-b827ebe1d493";
/// Standard Device Information service
pub const UUID_SERVICE_DEVICE_INFO: &str = "0000180a-0000-1000-8000-00805f9b34fb";

/// Bean temperature
pub const UUID_CHAR_TEMP_1: &str = "4ac90001-0b71-11e8-b8f5-b827ebe1d493";
/// Exhaust temperature
pub const UUID_CHAR_TEMP_2: &str = "4ac90002-0b71-11e8-b8f5-b827ebe1d493";
/// Relative humidity
pub const UUID_CHAR_HUMIDITY_1: &str = "4ac9000b-0b71-11e8-b8f5-b827ebe1d493";
/// CO2
pub const UUID_CHAR_USER_1: &str = "4ac90015-0b71-11e8-b8f5-b827ebe1d493";
/// Heater level
pub const UUID_CHAR_USER_2: &str = "4ac90016-0b71-11e8-b8f5-b827ebe1d493";
/// Fan level
pub const UUID_CHAR_USER_3: &str = "4ac90017-0b71-11e8-b8f5-b827ebe1d493";

/// Scale descriptor attached to the humidity characteristic
pub const UUID_DESC_HUMIDITY_SCALE: &str = "4ac9001c-0b71-11e8-b8f5-b827ebe1d493";
/// Value of the humidity scale descriptor
pub const HUMIDITY_SCALE: [u8; 1] = [0x01];

/// Device Information: manufacturer name
pub const UUID_CHAR_MANUF_NAME: &str = "00002a29-0000-1000-8000-00805f9b34fb";
/// Device Information: serial number
pub const UUID_CHAR_SERIAL_NUM: &str = "00002a25-0000-1000-8000-00805f9b34fb";
/// Manufacturer string reported in Device Information
pub const MANUFACTURER_NAME: &str = "RBP_Pi";

/// Every value characteristic in the sensing service, in handle order
pub const SENSING_CHARACTERISTICS: [&str; 6] = [
    UUID_CHAR_TEMP_1,
    UUID_CHAR_TEMP_2,
    UUID_CHAR_HUMIDITY_1,
    UUID_CHAR_USER_1,
    UUID_CHAR_USER_2,
    UUID_CHAR_USER_3,
];

/// BLE errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BleError {
    #[error("No characteristic registered for {0}")]
    UnknownCharacteristic(String),

    #[error("Characteristic write failed: {0}")]
    WriteFailed(String),
}

impl From<BleError> for crate::ConnectorError {
    fn from(e: BleError) -> Self {
        match e {
            BleError::UnknownCharacteristic(uuid) => crate::ConnectorError::UnknownTarget(uuid),
            BleError::WriteFailed(reason) => crate::ConnectorError::ProtocolError(reason),
        }
    }
}

/// A writable GATT characteristic value
pub trait GattCharacteristic: Send {
    /// Replace the value and notify subscribers
    fn set_value(&mut self, value: &[u8]) -> Result<(), BleError>;
}

/// In-process characteristic keeping the latest value
///
/// Clones share the same storage, so a test or a local GATT adapter can keep
/// one handle while the sink owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryCharacteristic {
    inner: Arc<Mutex<MemoryState>>,
}

#[derive(Debug, Default)]
struct MemoryState {
    value: Option<Vec<u8>>,
    writes: u64,
}

impl MemoryCharacteristic {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last value written, `None` before the first write
    pub fn value(&self) -> Option<Vec<u8>> {
        self.lock().value.clone()
    }

    pub fn writes(&self) -> u64 {
        self.lock().writes
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl GattCharacteristic for MemoryCharacteristic {
    fn set_value(&mut self, value: &[u8]) -> Result<(), BleError> {
        let mut state = self.lock();
        state.value = Some(value.to_vec());
        state.writes += 1;
        Ok(())
    }
}

/// Characteristic that only logs what would have been notified
///
/// Stands in for the GATT server when the probe runs without a BLE adapter.
#[derive(Debug, Clone)]
pub struct LoggingCharacteristic {
    label: String,
}

impl LoggingCharacteristic {
    pub fn new(label: impl Into<String>) -> Self {
        Self { label: label.into() }
    }
}

impl GattCharacteristic for LoggingCharacteristic {
    fn set_value(&mut self, value: &[u8]) -> Result<(), BleError> {
        debug!("[{}] notify {}", self.label, hex(value));
        Ok(())
    }
}

fn hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for (i, b) in bytes.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{b:02X}");
    }
    out
}

/// Routes channel values to registered characteristics by UUID
#[derive(Default)]
pub struct BleSink {
    characteristics: HashMap<String, Box<dyn GattCharacteristic>>,
    stats: ConnectionStats,
}

impl BleSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `characteristic` to `uuid` (case-insensitive)
    ///
    /// Registering the same UUID twice replaces the earlier handle.
    pub fn register<C>(&mut self, uuid: &str, characteristic: C)
    where
        C: GattCharacteristic + 'static,
    {
        let key = uuid.to_ascii_lowercase();
        if self.characteristics.insert(key.clone(), Box::new(characteristic)).is_some() {
            warn!("Characteristic {} registered twice, keeping the latest", key);
        } else {
            debug!("Registered characteristic {}", key);
        }
    }

    pub fn is_registered(&self, uuid: &str) -> bool {
        self.characteristics.contains_key(&uuid.to_ascii_lowercase())
    }

    /// Number of registered characteristics
    pub fn len(&self) -> usize {
        self.characteristics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.characteristics.is_empty()
    }

    pub fn stats(&self) -> &ConnectionStats {
        &self.stats
    }

    fn write(&mut self, uuid: &str, data: &[u8]) -> Result<(), BleError> {
        let key = uuid.to_ascii_lowercase();
        let characteristic = self
            .characteristics
            .get_mut(&key)
            .ok_or_else(|| BleError::UnknownCharacteristic(key.clone()))?;

        match characteristic.set_value(data) {
            Ok(()) => {
                self.stats.record_sent(data.len());
                Ok(())
            }
            Err(e) => {
                self.stats.record_failure(&e);
                Err(e)
            }
        }
    }
}

impl Connector for BleSink {
    type Error = BleError;

    fn send(&mut self, target: &str, data: &[u8]) -> Result<(), Self::Error> {
        self.write(target, data)
    }

    fn is_connected(&self) -> bool {
        !self.characteristics.is_empty()
    }
}

impl TelemetrySink for BleSink {
    fn push(&mut self, channel: &TelemetryChannel, value: WireValue) -> Result<(), SinkError> {
        let Some(uuid) = channel.ble_uuid() else {
            return Ok(());
        };
        if !self.is_registered(uuid) {
            trace!("No characteristic for '{}' ({}), skipped", channel.label(), uuid);
            return Ok(());
        }

        self.write(uuid, &value.to_le_bytes()).map_err(|e| {
            warn!("BLE write for '{}' failed: {}", channel.label(), e);
            SinkError::WriteFailed { reason: "characteristic write failed" }
        })
    }
}

impl std::fmt::Debug for BleSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut uuids: Vec<&String> = self.characteristics.keys().collect();
        uuids.sort();
        f.debug_struct("BleSink")
            .field("characteristics", &uuids)
            .field("stats", &self.stats)
            .finish()
    }
}
