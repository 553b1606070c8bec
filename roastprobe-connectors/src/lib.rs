//! Telemetry Transports for RoastProbe
//!
//! ## Overview
//!
//! The probe publishes the same encoded channel values over one of two
//! transports. Both implement [`TelemetrySink`](roastprobe_core::TelemetrySink)
//! so the sampling loop does not care which one is active.
//!
//! ### RBP (BLE characteristic push)
//!
//! **When to use:**
//! - Roasting software talks to the probe over Bluetooth LE
//! - One central, short range
//!
//! **Characteristics:**
//! - One GATT characteristic per channel, addressed by UUID
//! - Value is the raw 4-byte fixed-point encoding
//! - No session: every update is written as soon as it is sampled
//!
//! ### RDP (UDP datagrams)
//!
//! **When to use:**
//! - Roasting software on the same LAN
//! - Multiple channels in one packet
//!
//! **Characteristics:**
//! - JSON datagrams, values as numbers rounded to 0.01
//! - Multicast discovery (SYN) until the server answers (ACK)
//! - Unicast TEMP datagrams to the server once per second afterwards
//!
//! ## Architecture
//!
//! ```text
//!                  ┌──────────────┐
//!                  │   Sampler    │
//!                  └──────┬───────┘
//!             TelemetrySink::push
//!          ┌──────────────┴───────────────┐
//!          ▼                              ▼
//! ┌─────────────────┐            ┌─────────────────┐
//! │    BleSink      │            │   FrameSink     │
//! │ uuid -> GATT    │            │ -> TelemetryFrame│
//! └─────────────────┘            └────────┬────────┘
//!                                         │ shared
//!                                         ▼
//!                                ┌─────────────────┐
//!                                │  RdpConnector   │──▶ DatagramTransport
//!                                │ HandshakeSession│    (tokio UdpSocket)
//!                                └─────────────────┘
//! ```
//!
//! ## Example Usage
//!
//! ```rust
//! use roastprobe_connectors::ble::{rbp_uuid, BleSink, MemoryCharacteristic, UUID_CHAR_TEMP_1};
//! use roastprobe_core::{codec, ReadingKind, TelemetryChannel, TelemetrySink};
//!
//! let bean = MemoryCharacteristic::new();
//! let mut sink = BleSink::new();
//! sink.register(UUID_CHAR_TEMP_1, bean.clone());
//!
//! let channel = TelemetryChannel::new("Bean Temp", ReadingKind::BeanTemperature)?
//!     .with_ble_uuid(&rbp_uuid("0001"))?;
//! sink.push(&channel, codec::encode_or_absent(Some(23.456)))?;
//!
//! assert_eq!(bean.value(), Some(vec![0x2A, 0x09, 0x00, 0x00]));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#[cfg(feature = "ble")]
pub mod ble;

#[cfg(feature = "rdp")]
pub mod rdp;

// Re-export common types
#[cfg(feature = "ble")]
pub use ble::{BleError, BleSink, GattCharacteristic};

#[cfg(feature = "rdp")]
pub use rdp::{HandshakeSession, RdpConnector, RdpError, SessionConfig, TelemetryFrame};

use thiserror::Error;

/// Common connector errors
#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("Not connected")]
    NotConnected,

    #[error("Unknown target: {0}")]
    UnknownTarget(String),

    #[error("Protocol error: {0}")]
    ProtocolError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Trait for connectors that write synchronously
pub trait Connector {
    type Error;

    /// Write `data` to the endpoint named by `target`
    fn send(&mut self, target: &str, data: &[u8]) -> Result<(), Self::Error>;

    /// Check if connected
    fn is_connected(&self) -> bool;
}

/// Async version of the Connector trait
///
/// Connectors that own a socket and a session implement this one.
#[async_trait::async_trait]
pub trait AsyncConnector: Send {
    type Error;

    /// Send raw bytes to the current peer
    async fn send(&mut self, data: &[u8]) -> Result<(), Self::Error>;

    /// Check if connected
    fn is_connected(&self) -> bool;

    /// Get connection statistics
    fn stats(&self) -> ConnectionStats;
}

/// Connection statistics common to all connectors
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ConnectionStats {
    /// Total messages sent successfully
    pub messages_sent: u64,
    /// Total messages failed to send
    pub messages_failed: u64,
    /// Total bytes sent
    pub bytes_sent: u64,
    /// Inbound messages accepted
    pub messages_received: u64,
    /// Inbound messages discarded as invalid
    pub messages_discarded: u64,
    /// Completed handshakes
    pub handshakes: u32,
    /// Last error message
    pub last_error: Option<String>,
}

impl ConnectionStats {
    pub(crate) fn record_sent(&mut self, bytes: usize) {
        self.messages_sent += 1;
        self.bytes_sent += bytes as u64;
    }

    pub(crate) fn record_failure(&mut self, error: impl ToString) {
        self.messages_failed += 1;
        self.last_error = Some(error.to_string());
    }
}

impl std::fmt::Display for ConnectionStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} sent ({} bytes), {} failed, {} received, {} discarded, {} handshakes",
            self.messages_sent,
            self.bytes_sent,
            self.messages_failed,
            self.messages_received,
            self.messages_discarded,
            self.handshakes
        )
    }
}
