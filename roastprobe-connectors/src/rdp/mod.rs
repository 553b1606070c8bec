//! RDP: telemetry datagrams over UDP
//!
//! ## Overview
//!
//! A small JSON-over-UDP protocol. The probe announces itself on a multicast
//! group until a server acknowledges it, then streams channel readings to
//! that server once per second.
//!
//! ```text
//!   probe                                   server
//!     │ ── SYN  (multicast 224.0.0.1:5050) ──▶ │   every 2s while searching
//!     │ ◀────────────── ACK (unicast) ──────── │
//!     │ ── TEMP (unicast ip:5050) ───────────▶ │   every 1s, forever
//!     │ ── TEMP ─────────────────────────────▶ │
//! ```
//!
//! ## Module Layout
//!
//! - [`protocol`]: constants and event types
//! - [`envelope`]: datagram (de)serialization and ACK validation
//! - [`session`]: sans-IO handshake state machine and scheduler
//! - [`frame`]: latest channel values shared with the sampling loop
//! - [`transport`]: async datagram seam over tokio `UdpSocket`
//! - [`connector`]: the task tying them together
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! use std::time::Instant;
//! use roastprobe_connectors::rdp::{
//!     bind_rdp_socket, HandshakeSession, RdpConnector, SessionConfig, TelemetryFrame,
//! };
//!
//! let socket = bind_rdp_socket(5050).await?;
//! let session = HandshakeSession::new(SessionConfig::new("12345"), Instant::now());
//! let frame = TelemetryFrame::shared();
//!
//! let (_stop, shutdown) = tokio::sync::watch::channel(false);
//! let mut rdp = RdpConnector::new(socket, session, frame.clone());
//! let stats = rdp.run(shutdown).await?;
//! println!("{stats}");
//! # Ok(())
//! # }
//! ```

pub mod connector;
pub mod envelope;
pub mod frame;
pub mod protocol;
pub mod session;
pub mod transport;

pub use connector::RdpConnector;
pub use envelope::{decode_datagram, encode_datagram, validate_ack, Datagram, SynEvent, TempEvent};
pub use frame::{lock_frame, FrameSink, SharedFrame, TelemetryFrame};
pub use protocol::EventType;
pub use session::{HandshakeSession, SessionConfig, SessionState, Transmit};
pub use transport::{bind, bind_rdp_socket, DatagramTransport};

use thiserror::Error;

/// RDP errors
#[derive(Debug, Error)]
pub enum RdpError {
    #[error("Not connected to a server")]
    NotConnected,

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Network error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<RdpError> for crate::ConnectorError {
    fn from(e: RdpError) -> Self {
        match e {
            RdpError::NotConnected => crate::ConnectorError::NotConnected,
            RdpError::InvalidAddress(a) => crate::ConnectorError::ConfigError(a),
            RdpError::Json(e) => crate::ConnectorError::ProtocolError(e.to_string()),
            RdpError::Io(e) => crate::ConnectorError::Io(e),
        }
    }
}
