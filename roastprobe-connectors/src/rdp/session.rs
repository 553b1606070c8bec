//! Handshake Session State Machine
//!
//! ## States
//!
//! ```text
//!                 valid ACK (version + serial + type 2)
//!   ┌───────────┐ ─────────────────────────────────────▶ ┌───────────────┐
//!   │ Searching │                                         │ Connected     │
//!   │ SYN/2s to │                                         │ TEMP/1s to    │
//!   │ 224.0.0.1 │                                         │ ACK source IP │
//!   └───────────┘                                         └───────────────┘
//!        ▲  │ anything else: discarded                          │
//!        └──┘                                                   └─ sticky
//! ```
//!
//! The session does no I/O. The caller feeds it inbound datagrams with
//! [`handle_datagram`](HandshakeSession::handle_datagram), asks it for due
//! outbound datagrams with [`poll_transmit`](HandshakeSession::poll_transmit),
//! and sleeps until [`next_deadline`](HandshakeSession::next_deadline) in
//! between. Time is always passed in, so tests drive it with synthetic
//! instants.
//!
//! Every datagram built consumes one epoch value, starting at 0, whether it
//! is a SYN or a TEMP.
//!
//! Once connected there is no way back to searching for the lifetime of the
//! session: a server that goes away simply stops receiving.

use std::net::{IpAddr, SocketAddr, SocketAddrV4};
use std::time::{Duration, Instant};

use log::{debug, info};

use super::envelope::{encode_datagram, validate_ack, SynEvent};
use super::frame::TelemetryFrame;
use super::protocol::{
    EventType, DEFAULT_DISCOVERY_GROUP, DEFAULT_PORT, MIN_INTERVAL, RDP_VERSION_1_0,
    SYNC_INTERVAL, TEMP_INTERVAL,
};
use super::RdpError;

/// Session parameters
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Identifies this probe to the server
    pub serial: String,
    /// Protocol version sent and expected
    pub version: String,
    /// Server port; the ACK source IP is paired with this port
    pub port: u16,
    /// Where SYNs go while searching
    pub discovery: SocketAddr,
    /// SYN period, at least [`MIN_INTERVAL`]
    pub sync_interval: Duration,
    /// TEMP period, at least [`MIN_INTERVAL`]
    pub temp_interval: Duration,
}

impl SessionConfig {
    pub fn new(serial: impl Into<String>) -> Self {
        Self {
            serial: serial.into(),
            version: RDP_VERSION_1_0.to_string(),
            port: DEFAULT_PORT,
            discovery: SocketAddr::V4(SocketAddrV4::new(DEFAULT_DISCOVERY_GROUP, DEFAULT_PORT)),
            sync_interval: SYNC_INTERVAL,
            temp_interval: TEMP_INTERVAL,
        }
    }

    /// Send SYNs to `discovery` instead of the multicast group
    pub fn discovery(mut self, discovery: SocketAddr) -> Self {
        self.discovery = discovery;
        self
    }

    /// Server port TEMPs go to
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// SYN and TEMP periods, raised to [`MIN_INTERVAL`] if shorter
    pub fn intervals(mut self, sync: Duration, temp: Duration) -> Self {
        self.sync_interval = sync.max(MIN_INTERVAL);
        self.temp_interval = temp.max(MIN_INTERVAL);
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new("12345")
    }
}

/// Where the session is in the handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Searching,
    Connected {
        /// Server address TEMP datagrams go to
        peer: SocketAddr,
    },
}

/// A datagram ready to send
#[derive(Debug, Clone, PartialEq)]
pub struct Transmit {
    pub destination: SocketAddr,
    pub payload: Vec<u8>,
    pub kind: EventType,
    pub epoch: u64,
}

/// Sans-IO RDP handshake and telemetry scheduler
#[derive(Debug, Clone)]
pub struct HandshakeSession {
    config: SessionConfig,
    state: SessionState,
    epoch: u64,
    sync_due: Instant,
    temp_due: Instant,
    discarded: u64,
}

impl HandshakeSession {
    /// New session in `Searching`, first SYN due at `now`
    ///
    /// Intervals shorter than [`MIN_INTERVAL`] are raised to it.
    pub fn new(config: SessionConfig, now: Instant) -> Self {
        let config = SessionConfig {
            sync_interval: config.sync_interval.max(MIN_INTERVAL),
            temp_interval: config.temp_interval.max(MIN_INTERVAL),
            ..config
        };
        Self {
            config,
            state: SessionState::Searching,
            epoch: 0,
            sync_due: now,
            temp_due: now,
            discarded: 0,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.state, SessionState::Connected { .. })
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        match self.state {
            SessionState::Connected { peer } => Some(peer),
            SessionState::Searching => None,
        }
    }

    /// Epoch the next datagram will carry
    pub fn next_epoch(&self) -> u64 {
        self.epoch
    }

    /// Inbound datagrams rejected so far
    pub fn discarded(&self) -> u64 {
        self.discarded
    }

    /// When the next datagram is due
    pub fn next_deadline(&self) -> Instant {
        match self.state {
            SessionState::Searching => self.sync_due,
            SessionState::Connected { .. } => self.temp_due,
        }
    }

    /// Process one inbound datagram from `from`
    ///
    /// Returns `true` if it moved the session from `Searching` to
    /// `Connected`. A valid ACK while already connected re-targets the peer
    /// and makes the next TEMP due immediately, but is not a transition.
    /// Anything that is not a valid ACK for this probe is discarded.
    pub fn handle_datagram(&mut self, from: SocketAddr, bytes: &[u8], now: Instant) -> bool {
        if let Err(reason) = validate_ack(bytes, &self.config.version, &self.config.serial) {
            debug!("Discarded {} byte datagram from {}: {}", bytes.len(), from, reason);
            self.discarded += 1;
            return false;
        }

        let peer = SocketAddr::new(from.ip(), self.config.port);
        let was_searching = !self.is_connected();
        self.state = SessionState::Connected { peer };
        self.temp_due = now;

        if was_searching {
            info!("ACK from {}, streaming telemetry to {}", from.ip(), peer);
        } else {
            debug!("Repeated ACK from {}, peer is {}", from.ip(), peer);
        }
        was_searching
    }

    /// Next datagram due at `now`, if any
    ///
    /// While connected with an empty frame nothing is built and no epoch is
    /// consumed; the timer still advances.
    pub fn poll_transmit(
        &mut self,
        now: Instant,
        frame: &TelemetryFrame,
    ) -> Result<Option<Transmit>, RdpError> {
        if now < self.next_deadline() {
            return Ok(None);
        }

        match self.state {
            SessionState::Searching => {
                self.sync_due = now + self.config.sync_interval;
                let transmit = self.build(EventType::Syn, self.config.discovery, &[SynEvent::default()])?;
                debug!("SYN epoch {} to {}", transmit.epoch, transmit.destination);
                Ok(Some(transmit))
            }
            SessionState::Connected { peer } => {
                self.temp_due = now + self.config.temp_interval;
                if frame.is_empty() {
                    return Ok(None);
                }
                let transmit = self.build(EventType::Temp, peer, &frame.events())?;
                debug!(
                    "TEMP epoch {} to {} ({} channels)",
                    transmit.epoch,
                    peer,
                    frame.len()
                );
                Ok(Some(transmit))
            }
        }
    }

    /// Last TEMP before the session is dropped
    ///
    /// Ignores the schedule so values buffered since the previous TEMP still
    /// reach the server. `None` while searching or with an empty frame.
    pub fn poll_final(&mut self, frame: &TelemetryFrame) -> Result<Option<Transmit>, RdpError> {
        let Some(peer) = self.peer() else {
            return Ok(None);
        };
        if frame.is_empty() {
            return Ok(None);
        }
        let transmit = self.build(EventType::Temp, peer, &frame.events())?;
        debug!("Final TEMP epoch {} to {} ({} channels)", transmit.epoch, peer, frame.len());
        Ok(Some(transmit))
    }

    fn build<E: serde::Serialize>(
        &mut self,
        kind: EventType,
        destination: SocketAddr,
        events: &[E],
    ) -> Result<Transmit, RdpError> {
        let epoch = self.epoch;
        let payload = encode_datagram(&self.config.version, &self.config.serial, epoch, events)?;
        self.epoch += 1;
        Ok(Transmit { destination, payload, kind, epoch })
    }

    /// IP of the connected server
    pub fn peer_ip(&self) -> Option<IpAddr> {
        self.peer().map(|p| p.ip())
    }
}
