//! RDP connector: drives a [`HandshakeSession`] over a [`DatagramTransport`]
//!
//! One task, three wake-up sources:
//!
//! ```text
//!   loop {
//!     select! {
//!       shutdown signal        => stop
//!       session deadline       => send due SYN / TEMP
//!       inbound datagram       => feed session (ACK handling)
//!     }
//!   }
//!   final TEMP if connected
//! ```
//!
//! Receive errors back off for [`RECV_ERROR_BACKOFF`] before the next wait.
//! Send failures are logged and counted, never retried: the next SYN or TEMP
//! tick is the retry. The frame mutex is held only while the session builds
//! a datagram, never across an await.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use log::{debug, info, warn};
use tokio::sync::watch;

use super::frame::{lock_frame, SharedFrame};
use super::session::{HandshakeSession, Transmit};
use super::transport::DatagramTransport;
use super::protocol::MAX_DATAGRAM;
use super::RdpError;
use crate::{AsyncConnector, ConnectionStats};

/// Pause after a failed receive
pub const RECV_ERROR_BACKOFF: Duration = Duration::from_millis(50);

/// Consecutive receive errors between repeated warnings
const RECV_ERROR_LOG_EVERY: u32 = 100;

/// What woke the loop
enum Wake {
    /// `false` when the sender is gone
    Signal(bool),
    Deadline,
    Datagram(std::io::Result<(usize, SocketAddr)>),
}

/// Session plus transport plus the shared frame it publishes
pub struct RdpConnector<T: DatagramTransport> {
    transport: T,
    session: HandshakeSession,
    frame: SharedFrame,
    stats: ConnectionStats,
    recv_errors: u32,
}

impl<T: DatagramTransport> RdpConnector<T> {
    pub fn new(transport: T, session: HandshakeSession, frame: SharedFrame) -> Self {
        Self {
            transport,
            session,
            frame,
            stats: ConnectionStats::default(),
            recv_errors: 0,
        }
    }

    pub fn session(&self) -> &HandshakeSession {
        &self.session
    }

    pub fn frame(&self) -> &SharedFrame {
        &self.frame
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Run until `shutdown` flips to `true` or its sender is dropped
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<ConnectionStats, RdpError> {
        let mut buf = vec![0u8; MAX_DATAGRAM];
        info!(
            "RDP connector started, serial '{}', discovery {}",
            self.session.config().serial,
            self.session.config().discovery
        );

        while !*shutdown.borrow() {
            let deadline = tokio::time::Instant::from_std(self.session.next_deadline());
            let wake = tokio::select! {
                changed = shutdown.changed() => Wake::Signal(changed.is_ok()),
                _ = tokio::time::sleep_until(deadline) => Wake::Deadline,
                received = self.transport.recv_from(&mut buf) => Wake::Datagram(received),
            };

            match wake {
                Wake::Signal(false) => break,
                Wake::Signal(true) => {}
                Wake::Deadline => {
                    self.flush_due(Instant::now()).await?;
                }
                Wake::Datagram(Ok((len, from))) => {
                    self.recv_errors = 0;
                    self.receive(from, &buf[..len], Instant::now());
                }
                Wake::Datagram(Err(e)) => {
                    self.recv_failed(&e);
                    tokio::select! {
                        _ = shutdown.changed() => {}
                        _ = tokio::time::sleep(RECV_ERROR_BACKOFF) => {}
                    }
                }
            }
        }

        self.flush_final().await?;
        info!("RDP connector stopped: {}", self.stats);
        Ok(self.stats.clone())
    }

    /// Feed one inbound datagram to the session
    pub fn receive(&mut self, from: SocketAddr, bytes: &[u8], now: Instant) -> bool {
        self.stats.messages_received += 1;
        let connected = self.session.handle_datagram(from, bytes, now);
        if connected {
            self.stats.handshakes += 1;
        }
        self.stats.messages_discarded = self.session.discarded();
        connected
    }

    /// Send every datagram due at `now`
    ///
    /// Only serialization errors are returned; send errors are counted.
    pub async fn flush_due(&mut self, now: Instant) -> Result<usize, RdpError> {
        let mut sent = 0;
        loop {
            let transmit = {
                let frame = lock_frame(&self.frame);
                self.session.poll_transmit(now, &frame)?
            };
            let Some(transmit) = transmit else { break };
            if self.transmit(&transmit).await {
                sent += 1;
            }
        }
        Ok(sent)
    }

    /// Send the frame one last time if connected
    ///
    /// Returns `true` if a TEMP went out.
    pub async fn flush_final(&mut self) -> Result<bool, RdpError> {
        let transmit = {
            let frame = lock_frame(&self.frame);
            self.session.poll_final(&frame)?
        };
        match transmit {
            Some(transmit) => Ok(self.transmit(&transmit).await),
            None => Ok(false),
        }
    }

    fn recv_failed(&mut self, error: &std::io::Error) {
        self.recv_errors = self.recv_errors.saturating_add(1);
        // ICMP errors from earlier sends can surface here once; a dead
        // socket fails every time
        if self.recv_errors == 1 || self.recv_errors % RECV_ERROR_LOG_EVERY == 0 {
            warn!("RDP receive failed ({} in a row): {}", self.recv_errors, error);
        } else {
            debug!("RDP receive failed: {}", error);
        }
        self.stats.last_error = Some(error.to_string());
    }

    async fn transmit(&mut self, transmit: &Transmit) -> bool {
        match self.transport.send_to(&transmit.payload, transmit.destination).await {
            Ok(n) => {
                self.stats.record_sent(n);
                true
            }
            Err(e) => {
                warn!(
                    "{} epoch {} to {} failed: {}",
                    transmit.kind, transmit.epoch, transmit.destination, e
                );
                self.stats.record_failure(&e);
                false
            }
        }
    }
}

#[async_trait]
impl<T: DatagramTransport> AsyncConnector for RdpConnector<T> {
    type Error = RdpError;

    /// Send raw bytes to the connected server
    async fn send(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        let peer = self.session.peer().ok_or(RdpError::NotConnected)?;
        match self.transport.send_to(data, peer).await {
            Ok(n) => {
                self.stats.record_sent(n);
                Ok(())
            }
            Err(e) => {
                self.stats.record_failure(&e);
                Err(RdpError::Io(e))
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    fn stats(&self) -> ConnectionStats {
        self.stats.clone()
    }
}
