//! Datagram transport seam
//!
//! The connector only needs "send these bytes there" and "give me the next
//! datagram". Production uses a tokio `UdpSocket`; tests can substitute an
//! in-memory pair.

use std::io;
use std::net::{Ipv4Addr, SocketAddr};

use async_trait::async_trait;
use log::debug;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;

/// Unreliable datagram I/O
#[async_trait]
pub trait DatagramTransport: Send + Sync {
    /// Send `buf` to `target`, returning bytes written
    async fn send_to(&self, buf: &[u8], target: SocketAddr) -> io::Result<usize>;

    /// Wait for the next datagram
    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)>;

    /// Address the transport is bound to
    fn local_addr(&self) -> io::Result<SocketAddr>;
}

#[async_trait]
impl DatagramTransport for UdpSocket {
    async fn send_to(&self, buf: &[u8], target: SocketAddr) -> io::Result<usize> {
        UdpSocket::send_to(self, buf, target).await
    }

    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        UdpSocket::recv_from(self, buf).await
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        UdpSocket::local_addr(self)
    }
}

/// Bind the probe's RDP socket on all interfaces
///
/// Multicast TTL is 1 so discovery never leaves the local segment.
pub async fn bind_rdp_socket(port: u16) -> io::Result<UdpSocket> {
    bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port))).await
}

/// Bind an RDP socket on a specific address
///
/// `SO_REUSEADDR` is set first so a restarted probe can take the port back
/// immediately.
pub async fn bind(addr: SocketAddr) -> io::Result<UdpSocket> {
    let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;

    let socket = UdpSocket::from_std(socket.into())?;
    socket.set_multicast_ttl_v4(1)?;
    debug!("RDP socket bound on {}", socket.local_addr()?);
    Ok(socket)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn loopback_round_trip() {
        let a = bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let b = bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let b_addr = DatagramTransport::local_addr(&b).unwrap();

        DatagramTransport::send_to(&a, b"ping", b_addr).await.unwrap();

        let mut buf = [0u8; 16];
        let (n, from) = DatagramTransport::recv_from(&b, &mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"ping");
        assert_eq!(from, DatagramTransport::local_addr(&a).unwrap());
    }

    #[tokio::test]
    async fn sets_reuse_address() {
        let socket = bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let sock_ref = socket2::SockRef::from(&socket);
        assert!(sock_ref.reuse_address().unwrap());
        assert_eq!(socket.multicast_ttl_v4().unwrap(), 1);
    }

    #[tokio::test]
    async fn rebinds_port_right_after_close() {
        let first = bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let addr = DatagramTransport::local_addr(&first).unwrap();
        drop(first);

        let second = bind(addr).await.unwrap();
        assert_eq!(DatagramTransport::local_addr(&second).unwrap(), addr);
    }
}
