//! Shared helpers for host integration tests

use std::net::{Ipv4Addr, UdpSocket};
use std::time::Duration;

use roastprobe_host::config::{ProbeConfig, RdpConfig, TransportKind};
use roastprobe_host::ShutdownHandle;

/// Production config sampling every 20 ms
pub fn fast_config(transport: TransportKind) -> ProbeConfig {
    ProbeConfig { transport, sample_interval_ms: 20, ..ProbeConfig::default() }
}

/// RDP config that sends SYNs to its own socket on loopback
pub fn loopback_rdp_config() -> ProbeConfig {
    let rdp = RdpConfig {
        port: free_udp_port(),
        discovery_group: Ipv4Addr::LOCALHOST,
        sync_interval_ms: 50,
        temp_interval_ms: 50,
        ..RdpConfig::default()
    };
    ProbeConfig { rdp, ..fast_config(TransportKind::Rdp) }
}

/// A UDP port that was free a moment ago
pub fn free_udp_port() -> u16 {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).unwrap();
    socket.local_addr().unwrap().port()
}

/// Trigger `handle` after `delay`
pub fn stop_after(handle: ShutdownHandle, delay: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        handle.trigger();
    });
}
