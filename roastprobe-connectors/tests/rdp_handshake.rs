//! RDP handshake against a fake server on loopback UDP

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use roastprobe_connectors::rdp::{
    bind, decode_datagram, lock_frame, Datagram, HandshakeSession, RdpConnector, SessionConfig,
    SharedFrame, SynEvent, TelemetryFrame, TempEvent,
};
use roastprobe_connectors::ConnectionStats;
use serde_json::Value;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::timeout;

const SERIAL: &str = "12345";
const WAIT: Duration = Duration::from_secs(2);

struct Probe {
    stop: watch::Sender<bool>,
    task: JoinHandle<ConnectionStats>,
    frame: SharedFrame,
}

impl Probe {
    async fn shutdown(self) -> ConnectionStats {
        self.stop.send(true).unwrap();
        timeout(WAIT, self.task).await.unwrap().unwrap()
    }
}

async fn server() -> (UdpSocket, SocketAddr) {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();
    (socket, addr)
}

/// Start a probe whose discovery target is `server` instead of multicast
async fn start_probe(server: SocketAddr) -> Probe {
    let socket = bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
    let config = SessionConfig::new(SERIAL)
        .discovery(server)
        .port(server.port())
        .intervals(Duration::from_millis(100), Duration::from_millis(50));

    let frame = TelemetryFrame::shared();
    {
        let mut frame = lock_frame(&frame);
        frame.set(1, Some(182.25), Some(3000));
        frame.set(2, Some(41.5), None);
    }

    let session = HandshakeSession::new(config, Instant::now());
    let mut rdp = RdpConnector::new(socket, session, frame.clone());
    let (stop, shutdown) = watch::channel(false);
    let task = tokio::spawn(async move { rdp.run(shutdown).await.unwrap() });

    Probe { stop, task, frame }
}

async fn recv(server: &UdpSocket) -> (Vec<u8>, SocketAddr) {
    let mut buf = vec![0u8; 4096];
    let (n, from) = timeout(WAIT, server.recv_from(&mut buf)).await.unwrap().unwrap();
    buf.truncate(n);
    (buf, from)
}

fn ack(serial: &str) -> Vec<u8> {
    format!(r#"{{"RPVersion":"RDP_1.0","RPSerial":"{serial}","RPEventType":2}}"#).into_bytes()
}

#[tokio::test]
async fn syn_ack_then_temp_stream() {
    let (server, server_addr) = server().await;
    let probe = start_probe(server_addr).await;

    let (syn, probe_addr) = recv(&server).await;
    let syn: Datagram<SynEvent> = decode_datagram(&syn).unwrap();
    assert_eq!(syn.serial, SERIAL);
    assert_eq!(syn.version, "RDP_1.0");
    assert_eq!(syn.events, vec![SynEvent::default()]);

    server.send_to(&ack(SERIAL), probe_addr).await.unwrap();

    // Skip any SYN that crossed the ACK in flight
    let mut temps = Vec::new();
    while temps.len() < 3 {
        let (bytes, from) = recv(&server).await;
        assert_eq!(from, probe_addr);
        let packet: Value = serde_json::from_slice(&bytes).unwrap();
        assert!(packet["RPPayload"].is_string(), "payload must be JSON text");
        if let Ok(temp) = decode_datagram::<TempEvent>(&bytes) {
            if temp.events.iter().all(|e| e.event_type == 3) {
                temps.push(temp);
            }
        }
    }

    assert_eq!(
        temps[0].events,
        vec![TempEvent::new(1, Some(182.25), Some(3000)), TempEvent::new(2, Some(41.5), None)]
    );
    assert!(temps.windows(2).all(|w| w[1].epoch > w[0].epoch));
    assert!(temps[0].epoch > syn.epoch);

    let stats = probe.shutdown().await;
    assert_eq!(stats.handshakes, 1);
    assert!(stats.messages_sent >= 4);
}

#[tokio::test]
async fn frame_updates_show_up_in_later_temps() {
    let (server, server_addr) = server().await;
    let probe = start_probe(server_addr).await;

    let (_, probe_addr) = recv(&server).await;
    server.send_to(&ack(SERIAL), probe_addr).await.unwrap();

    lock_frame(&probe.frame).set(1, None, Some(3000));

    let deadline = Instant::now() + WAIT;
    loop {
        assert!(Instant::now() < deadline, "no TEMP with the updated value");
        let (bytes, _) = recv(&server).await;
        let Ok(temp) = decode_datagram::<TempEvent>(&bytes) else { continue };
        if temp.events.first().map(|e| e.value) == Some(None) {
            break;
        }
    }

    probe.shutdown().await;
}

#[tokio::test]
async fn mismatched_ack_keeps_searching() {
    let (server, server_addr) = server().await;
    let probe = start_probe(server_addr).await;

    let (first, probe_addr) = recv(&server).await;
    server.send_to(&ack("54321"), probe_addr).await.unwrap();
    server.send_to(b"garbage", probe_addr).await.unwrap();

    // Still SYNs, still addressed to the discovery target
    for _ in 0..2 {
        let (bytes, _) = recv(&server).await;
        let syn: Datagram<SynEvent> = decode_datagram(&bytes).unwrap();
        assert_eq!(syn.events, vec![SynEvent::default()]);
    }
    let first: Datagram<SynEvent> = decode_datagram(&first).unwrap();
    assert_eq!(first.epoch, 0);

    let stats = probe.shutdown().await;
    assert_eq!(stats.handshakes, 0);
    assert_eq!(stats.messages_discarded, 2);
}
