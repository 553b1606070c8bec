//! End-to-end runs with simulated hardware

mod common;

use std::time::Duration;

use common::{fast_config, loopback_rdp_config, stop_after};
use roastprobe_host::config::TransportKind;
use roastprobe_host::{run, ProbeContext};

#[tokio::test]
async fn ble_run_publishes_every_routed_channel() {
    let ctx = ProbeContext::new(fast_config(TransportKind::Ble)).unwrap();
    let ble_channels = ctx
        .config()
        .channels
        .iter()
        .filter(|c| c.ble_uuid.is_some())
        .count() as u64;
    stop_after(ctx.shutdown_handle(), Duration::from_millis(300));

    let summary = run(ctx).await.unwrap();
    assert!(summary.cycles >= 3, "only {} cycles", summary.cycles);
    assert!(summary.half_cycles > 0);

    // Two device info writes, then one write per BLE channel per cycle
    let stats = &summary.transport;
    assert_eq!(stats.messages_sent, 2 + ble_channels * u64::from(summary.cycles));
    assert_eq!(stats.messages_failed, 0);

    let last = summary.last_cycle.unwrap();
    assert_eq!(last.sink_failures, 0);
    assert_eq!(last.absent, 0);
    assert_eq!(last.power.heater, 7.0);
    assert_eq!(last.power.fan, 5.0);
}

#[tokio::test]
async fn rdp_run_searches_until_shutdown() {
    let ctx = ProbeContext::new(loopback_rdp_config()).unwrap();
    stop_after(ctx.shutdown_handle(), Duration::from_millis(300));

    let summary = run(ctx).await.unwrap();
    let stats = &summary.transport;

    // SYNs loop back to our own socket and are not ACKs
    assert!(stats.messages_sent >= 2, "{stats}");
    assert!(stats.messages_discarded >= 1, "{stats}");
    assert_eq!(stats.handshakes, 0);
    assert!(summary.cycles >= 3);
}

#[tokio::test]
async fn shutdown_before_start_returns_promptly() {
    let ctx = ProbeContext::new(fast_config(TransportKind::Ble)).unwrap();
    ctx.shutdown_handle().trigger();

    let summary = tokio::time::timeout(Duration::from_secs(2), run(ctx)).await.unwrap().unwrap();
    assert_eq!(summary.cycles, 0);
    assert!(summary.last_cycle.is_none());
}
