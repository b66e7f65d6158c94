use anyhow::Result;
use rpc::prelude::*;
use rpc_core::comms::Address;
use rpc_core::config::{ClientConfig, ServerConfig};
use rpc_core::{BroadcastListener, RpcClient, RpcError, RpcServer};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

#[derive(Clone, Default)]
struct Recorder {
    messages: Arc<Mutex<Vec<(String, Value)>>>,
    disconnections: Arc<AtomicUsize>,
}

impl BroadcastListener for Recorder {
    fn on_message(&self, topic: &str, payload: Value) {
        self.messages
            .lock()
            .unwrap()
            .push((topic.to_string(), payload));
    }

    fn on_disconnected(&self) {
        self.disconnections.fetch_add(1, Ordering::SeqCst);
    }
}

fn start_server(name: &str, heartbeat_ms: u64) -> Result<(RpcServer, Address, Address)> {
    let reply = Address::memory(&format!("{}-rep", name));
    let publish = Address::memory(&format!("{}-pub", name));
    let server = RpcServer::with_config(ServerConfig {
        heartbeat_interval_ms: heartbeat_ms,
        poll_timeout_ms: 20,
        ..Default::default()
    });
    server.register("add", operation!(|a: i64, b: i64| a + b));
    server.register("sleep", operation!(|ms: u64| {
        thread::sleep(Duration::from_millis(ms));
        ms
    }));
    server.start(&reply, &publish)?;
    Ok((server, reply, publish))
}

fn client_config(call_timeout_ms: u64, tolerance_ms: u64) -> ClientConfig {
    ClientConfig {
        call_timeout_ms,
        heartbeat_tolerance_ms: tolerance_ms,
        poll_timeout_ms: 20,
        ..Default::default()
    }
}

/// Polls `condition` until it holds or `timeout` expires.
fn wait_for(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    condition()
}

#[test]
fn test_call_before_start_is_not_connected() {
    let client = RpcClient::new(|_: &str, _: Value| {});
    assert!(matches!(
        client.call("add", Args::new().arg(1).arg(2)),
        Err(RpcError::NotConnected)
    ));
}

#[test]
fn test_connect_to_unbound_memory_address_fails() {
    let client = RpcClient::new(|_: &str, _: Value| {});
    let address = Address::memory("client-nobody");
    assert!(client.start(&address, &address).is_err());
    assert!(!client.is_active());
}

#[test]
fn test_call_timeout_then_recover() -> Result<()> {
    let (_server, reply, publish) = start_server("client-timeout", 10_000)?;
    let client = RpcClient::with_config(client_config(100, 30_000), |_: &str, _: Value| {});
    client.start(&reply, &publish)?;

    match client.call("sleep", Args::new().arg(400)) {
        Err(RpcError::CallTimeout { name, .. }) => assert_eq!(name, "sleep"),
        other => panic!("expected timeout, got {:?}", other),
    }

    // Once the server is free again the reset channel serves new calls.
    thread::sleep(Duration::from_millis(500));
    assert_eq!(client.call("add", Args::new().arg(1).arg(2))?, json!(3));
    Ok(())
}

#[test]
fn test_subscribed_broadcasts_reach_listener() -> Result<()> {
    let (server, reply, publish) = start_server("client-broadcast", 50)?;
    let recorder = Recorder::default();
    let client = RpcClient::with_config(client_config(1_000, 30_000), recorder.clone());
    client.subscribe_topic("md.");
    client.start(&reply, &publish)?;

    // Give the subscriber thread a pass to apply the subscription.
    thread::sleep(Duration::from_millis(50));
    server.publish("md.AAPL", &json!({"bid": 1.5}))?;
    server.publish("news", &json!("ignored"))?;

    assert!(wait_for(Duration::from_secs(1), || {
        !recorder.messages.lock().unwrap().is_empty()
    }));
    thread::sleep(Duration::from_millis(100));

    // Heartbeats are consumed by the client and never forwarded.
    let messages = recorder.messages.lock().unwrap().clone();
    assert_eq!(messages, vec![("md.AAPL".to_string(), json!({"bid": 1.5}))]);
    assert!(client.last_heartbeat().is_some());
    Ok(())
}

#[test]
fn test_silent_server_reported_once() -> Result<()> {
    let (_server, reply, publish) = start_server("client-silent", 10_000)?;
    let recorder = Recorder::default();
    let client = RpcClient::with_config(client_config(1_000, 150), recorder.clone());
    client.start(&reply, &publish)?;

    assert!(wait_for(Duration::from_secs(1), || {
        recorder.disconnections.load(Ordering::SeqCst) > 0
    }));
    thread::sleep(Duration::from_millis(300));
    assert_eq!(recorder.disconnections.load(Ordering::SeqCst), 1);
    assert!(client.last_heartbeat().is_none());
    Ok(())
}

#[test]
fn test_stop_and_join_disconnects() -> Result<()> {
    let (_server, reply, publish) = start_server("client-stop", 10_000)?;
    let client = RpcClient::with_config(client_config(1_000, 30_000), |_: &str, _: Value| {});
    client.start(&reply, &publish)?;
    assert!(client.is_active());

    client.stop();
    client.join()?;
    assert!(!client.is_active());
    assert!(matches!(
        client.call("add", Args::new().arg(1).arg(2)),
        Err(RpcError::NotConnected)
    ));
    Ok(())
}

#[test]
fn test_call_channel_recovers_after_server_restart() -> Result<()> {
    let (server, reply, publish) = start_server("client-restart", 10_000)?;
    let client = RpcClient::with_config(client_config(1_000, 30_000), |_: &str, _: Value| {});
    client.start(&reply, &publish)?;
    assert_eq!(client.call("add", Args::new().arg(1).arg(2))?, json!(3));

    server.stop();
    server.join()?;
    server.start(&reply, &publish)?;

    // The first call hits the old endpoint and fails; the reset reconnects.
    assert!(matches!(
        client.call("add", Args::new().arg(1).arg(2)),
        Err(RpcError::Comms(_))
    ));
    assert_eq!(client.call("add", Args::new().arg(2).arg(2))?, json!(4));
    Ok(())
}

#[test]
fn test_restart_after_listener_panic() -> Result<()> {
    let (server, reply, publish) = start_server("client-listener-panic", 10_000)?;
    let client = RpcClient::with_config(client_config(1_000, 30_000), |topic: &str, _: Value| {
        if topic == "boom" {
            panic!("listener failed");
        }
    });
    client.subscribe_topic("boom");
    client.start(&reply, &publish)?;
    thread::sleep(Duration::from_millis(50));

    server.publish("boom", &json!(1))?;
    assert!(wait_for(Duration::from_secs(1), || !client.is_active()));

    // The dead subscriber thread is reaped and a fresh one started.
    client.start(&reply, &publish)?;
    assert!(client.is_active());
    assert_eq!(client.call("add", Args::new().arg(1).arg(1))?, json!(2));

    client.stop();
    client.join()?;
    Ok(())
}
