use anyhow::Result;
use rpc::prelude::*;
use rpc_core::comms::Address;
use rpc_core::config::{ClientConfig, ServerConfig};
use rpc_core::{BroadcastListener, RpcClient, RpcError, RpcServer, ServerState};
use std::sync::mpsc::{self, Sender};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

struct Forward(Mutex<Sender<(String, Value)>>);

impl BroadcastListener for Forward {
    fn on_message(&self, topic: &str, payload: Value) {
        let _ = self.0.lock().unwrap().send((topic.to_string(), payload));
    }
}

// Verifies that a server and a client can talk over real TCP sockets:
// calls, heartbeats and topic broadcasts.
#[test]
fn test_zmq_call_and_broadcast_end_to_end() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();

    // Non-standard ports to avoid conflicts with a running node.
    let bind_reply = Address::zmq_tcp("127.0.0.1", 5981);
    let bind_publish = Address::zmq_tcp("127.0.0.1", 5982);

    let server = RpcServer::with_config(ServerConfig {
        heartbeat_interval_ms: 100,
        poll_timeout_ms: 50,
        ..Default::default()
    });
    server.register("add", operation!(|a: f64, b: f64| a + b));
    server.start(&bind_reply, &bind_publish)?;

    let (tx, rx) = mpsc::channel();
    let client = RpcClient::with_config(
        ClientConfig {
            call_timeout_ms: 2_000,
            poll_timeout_ms: 50,
            ..Default::default()
        },
        Forward(Mutex::new(tx)),
    );
    client.subscribe_topic("tick");
    client.start(&bind_reply, &bind_publish)?;

    assert_eq!(client.call("add", Args::new().arg(1.5).arg(2.0))?, json!(3.5));
    match client.call("nope", Args::new()) {
        Err(RpcError::Remote(diagnostic)) => assert!(diagnostic.contains("nope not registered")),
        other => panic!("expected remote failure, got {:?}", other),
    }

    // Subscriptions are not instant over TCP; publish until one lands.
    let mut received = None;
    for seq in 0..20 {
        server.publish("tick", &json!({ "seq": seq }))?;
        if let Ok(message) = rx.recv_timeout(Duration::from_millis(100)) {
            received = Some(message);
            break;
        }
    }
    let (topic, payload) = received.expect("no broadcast received over tcp");
    assert_eq!(topic, "tick");
    assert!(payload["seq"].is_u64());

    thread::sleep(Duration::from_millis(250));
    assert!(client.last_heartbeat().is_some());

    client.stop();
    client.join()?;
    server.stop();
    server.join()?;
    assert_eq!(server.state(), ServerState::Stopped);
    Ok(())
}

#[test]
fn test_zmq_port_in_use_is_a_bind_error() -> Result<()> {
    let reply = Address::zmq_tcp("127.0.0.1", 5983);
    let publish = Address::zmq_tcp("127.0.0.1", 5984);

    let first = RpcServer::new();
    first.start(&reply, &publish)?;

    let second = RpcServer::new();
    let result = second.start(&reply, &Address::zmq_tcp("127.0.0.1", 5985));
    assert!(matches!(result, Err(RpcError::TransportBind { channel: "reply", .. })));
    assert_eq!(second.state(), ServerState::Stopped);

    first.stop();
    first.join()?;

    // Unbinding released the ports.
    second.start(&reply, &publish)?;
    second.stop();
    second.join()?;
    Ok(())
}
