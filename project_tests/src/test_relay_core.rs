use std::sync::Arc;

use lib_relay::core::{
    ConnectionLifecycle, DeliveryDispatcher, EmitOutcome, LivenessMonitor, OutboundFrame, Registry,
};
use tokio::sync::mpsc;

fn expect_data(frame: OutboundFrame) -> serde_json::Value {
    match frame {
        OutboundFrame::Data(json) => serde_json::from_str(&json).expect("frame should be JSON"),
        other => panic!("expected a data frame, got {:?}", other),
    }
}

#[tokio::main]
/// # Relay Core Integration Test
///
/// Drives the full connect -> announce -> emit -> heartbeat -> evict flow
/// against the core components wired exactly as the gateway wires them,
/// with plain MPSC receivers standing in for the WebSocket tasks:
/// 1.  Connect a client and assert it receives the id announcement.
/// 2.  Emit to that id and assert the payload arrives verbatim.
/// 3.  Emit to an unknown id, an empty id, and a missing payload.
/// 4.  Disconnect and assert emits now report NotFound.
/// 5.  Run heartbeat sweeps and assert a silent client is evicted while a
///     responsive one survives.
async fn main() {
    let registry = Arc::new(Registry::new());
    let lifecycle = ConnectionLifecycle::new(Arc::clone(&registry));
    let dispatcher = DeliveryDispatcher::new(Arc::clone(&registry));

    // 1. Connection establishment and announcement.
    let (tx, mut rx) = mpsc::unbounded_channel();
    let client_id = lifecycle.on_connect(tx);

    let announcement = expect_data(rx.try_recv().expect("announcement expected"));
    assert_eq!(announcement["type"], "connection");
    assert_eq!(announcement["clientId"], client_id.as_str());
    assert_eq!(registry.size(), 1, "health count should reflect one client");

    // 2. Targeted delivery, verbatim.
    let payload = serde_json::json!({"msg": "hi"});
    assert_eq!(
        dispatcher.emit(&client_id, Some(&payload)),
        EmitOutcome::Delivered
    );
    assert_eq!(expect_data(rx.try_recv().expect("payload expected")), payload);

    // 3. The error taxonomy.
    assert_eq!(
        dispatcher.emit("nobody", Some(&payload)),
        EmitOutcome::NotFound
    );
    assert_eq!(dispatcher.emit("", Some(&payload)), EmitOutcome::BadRequest);
    assert_eq!(dispatcher.emit(&client_id, None), EmitOutcome::BadRequest);
    assert!(
        rx.try_recv().is_err(),
        "failed emits must not reach the client"
    );

    // 4. Disconnect, then emit to the former id.
    lifecycle.on_disconnect(&client_id);
    assert_eq!(registry.size(), 0);
    assert_eq!(
        dispatcher.emit(&client_id, Some(&payload)),
        EmitOutcome::NotFound
    );

    // 5. Heartbeat: the responsive client outlives the silent one.
    let (tx_good, mut rx_good) = mpsc::unbounded_channel();
    let good_id = lifecycle.on_connect(tx_good);
    let (tx_bad, _rx_bad) = mpsc::unbounded_channel();
    let bad_id = lifecycle.on_connect(tx_bad);
    let _ = rx_good.try_recv(); // discard the announcement

    for _ in 0..3 {
        LivenessMonitor::sweep(&registry);
        // Only the good client answers its probe.
        assert!(matches!(rx_good.try_recv(), Ok(OutboundFrame::Probe)));
        lifecycle.on_probe_response(&good_id);
    }

    assert!(registry.lookup(&good_id).is_some(), "responsive client evicted");
    assert!(registry.lookup(&bad_id).is_none(), "silent client survived");
    assert_eq!(registry.size(), 1);

    println!("test_relay_core: all assertions passed");
}
