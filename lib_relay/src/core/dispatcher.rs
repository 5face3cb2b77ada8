//! # Delivery Dispatcher
//!
//! The one-target delivery operation. An external caller (the backend, via
//! the `/emit` endpoint) names a client id and a payload; the dispatcher
//! resolves the id through the registry and forwards the payload verbatim
//! over that connection's channel.
//!
//! Every failure path is a typed [`EmitOutcome`] returned to the caller,
//! never a panic and never a log line standing in for a result. Delivery is
//! at-most-once and best-effort: no retry, no queueing, and no eviction on
//! failure. A send that fails because the socket task is gone reports
//! `DeliveryFailed` and leaves the entry alone; reaping it is the liveness
//! monitor's job, which keeps exactly one component responsible for removal.

use std::sync::Arc;

use crate::core::registry::{OutboundFrame, Registry};

/// Result of a single emit command, reported synchronously to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitOutcome {
    /// The payload was handed to the target connection's socket task.
    Delivered,
    /// Missing target id or missing/empty payload; no lookup was performed.
    BadRequest,
    /// No connection is currently registered under the target id.
    NotFound,
    /// The target was found but its transport could no longer accept the
    /// payload (connection half-closed). Distinct from `NotFound` so the
    /// caller can tell a dead target from an unknown one.
    DeliveryFailed,
}

/// Routes emit commands to the matching live connection. Read-only against
/// the registry.
pub struct DeliveryDispatcher {
    registry: Arc<Registry>,
}

impl DeliveryDispatcher {
    /// Creates a dispatcher reading from the given registry.
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    /// Forwards `payload` verbatim to the connection registered under
    /// `target_id`.
    ///
    /// The payload is serialized once and shared with the socket task via
    /// `Arc`, so the frame the client receives is byte-for-byte the JSON of
    /// what the caller submitted.
    pub fn emit(&self, target_id: &str, payload: Option<&serde_json::Value>) -> EmitOutcome {
        let payload = match payload {
            Some(value) if !is_empty_payload(value) => value,
            _ => return EmitOutcome::BadRequest,
        };
        if target_id.is_empty() {
            return EmitOutcome::BadRequest;
        }

        let Some(handle) = self.registry.lookup(target_id) else {
            return EmitOutcome::NotFound;
        };

        if handle.push(OutboundFrame::Data(Arc::new(payload.to_string()))) {
            log::debug!("Message sent to client {}", target_id);
            EmitOutcome::Delivered
        } else {
            log::warn!("Delivery to client {} failed: transport closed", target_id);
            EmitOutcome::DeliveryFailed
        }
    }
}

/// An "empty" payload is rejected before any lookup: null, the empty string,
/// `false`, and numeric zero, mirroring how the backend API has always
/// treated these command bodies. Empty objects and arrays are real values
/// and are forwarded.
fn is_empty_payload(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => true,
        serde_json::Value::String(s) => s.is_empty(),
        serde_json::Value::Bool(b) => !b,
        serde_json::Value::Number(n) => n.as_f64() == Some(0.0),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::registry::ClientHandle;
    use serde_json::json;
    use tokio::sync::mpsc;

    fn setup() -> (Arc<Registry>, DeliveryDispatcher) {
        let registry = Arc::new(Registry::new());
        let dispatcher = DeliveryDispatcher::new(Arc::clone(&registry));
        (registry, dispatcher)
    }

    fn register_handle(
        registry: &Registry,
        id: &str,
    ) -> mpsc::UnboundedReceiver<OutboundFrame> {
        let (tx, rx) = mpsc::unbounded_channel();
        registry.register(Arc::new(ClientHandle::new(id.to_string(), tx)));
        rx
    }

    #[test]
    fn emit_to_registered_client_delivers_verbatim() {
        let (registry, dispatcher) = setup();
        let mut rx = register_handle(&registry, "abc123");

        let payload = json!({"msg": "hi", "n": 7});
        assert_eq!(
            dispatcher.emit("abc123", Some(&payload)),
            EmitOutcome::Delivered
        );

        let OutboundFrame::Data(sent) = rx.try_recv().unwrap() else {
            panic!("expected a data frame");
        };
        let received: serde_json::Value = serde_json::from_str(&sent).unwrap();
        assert_eq!(received, payload);
    }

    #[test]
    fn emit_to_unknown_id_is_not_found() {
        let (registry, dispatcher) = setup();
        let _rx = register_handle(&registry, "present");

        assert_eq!(
            dispatcher.emit("absent", Some(&json!({"msg": "hi"}))),
            EmitOutcome::NotFound
        );
        // Registry state unchanged.
        assert_eq!(registry.size(), 1);
    }

    #[test]
    fn empty_target_is_bad_request() {
        let (_registry, dispatcher) = setup();
        assert_eq!(
            dispatcher.emit("", Some(&json!({"msg": "hi"}))),
            EmitOutcome::BadRequest
        );
    }

    #[test]
    fn missing_payload_is_bad_request() {
        let (registry, dispatcher) = setup();
        let mut rx = register_handle(&registry, "abc123");

        assert_eq!(dispatcher.emit("abc123", None), EmitOutcome::BadRequest);
        assert_eq!(
            dispatcher.emit("abc123", Some(&serde_json::Value::Null)),
            EmitOutcome::BadRequest
        );
        // BadRequest is rejected before any lookup or send.
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn empty_payload_is_bad_request() {
        let (registry, dispatcher) = setup();
        let mut rx = register_handle(&registry, "abc123");

        assert_eq!(
            dispatcher.emit("abc123", Some(&json!(""))),
            EmitOutcome::BadRequest
        );
        assert_eq!(
            dispatcher.emit("abc123", Some(&json!(false))),
            EmitOutcome::BadRequest
        );
        assert_eq!(
            dispatcher.emit("abc123", Some(&json!(0))),
            EmitOutcome::BadRequest
        );
        // Nothing reaches the client's channel.
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn empty_containers_are_still_delivered() {
        let (registry, dispatcher) = setup();
        let mut rx = register_handle(&registry, "abc123");

        // Empty objects/arrays are real values, unlike "" or null.
        assert_eq!(
            dispatcher.emit("abc123", Some(&json!({}))),
            EmitOutcome::Delivered
        );
        assert_eq!(
            dispatcher.emit("abc123", Some(&json!([]))),
            EmitOutcome::Delivered
        );
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn closed_transport_is_delivery_failed_without_eviction() {
        let (registry, dispatcher) = setup();
        let rx = register_handle(&registry, "halfdead");
        drop(rx);

        assert_eq!(
            dispatcher.emit("halfdead", Some(&json!({"msg": "hi"}))),
            EmitOutcome::DeliveryFailed
        );
        // Eviction is the liveness monitor's job, not the dispatcher's.
        assert_eq!(registry.size(), 1);
    }

    #[test]
    fn emits_to_same_target_preserve_order() {
        let (registry, dispatcher) = setup();
        let mut rx = register_handle(&registry, "abc123");

        for i in 0..5 {
            assert_eq!(
                dispatcher.emit("abc123", Some(&json!({"seq": i}))),
                EmitOutcome::Delivered
            );
        }
        for i in 0..5 {
            let OutboundFrame::Data(sent) = rx.try_recv().unwrap() else {
                panic!("expected a data frame");
            };
            let value: serde_json::Value = serde_json::from_str(&sent).unwrap();
            assert_eq!(value["seq"], i);
        }
    }

    #[test]
    fn emit_after_disconnect_is_not_found() {
        let (registry, dispatcher) = setup();
        let _rx = register_handle(&registry, "gone");
        registry.remove("gone");

        assert_eq!(
            dispatcher.emit("gone", Some(&json!({"msg": "hi"}))),
            EmitOutcome::NotFound
        );
    }

    #[test]
    fn scalar_payloads_are_forwarded_as_is() {
        let (registry, dispatcher) = setup();
        let mut rx = register_handle(&registry, "abc123");

        // No schema is enforced beyond serializability.
        assert_eq!(
            dispatcher.emit("abc123", Some(&json!("just a string"))),
            EmitOutcome::Delivered
        );
        let OutboundFrame::Data(sent) = rx.try_recv().unwrap() else {
            panic!("expected a data frame");
        };
        assert_eq!(sent.as_str(), "\"just a string\"");
    }
}
