//! # Connection Lifecycle Handler
//!
//! Reacts to the three events the transport layer reports for each
//! connection: establishment, closure, and probe response. It coordinates the
//! identity generator and the registry so the socket task itself stays a dumb
//! frame pump.
//!
//! There are no retries here. Connection setup and teardown are driven
//! entirely by the transport; this component only keeps the registry in step
//! with what the transport reports.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::core::identity::IdGenerator;
use crate::core::registry::{ClientHandle, OutboundFrame, Registry};

/// Coordinates identity assignment and registry bookkeeping for connection
/// events.
pub struct ConnectionLifecycle {
    registry: Arc<Registry>,
    ids: IdGenerator,
}

impl ConnectionLifecycle {
    /// Creates a lifecycle handler writing into the given registry.
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            ids: IdGenerator::new(),
        }
    }

    /// Handles a newly established connection.
    ///
    /// Assigns an id, registers the handle, and announces the id to the
    /// connection itself as `{"type":"connection","clientId":...}` so the
    /// client can relay it to the backend that will address future emits.
    /// Returns the assigned id for the socket task to use in later events.
    pub fn on_connect(&self, sender: mpsc::UnboundedSender<OutboundFrame>) -> String {
        let id = self.ids.generate();
        let handle = Arc::new(ClientHandle::new(id.clone(), sender));
        self.registry.register(Arc::clone(&handle));
        handle.mark_alive();

        let announcement = serde_json::json!({
            "type": "connection",
            "clientId": id,
        });
        if !handle.push(OutboundFrame::Data(Arc::new(announcement.to_string()))) {
            // The socket died between upgrade and announcement; the entry
            // will be reaped by the next liveness sweep at the latest, but
            // there is no reason to keep it around.
            log::warn!("Client '{}' vanished before announcement", id);
            self.registry.remove(&id);
        } else {
            log::info!("Client connected with ID: {}", id);
        }
        id
    }

    /// Handles a disconnection notice: the entry is removed unconditionally.
    pub fn on_disconnect(&self, id: &str) {
        log::info!("Client disconnected: {}", id);
        self.registry.remove(id);
    }

    /// Handles a probe response (pong): flips the connection back to ALIVE
    /// before the next sweep runs.
    pub fn on_probe_response(&self, id: &str) {
        if let Some(handle) = self.registry.lookup(id) {
            handle.mark_alive();
        }
    }
}
