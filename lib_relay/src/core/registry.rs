//! # Connection Registry
//!
//! The shared, process-wide map from client identifier to a live connection
//! handle. The lifecycle handler and the liveness sweep are its only writers;
//! the delivery dispatcher and health reporting only read it.
//!
//! Each registered connection is represented by a [`ClientHandle`]: the
//! sending half of an unbounded MPSC channel whose receiving half is drained
//! by the task that owns the actual WebSocket. The core pushes
//! [`OutboundFrame`] values into that channel and never touches transport
//! frames itself; the socket task maps `Data`/`Probe`/`Terminate` to
//! Text/Ping/Close. Because every handle has exactly one draining task,
//! frames pushed to a single target preserve their push order.
//!
//! All registry operations go through one `Mutex`, so an insert or remove is
//! never observable half-done by a concurrent lookup. Per-entry locking would
//! buy nothing at the expected connection counts.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

/// A single frame queued for a connection's socket task.
///
/// The transport layer owns the socket; the core only ever pushes these
/// commands into the connection's channel.
#[derive(Debug, Clone)]
pub enum OutboundFrame {
    /// A serialized JSON payload to forward verbatim as a text frame. The
    /// `Arc` lets a payload be handed to a connection without copying the
    /// underlying string.
    Data(Arc<String>),
    /// A liveness probe; the socket task sends a Ping frame.
    Probe,
    /// Force-close the connection; the socket task sends Close and exits.
    Terminate,
}

/// # Client Handle
///
/// The registry-side representation of one live client session. It holds the
/// channel into the connection's socket task plus the liveness flag mutated
/// by the heartbeat protocol. Nothing in a handle is ever mutated in place
/// except `alive`.
pub struct ClientHandle {
    /// The opaque identifier assigned at connection time.
    id: String,
    /// Sending half of the connection's outbound frame channel. Sends only
    /// fail once the socket task has dropped its receiver, i.e. the
    /// connection is already gone.
    sender: mpsc::UnboundedSender<OutboundFrame>,
    /// `true` while the connection has answered the most recent probe.
    /// Cleared by the liveness sweep, set by the probe-response event.
    alive: AtomicBool,
}

impl ClientHandle {
    /// Creates a handle for a freshly established connection. New handles
    /// start out alive; the first sweep will issue their first probe.
    pub fn new(id: String, sender: mpsc::UnboundedSender<OutboundFrame>) -> Self {
        Self {
            id,
            sender,
            alive: AtomicBool::new(true),
        }
    }

    /// The identifier this handle is registered under.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Queues a frame for the socket task. Returns `false` if the task is
    /// gone (receiver dropped), which callers treat as "connection dead".
    pub fn push(&self, frame: OutboundFrame) -> bool {
        self.sender.send(frame).is_ok()
    }

    /// Records a probe response (or initial establishment).
    pub fn mark_alive(&self) {
        self.alive.store(true, Ordering::Relaxed);
    }

    /// Clears the liveness flag when a probe goes out; the connection is now
    /// SUSPECT until a pong flips it back.
    pub fn mark_suspect(&self) {
        self.alive.store(false, Ordering::Relaxed);
    }

    /// Whether the connection answered the previous probe cycle.
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Relaxed)
    }
}

/// # Registry
///
/// The mapping `client id -> ClientHandle`. Keys are unique at any instant;
/// every entry corresponds to a connection that was alive when registered and
/// has not yet been removed.
pub struct Registry {
    /// A thread-safe, shared map of all currently connected client handles.
    clients: Mutex<HashMap<String, Arc<ClientHandle>>>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Inserts a handle under its id.
    ///
    /// If the id is already present the prior entry is silently replaced
    /// (last-write-wins). With [`IdGenerator`](super::identity::IdGenerator)
    /// ids this cannot happen organically, but the contract is kept explicit
    /// and logged because a stale entry being replaced is worth noticing.
    pub fn register(&self, handle: Arc<ClientHandle>) {
        let mut clients = self.clients.lock().expect("Registry lock poisoned");
        if clients.insert(handle.id().to_string(), handle.clone()).is_some() {
            log::warn!(
                "Client '{}' re-registered; previous handle replaced",
                handle.id()
            );
        } else {
            log::info!("Client '{}' registered", handle.id());
        }
    }

    /// Looks up the handle for an id. Read-only; never mutates the map.
    pub fn lookup(&self, id: &str) -> Option<Arc<ClientHandle>> {
        let clients = self.clients.lock().expect("Registry lock poisoned");
        clients.get(id).cloned()
    }

    /// Removes the entry for an id if present. Removing an absent id is a
    /// no-op, not an error.
    pub fn remove(&self, id: &str) {
        let mut clients = self.clients.lock().expect("Registry lock poisoned");
        if clients.remove(id).is_some() {
            log::info!("Client '{}' removed from registry", id);
        }
    }

    /// Number of currently registered connections. Used by health reporting.
    pub fn size(&self) -> usize {
        let clients = self.clients.lock().expect("Registry lock poisoned");
        clients.len()
    }

    /// A snapshot of all current handles, for the liveness sweep. The lock is
    /// released before the sweep starts probing, so connection churn during a
    /// sweep never deadlocks against register/remove.
    pub fn handles(&self) -> Vec<Arc<ClientHandle>> {
        let clients = self.clients.lock().expect("Registry lock poisoned");
        clients.values().cloned().collect()
    }

    /// Process-wide cleanup at transport teardown: asks every remaining
    /// socket task to close and empties the map.
    pub fn drain(&self) {
        let mut clients = self.clients.lock().expect("Registry lock poisoned");
        for handle in clients.values() {
            let _ = handle.push(OutboundFrame::Terminate);
        }
        let drained = clients.len();
        clients.clear();
        if drained > 0 {
            log::info!("Registry drained; {} connection(s) closed", drained);
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
