//! # Core Relay Engine
//!
//! This module forms the heart of the `wsrelay` push gateway. It aggregates
//! all the fundamental components required for tracking live downstream
//! connections and routing backend-issued messages to exactly one of them.
//! The components in this module are designed to be asynchronous,
//! thread-safe, and free of any transport- or policy-level concerns.
//!
//! ## Core Components:
//!
//! - **`identity`**: Produces the short, opaque client identifiers that the
//!   backend uses to address individual connections. Collision-free within a
//!   process (monotonic counter plus random suffix).
//!
//! - **`registry`**: The shared map from client identifier to a live,
//!   sendable connection handle. The single source of truth for "who is
//!   connected right now"; insert and remove appear atomic to concurrent
//!   lookups.
//!
//! - **`lifecycle`**: Reacts to connection-established, connection-closed,
//!   and probe-response events from the transport layer, coordinating the
//!   identity generator and the registry.
//!
//! - **`liveness`**: The heartbeat sweep. On a fixed cadence it probes every
//!   registered connection and evicts the ones that failed to answer the
//!   previous probe.
//!
//! - **`dispatcher`**: The one-target delivery operation. Takes an external
//!   "emit" command, resolves the target handle through the registry, and
//!   forwards the payload verbatim, reporting a typed outcome to the caller.
//!
//! By declaring and re-exporting these components, the `core` module provides
//! a unified and clean public API for the `servers` crate to wire against.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

/// Opaque client identifier generation.
pub mod identity;
/// The shared map of live connection handles.
pub mod registry;
/// Connection establishment, teardown, and probe-response handling.
pub mod lifecycle;
/// The periodic heartbeat sweep that evicts unresponsive connections.
pub mod liveness;
/// One-target, best-effort message delivery.
pub mod dispatcher;

// --- Public API Re-exports ---
// Make the primary structs from the core modules directly accessible.
pub use dispatcher::{DeliveryDispatcher, EmitOutcome};
pub use identity::IdGenerator;
pub use lifecycle::ConnectionLifecycle;
pub use liveness::LivenessMonitor;
pub use registry::{ClientHandle, OutboundFrame, Registry};
