// Declare the modules to re-export
pub mod core;

// Re-export everything
pub use crate::core::dispatcher::{DeliveryDispatcher, EmitOutcome};
pub use crate::core::identity::IdGenerator;
pub use crate::core::lifecycle::ConnectionLifecycle;
pub use crate::core::liveness::LivenessMonitor;
pub use crate::core::registry::{ClientHandle, OutboundFrame, Registry};
