use std::sync::Arc;
use std::time::Instant;

use lib_relay::core::{ConnectionLifecycle, DeliveryDispatcher, Registry};

use crate::relay_logic::config::Settings;

/// Shared state for the relay's web handlers: the core components wired
/// around one registry, plus the resolved settings and the process start
/// instant for uptime reporting.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub registry: Arc<Registry>,
    pub lifecycle: Arc<ConnectionLifecycle>,
    pub dispatcher: Arc<DeliveryDispatcher>,
    started: Instant,
}

impl AppState {
    pub fn new(settings: Arc<Settings>) -> Self {
        let registry = Arc::new(Registry::new());
        Self {
            lifecycle: Arc::new(ConnectionLifecycle::new(Arc::clone(&registry))),
            dispatcher: Arc::new(DeliveryDispatcher::new(Arc::clone(&registry))),
            registry,
            settings,
            started: Instant::now(),
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started.elapsed().as_secs()
    }
}
