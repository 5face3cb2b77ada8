//! # Liveness Monitor
//!
//! The heartbeat sweep that keeps the registry honest. Each connection moves
//! through a tiny state machine, `ALIVE <-> SUSPECT -> evicted`, driven by a
//! fixed-interval task:
//!
//! - A handle whose alive flag is still clear when the sweep runs did not
//!   answer the previous cycle's probe. Its socket task is told to close and
//!   the entry is removed (SUSPECT -> evicted).
//! - Every other handle is flipped to SUSPECT and sent a probe; the
//!   transport's pong event flips it back to ALIVE before the next tick.
//!
//! A connection therefore gets exactly one full interval of grace: it is only
//! terminated after failing two consecutive cycles. One slow pong never costs
//! a connection, and staleness in the registry is bounded to roughly one
//! interval.
//!
//! The sweep task is owned by the monitor and tied to the hosting transport's
//! lifecycle through a `CancellationToken`; cancelling it stops the task
//! exactly once and no tick fires afterwards.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::registry::{OutboundFrame, Registry};

/// Periodically probes all registered connections and evicts unresponsive
/// ones.
pub struct LivenessMonitor {
    registry: Arc<Registry>,
    interval: Duration,
    token: CancellationToken,
}

impl LivenessMonitor {
    /// Creates a monitor sweeping the given registry on a fixed cadence.
    pub fn new(registry: Arc<Registry>, interval: Duration) -> Self {
        Self {
            registry,
            interval,
            token: CancellationToken::new(),
        }
    }

    /// Spawns the recurring sweep task and returns its join handle.
    ///
    /// The first tick of `tokio::time::interval` fires immediately, which
    /// would mark every connection SUSPECT at startup with no time to ever
    /// have ponged; it is consumed before the loop so each sweep observes a
    /// full interval of probe responses.
    pub fn start(&self) -> JoinHandle<()> {
        let registry = Arc::clone(&self.registry);
        let token = self.token.clone();
        let period = self.interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            log::info!(
                "Liveness monitor started (interval {}s)",
                period.as_secs()
            );
            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        log::info!("Liveness monitor stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        Self::sweep(&registry);
                    }
                }
            }
        })
    }

    /// Stops the recurring sweep. Idempotent; no tick fires after this
    /// returns and the spawned task exits.
    pub fn stop(&self) {
        self.token.cancel();
    }

    /// One probe/evict cycle over a snapshot of the registry.
    ///
    /// Exposed so tests (and the shutdown path) can drive cycles without the
    /// timer. Eviction here is the only place a connection is removed for
    /// unresponsiveness; the dispatcher never does.
    pub fn sweep(registry: &Registry) {
        for handle in registry.handles() {
            if !handle.is_alive() {
                // Missed the previous probe: terminate and evict.
                log::warn!("Client '{}' failed liveness check; evicting", handle.id());
                let _ = handle.push(OutboundFrame::Terminate);
                registry.remove(handle.id());
                continue;
            }
            handle.mark_suspect();
            if !handle.push(OutboundFrame::Probe) {
                // Socket task already gone; reap the entry now rather than
                // waiting a full cycle for a probe that cannot be answered.
                log::info!("Client '{}' channel closed; evicting", handle.id());
                registry.remove(handle.id());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::registry::ClientHandle;
    use tokio::sync::mpsc;

    fn register_handle(
        registry: &Registry,
        id: &str,
    ) -> (Arc<ClientHandle>, mpsc::UnboundedReceiver<OutboundFrame>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = Arc::new(ClientHandle::new(id.to_string(), tx));
        registry.register(Arc::clone(&handle));
        (handle, rx)
    }

    #[test]
    fn first_sweep_probes_not_evicts() {
        let registry = Registry::new();
        let (handle, mut rx) = register_handle(&registry, "c1");

        LivenessMonitor::sweep(&registry);

        assert_eq!(registry.size(), 1);
        assert!(!handle.is_alive());
        assert!(matches!(rx.try_recv(), Ok(OutboundFrame::Probe)));
    }

    #[test]
    fn silent_connection_evicted_on_second_sweep() {
        let registry = Registry::new();
        let (_handle, mut rx) = register_handle(&registry, "c1");

        LivenessMonitor::sweep(&registry);
        // No pong between cycles.
        LivenessMonitor::sweep(&registry);

        assert_eq!(registry.size(), 0);
        assert!(matches!(rx.try_recv(), Ok(OutboundFrame::Probe)));
        assert!(matches!(rx.try_recv(), Ok(OutboundFrame::Terminate)));
    }

    #[test]
    fn responsive_connection_survives_many_sweeps() {
        let registry = Registry::new();
        let (handle, mut rx) = register_handle(&registry, "c1");

        for _ in 0..10 {
            LivenessMonitor::sweep(&registry);
            // Simulate the transport's pong event.
            handle.mark_alive();
        }

        assert_eq!(registry.size(), 1);
        let mut probes = 0;
        while let Ok(frame) = rx.try_recv() {
            assert!(matches!(frame, OutboundFrame::Probe));
            probes += 1;
        }
        assert_eq!(probes, 10);
    }

    #[test]
    fn closed_channel_reaped_immediately() {
        let registry = Registry::new();
        let (_handle, rx) = register_handle(&registry, "c1");
        drop(rx);

        LivenessMonitor::sweep(&registry);
        assert_eq!(registry.size(), 0);
    }

    #[test]
    fn sweep_only_evicts_the_silent_ones() {
        let registry = Registry::new();
        let (responsive, _rx1) = register_handle(&registry, "good");
        let (_silent, _rx2) = register_handle(&registry, "bad");

        LivenessMonitor::sweep(&registry);
        responsive.mark_alive();
        LivenessMonitor::sweep(&registry);

        assert_eq!(registry.size(), 1);
        assert!(registry.lookup("good").is_some());
        assert!(registry.lookup("bad").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn timer_task_drives_eviction() {
        let registry = Arc::new(Registry::new());
        let (_handle, _rx) = register_handle(&registry, "c1");

        let monitor = LivenessMonitor::new(Arc::clone(&registry), Duration::from_secs(30));
        let task = monitor.start();

        // Two full intervals with no pong: probe, then evict.
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(registry.size(), 0);

        monitor.stop();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_monitor_stops_sweeping() {
        let registry = Arc::new(Registry::new());

        let monitor = LivenessMonitor::new(Arc::clone(&registry), Duration::from_secs(30));
        let task = monitor.start();
        monitor.stop();
        task.await.unwrap();

        // Registered after shutdown: no sweep may ever touch it.
        let (handle, _rx) = register_handle(&registry, "late");
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(registry.size(), 1);
        assert!(handle.is_alive());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_idempotent() {
        let registry = Arc::new(Registry::new());
        let monitor = LivenessMonitor::new(registry, Duration::from_secs(30));
        let task = monitor.start();
        monitor.stop();
        monitor.stop();
        task.await.unwrap();
    }
}
