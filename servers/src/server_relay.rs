use std::sync::Arc;

use anyhow::Result;
use lib_relay::core::LivenessMonitor;
use tokio::signal;

mod relay_logic;
use relay_logic::{config, downstream, logger, state::AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // Explicitly install the default crypto provider for rustls
    let _ = rustls::crypto::ring::default_provider().install_default();

    let settings = Arc::new(config::load());
    logger::setup_logging(&settings.log_dir, &settings.log_level)?;

    let state = AppState::new(Arc::clone(&settings));

    // The liveness sweep owns the only recurring timer in the process; its
    // token is cancelled below so no tick can fire after shutdown.
    let monitor = LivenessMonitor::new(Arc::clone(&state.registry), settings.heartbeat_interval);
    let monitor_handle = monitor.start();

    let (shutdown_tx, _) = tokio::sync::broadcast::channel(1);
    let server_handle = tokio::spawn(downstream::run(state.clone(), shutdown_tx.subscribe()));

    // Wait for shutdown signal
    tokio::select! {
        _ = signal::ctrl_c() => {
            log::info!("Ctrl-C received, initiating shutdown.");
        }
        _ = async {
            #[cfg(unix)]
            {
                let mut term_signal = signal::unix::signal(signal::unix::SignalKind::terminate())
                    .expect("failed to install SIGTERM handler");
                term_signal.recv().await;
                log::info!("SIGTERM received, initiating shutdown.");
            }
            #[cfg(not(unix))]
            {
                // On non-unix platforms, just wait forever.
                std::future::pending::<()>().await;
            }
        } => {}
    }

    // Send shutdown signal to all components
    let _ = shutdown_tx.send(());
    monitor.stop();
    // Transport is going away: close and forget every remaining connection.
    state.registry.drain();

    // Wait for components to shut down
    let _ = tokio::try_join!(server_handle, monitor_handle);

    log::info!("Shutdown complete.");
    Ok(())
}
