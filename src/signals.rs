use tokio::sync::broadcast;
use tracing::{error, info};

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

/// Why the daemon is stopping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    Interrupt,
    Terminate,
}

/// Spawn a task that broadcasts once on SIGINT or SIGTERM
pub fn setup_signal_handlers() -> (broadcast::Sender<ShutdownSignal>, tokio::task::JoinHandle<()>) {
    let (shutdown_tx, _) = broadcast::channel(16);
    let tx_clone = shutdown_tx.clone();

    let handle = tokio::spawn(async move {
        let received = wait_for_signal().await;
        info!(signal = ?received, "Shutdown signal received, draining connections");
        let _ = tx_clone.send(received);
    });

    (shutdown_tx, handle)
}

#[cfg(unix)]
async fn wait_for_signal() -> ShutdownSignal {
    match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => ShutdownSignal::Terminate,
                _ = sigint.recv() => ShutdownSignal::Interrupt,
            }
        }
        (Err(e), _) | (_, Err(e)) => {
            error!(error = %e, "Failed to install signal handlers, falling back to Ctrl+C");
            ctrl_c().await
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> ShutdownSignal {
    ctrl_c().await
}

async fn ctrl_c() -> ShutdownSignal {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    ShutdownSignal::Interrupt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_see_broadcast() {
        let (shutdown_tx, handle) = setup_signal_handlers();
        let mut rx = shutdown_tx.subscribe();

        shutdown_tx.send(ShutdownSignal::Terminate).unwrap();
        assert_eq!(rx.recv().await.unwrap(), ShutdownSignal::Terminate);

        handle.abort();
    }
}
