//! Process interrupt wiring for the delivery loop

use crate::error::CollectorResult;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tracing::info;

/// Register SIGINT/SIGTERM handlers and return the shutdown receiver
///
/// The receiver flips to `true` on the first signal. Registration failures
/// surface as [`CollectorError::Io`](crate::error::CollectorError::Io).
/// Must be called from within a tokio runtime.
pub fn install_signal_handlers() -> CollectorResult<watch::Receiver<bool>> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    tokio::spawn(async move {
        tokio::select! {
            _ = sigint.recv() => {
                info!("Received SIGINT, shutting down gracefully...");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down gracefully...");
            }
        }
        let _ = shutdown_tx.send(true);
    });

    Ok(shutdown_rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_handlers_start_with_shutdown_unset() {
        let shutdown = install_signal_handlers().unwrap();
        assert!(!*shutdown.borrow());
        assert!(!shutdown.has_changed().unwrap());
    }
}
