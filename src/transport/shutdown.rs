use {
    crate::Result,
    axum::Router,
    std::{net::SocketAddr, time::Duration},
    tokio::{net::TcpListener, signal, sync::watch},
};

/// Serves `router` until SIGINT or SIGTERM, then drains in-flight requests
/// for at most `shutdown_timeout`.
///
/// The timeout only starts once a signal has been received. If connections
/// drain earlier, shutdown completes early.
pub(crate) async fn serve_with_shutdown(
    listener: TcpListener,
    router: Router,
    shutdown_timeout: Duration,
) -> Result<()> {
    let (initiated_tx, mut initiated_rx) = watch::channel(false);

    let service = router.into_make_service_with_connect_info::<SocketAddr>();
    let serve_future = axum::serve(listener, service).with_graceful_shutdown(async move {
        shutdown_signal().await;
        tracing::info!(
            "Shutdown signal received, starting graceful shutdown (timeout: {}s)",
            shutdown_timeout.as_secs()
        );
        let _ = initiated_tx.send(true);
    });

    tokio::select! {
        result = serve_future => {
            tracing::info!("Graceful shutdown completed");
            result?;
        }
        _ = async {
            if initiated_rx.wait_for(|initiated| *initiated).await.is_err() {
                std::future::pending::<()>().await;
            }
            tokio::time::sleep(shutdown_timeout).await;
        } => {
            tracing::warn!("Graceful shutdown timeout expired, forcing shutdown");
        }
    }

    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
///
/// If a handler cannot be installed the function logs a warning and waits
/// on the remaining signal only.
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => tracing::debug!("Ctrl+C signal received"),
            Err(err) => {
                tracing::warn!("Failed to install Ctrl+C handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal_handler) => {
                signal_handler.recv().await;
                tracing::debug!("SIGTERM signal received");
            }
            Err(err) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
