//! Gateway assembly and coordinated shutdown.
//!
//! Wires the device store, transport, lifecycle controller and HTTP server
//! together, then blocks until a termination signal or a fatal session error
//! and tears everything down in order: session first, HTTP second.

use crate::config::Config;
use crate::server::{self, AppState};
use crate::session::SessionController;
use crate::store::{DeviceStore, StoreError};
use crate::transport::{DynTransport, SessionEvent, TransportError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// How long in-flight HTTP requests get to finish during shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Startup-fatal conditions. Anything failing here aborts the process before
/// a single request is served; nothing is retried.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("device store unavailable: {0}")]
    Store(#[from] StoreError),

    #[error("initial connect failed: {0}")]
    Connect(#[from] TransportError),

    #[error("failed to bind HTTP listener: {0}")]
    Bind(#[from] std::io::Error),
}

/// Run the gateway to completion.
///
/// Returns `Ok(())` after a graceful shutdown (signal or fatal session
/// error); returns an error only for startup-fatal conditions.
pub async fn run(
    config: Config,
    transport: DynTransport,
    events: mpsc::Receiver<SessionEvent>,
) -> Result<(), GatewayError> {
    let devices = DeviceStore::open(&config.store_path)?;
    let identity = devices.load()?;

    let fatal = CancellationToken::new();
    let shutdown = CancellationToken::new();

    let mut controller = SessionController::new(
        transport.clone(),
        events,
        devices,
        config.send_timeout,
        fatal.clone(),
        shutdown.clone(),
    );
    let session = controller.handle();

    transport.connect().await?;
    if identity.is_some() {
        controller.resume_ready();
    }
    let controller_task = tokio::spawn(controller.run());

    let app = server::build_app(AppState::new(session, config.server_key));
    let listener = tokio::net::TcpListener::bind(config.http_addr).await?;
    tracing::info!(addr = %config.http_addr, "HTTP server listening");

    let http_shutdown = CancellationToken::new();
    let server_task = tokio::spawn(server::serve(listener, app, http_shutdown.clone()));
    let server_abort = server_task.abort_handle();

    // Block until the first of: OS termination signal, fatal session error.
    tokio::select! {
        _ = terminate_signal() => tracing::info!("termination signal received"),
        _ = fatal.cancelled() => tracing::error!("fatal session error, shutting down"),
    }

    // Teardown order matters: stop the controller and disconnect the session
    // first so no new send work starts, then drain the HTTP server.
    shutdown.cancel();
    transport.disconnect().await;
    http_shutdown.cancel();

    match tokio::time::timeout(SHUTDOWN_GRACE, server_task).await {
        Ok(Ok(Ok(()))) => tracing::info!("HTTP server stopped"),
        Ok(Ok(Err(err))) => tracing::warn!(error = %err, "HTTP server exited with error"),
        Ok(Err(err)) => tracing::warn!(error = %err, "HTTP server task panicked"),
        Err(_) => {
            tracing::warn!("grace period elapsed, aborting in-flight requests");
            server_abort.abort();
        }
    }
    let _ = controller_task.await;
    Ok(())
}

/// Resolves on SIGINT or SIGTERM.
async fn terminate_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(sig) => Some(sig),
            Err(err) => {
                tracing::warn!(error = %err, "failed to install SIGTERM handler");
                None
            }
        };
        let sigterm = async {
            match sigterm.as_mut() {
                Some(sig) => {
                    sig.recv().await;
                }
                None => std::future::pending().await,
            }
        };
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(err) = result {
                    tracing::warn!(error = %err, "failed to listen for SIGINT");
                    std::future::pending::<()>().await;
                }
            }
            _ = sigterm => {}
        }
    }
    #[cfg(not(unix))]
    {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    }
}
