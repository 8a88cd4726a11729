//! Listener setup and graceful shutdown.

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use vless_config::Config;

use crate::error::ServerError;
use crate::router::build_router;
use crate::state::ServerState;
use crate::util::create_listener;

/// Run the server with a cancellation token for graceful shutdown.
pub async fn run_with_shutdown(
    config: Config,
    shutdown: CancellationToken,
) -> Result<(), ServerError> {
    let listen: SocketAddr = config
        .server
        .listen
        .parse()
        .map_err(|_| ServerError::Config("invalid listen address".into()))?;

    let state = ServerState::from_config(&config)?.into_shared();
    let listener = create_listener(listen, config.server.connection_backlog)?;

    info!(
        listen = %listener.local_addr().unwrap_or(listen),
        ws_path = %state.ws_path,
        xhttp_path = %state.xhttp_path,
        doh_path = %state.doh_path,
        fallbacks = state.dialer.fallbacks().hosts().len(),
        window_bytes = state.window_bytes,
        "server started"
    );

    serve(listener, state, shutdown).await
}

/// Serve requests on an already bound listener until `shutdown` fires,
/// then wait for active sessions up to the configured timeout.
pub async fn serve(
    listener: TcpListener,
    state: Arc<ServerState>,
    shutdown: CancellationToken,
) -> Result<(), ServerError> {
    let app = build_router(state.clone());
    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown.clone().cancelled_owned())
    .into_future();

    // Graceful shutdown in axum waits for open connections; long-lived
    // proxy sessions are bounded by the shutdown timeout instead.
    tokio::select! {
        res = server => res?,
        _ = async {
            shutdown.cancelled().await;
            tokio::time::sleep(state.shutdown_timeout).await;
        } => {
            warn!("http connections still open after shutdown timeout");
        }
    }
    info!("shutdown signal received, listener closed");

    let active = state.tracker.count();
    if active > 0 {
        info!("waiting for {} active sessions to drain", active);
        if state.tracker.wait_for_zero(state.shutdown_timeout).await {
            info!("all sessions drained");
        } else {
            warn!(
                "shutdown timeout, {} sessions still active",
                state.tracker.count()
            );
        }
    }

    info!("server stopped");
    Ok(())
}

/// Run the server until an error occurs (no graceful shutdown).
pub async fn run(config: Config) -> Result<(), ServerError> {
    run_with_shutdown(config, CancellationToken::new()).await
}
