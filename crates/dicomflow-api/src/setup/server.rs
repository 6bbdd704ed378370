//! Listener, serve loop and shutdown

use anyhow::{Context, Result};
use axum::Router;
use dicomflow_core::Config;
use std::net::{Ipv4Addr, SocketAddr};

const MIB: u64 = 1024 * 1024;

/// Serve `app` on every interface until SIGINT or SIGTERM. In-flight chunk
/// requests are allowed to finish.
pub async fn start_server(config: &Config, app: Router) -> Result<()> {
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.server_port()));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!(
        %addr,
        environment = config.environment(),
        chunk_part_limit_mib = config.max_chunk_file_size_bytes() / MIB,
        single_upload_limit_mib = config.max_single_upload_size_bytes() / MIB,
        files_per_request = config.max_files_per_request(),
        storage = config.storage_path(),
        "Accepting DICOM uploads"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_stop())
        .await
        .context("HTTP server terminated with an error")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn wait_for_stop() {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "SIGINT handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let signal = tokio::select! {
        _ = interrupt => "SIGINT",
        _ = terminate => "SIGTERM",
    };
    tracing::info!(signal, "Draining connections");
}
