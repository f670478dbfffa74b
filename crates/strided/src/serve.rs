//! `strided serve`: the health API server.

use std::net::SocketAddr;

use tracing::{error, info};

pub async fn run(port: u16, version: String) -> anyhow::Result<()> {
    let router = stride_api::build_router(version.clone());
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!(%addr, %version, "health API starting");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Graceful shutdown on Ctrl-C.
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
            info!("shutdown signal received");
        })
        .await?;

    info!("health API stopped");
    Ok(())
}
