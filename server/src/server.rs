use std::net::SocketAddr;

use color_eyre::eyre::WrapErr;
use tracing::info;

/// Serve `app` on `PORT` (default 3000) until the process is stopped
pub async fn run_server(app: axum::Router) -> color_eyre::Result<()> {
    let port: u16 = match std::env::var("PORT") {
        Ok(port) => port.parse().wrap_err("PORT must be a valid port number")?,
        Err(_) => 3000,
    };
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .wrap_err_with(|| format!("Failed to bind {addr}"))?;

    info!("Listening on {}", addr);
    axum::serve(listener, app)
        .await
        .wrap_err("Server exited with an error")?;

    Ok(())
}
