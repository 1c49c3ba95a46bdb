// Minimal HTTP endpoint for hosts that ping the process to keep it awake

use std::net::SocketAddr;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{error, info};

async fn alive_handler() -> impl IntoResponse {
    (StatusCode::OK, "I'm alive")
}

pub fn router() -> Router {
    Router::new().route("/", get(alive_handler))
}

/// Bind `addr` and serve on a background task. Returns the bound address.
pub async fn spawn(addr: SocketAddr) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
    let listener = TcpListener::bind(addr).await?;
    let bound = listener.local_addr()?;
    info!(%bound, "keep-alive endpoint listening");

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router()).await {
            error!("keep-alive server stopped: {}", e);
        }
    });
    Ok((bound, handle))
}
