//! HTTP endpoint reporting the counter.
//!
//! Every request, whatever its method or path, gets `200 text/plain` with
//! `Count: <n>`.

use std::net::SocketAddr;
use std::sync::atomic::Ordering;

use axum::{extract::State, http::header, response::IntoResponse, Router};
use tracing::info;

use crate::counter::SharedCount;

pub fn create_router(count: SharedCount) -> Router {
    Router::new().fallback(count_handler).with_state(count)
}

async fn count_handler(State(count): State<SharedCount>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain")],
        format!("Count: {}", count.load(Ordering::Relaxed)),
    )
}

/// Serve the counter on `addr` until the future is dropped.
pub async fn serve(addr: SocketAddr, count: SharedCount) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("HTTP server listening on {}", addr);
    axum::serve(listener, create_router(count)).await
}
