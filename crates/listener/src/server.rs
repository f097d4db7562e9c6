//! The `/deploy` HTTP endpoint.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{ConnectInfo, DefaultBodyLimit, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::{Json, Router};
use deploy::WebhookHandler;
use serde::Serialize;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::gate::{Admission, InboundRequest, WebhookGate};

/// Route the webhook is configured against.
pub const DEPLOY_PATH: &str = "/deploy";

/// Largest body accepted on [`DEPLOY_PATH`]; GitHub caps deliveries at 25 MB.
pub const MAX_DELIVERY_BYTES: usize = 25 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP server stopped: {0}")]
    Serve(#[source] std::io::Error),
}

/// Shared state for the endpoint.
#[derive(Clone)]
pub struct AppState {
    gate: Arc<WebhookGate>,
    handler: Arc<dyn WebhookHandler>,
}

impl AppState {
    pub fn new(gate: WebhookGate, handler: Arc<dyn WebhookHandler>) -> Self {
        Self {
            gate: Arc::new(gate),
            handler,
        }
    }
}

/// JSON body of every handled POST.
#[derive(Debug, Serialize)]
struct MessageBody {
    msg: String,
}

/// Builds the router. Callers must serve it with connect info
/// (`into_make_service_with_connect_info::<SocketAddr>()`), which
/// [`serve`] does.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(DEPLOY_PATH, any(deploy))
        .layer(DefaultBodyLimit::max(MAX_DELIVERY_BYTES))
        .with_state(state)
}

async fn deploy(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request = InboundRequest {
        method,
        headers,
        peer: Some(peer.ip()),
        body,
    };

    match state.gate.admit(&request).await {
        Admission::Passthrough => (StatusCode::OK, "OK").into_response(),
        Admission::Rejected { status, .. } => status.into_response(),
        Admission::Admitted => {
            let delivery = match request.to_delivery() {
                Ok(delivery) => delivery,
                Err(cause) => {
                    error!(error = %cause, "admitted request lost a required header");
                    return state.gate.reject_status().into_response();
                }
            };
            let outcome = state.handler.handle(delivery).await;
            Json(MessageBody {
                msg: outcome.message(),
            })
            .into_response()
        }
    }
}

/// Serves the endpoint on `addr` until `shutdown` resolves.
///
/// # Errors
///
/// [`ListenerError::Bind`] if the address cannot be bound,
/// [`ListenerError::Serve`] if the accept loop fails.
pub async fn serve(
    addr: SocketAddr,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), ListenerError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ListenerError::Bind { addr, source })?;
    let local = listener.local_addr().unwrap_or(addr);
    info!(addr = %local, path = DEPLOY_PATH, "webhook listener started");

    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
    .map_err(ListenerError::Serve)?;

    info!("webhook listener stopped");
    Ok(())
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
