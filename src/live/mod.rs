pub mod wire;

use std::net::SocketAddr;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::{Html, Response};
use axum::routing::get;
use axum::{Json, Router};
use color_eyre::Result;
use color_eyre::eyre::WrapErr;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::metrics::buffer::{BufferHandle, Snapshot};

const DASHBOARD_HTML: &str = include_str!("../../assets/dashboard.html");

#[derive(Clone)]
struct LiveState {
    buffer: BufferHandle,
    updates: watch::Receiver<Snapshot>,
}

/// Serves the live dashboard until the stop signal flips: `GET /` is the
/// dashboard page, `GET /api/data` the pull endpoint, `GET /ws` the push
/// channel fed by the sampler's tick notifications.
pub async fn serve(
    buffer: BufferHandle,
    updates: watch::Receiver<Snapshot>,
    port: u16,
    mut stop: watch::Receiver<bool>,
) -> Result<()> {
    let app = router(buffer, updates);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .wrap_err_with(|| format!("failed to bind live dashboard on port {port}"))?;
    info!(%addr, "live dashboard listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = stop.wait_for(|stopped| *stopped).await;
        })
        .await
        .wrap_err("live dashboard server error")?;
    Ok(())
}

fn router(buffer: BufferHandle, updates: watch::Receiver<Snapshot>) -> Router {
    Router::new()
        .route("/", get(dashboard))
        .route("/api/data", get(pull_data))
        .route("/ws", get(ws_upgrade))
        .with_state(LiveState { buffer, updates })
}

async fn dashboard() -> Html<&'static str> {
    Html(DASHBOARD_HTML)
}

/// Pull contract: the same cumulative payload the push channel emits, for
/// first page loads and poll fallback.
async fn pull_data(State(state): State<LiveState>) -> Json<serde_json::Value> {
    Json(wire::payload(&state.buffer.snapshot()))
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<LiveState>) -> Response {
    ws.on_upgrade(move |socket| push_loop(socket, state))
}

/// One task per connected client. A send failure or close ends only this
/// client's session; clients not connected at a tick simply miss it.
async fn push_loop(mut socket: WebSocket, state: LiveState) {
    let mut updates = state.updates.clone();
    loop {
        let snapshot = updates.borrow_and_update().clone();
        let text = wire::payload(&snapshot).to_string();
        if socket.send(Message::Text(text.into())).await.is_err() {
            debug!("dashboard client disconnected during send");
            return;
        }
        loop {
            tokio::select! {
                changed = updates.changed() => {
                    if changed.is_err() {
                        // Sampler gone; nothing further to push.
                        return;
                    }
                    break;
                }
                incoming = socket.recv() => {
                    match incoming {
                        None | Some(Err(_)) | Some(Ok(Message::Close(_))) => {
                            debug!("dashboard client disconnected");
                            return;
                        }
                        Some(Ok(_)) => {}
                    }
                }
            }
        }
    }
}
