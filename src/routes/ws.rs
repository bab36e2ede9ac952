// WebSocket handler: one registered client per connection

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{Duration, timeout};

use super::AppState;
use crate::engine::{Batch, ClientId, ClientRegistry};

pub(super) const WS_PING_INTERVAL: Duration = Duration::from_secs(30);
pub(super) const WS_SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Unregisters the client on drop, whichever way the connection ends.
struct ClientGuard {
    registry: Arc<ClientRegistry>,
    id: ClientId,
}

impl Drop for ClientGuard {
    fn drop(&mut self) {
        self.registry.unregister(self.id);
    }
}

pub(super) async fn ws_stats(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let registry = state.registry.clone();
    let buffer = state.config.engine.client_buffer;
    ws.on_upgrade(move |socket| async move {
        if let Err(e) = stream_stats(socket, registry, buffer).await {
            tracing::info!("Stats stream error: {}", e);
        }
    })
}

async fn stream_stats(
    mut socket: WebSocket,
    registry: Arc<ClientRegistry>,
    buffer: usize,
) -> anyhow::Result<()> {
    let (tx, mut rx) = mpsc::channel::<Batch>(buffer);
    let id = registry.register(tx);
    let _guard = ClientGuard {
        registry: registry.clone(),
        id,
    };
    tracing::info!(client = %id, clients = registry.size(), "Client connected to stats stream");

    let mut ping_interval = tokio::time::interval(WS_PING_INTERVAL);
    ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            batch = rx.recv() => {
                let Some(batch) = batch else { break };
                let r = timeout(WS_SEND_TIMEOUT, socket.send(Message::Text(batch.to_string().into()))).await;
                if r.is_err() || r.unwrap_or(Ok(())).is_err() {
                    break;
                }
            }
            inbound = socket.recv() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        tracing::debug!(client = %id, len = text.as_str().len(), "inbound message ignored");
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::info!(client = %id, error = %e, "read error");
                        break;
                    }
                }
            }
            _ = ping_interval.tick() => {
                let r = timeout(WS_SEND_TIMEOUT, socket.send(Message::Ping(Bytes::new()))).await;
                if r.is_err() || r.unwrap_or(Ok(())).is_err() {
                    break;
                }
            }
        }
    }
    tracing::info!(client = %id, "Client disconnected from stats stream");
    Ok(())
}
