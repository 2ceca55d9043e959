//! WebSocket handler for result push.
//!
//! The connection registers under the client-supplied session id and then
//! waits for either a client frame or a new result in its slot. Inbound
//! frames carry no meaning beyond ping and close.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use tracing::{debug, info, warn};

use crate::dispatch::{LiveChannelRegistry, ResultMessage};

/// One live channel connection
pub struct LiveChannelHandler {
    registry: Arc<LiveChannelRegistry>,
    session_id: String,
}

impl LiveChannelHandler {
    pub fn new(registry: Arc<LiveChannelRegistry>, session_id: impl Into<String>) -> Self {
        Self {
            registry,
            session_id: session_id.into(),
        }
    }

    /// Serve a connection until either side closes it.
    pub async fn handle(self, mut socket: WebSocket) {
        let (connection_id, mut results) = self.registry.open(&self.session_id);
        info!(
            session_id = %self.session_id,
            connection = %connection_id,
            "Live channel opened"
        );

        loop {
            tokio::select! {
                frame = socket.recv() => match frame {
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = socket.send(Message::Pong(data)).await {
                            warn!(error = %e, "Failed to send pong");
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!(connection = %connection_id, "Live channel close received");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(connection = %connection_id, error = %e, "WebSocket error");
                        break;
                    }
                },
                changed = results.changed() => {
                    if changed.is_err() {
                        // Replaced by a newer connection for the same session.
                        debug!(connection = %connection_id, "Result slot dropped");
                        break;
                    }
                    let latest = results.borrow_and_update().clone();
                    if let Some(message) = latest {
                        if let Err(e) = self.push(&mut socket, &message).await {
                            warn!(connection = %connection_id, error = %e, "Failed to push result");
                            break;
                        }
                    }
                }
            }
        }

        self.registry.close(&self.session_id, connection_id);
        info!(
            session_id = %self.session_id,
            connection = %connection_id,
            "Live channel closed"
        );
    }

    async fn push(&self, socket: &mut WebSocket, message: &ResultMessage) -> Result<(), axum::Error> {
        let text = serde_json::to_string(message).map_err(axum::Error::new)?;
        socket.send(Message::Text(text)).await?;
        debug!(session_id = %self.session_id, "Result pushed");
        Ok(())
    }
}
