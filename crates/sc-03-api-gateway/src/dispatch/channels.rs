//! Live channel registry.
//!
//! Maps a client-chosen session id to the result slot of its open WebSocket.
//! Each slot is a `watch` channel, so a connection only ever sees the latest
//! delivered result.
//!
//! ## Invariants
//!
//! - At most one entry per session id; opening again replaces the old entry.
//! - An entry is only removed by the connection that owns it.
//! - The map lock is held for the lookup only, never across a send.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;
use tracing::debug;

/// Message pushed to a client when its run completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultMessage {
    pub message: String,
    /// Base64 of the encoded output image
    pub image: String,
    /// Seconds per transform filter
    pub duration: BTreeMap<String, f64>,
    /// Error message per failed filter
    pub errors: BTreeMap<String, String>,
}

/// Receiving half handed to a WebSocket connection.
pub type ResultReceiver = watch::Receiver<Option<Arc<ResultMessage>>>;

type ResultSender = watch::Sender<Option<Arc<ResultMessage>>>;

/// Identifies one WebSocket connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Why a result could not be delivered. Logged, never retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeliveryMiss {
    #[error("no live channel registered")]
    NoChannel,

    #[error("live channel closed")]
    Closed,
}

struct LiveChannel {
    connection_id: ConnectionId,
    sender: Arc<ResultSender>,
}

/// Registry of open live channels keyed by session id.
#[derive(Default)]
pub struct LiveChannelRegistry {
    next_id: AtomicU64,
    channels: Mutex<HashMap<String, LiveChannel>>,
}

impl LiveChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a channel for `session_id`, replacing any existing one.
    pub fn open(&self, session_id: &str) -> (ConnectionId, ResultReceiver) {
        let connection_id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (sender, receiver) = watch::channel(None);

        let replaced = self.channels.lock().insert(
            session_id.to_string(),
            LiveChannel {
                connection_id,
                sender: Arc::new(sender),
            },
        );

        if let Some(old) = replaced {
            debug!(
                session_id,
                old = %old.connection_id,
                new = %connection_id,
                "Live channel replaced"
            );
        }

        (connection_id, receiver)
    }

    /// Remove the entry for `session_id` if it still belongs to `connection_id`.
    pub fn close(&self, session_id: &str, connection_id: ConnectionId) -> bool {
        let mut channels = self.channels.lock();
        match channels.get(session_id) {
            Some(entry) if entry.connection_id == connection_id => {
                channels.remove(session_id);
                true
            }
            _ => false,
        }
    }

    /// Push a result to the channel registered under `session_id`.
    pub fn deliver(
        &self,
        session_id: &str,
        message: Arc<ResultMessage>,
    ) -> Result<ConnectionId, DeliveryMiss> {
        let (connection_id, sender) = {
            let channels = self.channels.lock();
            let entry = channels.get(session_id).ok_or(DeliveryMiss::NoChannel)?;
            (entry.connection_id, Arc::clone(&entry.sender))
        };

        if sender.send(Some(message)).is_err() {
            self.close(session_id, connection_id);
            return Err(DeliveryMiss::Closed);
        }
        Ok(connection_id)
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.channels.lock().contains_key(session_id)
    }

    pub fn len(&self) -> usize {
        self.channels.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.lock().is_empty()
    }
}
