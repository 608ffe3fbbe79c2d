//! Broadcast endpoint: subscriber bookkeeping and the accept loop
//!
//! Any connecting peer becomes a subscriber and receives every future
//! broadcast (trusted network only; there is no authentication on this
//! endpoint by design).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::{DecisionFrame, HubError, Result};

/// Instance-owned set of connected subscribers
///
/// Mutated only under its lock; each subscriber is an unbounded channel
/// pumped into its socket by a dedicated task, so a slow or dead peer
/// never blocks a broadcast.
#[derive(Clone, Default)]
pub struct SubscriberSet {
    inner: Arc<Mutex<HashMap<u64, UnboundedSender<Message>>>>,
    next_id: Arc<AtomicU64>,
}

impl SubscriberSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber; returns its id and the receiving end to
    /// pump into the socket
    pub async fn add(&self) -> (u64, mpsc::UnboundedReceiver<Message>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.lock().await.insert(id, tx);
        (id, rx)
    }

    pub async fn remove(&self, id: u64) {
        self.inner.lock().await.remove(&id);
    }

    pub async fn count(&self) -> usize {
        self.inner.lock().await.len()
    }

    /// Send `text` as one decision frame to every subscriber.
    ///
    /// Subscribers whose channel is already closed are dropped from the
    /// set; their failure never affects delivery to the rest. Returns the
    /// number of subscribers the frame was handed to.
    pub async fn broadcast(&self, text: &str) -> usize {
        let frame = DecisionFrame {
            ai_decision: text.to_string(),
        };
        // DecisionFrame is a plain struct of strings; serialization
        // cannot fail
        let payload = serde_json::to_string(&frame).unwrap_or_default();

        let mut subscribers = self.inner.lock().await;
        let mut dead = Vec::new();
        let mut delivered = 0;
        for (&id, tx) in subscribers.iter() {
            if tx.send(Message::Text(payload.clone())).is_ok() {
                delivered += 1;
            } else {
                dead.push(id);
            }
        }
        for id in dead {
            debug!(subscriber = id, "dropping closed subscriber");
            subscribers.remove(&id);
        }
        delivered
    }
}

/// WebSocket server that feeds broadcasts to settlement agents
pub struct BroadcastServer {
    listener: TcpListener,
    subscribers: SubscriberSet,
}

impl BroadcastServer {
    pub async fn bind(addr: &str, subscribers: SubscriberSet) -> Result<Self> {
        let listener = TcpListener::bind(addr).await.map_err(|source| HubError::Bind {
            addr: addr.to_string(),
            source,
        })?;
        info!(addr, "broadcast endpoint listening");
        Ok(Self {
            listener,
            subscribers,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept subscribers forever; one task per connection.
    pub async fn run(self) {
        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    let subscribers = self.subscribers.clone();
                    tokio::spawn(async move {
                        handle_subscriber(stream, subscribers).await;
                    });
                    debug!(%peer, "subscriber connecting");
                }
                Err(err) => {
                    warn!(%err, "accept failed");
                }
            }
        }
    }
}

async fn handle_subscriber(stream: TcpStream, subscribers: SubscriberSet) {
    let ws = match tokio_tungstenite::accept_async(stream).await {
        Ok(ws) => ws,
        Err(err) => {
            warn!(%err, "websocket handshake failed");
            return;
        }
    };
    let (id, mut rx) = subscribers.add().await;
    info!(subscriber = id, "subscriber connected");

    let (mut sink, mut source) = ws.split();
    loop {
        tokio::select! {
            outbound = rx.recv() => {
                let Some(message) = outbound else { break };
                if sink.send(message).await.is_err() {
                    break;
                }
            }
            inbound = source.next() => {
                match inbound {
                    // Agents don't talk back; drain pings and ignore text
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    subscribers.remove(id).await;
    info!(subscriber = id, "subscriber disconnected");
}
