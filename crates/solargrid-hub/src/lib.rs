//! SolarGrid Hub - the central decision process
//!
//! The hub receives energy reports from the telemetry backend, asks the
//! decision oracle for transfer instructions, and fans the resulting text
//! out to every connected settlement agent over WebSocket.
//!
//! # Delivery semantics
//!
//! Broadcasts are at-most-once: there is no replay buffer, so an agent
//! that is reconnecting when a round is broadcast never sees that round.
//! Broadcasting to zero subscribers is a no-op, not an error. Both are
//! deliberate properties of the wire contract, not bugs.
//!
//! # Failure handling
//!
//! An oracle failure drops the round (the stale report is not retried);
//! a lost telemetry connection is retried forever under the configured
//! [`RetryPolicy`]; a dead subscriber is dropped from the set without
//! affecting delivery to the others. Nothing here is process-fatal.

pub mod broadcast;
pub mod feed;
pub mod hub;

pub use broadcast::{BroadcastServer, SubscriberSet};
pub use feed::ReportFeed;
pub use hub::DecisionHub;

use thiserror::Error;

/// Errors from hub plumbing
#[derive(Debug, Error)]
pub enum HubError {
    #[error("failed to bind broadcast endpoint {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

pub type Result<T> = std::result::Result<T, HubError>;

/// The single broadcast frame shape: `{"ai_decision": <text>}`
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DecisionFrame {
    pub ai_decision: String,
}
