//! SolarGrid Agent - per-house settlement process
//!
//! Each agent owns exactly one wallet and one ledger. It subscribes to
//! the hub's decision broadcasts, extracts the instructions addressed to
//! its wallet, executes them in order, and durably records every attempt.
//!
//! # Filtering rules
//!
//! For each instruction in a broadcast:
//! - `sender == own wallet`: execute the transfer and append the outcome
//!   to the ledger, success or not
//! - `recipient == own wallet` (and sender is someone else): informational
//!   only; the counter-party's agent does the debiting
//! - anything else: ignored
//!
//! The agent never signs on behalf of another address, and a lost hub
//! connection is retried forever; a broadcast missed while reconnecting
//! is gone (at-most-once delivery, a property of the wire contract).

pub mod agent;
pub mod config;

pub use agent::{ConnectionState, SettlementAgent};
pub use config::{AgentConfig, StoredWallet, WalletStore};

use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort agent startup
///
/// Runtime failures (chain, channel) never surface here; they are
/// recovered in place. These are the unrecoverable configuration
/// problems that should stop the process with a clear message.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("failed to read config {path}: {source}")]
    Config {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed config {path}: {source}")]
    ConfigFormat {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error(
        "invalid retry policy in {path}: multiplier must be finite and >= 1.0, \
         max_delay must be >= initial_delay"
    )]
    ConfigRetry { path: PathBuf },

    #[error("wallet file not found for {name} at {path}")]
    WalletNotFound { name: String, path: PathBuf },

    #[error("malformed wallet file {path}: {source}")]
    WalletFormat {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("private key env var {var} is not set")]
    MissingPrivateKey { var: String },

    #[error("wallet address {stored} does not match the key (derives {derived})")]
    WalletMismatch { stored: String, derived: String },

    #[error(transparent)]
    Chain(#[from] solargrid_chain::ChainError),

    #[error(transparent)]
    Ledger(#[from] solargrid_ledger::LedgerError),
}

pub type Result<T> = std::result::Result<T, AgentError>;
