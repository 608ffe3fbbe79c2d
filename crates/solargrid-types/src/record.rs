//! Transaction records as persisted by the ledger
//!
//! Field names serialize in camelCase so ledger files stay readable with
//! the same keys agents have always logged (`txHash`, `blockNumber`,
//! `gasUsed`).

use crate::WalletAddress;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of one executed transfer attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    /// Name of the agent that executed the attempt
    pub agent_id: String,
    pub sender: WalletAddress,
    pub recipient: WalletAddress,
    /// Whole SOLAR tokens as instructed
    pub amount: u64,
    /// Set as soon as the broadcast succeeds, even if confirmation
    /// later fails or times out
    pub tx_hash: Option<String>,
    pub success: bool,
    pub error: Option<String>,
    pub block_number: Option<u64>,
    pub gas_used: Option<u64>,
    pub timestamp: DateTime<Utc>,
}
