//! SolarGrid Chain - token chain capability and transaction executor
//!
//! The chain itself is a capability, not something this workspace
//! implements: [`TokenChain`] is the seam, with a JSON-RPC implementation
//! for real nodes and an in-memory mock for tests and offline simulation.
//!
//! [`TransactionExecutor`] owns one wallet and turns a (recipient, amount)
//! pair into a signed, broadcast, confirmed transfer with the settlement
//! pipeline's policies:
//!
//! - nonce from the *pending* transaction count, so back-to-back submits
//!   from one wallet never collide (one wallet, one executor instance)
//! - gas price at 1.2x the network's suggestion
//! - hash captured at broadcast time, before confirmation
//! - bounded confirmation wait with a reconciliation pass on timeout

pub mod executor;
pub mod jsonrpc;
pub mod mock;
pub mod rlp;
pub mod wallet;

pub use executor::{ConfirmationPolicy, GasPolicy, TransactionExecutor, TransactionOutcome};
pub use jsonrpc::JsonRpcChain;
pub use mock::{MockChain, ReceiptBehavior};
pub use wallet::Wallet;

use async_trait::async_trait;
use solargrid_types::WalletAddress;
use thiserror::Error;

/// Errors that can occur talking to or signing for the chain
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("transaction rejected at broadcast: {0}")]
    Submission(String),

    #[error("rpc transport error: {0}")]
    Transport(String),

    #[error("malformed rpc response: {0}")]
    Protocol(String),
}

pub type Result<T> = std::result::Result<T, ChainError>;

/// A raw signed transfer, ready to broadcast
#[derive(Debug, Clone)]
pub struct SignedTransfer {
    pub raw: Vec<u8>,
}

/// Confirmation receipt for a broadcast transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReceipt {
    /// True iff the transaction executed successfully on-chain
    pub status: bool,
    pub block_number: u64,
    pub gas_used: u64,
}

/// Everything the executor needs from a token chain
///
/// Standard ERC-20 semantics: `transfer(to, value)` moves scaled units,
/// `balance_of`/`decimals` read token state. Nonces come from the pending
/// transaction count.
#[async_trait]
pub trait TokenChain: Send + Sync {
    /// The token's declared decimal precision
    async fn decimals(&self) -> Result<u8>;

    /// Raw (unscaled) token balance of `owner`
    async fn balance_of(&self, owner: &WalletAddress) -> Result<u128>;

    /// Pending transaction count for `owner`, used as the next nonce
    async fn pending_nonce(&self, owner: &WalletAddress) -> Result<u64>;

    /// The network's current suggested gas price, in wei
    async fn gas_price(&self) -> Result<u128>;

    /// Chain id for replay-protected signing
    async fn chain_id(&self) -> Result<u64>;

    /// Broadcast a signed transfer; returns the transaction hash
    async fn submit_transfer(&self, transfer: SignedTransfer) -> Result<String>;

    /// One receipt poll; `None` while the transaction is unconfirmed
    async fn receipt(&self, tx_hash: &str) -> Result<Option<TransferReceipt>>;
}

/// Unsigned transfer parameters handed to the wallet for signing
#[derive(Debug, Clone)]
pub struct TransferCall {
    pub to: WalletAddress,
    /// Scaled on-chain amount (`tokens * 10^decimals`)
    pub value: u128,
    pub nonce: u64,
    pub gas_price: u128,
    pub gas_limit: u64,
    pub chain_id: u64,
}
