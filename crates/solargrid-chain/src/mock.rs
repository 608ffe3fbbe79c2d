//! In-memory chain for tests and offline simulation

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use solargrid_types::WalletAddress;

use crate::{ChainError, Result, SignedTransfer, TokenChain, TransferReceipt};

/// How the mock answers receipt polls for a submitted transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptBehavior {
    /// Successful receipt after this many polls
    ConfirmAfter(u32),
    /// Receipt present but status = failed
    Revert,
    /// Receipt never appears
    Never,
}

#[derive(Default)]
struct MockState {
    balances: HashMap<WalletAddress, u128>,
    nonces: HashMap<WalletAddress, u64>,
    submitted: Vec<SignedTransfer>,
    polls: HashMap<String, u32>,
    behaviors: Vec<ReceiptBehavior>,
    fail_submission: bool,
}

/// Scriptable in-memory [`TokenChain`]
#[derive(Clone)]
pub struct MockChain {
    decimals: u8,
    gas_price: u128,
    chain_id: u64,
    state: Arc<Mutex<MockState>>,
}

impl MockChain {
    pub fn new() -> Self {
        Self {
            decimals: 18,
            gas_price: 5_000_000_000,
            chain_id: 57054,
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    pub fn with_decimals(mut self, decimals: u8) -> Self {
        self.decimals = decimals;
        self
    }

    pub fn with_gas_price(mut self, gas_price: u128) -> Self {
        self.gas_price = gas_price;
        self
    }

    pub async fn set_balance(&self, owner: WalletAddress, raw: u128) {
        self.state.lock().await.balances.insert(owner, raw);
    }

    pub async fn set_nonce(&self, owner: WalletAddress, nonce: u64) {
        self.state.lock().await.nonces.insert(owner, nonce);
    }

    /// Queue the receipt behavior for the next submission (FIFO; defaults
    /// to immediate confirmation when the queue is empty)
    pub async fn script_receipt(&self, behavior: ReceiptBehavior) {
        self.state.lock().await.behaviors.push(behavior);
    }

    pub async fn reject_next_submission(&self) {
        self.state.lock().await.fail_submission = true;
    }

    pub async fn submitted_count(&self) -> usize {
        self.state.lock().await.submitted.len()
    }
}

impl Default for MockChain {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenChain for MockChain {
    async fn decimals(&self) -> Result<u8> {
        Ok(self.decimals)
    }

    async fn balance_of(&self, owner: &WalletAddress) -> Result<u128> {
        Ok(self
            .state
            .lock()
            .await
            .balances
            .get(owner)
            .copied()
            .unwrap_or(0))
    }

    async fn pending_nonce(&self, owner: &WalletAddress) -> Result<u64> {
        Ok(self
            .state
            .lock()
            .await
            .nonces
            .get(owner)
            .copied()
            .unwrap_or(0))
    }

    async fn gas_price(&self) -> Result<u128> {
        Ok(self.gas_price)
    }

    async fn chain_id(&self) -> Result<u64> {
        Ok(self.chain_id)
    }

    async fn submit_transfer(&self, transfer: SignedTransfer) -> Result<String> {
        let mut state = self.state.lock().await;
        if state.fail_submission {
            state.fail_submission = false;
            return Err(ChainError::Submission("insufficient funds for gas".into()));
        }
        state.submitted.push(transfer);
        let index = state.submitted.len();
        let hash = format!("0xmock{index:04}");
        state.polls.insert(hash.clone(), 0);
        Ok(hash)
    }

    async fn receipt(&self, tx_hash: &str) -> Result<Option<TransferReceipt>> {
        let mut state = self.state.lock().await;
        let Some(polls) = state.polls.get_mut(tx_hash) else {
            return Ok(None);
        };
        *polls += 1;
        let polls = *polls;

        // Behavior for submission k lives at behaviors[k-1]
        let index = tx_hash
            .trim_start_matches("0xmock")
            .trim_start_matches('0')
            .parse::<usize>()
            .unwrap_or(1);
        let behavior = state
            .behaviors
            .get(index - 1)
            .copied()
            .unwrap_or(ReceiptBehavior::ConfirmAfter(0));

        match behavior {
            ReceiptBehavior::ConfirmAfter(n) if polls > n => Ok(Some(TransferReceipt {
                status: true,
                block_number: 1_000 + index as u64,
                gas_used: 51_000,
            })),
            ReceiptBehavior::ConfirmAfter(_) => Ok(None),
            ReceiptBehavior::Revert => Ok(Some(TransferReceipt {
                status: false,
                block_number: 1_000 + index as u64,
                gas_used: 28_000,
            })),
            ReceiptBehavior::Never => Ok(None),
        }
    }
}
