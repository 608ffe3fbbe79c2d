//! Transaction executor: validate, scale, sign, broadcast, confirm
//!
//! One executor owns one wallet and submits its transfers sequentially.
//! Every call returns a [`TransactionOutcome`]; chain and signing failures
//! are folded into the outcome rather than surfaced as errors, so the
//! agent can always produce a ledger entry.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{info, warn};

use solargrid_types::WalletAddress;

use crate::{ChainError, TokenChain, TransferCall, Wallet};

/// Gas pricing policy: suggested price times a surcharge
#[derive(Debug, Clone, Copy)]
pub struct GasPolicy {
    /// Surcharge as a ratio; defaults to 12/10 (1.2x)
    pub surcharge_num: u128,
    pub surcharge_den: u128,
    pub gas_limit: u64,
}

impl Default for GasPolicy {
    fn default() -> Self {
        Self {
            surcharge_num: 12,
            surcharge_den: 10,
            gas_limit: 100_000,
        }
    }
}

impl GasPolicy {
    pub fn apply(&self, suggested: u128) -> u128 {
        suggested * self.surcharge_num / self.surcharge_den
    }
}

/// Confirmation wait policy
#[derive(Debug, Clone, Copy)]
pub struct ConfirmationPolicy {
    /// Total time to wait for a receipt before reconciling
    pub timeout: Duration,
    /// Delay between receipt polls
    pub poll_interval: Duration,
    /// Extra polls after timeout before the outcome is final; a receipt
    /// found here upgrades a would-be timeout to its real status
    pub reconcile_polls: u32,
}

impl Default for ConfirmationPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(120),
            poll_interval: Duration::from_secs(2),
            reconcile_polls: 3,
        }
    }
}

/// The recorded result of one transfer attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionOutcome {
    /// Present whenever broadcast succeeded, even on later failure
    pub tx_hash: Option<String>,
    pub success: bool,
    pub error: Option<String>,
    pub block_number: Option<u64>,
    pub gas_used: Option<u64>,
}

impl TransactionOutcome {
    fn failure(error: impl Into<String>) -> Self {
        Self {
            tx_hash: None,
            success: false,
            error: Some(error.into()),
            block_number: None,
            gas_used: None,
        }
    }
}

/// Signs, submits, and confirms transfers for one wallet
pub struct TransactionExecutor {
    chain: Arc<dyn TokenChain>,
    wallet: Wallet,
    gas: GasPolicy,
    confirmation: ConfirmationPolicy,
}

impl TransactionExecutor {
    pub fn new(chain: Arc<dyn TokenChain>, wallet: Wallet) -> Self {
        Self {
            chain,
            wallet,
            gas: GasPolicy::default(),
            confirmation: ConfirmationPolicy::default(),
        }
    }

    pub fn with_gas_policy(mut self, gas: GasPolicy) -> Self {
        self.gas = gas;
        self
    }

    pub fn with_confirmation_policy(mut self, confirmation: ConfirmationPolicy) -> Self {
        self.confirmation = confirmation;
        self
    }

    pub fn sender(&self) -> &WalletAddress {
        self.wallet.address()
    }

    /// Execute one transfer of `amount` whole tokens to `recipient`.
    pub async fn execute(&self, recipient: &WalletAddress, amount: u64) -> TransactionOutcome {
        if !recipient.is_well_formed() {
            return TransactionOutcome::failure(format!("invalid recipient address: {recipient}"));
        }

        let call = match self.build_call(recipient, amount).await {
            Ok(call) => call,
            Err(err) => return TransactionOutcome::failure(err.to_string()),
        };

        let signed = match self.wallet.sign_transfer(&call) {
            Ok(signed) => signed,
            Err(err) => return TransactionOutcome::failure(err.to_string()),
        };

        let tx_hash = match self.chain.submit_transfer(signed).await {
            Ok(hash) => hash,
            Err(err) => return TransactionOutcome::failure(err.to_string()),
        };
        info!(%recipient, amount, tx_hash, "transfer broadcast");

        self.await_confirmation(tx_hash).await
    }

    async fn build_call(
        &self,
        recipient: &WalletAddress,
        amount: u64,
    ) -> Result<TransferCall, ChainError> {
        let decimals = self.chain.decimals().await?;
        // Exact for any u64 amount: 2^64 * 10^18 < 2^128
        let value = u128::from(amount) * 10u128.pow(u32::from(decimals));

        let nonce = self.chain.pending_nonce(self.wallet.address()).await?;
        let gas_price = self.gas.apply(self.chain.gas_price().await?);
        let chain_id = self.chain.chain_id().await?;

        Ok(TransferCall {
            to: recipient.clone(),
            value,
            nonce,
            gas_price,
            gas_limit: self.gas.gas_limit,
            chain_id,
        })
    }

    async fn await_confirmation(&self, tx_hash: String) -> TransactionOutcome {
        let deadline = Instant::now() + self.confirmation.timeout;
        loop {
            if let Some(outcome) = self.poll_once(&tx_hash).await {
                return outcome;
            }
            if Instant::now() >= deadline {
                break;
            }
            sleep(self.confirmation.poll_interval).await;
        }

        // The transaction may still have landed; reconcile before giving up.
        for _ in 0..self.confirmation.reconcile_polls {
            sleep(self.confirmation.poll_interval).await;
            if let Some(outcome) = self.poll_once(&tx_hash).await {
                info!(tx_hash, "receipt found during reconciliation");
                return outcome;
            }
        }

        warn!(tx_hash, "confirmation timed out");
        TransactionOutcome {
            tx_hash: Some(tx_hash),
            success: false,
            error: Some("confirmation timed out; transaction may still land".to_string()),
            block_number: None,
            gas_used: None,
        }
    }

    async fn poll_once(&self, tx_hash: &str) -> Option<TransactionOutcome> {
        match self.chain.receipt(tx_hash).await {
            Ok(Some(receipt)) => Some(TransactionOutcome {
                tx_hash: Some(tx_hash.to_string()),
                success: receipt.status,
                error: (!receipt.status).then(|| "transaction reverted on-chain".to_string()),
                block_number: Some(receipt.block_number),
                gas_used: Some(receipt.gas_used),
            }),
            Ok(None) => None,
            Err(err) => {
                // Transient read failure; keep polling until the deadline
                warn!(tx_hash, %err, "receipt poll failed");
                None
            }
        }
    }
}
