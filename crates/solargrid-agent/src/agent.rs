//! The settlement agent event loop

use chrono::Utc;
use futures::StreamExt;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use solargrid_chain::TransactionExecutor;
use solargrid_ledger::TransactionLedger;
use solargrid_types::{Instruction, RetryPolicy, TransactionRecord};

/// Channel lifecycle, observable for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Listening,
    Processing,
}

/// Decision frame as broadcast by the hub
#[derive(Deserialize)]
struct DecisionFrame {
    ai_decision: String,
}

/// One house's settlement process
///
/// Owns one wallet (via the executor) and one ledger. Instructions are
/// executed strictly in the order they appear in a broadcast.
pub struct SettlementAgent {
    agent_id: String,
    executor: TransactionExecutor,
    ledger: TransactionLedger,
    hub_url: String,
    retry: RetryPolicy,
    state: Arc<RwLock<ConnectionState>>,
}

impl SettlementAgent {
    pub fn new(
        agent_id: impl Into<String>,
        executor: TransactionExecutor,
        ledger: TransactionLedger,
        hub_url: impl Into<String>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            executor,
            ledger,
            hub_url: hub_url.into(),
            retry,
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
        }
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub async fn connection_state(&self) -> ConnectionState {
        *self.state.read().await
    }

    async fn set_state(&self, state: ConnectionState) {
        *self.state.write().await = state;
    }

    /// Handle one decision broadcast; returns the number of ledger
    /// records appended.
    pub async fn process_decision(&self, text: &str) -> usize {
        let instructions = solargrid_parser::parse(text);
        if instructions.is_empty() {
            debug!(agent = %self.agent_id, "no instructions in decision, nothing to do");
            return 0;
        }

        let mut appended = 0;
        for instruction in instructions {
            if self.handle_instruction(&instruction).await {
                appended += 1;
            }
        }
        appended
    }

    /// Returns true iff a ledger record was appended.
    async fn handle_instruction(&self, instruction: &Instruction) -> bool {
        let own = self.executor.sender();

        if instruction.sender == *own {
            info!(
                agent = %self.agent_id,
                %instruction,
                "executing transfer"
            );
            let outcome = self
                .executor
                .execute(&instruction.recipient, instruction.amount)
                .await;

            if outcome.success {
                info!(agent = %self.agent_id, tx_hash = ?outcome.tx_hash, "transfer confirmed");
            } else {
                warn!(agent = %self.agent_id, error = ?outcome.error, "transfer failed");
            }

            let record = TransactionRecord {
                agent_id: self.agent_id.clone(),
                sender: instruction.sender.clone(),
                recipient: instruction.recipient.clone(),
                amount: instruction.amount,
                tx_hash: outcome.tx_hash,
                success: outcome.success,
                error: outcome.error,
                block_number: outcome.block_number,
                gas_used: outcome.gas_used,
                timestamp: Utc::now(),
            };
            if let Err(err) = self.ledger.append(record).await {
                // The attempt already happened; losing the record is the
                // one failure we must not swallow quietly.
                error!(agent = %self.agent_id, %err, "FAILED TO RECORD TRANSACTION ATTEMPT");
            }
            true
        } else if instruction.recipient == *own {
            info!(
                agent = %self.agent_id,
                from = %instruction.sender,
                amount = instruction.amount,
                "incoming transfer expected"
            );
            false
        } else {
            false
        }
    }

    /// Subscribe to the hub and process broadcasts until externally
    /// terminated. Reconnects forever under the retry policy.
    pub async fn run(&self) {
        let mut attempt: u32 = 0;
        loop {
            self.set_state(ConnectionState::Connecting).await;
            match connect_async(self.hub_url.as_str()).await {
                Ok((mut ws, _)) => {
                    info!(agent = %self.agent_id, url = %self.hub_url, "connected to hub");
                    self.set_state(ConnectionState::Listening).await;
                    attempt = 0;

                    while let Some(frame) = ws.next().await {
                        match frame {
                            Ok(Message::Text(text)) => {
                                match serde_json::from_str::<DecisionFrame>(&text) {
                                    Ok(frame) => {
                                        self.set_state(ConnectionState::Processing).await;
                                        self.process_decision(&frame.ai_decision).await;
                                        self.set_state(ConnectionState::Listening).await;
                                    }
                                    Err(err) => {
                                        warn!(agent = %self.agent_id, %err, "undecodable frame dropped");
                                    }
                                }
                            }
                            Ok(Message::Close(_)) | Err(_) => break,
                            Ok(_) => {}
                        }
                    }
                    warn!(agent = %self.agent_id, "hub connection lost");
                }
                Err(err) => {
                    warn!(agent = %self.agent_id, %err, "hub connect failed");
                }
            }

            self.set_state(ConnectionState::Disconnected).await;
            let delay = self.retry.delay_for(attempt);
            attempt = attempt.saturating_add(1);
            info!(agent = %self.agent_id, ?delay, "reconnecting to hub");
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solargrid_chain::{ConfirmationPolicy, MockChain, ReceiptBehavior, Wallet};
    use solargrid_types::WalletAddress;
    use std::time::Duration;

    const TOKEN: &str = "0xA77884FE9B83C678689b98E877B2A2D5bAF53497";
    // Derives address 0x9d8a62f656a8d1615c1294fd71e9cfb3e4855a4f
    const KEY: &str = "0x4646464646464646464646464646464646464646464646464646464646464646";
    const OWN: &str = "0x9d8a62f656a8d1615c1294fd71e9cfb3e4855a4f";
    const OTHER_A: &str = "0xE860ADA0513Cd6490684BC23e04B27E410DE84FC";
    const OTHER_B: &str = "0x2BD22357d36c99EF3aE117D7cD4170A2Ea30B98A";

    fn line(sender: &str, amount: u64, recipient: &str) -> String {
        format!("Wallet {sender} sends {amount} SOLAR to Wallet {recipient} on Sonic Network.")
    }

    async fn agent(chain: Arc<MockChain>) -> (SettlementAgent, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let ledger = TransactionLedger::open(dir.path().join("tx.log")).unwrap();
        let wallet = Wallet::from_private_key(KEY, WalletAddress::new(TOKEN)).unwrap();
        let executor = TransactionExecutor::new(chain, wallet).with_confirmation_policy(
            ConfirmationPolicy {
                timeout: Duration::from_millis(50),
                poll_interval: Duration::from_millis(5),
                reconcile_polls: 2,
            },
        );
        let agent = SettlementAgent::new(
            "house3",
            executor,
            ledger,
            "ws://127.0.0.1:8765",
            RetryPolicy::default(),
        );
        (agent, dir)
    }

    #[tokio::test]
    async fn executes_own_transfer_and_records_it() {
        let chain = Arc::new(MockChain::new());
        let (agent, _dir) = agent(chain.clone()).await;

        let text = format!("House H3 owes for 2 kWh.\n{}", line(OWN, 2, OTHER_A));
        assert_eq!(agent.process_decision(&text).await, 1);

        let records = agent.ledger.all().await;
        assert_eq!(records.len(), 1);
        assert!(records[0].success);
        assert_eq!(records[0].amount, 2);
        assert_eq!(records[0].agent_id, "house3");
        assert_eq!(records[0].recipient, WalletAddress::new(OTHER_A));
        assert_eq!(chain.submitted_count().await, 1);
    }

    #[tokio::test]
    async fn unrelated_instructions_cause_no_chain_calls_or_records() {
        let chain = Arc::new(MockChain::new());
        let (agent, _dir) = agent(chain.clone()).await;

        let text = format!("{}\n{}", line(OTHER_A, 3, OTHER_B), line(OTHER_B, 1, OTHER_A));
        assert_eq!(agent.process_decision(&text).await, 0);
        assert_eq!(chain.submitted_count().await, 0);
        assert!(agent.ledger.is_empty().await);
    }

    #[tokio::test]
    async fn incoming_transfers_are_informational_only() {
        let chain = Arc::new(MockChain::new());
        let (agent, _dir) = agent(chain.clone()).await;

        let text = line(OTHER_A, 5, OWN);
        assert_eq!(agent.process_decision(&text).await, 0);
        assert_eq!(chain.submitted_count().await, 0);
        assert!(agent.ledger.is_empty().await);
    }

    #[tokio::test]
    async fn own_address_matches_case_insensitively() {
        let chain = Arc::new(MockChain::new());
        let (agent, _dir) = agent(chain.clone()).await;

        let upper = OWN.to_uppercase().replace("0X", "0x");
        let text = line(&upper, 1, OTHER_A);
        assert_eq!(agent.process_decision(&text).await, 1);
        assert_eq!(chain.submitted_count().await, 1);
    }

    #[tokio::test]
    async fn instructions_execute_in_parse_order() {
        let chain = Arc::new(MockChain::new());
        let (agent, _dir) = agent(chain.clone()).await;

        let text = format!(
            "{}\n{}\n{}",
            line(OWN, 1, OTHER_A),
            line(OTHER_A, 9, OTHER_B),
            line(OWN, 2, OTHER_B),
        );
        assert_eq!(agent.process_decision(&text).await, 2);

        let records = agent.ledger.all().await;
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].amount, 1);
        assert_eq!(records[0].recipient, WalletAddress::new(OTHER_A));
        assert_eq!(records[1].amount, 2);
        assert_eq!(records[1].recipient, WalletAddress::new(OTHER_B));
    }

    #[tokio::test]
    async fn failed_transfer_still_produces_a_record() {
        let chain = Arc::new(MockChain::new());
        chain.script_receipt(ReceiptBehavior::Revert).await;
        let (agent, _dir) = agent(chain.clone()).await;

        let text = line(OWN, 4, OTHER_A);
        assert_eq!(agent.process_decision(&text).await, 1);

        let records = agent.ledger.all().await;
        assert!(!records[0].success);
        assert!(records[0].tx_hash.is_some());
        assert!(records[0].error.as_deref().unwrap().contains("reverted"));
    }

    #[tokio::test]
    async fn empty_decision_is_nothing_to_do() {
        let chain = Arc::new(MockChain::new());
        let (agent, _dir) = agent(chain.clone()).await;
        assert_eq!(agent.process_decision("grid is balanced").await, 0);
    }
}
