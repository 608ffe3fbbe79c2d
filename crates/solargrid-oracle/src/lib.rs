//! SolarGrid Oracle - decision oracle abstraction
//!
//! Given a structured energy report, the oracle returns free-text transfer
//! instructions in the fixed grammar the parser understands. The oracle is
//! a black box to the settlement pipeline: this crate only defines the
//! seam and two implementations.
//!
//! ## Providers
//!
//! - [`OpenAiOracle`]: any OpenAI-compatible chat-completions endpoint
//! - [`DeterministicOracle`]: LLM-free fallback that derives grid
//!   settlements directly from net energy, so the full pipeline runs
//!   without an API key
//!
//! LLM output is never trusted: whatever comes back is re-parsed against
//! the instruction grammar downstream, and anything off-grammar is
//! ignored there.

pub mod deterministic;
pub mod providers;

pub use deterministic::DeterministicOracle;
pub use providers::{OpenAiConfig, OpenAiOracle, ScriptedOracle};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use solargrid_types::{EnergyReport, WalletAddress};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors from the decision oracle
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("decision failed: {0}")]
    Decision(String),
}

pub type Result<T> = std::result::Result<T, OracleError>;

/// The decision seam: energy report in, instruction text out
#[async_trait]
pub trait DecisionOracle: Send + Sync {
    async fn decide(&self, report: &EnergyReport) -> Result<String>;
}

/// Maps house ids to wallet addresses, plus the Public Grid counter-party
///
/// Ordered map so prompts and deterministic output are stable across runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletDirectory {
    pub houses: BTreeMap<String, WalletAddress>,
    pub public_grid: WalletAddress,
}

impl WalletDirectory {
    pub fn wallet_for(&self, house_id: &str) -> Option<&WalletAddress> {
        self.houses.get(house_id)
    }
}
