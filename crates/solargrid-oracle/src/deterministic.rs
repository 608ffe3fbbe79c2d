//! LLM-free decision oracle
//!
//! Settles every house directly against the Public Grid: deficit houses
//! pay the grid, surplus houses are paid by the grid, one token per kWh
//! rounded to the nearest whole token. Output is valid instruction
//! grammar by construction, so the pipeline runs end to end without an
//! LLM in the loop.

use async_trait::async_trait;
use std::fmt::Write;
use tracing::warn;

use solargrid_types::EnergyReport;

use crate::{DecisionOracle, Result, WalletDirectory};

pub struct DeterministicOracle {
    directory: WalletDirectory,
}

impl DeterministicOracle {
    pub fn new(directory: WalletDirectory) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl DecisionOracle for DeterministicOracle {
    async fn decide(&self, report: &EnergyReport) -> Result<String> {
        let mut out = format!(
            "Energy settlement for weather '{}'. {}\n",
            report.weather,
            report.public_grid_action()
        );

        for house in &report.houses {
            let Some(wallet) = self.directory.wallet_for(&house.house_id) else {
                warn!(house = %house.house_id, "no wallet configured, skipping");
                continue;
            };
            let tokens = house.net_energy().round().abs() as u64;
            if tokens == 0 {
                continue;
            }
            if house.net_energy() < 0.0 {
                // Deficit: the house pays the grid for the energy it drew
                let _ = writeln!(
                    out,
                    "Wallet {} sends {} SOLAR to Wallet {} on Sonic Network.",
                    wallet, tokens, self.directory.public_grid
                );
            } else {
                // Surplus: the grid pays the house for the energy it fed in
                let _ = writeln!(
                    out,
                    "Wallet {} sends {} SOLAR to Wallet {} on Sonic Network.",
                    self.directory.public_grid, tokens, wallet
                );
            }
        }
        Ok(out)
    }
}
