//! Parsed transfer instructions

use crate::WalletAddress;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One transfer directive extracted from a decision broadcast
///
/// Invariant: `amount > 0`. The parser never emits zero-amount
/// instructions, so downstream code can rely on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub sender: WalletAddress,
    pub recipient: WalletAddress,
    /// Whole SOLAR tokens; scaled by the token's decimals at submission
    pub amount: u64,
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {} ({} SOLAR)",
            self.sender, self.recipient, self.amount
        )
    }
}
