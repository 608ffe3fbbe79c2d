//! SolarGrid Types - Canonical domain types for the settlement pipeline
//!
//! This crate contains the foundational types shared by every solargrid
//! crate, with zero dependencies on the rest of the workspace:
//!
//! - Wallet addresses with case-insensitive equality
//! - Energy telemetry reports (one per settlement round)
//! - Parsed transfer instructions
//! - Transaction records as persisted by the ledger
//! - The reconnect backoff policy shared by hub and agents
//!
//! # Invariants
//!
//! 1. Two `WalletAddress` values are equal iff their hex payloads are
//!    equal case-insensitively
//! 2. Every `Instruction` carries `amount > 0`
//! 3. `TransactionRecord` is append-only data — nothing in this workspace
//!    mutates a record after it is built

pub mod address;
pub mod instruction;
pub mod record;
pub mod report;
pub mod retry;

pub use address::*;
pub use instruction::*;
pub use record::*;
pub use report::*;
pub use retry::*;
