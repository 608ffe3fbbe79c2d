//! Wallet address type
//!
//! Addresses travel through the pipeline in whatever casing the oracle
//! produced them; equality and hashing are case-insensitive on the hex
//! payload so that `0xAbC…` and `0xabc…` name the same wallet.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// A hex wallet address (`0x` + 40 hex digits when well-formed)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WalletAddress(String);

impl WalletAddress {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The address exactly as it was received
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lowercased form, used for comparisons and on-chain encoding
    pub fn to_lowercase(&self) -> String {
        self.0.to_ascii_lowercase()
    }

    /// True iff the string is `0x` followed by exactly 40 hex digits
    pub fn is_well_formed(&self) -> bool {
        let Some(hex_part) = self.0.strip_prefix("0x") else {
            return false;
        };
        hex_part.len() == 40 && hex_part.chars().all(|c| c.is_ascii_hexdigit())
    }

    /// The 20 address bytes, if the address is well-formed
    pub fn to_bytes(&self) -> Option<[u8; 20]> {
        if !self.is_well_formed() {
            return None;
        }
        let mut out = [0u8; 20];
        let hex_part = &self.0[2..];
        for (i, byte) in out.iter_mut().enumerate() {
            let pair = &hex_part[i * 2..i * 2 + 2];
            *byte = u8::from_str_radix(pair, 16).ok()?;
        }
        Some(out)
    }
}

impl PartialEq for WalletAddress {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl Eq for WalletAddress {}

impl Hash for WalletAddress {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for b in self.0.bytes() {
            state.write_u8(b.to_ascii_lowercase());
        }
    }
}

impl fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WalletAddress {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}
