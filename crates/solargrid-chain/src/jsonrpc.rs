//! JSON-RPC backed [`TokenChain`] implementation
//!
//! Speaks the standard `eth_*` surface of any EVM node: `eth_call` for
//! token reads, `eth_getTransactionCount` with the `"pending"` tag for
//! nonces, `eth_sendRawTransaction` for broadcast.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use solargrid_types::WalletAddress;

use crate::{ChainError, Result, SignedTransfer, TokenChain, TransferReceipt};

/// `decimals()` selector
const DECIMALS_SELECTOR: &str = "0x313ce567";
/// `balanceOf(address)` selector
const BALANCE_OF_SELECTOR: &str = "0x70a08231";

/// A token chain reached over HTTP JSON-RPC
pub struct JsonRpcChain {
    client: reqwest::Client,
    rpc_url: String,
    token: WalletAddress,
}

#[derive(Deserialize)]
struct RpcResponse {
    result: Option<Value>,
    error: Option<RpcError>,
}

#[derive(Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawReceipt {
    status: String,
    block_number: String,
    gas_used: String,
}

impl JsonRpcChain {
    pub fn new(rpc_url: impl Into<String>, token: WalletAddress) -> Result<Self> {
        if !token.is_well_formed() {
            return Err(ChainError::InvalidAddress(token.to_string()));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            rpc_url: rpc_url.into(),
            token,
        })
    }

    /// Fail fast at startup if the node is unreachable
    pub async fn check_connectivity(&self) -> Result<u64> {
        self.chain_id().await
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        let response = self
            .client
            .post(&self.rpc_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ChainError::Transport(e.to_string()))?;
        let rpc: RpcResponse = response
            .json()
            .await
            .map_err(|e| ChainError::Protocol(e.to_string()))?;

        if let Some(err) = rpc.error {
            return Err(ChainError::Protocol(format!(
                "{method} failed ({}): {}",
                err.code, err.message
            )));
        }
        rpc.result
            .ok_or_else(|| ChainError::Protocol(format!("{method}: missing result")))
    }

    async fn eth_call(&self, data: String) -> Result<String> {
        let result = self
            .call(
                "eth_call",
                json!([{ "to": self.token.to_lowercase(), "data": data }, "latest"]),
            )
            .await?;
        result
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| ChainError::Protocol("eth_call: non-string result".into()))
    }
}

fn parse_quantity(hex_str: &str) -> Result<u128> {
    let stripped = hex_str.trim_start_matches("0x");
    if stripped.is_empty() {
        return Ok(0);
    }
    u128::from_str_radix(stripped, 16)
        .map_err(|e| ChainError::Protocol(format!("bad quantity {hex_str}: {e}")))
}

fn parse_u64(hex_str: &str) -> Result<u64> {
    u64::try_from(parse_quantity(hex_str)?)
        .map_err(|_| ChainError::Protocol(format!("quantity out of u64 range: {hex_str}")))
}

/// Parse the low 128 bits of a 32-byte `eth_call` return value
fn parse_word(hex_str: &str) -> Result<u128> {
    let stripped = hex_str.trim_start_matches("0x");
    let tail = if stripped.len() > 32 {
        &stripped[stripped.len() - 32..]
    } else {
        stripped
    };
    parse_quantity(tail)
}

fn pad_address(addr: &WalletAddress) -> String {
    format!("{:0>64}", addr.to_lowercase().trim_start_matches("0x"))
}

#[async_trait]
impl TokenChain for JsonRpcChain {
    async fn decimals(&self) -> Result<u8> {
        let raw = self.eth_call(DECIMALS_SELECTOR.to_string()).await?;
        u8::try_from(parse_word(&raw)?)
            .map_err(|_| ChainError::Protocol(format!("decimals out of range: {raw}")))
    }

    async fn balance_of(&self, owner: &WalletAddress) -> Result<u128> {
        if !owner.is_well_formed() {
            return Err(ChainError::InvalidAddress(owner.to_string()));
        }
        let data = format!("{BALANCE_OF_SELECTOR}{}", pad_address(owner));
        let raw = self.eth_call(data).await?;
        parse_word(&raw)
    }

    async fn pending_nonce(&self, owner: &WalletAddress) -> Result<u64> {
        let result = self
            .call(
                "eth_getTransactionCount",
                json!([owner.to_lowercase(), "pending"]),
            )
            .await?;
        let raw = result
            .as_str()
            .ok_or_else(|| ChainError::Protocol("eth_getTransactionCount: non-string".into()))?;
        parse_u64(raw)
    }

    async fn gas_price(&self) -> Result<u128> {
        let result = self.call("eth_gasPrice", json!([])).await?;
        let raw = result
            .as_str()
            .ok_or_else(|| ChainError::Protocol("eth_gasPrice: non-string".into()))?;
        parse_quantity(raw)
    }

    async fn chain_id(&self) -> Result<u64> {
        let result = self.call("eth_chainId", json!([])).await?;
        let raw = result
            .as_str()
            .ok_or_else(|| ChainError::Protocol("eth_chainId: non-string".into()))?;
        parse_u64(raw)
    }

    async fn submit_transfer(&self, transfer: SignedTransfer) -> Result<String> {
        let raw = format!("0x{}", hex::encode(&transfer.raw));
        let result = self
            .call("eth_sendRawTransaction", json!([raw]))
            .await
            .map_err(|e| match e {
                // A node-side rejection is a submission failure, not a
                // protocol problem
                ChainError::Protocol(msg) => ChainError::Submission(msg),
                other => other,
            })?;
        result
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| ChainError::Protocol("eth_sendRawTransaction: non-string".into()))
    }

    async fn receipt(&self, tx_hash: &str) -> Result<Option<TransferReceipt>> {
        let result = self
            .call("eth_getTransactionReceipt", json!([tx_hash]))
            .await?;
        if result.is_null() {
            return Ok(None);
        }
        let raw: RawReceipt = serde_json::from_value(result)
            .map_err(|e| ChainError::Protocol(format!("bad receipt: {e}")))?;
        Ok(Some(TransferReceipt {
            status: parse_quantity(&raw.status)? == 1,
            block_number: parse_u64(&raw.block_number)?,
            gas_used: parse_u64(&raw.gas_used)?,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantities_parse_from_hex() {
        assert_eq!(parse_quantity("0x0").unwrap(), 0);
        assert_eq!(parse_quantity("0x1").unwrap(), 1);
        assert_eq!(parse_quantity("0x12a05f200").unwrap(), 5_000_000_000);
        assert_eq!(parse_quantity("0x").unwrap(), 0);
        assert!(parse_quantity("0xzz").is_err());
    }

    #[test]
    fn oversized_quantities_are_protocol_errors() {
        assert_eq!(parse_u64("0x10").unwrap(), 16);
        // 72 bits: fits a u128, not a u64
        assert!(matches!(
            parse_u64("0xffffffffffffffffff"),
            Err(ChainError::Protocol(_))
        ));
    }

    #[test]
    fn words_take_the_low_bits() {
        let word = format!("0x{}{:032x}", "0".repeat(32), 18u128);
        assert_eq!(parse_word(&word).unwrap(), 18);
    }

    #[test]
    fn addresses_pad_to_32_bytes() {
        let addr = WalletAddress::new("0x2BD22357d36c99EF3aE117D7cD4170A2Ea30B98A");
        let padded = pad_address(&addr);
        assert_eq!(padded.len(), 64);
        assert!(padded.starts_with("000000000000000000000000"));
        assert!(padded.ends_with("2bd22357d36c99ef3ae117d7cd4170a2ea30b98a"));
    }

    #[test]
    fn rejects_malformed_token_address() {
        assert!(JsonRpcChain::new("http://localhost:8545", WalletAddress::new("0xbad")).is_err());
    }
}
