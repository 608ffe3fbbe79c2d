//! Wallet key handling and legacy transaction signing
//!
//! One wallet is owned by exactly one executor instance; the private key
//! never leaves this type.

use k256::ecdsa::SigningKey;
use sha3::{Digest, Keccak256};
use solargrid_types::WalletAddress;

use crate::rlp;
use crate::{ChainError, Result, SignedTransfer, TransferCall};

/// ERC-20 `transfer(address,uint256)` selector
const TRANSFER_SELECTOR: [u8; 4] = [0xa9, 0x05, 0x9c, 0xbb];

/// A secp256k1 wallet for signing token transfers
pub struct Wallet {
    address: WalletAddress,
    key: SigningKey,
    token: WalletAddress,
}

impl Wallet {
    /// Build a wallet from a hex private key (with or without `0x`).
    ///
    /// The address is derived from the key, so a config file cannot pair
    /// the wrong address with a key. `token` is the SOLAR contract the
    /// wallet transfers against.
    pub fn from_private_key(private_key_hex: &str, token: WalletAddress) -> Result<Self> {
        let stripped = private_key_hex.trim().trim_start_matches("0x");
        let key_bytes = hex::decode(stripped)
            .map_err(|e| ChainError::Signing(format!("private key is not hex: {e}")))?;
        let key = SigningKey::from_slice(&key_bytes)
            .map_err(|e| ChainError::Signing(format!("invalid private key: {e}")))?;

        let address = derive_address(&key);
        if !token.is_well_formed() {
            return Err(ChainError::InvalidAddress(token.to_string()));
        }
        Ok(Self {
            address,
            key,
            token,
        })
    }

    pub fn address(&self) -> &WalletAddress {
        &self.address
    }

    pub fn token(&self) -> &WalletAddress {
        &self.token
    }

    /// Sign `call` as an EIP-155 legacy ERC-20 transfer transaction.
    pub fn sign_transfer(&self, call: &TransferCall) -> Result<SignedTransfer> {
        let to_bytes = call
            .to
            .to_bytes()
            .ok_or_else(|| ChainError::InvalidAddress(call.to.to_string()))?;
        let token_bytes = self
            .token
            .to_bytes()
            .ok_or_else(|| ChainError::InvalidAddress(self.token.to_string()))?;
        let data = transfer_calldata(&to_bytes, call.value);

        // Sighash covers (nonce, gasPrice, gas, to, value, data, chainId, 0, 0)
        let mut payload = Vec::new();
        rlp::encode_uint(&mut payload, call.nonce as u128);
        rlp::encode_uint(&mut payload, call.gas_price);
        rlp::encode_uint(&mut payload, call.gas_limit as u128);
        rlp::encode_bytes(&mut payload, &token_bytes);
        rlp::encode_uint(&mut payload, 0); // no native value, token transfer only
        rlp::encode_bytes(&mut payload, &data);
        rlp::encode_uint(&mut payload, call.chain_id as u128);
        rlp::encode_uint(&mut payload, 0);
        rlp::encode_uint(&mut payload, 0);
        let sighash = Keccak256::digest(rlp::encode_list(&payload));

        let (signature, recovery_id) = self
            .key
            .sign_prehash_recoverable(&sighash)
            .map_err(|e| ChainError::Signing(e.to_string()))?;

        let v = call.chain_id * 2 + 35 + u64::from(recovery_id.to_byte());
        let r = signature.r().to_bytes();
        let s = signature.s().to_bytes();

        let mut signed = Vec::new();
        rlp::encode_uint(&mut signed, call.nonce as u128);
        rlp::encode_uint(&mut signed, call.gas_price);
        rlp::encode_uint(&mut signed, call.gas_limit as u128);
        rlp::encode_bytes(&mut signed, &token_bytes);
        rlp::encode_uint(&mut signed, 0);
        rlp::encode_bytes(&mut signed, &data);
        rlp::encode_uint(&mut signed, v as u128);
        rlp::encode_bytes(&mut signed, strip_leading_zeros(&r));
        rlp::encode_bytes(&mut signed, strip_leading_zeros(&s));

        Ok(SignedTransfer {
            raw: rlp::encode_list(&signed),
        })
    }
}

/// ABI-encode `transfer(to, value)`
fn transfer_calldata(to: &[u8; 20], value: u128) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + 32 + 32);
    data.extend_from_slice(&TRANSFER_SELECTOR);
    data.extend_from_slice(&[0u8; 12]);
    data.extend_from_slice(to);
    data.extend_from_slice(&[0u8; 16]);
    data.extend_from_slice(&value.to_be_bytes());
    data
}

fn derive_address(key: &SigningKey) -> WalletAddress {
    let public = key.verifying_key().to_encoded_point(false);
    // Skip the 0x04 uncompressed-point tag
    let hash = Keccak256::digest(&public.as_bytes()[1..]);
    WalletAddress::new(format!("0x{}", hex::encode(&hash[12..])))
}

fn strip_leading_zeros(bytes: &[u8]) -> &[u8] {
    let first = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    &bytes[first..]
}
