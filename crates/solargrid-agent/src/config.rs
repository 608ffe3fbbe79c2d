//! Agent configuration and wallet loading

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use solargrid_types::{RetryPolicy, WalletAddress};

use crate::{AgentError, Result};

/// Per-agent configuration, loaded from a JSON file at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Agent name; also the wallet file stem in the keystore
    pub name: String,
    /// Hub broadcast endpoint, e.g. `ws://127.0.0.1:8765`
    pub hub_url: String,
    /// Chain RPC endpoint
    pub rpc_url: String,
    /// SOLAR token contract address
    pub token_contract: WalletAddress,
    /// Where the transaction ledger lives
    pub ledger_path: PathBuf,
    /// Keystore directory holding `<name>_wallet.json`
    #[serde(default)]
    pub keystore_dir: Option<PathBuf>,
    /// Env var holding the private key, as an alternative to the keystore
    #[serde(default)]
    pub private_key_env: Option<String>,
    /// Reconnect backoff; defaults to 5s doubling, capped at 60s
    #[serde(default)]
    pub retry: Option<RetryPolicy>,
}

impl AgentConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| AgentError::Config {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self =
            serde_json::from_str(&raw).map_err(|source| AgentError::ConfigFormat {
                path: path.to_path_buf(),
                source,
            })?;
        // A bad multiplier must stop the process here, not panic the
        // reconnect loop later
        if let Some(retry) = &config.retry {
            if !retry.is_valid() {
                return Err(AgentError::ConfigRetry {
                    path: path.to_path_buf(),
                });
            }
        }
        Ok(config)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry.unwrap_or_default()
    }

    /// Resolve the private key: keystore file first, env var second.
    pub fn private_key(&self) -> Result<String> {
        if let Some(dir) = &self.keystore_dir {
            let stored = WalletStore::new(dir).load(&self.name)?;
            return Ok(stored.private_key);
        }
        if let Some(var) = &self.private_key_env {
            return std::env::var(var).map_err(|_| AgentError::MissingPrivateKey {
                var: var.clone(),
            });
        }
        Err(AgentError::MissingPrivateKey {
            var: "(no keystore_dir or private_key_env configured)".to_string(),
        })
    }

    /// Build the signing wallet, verifying a keystore address against the
    /// one the key actually derives.
    pub fn build_wallet(&self) -> Result<solargrid_chain::Wallet> {
        let key = self.private_key()?;
        let wallet = solargrid_chain::Wallet::from_private_key(&key, self.token_contract.clone())?;

        if let Some(dir) = &self.keystore_dir {
            let stored = WalletStore::new(dir).load(&self.name)?;
            if &stored.address != wallet.address() {
                return Err(AgentError::WalletMismatch {
                    stored: stored.address.to_string(),
                    derived: wallet.address().to_string(),
                });
            }
        }
        Ok(wallet)
    }
}

/// A wallet file as stored on disk: `{"address": ..., "private_key": ...}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredWallet {
    pub address: WalletAddress,
    pub private_key: String,
}

/// Loads `<dir>/<name>_wallet.json` files
pub struct WalletStore {
    dir: PathBuf,
}

impl WalletStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn load(&self, name: &str) -> Result<StoredWallet> {
        let path = self.dir.join(format!("{name}_wallet.json"));
        let raw = fs::read_to_string(&path).map_err(|_| AgentError::WalletNotFound {
            name: name.to_string(),
            path: path.clone(),
        })?;
        serde_json::from_str(&raw).map_err(|source| AgentError::WalletFormat { path, source })
    }
}
