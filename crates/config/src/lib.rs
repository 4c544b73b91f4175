use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const APP_NAME: &str = "automint";
const KEYCHAIN_SERVICE: &str = "automint.credentials";

pub const SEPOLIA_CHAIN_ID: u64 = 11_155_111;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub store: StoreConfig,
    /// Account that owns a freshly created ledger.
    #[serde(default)]
    pub owner: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
    #[serde(default = "default_network_name")]
    pub name: String,
    pub rpc_url: Option<String>,
    pub contract_address: Option<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            chain_id: default_chain_id(),
            name: default_network_name(),
            rpc_url: None,
            contract_address: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

fn default_chain_id() -> u64 {
    SEPOLIA_CHAIN_ID
}

fn default_network_name() -> String {
    "Ethereum Sepolia".to_string()
}

fn default_store_path() -> PathBuf {
    PathBuf::from(".automint")
}

impl AppConfig {
    /// Apply `AUTOMINT_DB` and `AUTOMINT_OWNER` overrides.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(path) = std::env::var("AUTOMINT_DB") {
            self.store.path = PathBuf::from(path);
        }
        if let Ok(owner) = std::env::var("AUTOMINT_OWNER") {
            self.owner = Some(owner);
        }
        self
    }

    pub fn is_contract_deployed(&self) -> bool {
        self.network
            .contract_address
            .as_deref()
            .map(|a| !a.trim_start_matches("0x").chars().all(|c| c == '0'))
            .unwrap_or(false)
    }
}

pub fn load() -> Result<AppConfig> {
    let cfg: AppConfig = confy::load(APP_NAME, None).context("Failed to load app config")?;
    Ok(cfg.with_env_overrides())
}

pub fn store(cfg: &AppConfig) -> Result<()> {
    confy::store(APP_NAME, None, cfg).context("Failed to store app config")?;
    Ok(())
}

/// Store a secret in the OS keychain
pub fn store_secret(key: &str, value: &str) -> Result<()> {
    let entry = keyring::Entry::new(KEYCHAIN_SERVICE, key)?;
    entry.set_password(value)?;
    Ok(())
}

/// Retrieve a secret from the OS keychain
pub fn get_secret(key: &str) -> Result<String> {
    let entry = keyring::Entry::new(KEYCHAIN_SERVICE, key)?;
    let password = entry.get_password()?;
    Ok(password)
}

/// Delete a secret from the OS keychain
pub fn delete_secret(key: &str) -> Result<()> {
    let entry = keyring::Entry::new(KEYCHAIN_SERVICE, key)?;
    entry.delete_password()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_target_sepolia() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.network.chain_id, SEPOLIA_CHAIN_ID);
        assert_eq!(cfg.network.name, "Ethereum Sepolia");
        assert_eq!(cfg.store.path, PathBuf::from(".automint"));
        assert!(!cfg.is_contract_deployed());
    }

    #[test]
    fn zero_contract_address_is_not_deployed() {
        let mut cfg = AppConfig::default();
        cfg.network.contract_address = Some(format!("0x{}", "0".repeat(40)));
        assert!(!cfg.is_contract_deployed());
        cfg.network.contract_address = Some("0x5FbDB2315678afecb367f032d93F642f64180aa3".into());
        assert!(cfg.is_contract_deployed());
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let cfg: AppConfig = serde_json::from_str(r#"{"owner":"0xabc"}"#).unwrap();
        assert_eq!(cfg.owner.as_deref(), Some("0xabc"));
        assert_eq!(cfg.network.chain_id, SEPOLIA_CHAIN_ID);
    }
}
