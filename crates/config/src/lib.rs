use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

const APP_NAME: &str = "fundr";
const KEYCHAIN_SERVICE: &str = "fundr.wallet";
const PRIVATE_KEY_ACCOUNT: &str = "private_key";

pub const ENV_FACTORY: &str = "NEXT_PUBLIC_FACTORY";
pub const ENV_EDGE: &str = "NEXT_PUBLIC_EDGE";
pub const ENV_RPC_URL: &str = "NEXT_PUBLIC_RPC_URL";
pub const ENV_CHAIN_ID: &str = "NEXT_PUBLIC_CHAIN_ID";
pub const ENV_PRIVATE_KEY: &str = "FUNDR_PRIVATE_KEY";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub wallet: WalletConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub factory: Option<String>,
    pub edge_url: Option<String>,
    pub rpc_url: Option<String>,
    pub chain_id: Option<u64>,
    #[serde(default = "default_ipfs_gateway")]
    pub ipfs_gateway: String,
    pub metadata_upload_url: Option<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            factory: None,
            edge_url: None,
            rpc_url: None,
            chain_id: None,
            ipfs_gateway: default_ipfs_gateway(),
            metadata_upload_url: None,
        }
    }
}

fn default_ipfs_gateway() -> String {
    "https://ipfs.io/ipfs/".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "default_edge_timeout")]
    pub edge_timeout_secs: u64,
    #[serde(default = "default_detail_timeout")]
    pub detail_metadata_timeout_secs: u64,
    #[serde(default = "default_listing_timeout")]
    pub listing_metadata_timeout_secs: u64,
    #[serde(default = "default_page_limit")]
    pub page_limit: u32,
    /// First block scanned for factory logs when the indexer is down.
    pub log_start_block: Option<u64>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            edge_timeout_secs: default_edge_timeout(),
            detail_metadata_timeout_secs: default_detail_timeout(),
            listing_metadata_timeout_secs: default_listing_timeout(),
            page_limit: default_page_limit(),
            log_start_block: None,
        }
    }
}

fn default_edge_timeout() -> u64 {
    8
}

fn default_detail_timeout() -> u64 {
    5
}

fn default_listing_timeout() -> u64 {
    8
}

fn default_page_limit() -> u32 {
    12
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletConfig {
    #[serde(default = "default_confirmations")]
    pub confirmations: u64,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            confirmations: default_confirmations(),
        }
    }
}

fn default_confirmations() -> u64 {
    1
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn optional(value: &str) -> Option<String> {
    match value.trim() {
        "" | "none" => None,
        v => Some(v.to_string()),
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("{} expects a number, got {:?}", key, value))
}

impl AppConfig {
    /// Apply `NEXT_PUBLIC_*` overrides. Empty or malformed values are ignored.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(factory) = non_empty(lookup(ENV_FACTORY)) {
            self.network.factory = Some(factory);
        }
        if let Some(edge) = non_empty(lookup(ENV_EDGE)) {
            self.network.edge_url = Some(edge);
        }
        if let Some(rpc) = non_empty(lookup(ENV_RPC_URL)) {
            self.network.rpc_url = Some(rpc);
        }
        if let Some(raw) = non_empty(lookup(ENV_CHAIN_ID)) {
            match raw.parse() {
                Ok(id) => self.network.chain_id = Some(id),
                Err(_) => tracing::warn!(value = %raw, "Ignoring malformed {}", ENV_CHAIN_ID),
            }
        }
    }

    /// Set a field by dotted key, e.g. `network.edge_url`. `none` clears
    /// optional fields.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "network.factory" => self.network.factory = optional(value),
            "network.edge_url" => self.network.edge_url = optional(value),
            "network.rpc_url" => self.network.rpc_url = optional(value),
            "network.chain_id" => {
                self.network.chain_id = match optional(value) {
                    Some(v) => Some(parse_number(key, &v)?),
                    None => None,
                }
            }
            "network.ipfs_gateway" => {
                self.network.ipfs_gateway = optional(value).unwrap_or_else(default_ipfs_gateway)
            }
            "network.metadata_upload_url" => self.network.metadata_upload_url = optional(value),
            "fetch.edge_timeout_secs" => self.fetch.edge_timeout_secs = parse_number(key, value)?,
            "fetch.detail_metadata_timeout_secs" => {
                self.fetch.detail_metadata_timeout_secs = parse_number(key, value)?
            }
            "fetch.listing_metadata_timeout_secs" => {
                self.fetch.listing_metadata_timeout_secs = parse_number(key, value)?
            }
            "fetch.page_limit" => self.fetch.page_limit = parse_number(key, value)?,
            "fetch.log_start_block" => {
                self.fetch.log_start_block = match optional(value) {
                    Some(v) => Some(parse_number(key, &v)?),
                    None => None,
                }
            }
            "wallet.confirmations" => self.wallet.confirmations = parse_number(key, value)?,
            other => bail!("Unknown config key {}", other),
        }
        Ok(())
    }

    pub fn to_pretty_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Stored settings with environment overrides applied.
pub fn load() -> Result<AppConfig> {
    let mut cfg = load_stored()?;
    cfg.apply_env_overrides(|key| std::env::var(key).ok());
    Ok(cfg)
}

/// Stored settings only, for editing.
pub fn load_stored() -> Result<AppConfig> {
    let cfg: AppConfig = confy::load(APP_NAME, None).context("Failed to load app config")?;
    Ok(cfg)
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

/// Retrieve a secret from the OS keychain; `None` when nothing is stored.
pub fn get_secret(key: &str) -> Result<Option<String>> {
    let entry = keyring::Entry::new(KEYCHAIN_SERVICE, key)?;
    match entry.get_password() {
        Ok(password) => Ok(Some(password)),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Delete a secret from the OS keychain
pub fn delete_secret(key: &str) -> Result<()> {
    let entry = keyring::Entry::new(KEYCHAIN_SERVICE, key)?;
    entry.delete_password()?;
    Ok(())
}

pub fn store_private_key(value: &str) -> Result<()> {
    store_secret(PRIVATE_KEY_ACCOUNT, value.trim())
}

pub fn delete_private_key() -> Result<()> {
    delete_secret(PRIVATE_KEY_ACCOUNT)
}

/// Signing key from `FUNDR_PRIVATE_KEY`, else the keychain.
pub fn private_key() -> Result<Option<String>> {
    if let Some(key) = non_empty(std::env::var(ENV_PRIVATE_KEY).ok()) {
        return Ok(Some(key));
    }
    get_secret(PRIVATE_KEY_ACCOUNT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_fetch_policy() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.fetch.edge_timeout_secs, 8);
        assert_eq!(cfg.fetch.detail_metadata_timeout_secs, 5);
        assert_eq!(cfg.fetch.listing_metadata_timeout_secs, 8);
        assert_eq!(cfg.fetch.page_limit, 12);
        assert_eq!(cfg.network.ipfs_gateway, "https://ipfs.io/ipfs/");
    }

    #[test]
    fn env_overrides_stored_values() {
        let mut cfg = AppConfig::default();
        cfg.network.edge_url = Some("https://stored".into());
        cfg.apply_env_overrides(env(&[
            (ENV_EDGE, " https://edge.example "),
            (ENV_RPC_URL, ""),
            (ENV_CHAIN_ID, "11155111"),
            ("DATABASE_URL", "postgres://ignored"),
        ]));
        assert_eq!(cfg.network.edge_url.as_deref(), Some("https://edge.example"));
        assert_eq!(cfg.network.rpc_url, None);
        assert_eq!(cfg.network.chain_id, Some(11155111));
    }

    #[test]
    fn malformed_chain_id_is_ignored() {
        let mut cfg = AppConfig::default();
        cfg.network.chain_id = Some(1);
        cfg.apply_env_overrides(env(&[(ENV_CHAIN_ID, "mainnet")]));
        assert_eq!(cfg.network.chain_id, Some(1));
    }

    #[test]
    fn set_by_dotted_key() {
        let mut cfg = AppConfig::default();
        cfg.set("network.rpc_url", "http://localhost:8545").unwrap();
        cfg.set("fetch.page_limit", "24").unwrap();
        cfg.set("fetch.log_start_block", "100").unwrap();
        assert_eq!(cfg.network.rpc_url.as_deref(), Some("http://localhost:8545"));
        assert_eq!(cfg.fetch.page_limit, 24);
        assert_eq!(cfg.fetch.log_start_block, Some(100));

        cfg.set("network.rpc_url", "none").unwrap();
        assert_eq!(cfg.network.rpc_url, None);
        assert!(cfg.set("fetch.page_limit", "many").is_err());
        assert!(cfg.set("network.unknown", "x").is_err());
    }

    #[test]
    fn sparse_stored_config_fills_defaults() {
        let cfg: AppConfig = serde_json::from_str(r#"{ "network": { "factory": "0xabc" } }"#).unwrap();
        assert_eq!(cfg.network.factory.as_deref(), Some("0xabc"));
        assert_eq!(cfg.network.ipfs_gateway, "https://ipfs.io/ipfs/");
        assert_eq!(cfg.fetch, FetchConfig::default());
    }
}
