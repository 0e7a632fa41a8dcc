use anyhow::{anyhow, Result};
use chain::{
    rpc::{parse_private_key, Web3Chain},
    CampaignWallet,
};
use config::AppConfig;
use edge::{client::EdgeClient, ipfs::MetadataFetcher, CampaignSource};
use projects::ProjectService;
use std::sync::Arc;
use std::time::Duration;

/// Services built once per invocation from the effective config.
pub(crate) struct AppContext {
    pub(crate) cfg: AppConfig,
    pub(crate) service: Arc<ProjectService>,
    chain: Option<Arc<Web3Chain>>,
}

impl AppContext {
    pub(crate) fn load() -> Result<Self> {
        let cfg = config::load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to load stored config, using defaults");
            let mut cfg = AppConfig::default();
            cfg.apply_env_overrides(|key| std::env::var(key).ok());
            cfg
        });
        Self::from_config(cfg)
    }

    pub(crate) fn from_config(cfg: AppConfig) -> Result<Self> {
        let chain = create_chain(&cfg)?;
        let service = create_project_service(&cfg, chain.clone());
        Ok(Self {
            cfg,
            service: Arc::new(service),
            chain,
        })
    }

    /// Address of the configured signing key.
    pub(crate) fn wallet_address(&self) -> Option<String> {
        self.chain.as_ref().and_then(|chain| chain.address())
    }

    /// The signing chain client; `message` is shown when no key is configured.
    pub(crate) fn wallet(&self, message: &str) -> Result<Arc<Web3Chain>> {
        match &self.chain {
            Some(chain) if chain.address().is_some() => Ok(chain.clone()),
            _ => Err(anyhow!("{}", message)),
        }
    }

    /// Set up the transaction queue with the signing wallet.
    pub(crate) fn init_queue(&self, message: &str) -> Result<()> {
        let wallet = self.wallet(message)?;
        queue::init(queue::DEFAULT_DB_PATH, wallet, queue::audit::AuditLog::default())
    }
}

fn create_chain(cfg: &AppConfig) -> Result<Option<Arc<Web3Chain>>> {
    let Some(rpc_url) = cfg.network.rpc_url.as_deref() else {
        tracing::debug!("No RPC URL configured, chain reads disabled");
        return Ok(None);
    };

    let chain = Web3Chain::new(rpc_url, cfg.network.chain_id)?
        .with_start_block(cfg.fetch.log_start_block)
        .with_confirmations(cfg.wallet.confirmations);

    // A locked or missing keychain only disables signing.
    let key = config::private_key().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to read wallet key from keychain");
        None
    });
    Ok(Some(Arc::new(attach_signer(chain, key.as_deref()))))
}

/// Read commands keep working without a usable key; writes then ask for a wallet.
fn attach_signer(chain: Web3Chain, key: Option<&str>) -> Web3Chain {
    let Some(key) = key else {
        tracing::debug!("No wallet key configured");
        return chain;
    };
    match parse_private_key(key) {
        Ok(secret) => {
            tracing::debug!("Wallet key loaded");
            chain.with_secret_key(secret)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring unusable wallet key, signing disabled");
            chain
        }
    }
}

fn create_project_service(cfg: &AppConfig, chain: Option<Arc<Web3Chain>>) -> ProjectService {
    let metadata = MetadataFetcher::new(cfg.network.ipfs_gateway.clone());
    let mut service = ProjectService::new(metadata).with_metadata_timeouts(
        Duration::from_secs(cfg.fetch.detail_metadata_timeout_secs),
        Duration::from_secs(cfg.fetch.listing_metadata_timeout_secs),
    );

    if let Some(edge_url) = cfg.network.edge_url.as_deref() {
        tracing::debug!(%edge_url, "Using edge indexer");
        let edge: Arc<dyn CampaignSource> =
            EdgeClient::new(edge_url, Duration::from_secs(cfg.fetch.edge_timeout_secs));
        service = service.with_edge(edge);
    }
    if let Some(chain) = chain {
        service = service.with_chain(chain, cfg.network.factory.clone());
    }
    service
}
