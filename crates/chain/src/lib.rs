use anyhow::Result;
use async_trait::async_trait;
use fundr_core::{BackerRecord, CampaignAction, CampaignRecord};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Block windows tried, largest first, when scanning event logs.
pub const LOG_WINDOWS: [u64; 3] = [50_000, 10_000, 1_000];

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("no wallet key configured")]
    NoSigner,
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    #[error("RPC endpoint reports chain id {actual}, expected {expected}")]
    ChainIdMismatch { expected: u64, actual: u64 },
    #[error("timed out waiting for receipt of {0}")]
    ReceiptTimeout(String),
}

/// A campaign announced by the factory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedCampaign {
    pub address: String,
    pub block_number: u64,
}

/// Result of a mined transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutcome {
    pub tx_hash: String,
    pub success: bool,
    pub block_number: Option<u64>,
    /// Set for `createCampaign` receipts carrying a `CampaignCreated` log.
    pub created_campaign: Option<String>,
}

#[async_trait]
pub trait CampaignReader: Send + Sync {
    /// `getSummary` and `metadataURI` of one campaign.
    async fn campaign_summary(&self, address: &str) -> Result<CampaignRecord>;
    async fn pledge_of(&self, campaign: &str, backer: &str) -> Result<u128>;
    /// `Pledged` logs with block timestamps, in log order.
    async fn pledged_events(&self, campaign: &str) -> Result<Vec<BackerRecord>>;
    /// `CampaignCreated` logs of the factory, newest first.
    async fn created_campaigns(&self, factory: &str) -> Result<Vec<CreatedCampaign>>;
}

#[async_trait]
pub trait CampaignWallet: Send + Sync {
    fn address(&self) -> Option<String>;
    /// Sign and broadcast; returns the transaction hash.
    async fn submit(&self, action: &CampaignAction) -> Result<String>;
    async fn wait_for_receipt(&self, tx_hash: &str) -> Result<TxOutcome>;
}

/// `from` block for a window ending at `current`.
pub fn window_start(current: u64, window: u64) -> u64 {
    current.saturating_sub(window)
}

pub mod abi;
pub mod mock;
pub mod rpc;
