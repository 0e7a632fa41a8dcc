use super::abi::{CAMPAIGN_ABI, CAMPAIGN_CREATED_EVENT, FACTORY_ABI, PLEDGED_EVENT};
use super::{
    window_start, CampaignReader, CampaignWallet, ChainError, CreatedCampaign, TxOutcome,
    LOG_WINDOWS,
};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use fundr_core::{units::format_ether, validation::ensure_address, BackerRecord, CampaignAction, CampaignRecord};
use std::collections::{BTreeSet, HashMap};
use std::str::FromStr;
use std::time::Duration;
use web3::{
    contract::{Contract, Options},
    ethabi::{self, RawLog, Token},
    signing::{Key, SecretKey, SecretKeyRef},
    transports::Http,
    types::{Address, BlockId, BlockNumber, FilterBuilder, Log, H256, U256, U64},
    Web3,
};

const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(3);
const RECEIPT_POLL_ATTEMPTS: u32 = 100;

/// JSON-RPC access to the factory and its campaigns.
pub struct Web3Chain {
    web3: Web3<Http>,
    chain_id: Option<u64>,
    signer: Option<SecretKey>,
    campaign_abi: ethabi::Contract,
    factory_abi: ethabi::Contract,
    start_block: Option<u64>,
    confirmations: u64,
    receipt_poll: Duration,
}

pub fn parse_address(value: &str) -> Result<Address> {
    let checked = ensure_address(value).ok_or_else(|| ChainError::InvalidAddress(value.to_string()))?;
    Address::from_str(&checked).map_err(|_| ChainError::InvalidAddress(value.to_string()).into())
}

/// Hex private key, with or without `0x`.
pub fn parse_private_key(value: &str) -> Result<SecretKey> {
    let trimmed = value.trim();
    SecretKey::from_str(trimmed.strip_prefix("0x").unwrap_or(trimmed))
        .map_err(|e| anyhow!("Invalid wallet private key: {}", e))
}

/// Address controlled by a hex private key.
pub fn signer_address(private_key: &str) -> Result<String> {
    let key = parse_private_key(private_key)?;
    Ok(hex_of(SecretKeyRef::new(&key).address()))
}

/// Full lowercase `0x` rendering of an address or hash.
fn hex_of<T: std::fmt::Debug>(value: T) -> String {
    format!("{:?}", value)
}

fn to_wei(value: U256, what: &str) -> Result<u128> {
    u128::try_from(value).map_err(|_| anyhow!("{} does not fit in 128 bits", what))
}

fn raw_log(log: &Log) -> RawLog {
    RawLog {
        topics: log.topics.clone(),
        data: log.data.0.clone(),
    }
}

fn log_param(parsed: &ethabi::Log, name: &str) -> Option<Token> {
    parsed
        .params
        .iter()
        .find(|p| p.name == name)
        .map(|p| p.value.clone())
}

/// Block number and tx hash of a mined log; pending logs yield `None`.
fn settled(log: &Log) -> Option<(u64, H256)> {
    Some((log.block_number?.as_u64(), log.transaction_hash?))
}

fn created_from_logs(event: &ethabi::Event, logs: &[Log]) -> Option<String> {
    logs.iter()
        .filter_map(|log| event.parse_log(raw_log(log)).ok())
        .find_map(|parsed| log_param(&parsed, "campaign").and_then(Token::into_address))
        .map(hex_of)
}

/// Block timestamps that resolved. A failed lookup leaves its pledges at 0.
fn timestamps_by_block(blocks: Vec<u64>, stamps: Vec<Result<i64>>) -> HashMap<u64, i64> {
    blocks
        .into_iter()
        .zip(stamps)
        .filter_map(|(block, stamp)| match stamp {
            Ok(ts) => Some((block, ts)),
            Err(e) => {
                tracing::warn!(block, error = %e, "Block timestamp unavailable");
                None
            }
        })
        .collect()
}

/// Arguments of the contract call, in ABI order. Sent as a slice so each
/// token is one argument.
fn call_params(action: &CampaignAction) -> Result<Vec<Token>> {
    Ok(match action {
        CampaignAction::Pledge { .. }
        | CampaignAction::Refund { .. }
        | CampaignAction::Finalize { .. } => Vec::new(),
        CampaignAction::Unpledge { amount_wei, .. } => vec![Token::Uint(U256::from(*amount_wei))],
        CampaignAction::CreateCampaign {
            goal_wei,
            deadline,
            metadata_uri,
            ..
        } => {
            let deadline = u64::try_from(*deadline).context("Deadline precedes the epoch")?;
            vec![
                Token::Uint(U256::from(*goal_wei)),
                Token::Uint(U256::from(deadline)),
                Token::String(metadata_uri.clone()),
            ]
        }
    })
}

impl Web3Chain {
    /// `chain_id`, when set, is checked against the endpoint before signing.
    pub fn new(rpc_url: &str, chain_id: Option<u64>) -> Result<Self> {
        let transport = Http::new(rpc_url).with_context(|| format!("Invalid RPC URL {}", rpc_url))?;
        Ok(Self {
            web3: Web3::new(transport),
            chain_id,
            signer: None,
            campaign_abi: ethabi::Contract::load(CAMPAIGN_ABI.as_bytes())
                .context("Failed to load campaign ABI")?,
            factory_abi: ethabi::Contract::load(FACTORY_ABI.as_bytes())
                .context("Failed to load factory ABI")?,
            start_block: None,
            confirmations: 1,
            receipt_poll: RECEIPT_POLL_INTERVAL,
        })
    }

    pub fn with_signer(self, private_key: &str) -> Result<Self> {
        Ok(self.with_secret_key(parse_private_key(private_key)?))
    }

    pub fn with_secret_key(mut self, key: SecretKey) -> Self {
        self.signer = Some(key);
        self
    }

    /// First block scanned for factory logs.
    pub fn with_start_block(mut self, start_block: Option<u64>) -> Self {
        self.start_block = start_block;
        self
    }

    pub fn with_confirmations(mut self, confirmations: u64) -> Self {
        self.confirmations = confirmations.max(1);
        self
    }

    fn campaign(&self, address: Address) -> Contract<Http> {
        Contract::new(self.web3.eth(), address, self.campaign_abi.clone())
    }

    async fn verify_chain_id(&self) -> Result<()> {
        let Some(expected) = self.chain_id else {
            return Ok(());
        };
        let actual = self
            .web3
            .eth()
            .chain_id()
            .await
            .context("Failed to read chain id")?
            .low_u64();
        if actual != expected {
            return Err(ChainError::ChainIdMismatch {
                expected,
                actual,
            }
            .into());
        }
        Ok(())
    }

    async fn current_block(&self) -> Result<u64> {
        Ok(self
            .web3
            .eth()
            .block_number()
            .await
            .context("Failed to read current block number")?
            .as_u64())
    }

    async fn logs_between(&self, address: Address, topic: H256, from: u64, to: u64) -> Result<Vec<Log>> {
        let filter = FilterBuilder::default()
            .address(vec![address])
            .topics(Some(vec![topic]), None, None, None)
            .from_block(BlockNumber::Number(U64::from(from)))
            .to_block(BlockNumber::Number(U64::from(to)))
            .build();
        self.web3
            .eth()
            .logs(filter)
            .await
            .with_context(|| format!("eth_getLogs {}..{} failed", from, to))
    }

    /// Scan from `start` if given, otherwise over shrinking recent windows.
    async fn scan_logs(&self, address: Address, topic: H256, start: Option<u64>) -> Result<Vec<Log>> {
        let current = self.current_block().await?;
        if let Some(start) = start {
            match self.logs_between(address, topic, start.min(current), current).await {
                Ok(logs) => return Ok(logs),
                Err(e) => tracing::warn!(start, error = %e, "Full log scan failed, using recent window"),
            }
        }

        let mut last_err = None;
        for window in LOG_WINDOWS {
            let from = window_start(current, window);
            match self.logs_between(address, topic, from, current).await {
                Ok(logs) => return Ok(logs),
                Err(e) => {
                    tracing::warn!(window, error = %e, "Log query failed, narrowing range");
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| anyhow!("Log query failed")))
    }

    async fn block_timestamp(&self, number: u64) -> Result<i64> {
        let block = self
            .web3
            .eth()
            .block(BlockId::Number(BlockNumber::Number(U64::from(number))))
            .await
            .with_context(|| format!("Failed to read block {}", number))?
            .with_context(|| format!("Block {} not found", number))?;
        Ok(block.timestamp.low_u64() as i64)
    }

    async fn wait_for_confirmations(&self, mined_in: u64) -> Result<()> {
        let target = mined_in + self.confirmations - 1;
        while self.current_block().await? < target {
            tokio::time::sleep(self.receipt_poll).await;
        }
        Ok(())
    }
}

#[async_trait]
impl CampaignReader for Web3Chain {
    async fn campaign_summary(&self, address: &str) -> Result<CampaignRecord> {
        let contract = self.campaign(parse_address(address)?);
        let summary = contract.query::<(Address, U256, U256, U256, U256), _, _, _>(
            "getSummary",
            (),
            None,
            Options::default(),
            None,
        );
        let uri = contract.query::<String, _, _, _>("metadataURI", (), None, Options::default(), None);
        let ((creator, goal, deadline, status, pledged), metadata_uri) = futures::try_join!(summary, uri)
            .with_context(|| format!("Failed to read campaign {}", address))?;

        Ok(CampaignRecord {
            address: address.trim().to_string(),
            creator: hex_of(creator),
            goal_wei: to_wei(goal, "goal")?,
            deadline: deadline.low_u64() as i64,
            status_index: status.low_u32().min(u8::MAX as u32) as u8,
            total_pledged_wei: to_wei(pledged, "total pledged")?,
            metadata_uri,
            created_at: None,
            created_block: None,
        })
    }

    async fn pledge_of(&self, campaign: &str, backer: &str) -> Result<u128> {
        let contract = self.campaign(parse_address(campaign)?);
        let backer = parse_address(backer)?;
        let pledged: U256 = contract
            .query("pledges", backer, None, Options::default(), None)
            .await
            .context("Failed to read pledge")?;
        to_wei(pledged, "pledge")
    }

    async fn pledged_events(&self, campaign: &str) -> Result<Vec<BackerRecord>> {
        let address = parse_address(campaign)?;
        let event = self.campaign_abi.event(PLEDGED_EVENT)?;
        let logs = self.scan_logs(address, event.signature(), None).await?;

        let mut pledges = Vec::new();
        for log in &logs {
            let Some((block_number, tx_hash)) = settled(log) else {
                continue;
            };
            let parsed = match event.parse_log(raw_log(log)) {
                Ok(parsed) => parsed,
                Err(e) => {
                    tracing::debug!(error = %e, "Skipping undecodable Pledged log");
                    continue;
                }
            };
            let backer = log_param(&parsed, "backer").and_then(Token::into_address);
            let amount = log_param(&parsed, "amount").and_then(Token::into_uint);
            if let (Some(backer), Some(amount)) = (backer, amount) {
                pledges.push((backer, to_wei(amount, "pledge")?, block_number, tx_hash));
            }
        }

        let blocks: Vec<u64> = pledges
            .iter()
            .map(|(_, _, block, _)| *block)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let stamps = futures::future::join_all(blocks.iter().map(|b| self.block_timestamp(*b))).await;
        let by_block = timestamps_by_block(blocks, stamps);

        Ok(pledges
            .into_iter()
            .map(|(backer, amount_wei, block_number, tx_hash)| BackerRecord {
                address: hex_of(backer),
                amount: format_ether(amount_wei),
                amount_wei,
                timestamp: by_block.get(&block_number).copied().unwrap_or_default(),
                block_number,
                tx_hash: hex_of(tx_hash),
            })
            .collect())
    }

    async fn created_campaigns(&self, factory: &str) -> Result<Vec<CreatedCampaign>> {
        let address = parse_address(factory)?;
        let event = self.factory_abi.event(CAMPAIGN_CREATED_EVENT)?;
        let logs = self.scan_logs(address, event.signature(), self.start_block).await?;

        let mut created: Vec<CreatedCampaign> = logs
            .iter()
            .filter_map(|log| {
                let (block_number, _) = settled(log)?;
                let parsed = event.parse_log(raw_log(log)).ok()?;
                let campaign = log_param(&parsed, "campaign")?.into_address()?;
                Some(CreatedCampaign {
                    address: hex_of(campaign),
                    block_number,
                })
            })
            .collect();
        created.reverse();
        Ok(created)
    }
}

#[async_trait]
impl CampaignWallet for Web3Chain {
    fn address(&self) -> Option<String> {
        self.signer
            .as_ref()
            .map(|key| hex_of(SecretKeyRef::new(key).address()))
    }

    async fn submit(&self, action: &CampaignAction) -> Result<String> {
        let key = self.signer.as_ref().ok_or(ChainError::NoSigner)?;
        self.verify_chain_id().await?;

        let abi = match action {
            CampaignAction::CreateCampaign { .. } => &self.factory_abi,
            _ => &self.campaign_abi,
        };
        let params = call_params(action)?;

        let contract = Contract::new(self.web3.eth(), parse_address(action.target())?, abi.clone());
        let function = action.function_name();
        let from = SecretKeyRef::new(key).address();

        let mut options = Options::default();
        if action.value_wei() > 0 {
            options.value = Some(U256::from(action.value_wei()));
        }
        let estimate = contract
            .estimate_gas(function, params.as_slice(), from, options.clone())
            .await
            .with_context(|| format!("Gas estimation for {} failed", function))?;
        options.gas = Some(estimate * U256::from(12) / U256::from(10));

        let hash = contract
            .signed_call(function, params.as_slice(), options, SecretKeyRef::new(key))
            .await
            .with_context(|| format!("Failed to send {} transaction", function))?;

        tracing::info!(
            function,
            target = %action.target(),
            tx_hash = %hex_of(hash),
            "Transaction submitted"
        );
        Ok(hex_of(hash))
    }

    async fn wait_for_receipt(&self, tx_hash: &str) -> Result<TxOutcome> {
        let hash = H256::from_str(tx_hash.trim())
            .map_err(|_| anyhow!("Invalid transaction hash {}", tx_hash))?;
        let created_event = self.factory_abi.event(CAMPAIGN_CREATED_EVENT)?;

        for _ in 0..RECEIPT_POLL_ATTEMPTS {
            let receipt = self
                .web3
                .eth()
                .transaction_receipt(hash)
                .await
                .context("Failed to query transaction receipt")?;
            if let Some(receipt) = receipt {
                let block_number = receipt.block_number.map(|b| b.as_u64());
                if let Some(mined_in) = block_number {
                    self.wait_for_confirmations(mined_in).await?;
                }
                return Ok(TxOutcome {
                    tx_hash: hex_of(hash),
                    success: receipt.status.map(|s| s.as_u64() == 1).unwrap_or(false),
                    block_number,
                    created_campaign: created_from_logs(created_event, &receipt.logs),
                });
            }
            tokio::time::sleep(self.receipt_poll).await;
        }
        bail!(ChainError::ReceiptTimeout(tx_hash.to_string()))
    }
}
