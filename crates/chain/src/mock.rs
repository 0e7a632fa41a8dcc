use super::{CampaignReader, CampaignWallet, ChainError, CreatedCampaign, TxOutcome};
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use fundr_core::{units::format_ether, BackerRecord, CampaignAction, CampaignRecord, ProjectStatus};
use rand::Rng;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct MockState {
    campaigns: Vec<CampaignRecord>,
    pledges: HashMap<(String, String), u128>,
    events: HashMap<String, Vec<BackerRecord>>,
    created: Vec<CreatedCampaign>,
    submitted: Vec<CampaignAction>,
    receipts: HashMap<String, TxOutcome>,
    block: u64,
}

/// In-memory chain that applies submitted actions to its own state.
#[derive(Default)]
pub struct MockChain {
    state: Mutex<MockState>,
    signer: Option<String>,
    offline: AtomicBool,
    reject_submissions: AtomicBool,
}

fn key(value: &str) -> String {
    value.trim().to_ascii_lowercase()
}

fn random_hex(bytes: usize) -> String {
    let raw: Vec<u8> = (0..bytes).map(|_| rand::thread_rng().gen()).collect();
    format!("0x{}", hex::encode(raw))
}

impl MockChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_signer(mut self, address: &str) -> Self {
        self.signer = Some(key(address));
        self
    }

    pub fn with_campaign(self, record: CampaignRecord) -> Self {
        {
            let mut state = self.lock();
            state.block += 1;
            let block_number = record.created_block.unwrap_or(state.block);
            state.created.insert(
                0,
                CreatedCampaign {
                    address: key(&record.address),
                    block_number,
                },
            );
            state.campaigns.push(record);
        }
        self
    }

    /// Record a pledge and its `Pledged` event.
    pub fn with_pledge(self, campaign: &str, backer: &str, amount_wei: u128, timestamp: i64) -> Self {
        {
            let mut state = self.lock();
            state.block += 1;
            let block_number = state.block;
            Self::credit(&mut state, campaign, backer, amount_wei);
            state.events.entry(key(campaign)).or_default().push(BackerRecord {
                address: key(backer),
                amount: format_ether(amount_wei),
                amount_wei,
                timestamp,
                block_number,
                tx_hash: random_hex(32),
            });
        }
        self
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn set_reject_submissions(&self, reject: bool) {
        self.reject_submissions.store(reject, Ordering::SeqCst);
    }

    pub fn submitted(&self) -> Vec<CampaignAction> {
        self.lock().submitted.clone()
    }

    pub fn campaign(&self, address: &str) -> Option<CampaignRecord> {
        let address = key(address);
        self.lock()
            .campaigns
            .iter()
            .find(|c| key(&c.address) == address)
            .cloned()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn ensure_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            bail!("Mock RPC endpoint is offline");
        }
        Ok(())
    }

    fn credit(state: &mut MockState, campaign: &str, backer: &str, amount_wei: u128) {
        *state.pledges.entry((key(campaign), key(backer))).or_default() += amount_wei;
        if let Some(record) = state.campaigns.iter_mut().find(|c| key(&c.address) == key(campaign)) {
            record.total_pledged_wei += amount_wei;
        }
    }

    fn apply(state: &mut MockState, action: &CampaignAction, sender: &str) -> Result<Option<String>> {
        let campaign_index = |state: &MockState, address: &str| {
            state
                .campaigns
                .iter()
                .position(|c| key(&c.address) == key(address))
                .ok_or_else(|| anyhow!("execution reverted: unknown campaign {}", address))
        };

        match action {
            CampaignAction::Pledge { campaign, amount_wei } => {
                campaign_index(state, campaign)?;
                Self::credit(state, campaign, sender, *amount_wei);
                Ok(None)
            }
            CampaignAction::Unpledge { campaign, amount_wei } => {
                let idx = campaign_index(state, campaign)?;
                let pledged = state.pledges.entry((key(campaign), key(sender))).or_default();
                if *pledged < *amount_wei {
                    bail!("execution reverted: amount exceeds pledge");
                }
                *pledged -= amount_wei;
                state.campaigns[idx].total_pledged_wei -= amount_wei;
                Ok(None)
            }
            CampaignAction::Refund { campaign } => {
                let idx = campaign_index(state, campaign)?;
                let refunded = state
                    .pledges
                    .remove(&(key(campaign), key(sender)))
                    .unwrap_or_default();
                if refunded == 0 {
                    bail!("execution reverted: nothing to refund");
                }
                let record = &mut state.campaigns[idx];
                record.total_pledged_wei = record.total_pledged_wei.saturating_sub(refunded);
                record.status_index = ProjectStatus::Failed as u8;
                Ok(None)
            }
            CampaignAction::Finalize { campaign } => {
                let idx = campaign_index(state, campaign)?;
                state.campaigns[idx].status_index = ProjectStatus::Successful as u8;
                Ok(None)
            }
            CampaignAction::CreateCampaign {
                goal_wei,
                deadline,
                metadata_uri,
                ..
            } => {
                let address = random_hex(20);
                state.block += 1;
                let block_number = state.block;
                state.campaigns.push(CampaignRecord {
                    address: address.clone(),
                    creator: sender.to_string(),
                    goal_wei: *goal_wei,
                    deadline: *deadline,
                    status_index: ProjectStatus::Active as u8,
                    total_pledged_wei: 0,
                    metadata_uri: metadata_uri.clone(),
                    created_at: None,
                    created_block: Some(block_number),
                });
                state.created.insert(
                    0,
                    CreatedCampaign {
                        address: address.clone(),
                        block_number,
                    },
                );
                Ok(Some(address))
            }
        }
    }
}

#[async_trait]
impl CampaignReader for MockChain {
    async fn campaign_summary(&self, address: &str) -> Result<CampaignRecord> {
        self.ensure_online()?;
        self.campaign(address)
            .ok_or_else(|| anyhow!("execution reverted: no campaign at {}", address))
    }

    async fn pledge_of(&self, campaign: &str, backer: &str) -> Result<u128> {
        self.ensure_online()?;
        Ok(self
            .lock()
            .pledges
            .get(&(key(campaign), key(backer)))
            .copied()
            .unwrap_or_default())
    }

    async fn pledged_events(&self, campaign: &str) -> Result<Vec<BackerRecord>> {
        self.ensure_online()?;
        Ok(self.lock().events.get(&key(campaign)).cloned().unwrap_or_default())
    }

    async fn created_campaigns(&self, _factory: &str) -> Result<Vec<CreatedCampaign>> {
        self.ensure_online()?;
        Ok(self.lock().created.clone())
    }
}

#[async_trait]
impl CampaignWallet for MockChain {
    fn address(&self) -> Option<String> {
        self.signer.clone()
    }

    async fn submit(&self, action: &CampaignAction) -> Result<String> {
        let sender = self.signer.clone().ok_or(ChainError::NoSigner)?;
        self.ensure_online()?;
        if self.reject_submissions.load(Ordering::SeqCst) {
            bail!("User rejected the request.");
        }

        let mut state = self.lock();
        state.submitted.push(action.clone());
        let tx_hash = random_hex(32);
        let (success, created_campaign) = match Self::apply(&mut state, action, &sender) {
            Ok(created) => (true, created),
            Err(e) => {
                tracing::debug!(error = %e, "Mock transaction reverted");
                (false, None)
            }
        };
        state.block += 1;
        let outcome = TxOutcome {
            tx_hash: tx_hash.clone(),
            success,
            block_number: Some(state.block),
            created_campaign,
        };
        state.receipts.insert(tx_hash.clone(), outcome);
        Ok(tx_hash)
    }

    async fn wait_for_receipt(&self, tx_hash: &str) -> Result<TxOutcome> {
        self.ensure_online()?;
        self.lock()
            .receipts
            .get(tx_hash)
            .cloned()
            .ok_or_else(|| ChainError::ReceiptTimeout(tx_hash.to_string()).into())
    }
}
