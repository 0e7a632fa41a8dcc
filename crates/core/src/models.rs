use crate::metadata::NormalisedMetadata;
use crate::project::progress;
use crate::units::to_eth;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    Active,
    Successful,
    Failed,
    Cancelled,
}

impl ProjectStatus {
    /// Contract status index. Unknown indices read as active.
    pub fn from_index(index: u8) -> Self {
        match index {
            1 => Self::Successful,
            2 => Self::Failed,
            3 => Self::Cancelled,
            _ => Self::Active,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Successful => "successful",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Active => "In Progress",
            Self::Successful => "Successful",
            Self::Failed => "Not Achieved",
            Self::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Where a listing page came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    Edge,
    Fallback,
}

/// Raw campaign state in wei, as read from the indexer or the contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignRecord {
    pub address: String,
    pub creator: String,
    pub goal_wei: u128,
    /// Unix seconds.
    pub deadline: i64,
    pub status_index: u8,
    pub total_pledged_wei: u128,
    pub metadata_uri: String,
    pub created_at: Option<i64>,
    pub created_block: Option<u64>,
}

fn deadline_datetime(deadline: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(deadline, 0).single().unwrap_or_else(Utc::now)
}

impl CampaignRecord {
    pub fn status(&self) -> ProjectStatus {
        ProjectStatus::from_index(self.status_index)
    }

    pub fn to_summary(&self, metadata: &NormalisedMetadata) -> ProjectSummary {
        ProjectSummary {
            id: self.address.clone(),
            title: metadata.title.clone(),
            summary: metadata.summary.clone(),
            goal_amount: to_eth(self.goal_wei),
            pledged_amount: to_eth(self.total_pledged_wei),
            goal_wei: self.goal_wei,
            pledged_wei: self.total_pledged_wei,
            deadline: deadline_datetime(self.deadline),
            status: self.status(),
            creator: self.creator.clone(),
            category: metadata.category.clone(),
            image_url: metadata.image_url.clone(),
            progress: progress(self.goal_wei, self.total_pledged_wei),
        }
    }

    pub fn to_detail(&self, metadata: &NormalisedMetadata) -> ProjectDetail {
        ProjectDetail {
            id: self.address.clone(),
            title: metadata.title.clone(),
            summary: metadata.summary.clone(),
            description: metadata.description.clone(),
            goal_amount: to_eth(self.goal_wei),
            pledged_amount: to_eth(self.total_pledged_wei),
            goal_wei: self.goal_wei,
            pledged_wei: self.total_pledged_wei,
            deadline: deadline_datetime(self.deadline),
            status: self.status(),
            creator: self.creator.clone(),
            owner: self.creator.clone(),
            category: metadata.category.clone(),
            image_url: metadata.image_url.clone(),
            backer_count: 0,
        }
    }
}

/// Listing card view of a campaign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSummary {
    pub id: String,
    pub title: String,
    pub summary: String,
    pub goal_amount: f64,
    pub pledged_amount: f64,
    pub goal_wei: u128,
    pub pledged_wei: u128,
    pub deadline: DateTime<Utc>,
    pub status: ProjectStatus,
    pub creator: String,
    pub category: String,
    pub image_url: String,
    pub progress: f64,
}

/// Detail page view of a campaign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectDetail {
    pub id: String,
    pub title: String,
    pub summary: String,
    pub description: String,
    pub goal_amount: f64,
    pub pledged_amount: f64,
    pub goal_wei: u128,
    pub pledged_wei: u128,
    pub deadline: DateTime<Utc>,
    pub status: ProjectStatus,
    pub creator: String,
    pub owner: String,
    pub category: String,
    pub image_url: String,
    pub backer_count: u64,
}

/// One `Pledged` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackerRecord {
    pub address: String,
    /// ETH, exact decimal.
    pub amount: String,
    pub amount_wei: u128,
    pub timestamp: i64,
    pub block_number: u64,
    pub tx_hash: String,
}

/// A predefined contract call submitted from a wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignAction {
    Pledge {
        campaign: String,
        amount_wei: u128,
    },
    Unpledge {
        campaign: String,
        amount_wei: u128,
    },
    Refund {
        campaign: String,
    },
    Finalize {
        campaign: String,
    },
    CreateCampaign {
        factory: String,
        goal_wei: u128,
        deadline: i64,
        metadata_uri: String,
    },
}

impl CampaignAction {
    pub fn function_name(&self) -> &'static str {
        match self {
            Self::Pledge { .. } => "pledge",
            Self::Unpledge { .. } => "unpledge",
            Self::Refund { .. } => "refund",
            Self::Finalize { .. } => "finalize",
            Self::CreateCampaign { .. } => "createCampaign",
        }
    }

    /// Contract the call is sent to.
    pub fn target(&self) -> &str {
        match self {
            Self::Pledge { campaign, .. }
            | Self::Unpledge { campaign, .. }
            | Self::Refund { campaign }
            | Self::Finalize { campaign } => campaign,
            Self::CreateCampaign { factory, .. } => factory,
        }
    }

    /// Native value attached to the call.
    pub fn value_wei(&self) -> u128 {
        match self {
            Self::Pledge { amount_wei, .. } => *amount_wei,
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::WEI_PER_ETH;
    use pretty_assertions::assert_eq;

    fn record() -> CampaignRecord {
        CampaignRecord {
            address: "0x00000000000000000000000000000000000000aa".into(),
            creator: "0x00000000000000000000000000000000000000bb".into(),
            goal_wei: 2 * WEI_PER_ETH,
            deadline: 1_893_456_000,
            status_index: 0,
            total_pledged_wei: WEI_PER_ETH / 2,
            metadata_uri: "ipfs://cid".into(),
            created_at: None,
            created_block: None,
        }
    }

    #[test]
    fn maps_status_indices() {
        assert_eq!(ProjectStatus::from_index(0), ProjectStatus::Active);
        assert_eq!(ProjectStatus::from_index(1), ProjectStatus::Successful);
        assert_eq!(ProjectStatus::from_index(2), ProjectStatus::Failed);
        assert_eq!(ProjectStatus::from_index(3), ProjectStatus::Cancelled);
        assert_eq!(ProjectStatus::from_index(9), ProjectStatus::Active);
        assert_eq!(ProjectStatus::Failed.label(), "Not Achieved");
    }

    #[test]
    fn summary_carries_metadata_and_amounts() {
        let meta = NormalisedMetadata::fallback();
        let summary = record().to_summary(&meta);
        assert_eq!(summary.goal_amount, 2.0);
        assert_eq!(summary.pledged_amount, 0.5);
        assert_eq!(summary.progress, 0.25);
        assert_eq!(summary.title, meta.title);
        assert_eq!(summary.deadline.to_rfc3339(), "2030-01-01T00:00:00+00:00");
    }

    #[test]
    fn detail_owner_is_creator() {
        let detail = record().to_detail(&NormalisedMetadata::fallback());
        assert_eq!(detail.owner, detail.creator);
        assert_eq!(detail.backer_count, 0);
    }

    #[test]
    fn action_routing() {
        let pledge = CampaignAction::Pledge {
            campaign: "0xabc".into(),
            amount_wei: 5,
        };
        assert_eq!(pledge.function_name(), "pledge");
        assert_eq!(pledge.value_wei(), 5);
        assert_eq!(pledge.target(), "0xabc");

        let unpledge = CampaignAction::Unpledge {
            campaign: "0xabc".into(),
            amount_wei: 5,
        };
        assert_eq!(unpledge.value_wei(), 0);

        let create = CampaignAction::CreateCampaign {
            factory: "0xf".into(),
            goal_wei: 1,
            deadline: 2,
            metadata_uri: "ipfs://x".into(),
        };
        assert_eq!(create.target(), "0xf");
        let json = serde_json::to_string(&create).unwrap();
        assert!(json.starts_with(r#"{"create_campaign":"#));
        let back: CampaignAction = serde_json::from_str(&json).unwrap();
        assert_eq!(back, create);
    }
}
