use anyhow::Result;
use async_trait::async_trait;
use fundr_core::{
    metadata::has_embedded_title, normalise_metadata, units::wei_from_str, CampaignRecord,
    NormalisedMetadata, SortKey,
};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub const DEFAULT_PAGE_LIMIT: u32 = 12;

/// Free-form metadata object embedded by the indexer.
pub type EdgeMetadata = Value;

/// Campaign as mirrored by the indexer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeCampaign {
    pub address: String,
    #[serde(default)]
    pub creator: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub goal: String,
    #[serde(default)]
    pub deadline: i64,
    /// Contract status index; out-of-range values read as unknown.
    #[serde(default, deserialize_with = "status_index")]
    pub status: u8,
    #[serde(default, deserialize_with = "string_or_number")]
    pub total_pledged: String,
    #[serde(rename = "metadataURI", default)]
    pub metadata_uri: String,
    #[serde(default)]
    pub created_at: Option<i64>,
    #[serde(default)]
    pub created_block: Option<u64>,
    /// Metadata pre-fetched by the indexer, if any.
    #[serde(default)]
    pub metadata: Option<EdgeMetadata>,
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    })
}

fn status_index<'de, D>(deserializer: D) -> std::result::Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => Some(0),
    };
    Ok(raw.and_then(|v| u8::try_from(v).ok()).unwrap_or(u8::MAX))
}

impl EdgeCampaign {
    pub fn to_record(&self) -> CampaignRecord {
        CampaignRecord {
            address: self.address.clone(),
            creator: self.creator.clone(),
            goal_wei: wei_from_str(&self.goal),
            deadline: self.deadline,
            status_index: self.status,
            total_pledged_wei: wei_from_str(&self.total_pledged),
            metadata_uri: self.metadata_uri.clone(),
            created_at: self.created_at,
            created_block: self.created_block,
        }
    }

    /// Indexer metadata, when it is complete enough to skip IPFS.
    pub fn embedded_metadata(&self) -> Option<NormalisedMetadata> {
        self.metadata
            .as_ref()
            .filter(|m| has_embedded_title(m))
            .map(normalise_metadata)
    }
}

/// One page of `GET /campaigns`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignPage {
    #[serde(default)]
    pub campaigns: Vec<EdgeCampaign>,
    #[serde(default)]
    pub cursor: u64,
    #[serde(default)]
    pub next_cursor: Option<u64>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub total: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageQuery {
    pub cursor: u64,
    pub limit: u32,
    pub sort: SortKey,
}

impl Default for PageQuery {
    fn default() -> Self {
        Self {
            cursor: 0,
            limit: DEFAULT_PAGE_LIMIT,
            sort: SortKey::Latest,
        }
    }
}

#[async_trait]
pub trait CampaignSource: Send + Sync {
    async fn fetch_page(&self, query: &PageQuery) -> Result<CampaignPage>;
    /// `Ok(None)` when the indexer does not know the campaign.
    async fn fetch_campaign(&self, address: &str) -> Result<Option<EdgeCampaign>>;
}

pub mod client;
pub mod ipfs;
pub mod mock;

#[cfg(test)]
mod tests {
    use super::*;
    use fundr_core::ProjectStatus;
    use pretty_assertions::assert_eq;

    const PAGE: &str = r#"{
        "campaigns": [{
            "address": "0x52908400098527886E0F7030069857D2E4169EE7",
            "creator": "0x8617E340B3D01FA5F11F306F4090FD50E238070D",
            "goal": "2000000000000000000",
            "deadline": 1893456000,
            "status": 0,
            "totalPledged": 500000000000000000,
            "metadataURI": "ipfs://bafy",
            "createdAt": 1700000000,
            "createdBlock": 123,
            "metadata": { "title": "Solar", "image": "https://img/s.png" }
        }],
        "cursor": 0,
        "nextCursor": 12,
        "hasMore": true,
        "total": 30
    }"#;

    #[test]
    fn decodes_indexer_page() {
        let page: CampaignPage = serde_json::from_str(PAGE).unwrap();
        assert_eq!(page.next_cursor, Some(12));
        assert!(page.has_more);
        let c = &page.campaigns[0];
        assert_eq!(c.total_pledged, "500000000000000000");
        let record = c.to_record();
        assert_eq!(record.goal_wei, 2_000_000_000_000_000_000);
        assert_eq!(record.total_pledged_wei, 500_000_000_000_000_000);
        assert_eq!(record.metadata_uri, "ipfs://bafy");
        assert_eq!(record.created_block, Some(123));
    }

    #[test]
    fn embedded_metadata_needs_title() {
        let page: CampaignPage = serde_json::from_str(PAGE).unwrap();
        let meta = page.campaigns[0].embedded_metadata().unwrap();
        assert_eq!(meta.title, "Solar");
        assert_eq!(meta.image_url, "https://img/s.png");

        let mut untitled = page.campaigns[0].clone();
        untitled.metadata = Some(serde_json::json!({ "summary": "no title" }));
        assert_eq!(untitled.embedded_metadata(), None);
        untitled.metadata = None;
        assert_eq!(untitled.embedded_metadata(), None);
    }

    #[test]
    fn tolerates_sparse_records() {
        let c: EdgeCampaign = serde_json::from_str(r#"{ "address": "0x01", "goal": null }"#).unwrap();
        let record = c.to_record();
        assert_eq!(record.goal_wei, 0);
        assert_eq!(record.status_index, 0);
        assert_eq!(record.metadata_uri, "");
    }

    #[test]
    fn out_of_range_status_reads_as_active() {
        let c: EdgeCampaign = serde_json::from_str(r#"{ "address": "0x01", "status": 300 }"#).unwrap();
        assert_eq!(c.to_record().status(), ProjectStatus::Active);
        let c: EdgeCampaign = serde_json::from_str(r#"{ "address": "0x01", "status": -1 }"#).unwrap();
        assert_eq!(c.to_record().status(), ProjectStatus::Active);
        let c: EdgeCampaign = serde_json::from_str(r#"{ "address": "0x01", "status": "2" }"#).unwrap();
        assert_eq!(c.to_record().status(), ProjectStatus::Failed);
    }
}
