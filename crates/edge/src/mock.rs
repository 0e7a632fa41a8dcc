use super::{CampaignPage, CampaignSource, EdgeCampaign, PageQuery};
use anyhow::{bail, Result};
use async_trait::async_trait;
use fundr_core::SortKey;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// In-memory indexer. Can be switched offline to exercise fallbacks.
#[derive(Default)]
pub struct MockSource {
    campaigns: Vec<EdgeCampaign>,
    offline: AtomicBool,
    requests: AtomicUsize,
}

impl MockSource {
    pub fn new(campaigns: Vec<EdgeCampaign>) -> Arc<Self> {
        Arc::new(Self {
            campaigns,
            ..Default::default()
        })
    }

    pub fn offline() -> Arc<Self> {
        let source = Self::default();
        source.offline.store(true, Ordering::SeqCst);
        Arc::new(source)
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    fn begin(&self) -> Result<()> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            bail!("Mock edge is offline");
        }
        Ok(())
    }
}

#[async_trait]
impl CampaignSource for MockSource {
    async fn fetch_page(&self, query: &PageQuery) -> Result<CampaignPage> {
        self.begin()?;
        let mut sorted = self.campaigns.clone();
        match query.sort {
            SortKey::Deadline => sorted.sort_by_key(|c| c.deadline),
            SortKey::Latest | SortKey::Progress => {
                sorted.sort_by(|a, b| b.created_at.cmp(&a.created_at))
            }
        }

        let total = sorted.len() as u64;
        let start = (query.cursor as usize).min(sorted.len());
        let end = (start + query.limit as usize).min(sorted.len());
        let has_more = end < sorted.len();
        Ok(CampaignPage {
            campaigns: sorted[start..end].to_vec(),
            cursor: query.cursor,
            next_cursor: has_more.then_some(end as u64),
            has_more,
            total,
        })
    }

    async fn fetch_campaign(&self, address: &str) -> Result<Option<EdgeCampaign>> {
        self.begin()?;
        Ok(self
            .campaigns
            .iter()
            .find(|c| c.address.eq_ignore_ascii_case(address))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn campaign(n: u8) -> EdgeCampaign {
        EdgeCampaign {
            address: format!("0x{:040x}", n),
            creator: format!("0x{:040x}", 0xff),
            goal: "1000000000000000000".into(),
            deadline: 2_000_000_000 - n as i64,
            status: 0,
            total_pledged: "0".into(),
            metadata_uri: String::new(),
            created_at: Some(1_700_000_000 + n as i64),
            created_block: Some(n as u64),
            metadata: None,
        }
    }

    #[tokio::test]
    async fn pages_through_campaigns() {
        let source = MockSource::new((1..=5).map(campaign).collect());
        let first = source
            .fetch_page(&PageQuery {
                limit: 2,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(first.campaigns.len(), 2);
        assert_eq!(first.campaigns[0].created_block, Some(5));
        assert_eq!(first.next_cursor, Some(2));

        let last = source
            .fetch_page(&PageQuery {
                cursor: 4,
                limit: 2,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(last.campaigns.len(), 1);
        assert!(!last.has_more);
        assert_eq!(last.next_cursor, None);
        assert_eq!(last.total, 5);
    }

    #[tokio::test]
    async fn offline_source_errors() {
        let source = MockSource::offline();
        assert!(source.fetch_page(&PageQuery::default()).await.is_err());
        assert!(source.fetch_campaign("0x01").await.is_err());
        assert_eq!(source.request_count(), 2);
    }

    #[tokio::test]
    async fn unknown_campaign_is_none() {
        let source = MockSource::new(vec![campaign(1)]);
        assert_eq!(source.fetch_campaign("0x1234").await.unwrap(), None);
        let found = source.fetch_campaign(&campaign(1).address.to_uppercase().replace("0X", "0x")).await.unwrap();
        assert!(found.is_some());
    }
}
