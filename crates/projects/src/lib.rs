//! Campaign reads with fallback: indexer first, then the chain.

use anyhow::{bail, Result};
use chain::{CampaignReader, CreatedCampaign};
use edge::{
    ipfs::{MetadataFetcher, DETAIL_METADATA_TIMEOUT, LISTING_METADATA_TIMEOUT},
    CampaignPage, CampaignSource, EdgeCampaign, PageQuery,
};
use fundr_core::{
    sort_projects, validation::ensure_address, BackerRecord, CampaignRecord, DataSource,
    ProjectDetail, ProjectSummary,
};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

pub mod account;
pub mod explorer;

pub use account::{AccountOverview, PledgedProject};
pub use explorer::Explorer;

/// One page of project summaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectPage {
    pub projects: Vec<ProjectSummary>,
    pub cursor: u64,
    pub next_cursor: Option<u64>,
    pub has_more: bool,
    pub total: u64,
    pub source: DataSource,
}

pub struct ProjectService {
    edge: Option<Arc<dyn CampaignSource>>,
    chain: Option<Arc<dyn CampaignReader>>,
    factory: Option<String>,
    metadata: MetadataFetcher,
    detail_metadata_timeout: Duration,
    listing_metadata_timeout: Duration,
}

impl ProjectService {
    pub fn new(metadata: MetadataFetcher) -> Self {
        Self {
            edge: None,
            chain: None,
            factory: None,
            metadata,
            detail_metadata_timeout: DETAIL_METADATA_TIMEOUT,
            listing_metadata_timeout: LISTING_METADATA_TIMEOUT,
        }
    }

    pub fn with_edge(mut self, edge: Arc<dyn CampaignSource>) -> Self {
        self.edge = Some(edge);
        self
    }

    /// Chain reads; `factory` enables the listing fallback.
    pub fn with_chain(mut self, chain: Arc<dyn CampaignReader>, factory: Option<String>) -> Self {
        self.chain = Some(chain);
        self.factory = factory.and_then(|f| ensure_address(&f));
        self
    }

    pub fn with_metadata_timeouts(mut self, detail: Duration, listing: Duration) -> Self {
        self.detail_metadata_timeout = detail;
        self.listing_metadata_timeout = listing;
        self
    }

    pub fn has_chain(&self) -> bool {
        self.chain.is_some()
    }

    /// Detail view of a campaign, or `None` when no source can provide it.
    pub async fn fetch_project_detail(&self, id: &str) -> Option<ProjectDetail> {
        let Some(address) = ensure_address(id) else {
            tracing::debug!(%id, "Not a campaign address");
            return None;
        };

        if let Some(edge) = &self.edge {
            match edge.fetch_campaign(&address).await {
                Ok(Some(campaign)) => return Some(self.detail_from_edge(&campaign).await),
                Ok(None) => tracing::debug!(%address, "Edge has no record, trying chain"),
                Err(e) => tracing::warn!(%address, error = %e, "Edge detail failed, trying chain"),
            }
        }

        let chain = self.chain.as_ref()?;
        match chain.campaign_summary(&address).await {
            Ok(record) => {
                let metadata = self
                    .metadata
                    .fetch(&record.metadata_uri, self.detail_metadata_timeout)
                    .await;
                Some(record.to_detail(&metadata))
            }
            Err(e) => {
                tracing::warn!(%address, error = %e, "Chain detail read failed");
                None
            }
        }
    }

    async fn detail_from_edge(&self, campaign: &EdgeCampaign) -> ProjectDetail {
        let record = campaign.to_record();
        let metadata = match campaign.embedded_metadata() {
            Some(embedded) => embedded,
            None => {
                self.metadata
                    .fetch(&record.metadata_uri, self.detail_metadata_timeout)
                    .await
            }
        };
        record.to_detail(&metadata)
    }

    async fn summarise(&self, record: CampaignRecord, embedded: Option<EdgeCampaign>) -> ProjectSummary {
        let metadata = match embedded.as_ref().and_then(EdgeCampaign::embedded_metadata) {
            Some(m) => m,
            None => {
                self.metadata
                    .fetch(&record.metadata_uri, self.listing_metadata_timeout)
                    .await
            }
        };
        record.to_summary(&metadata)
    }

    /// A page of summaries from the indexer, or from factory logs when the
    /// indexer is unavailable.
    pub async fn fetch_projects_page(&self, query: &PageQuery) -> Result<ProjectPage> {
        if let Some(edge) = &self.edge {
            match edge.fetch_page(query).await {
                Ok(page) => return Ok(self.page_from_edge(page, query).await),
                Err(e) => tracing::warn!(cursor = query.cursor, error = %e, "Edge listing failed, using chain"),
            }
        }

        match (&self.chain, &self.factory) {
            (Some(chain), Some(factory)) => self.page_from_chain(chain.as_ref(), factory, query).await,
            _ => bail!("No campaign source is available"),
        }
    }

    async fn page_from_edge(&self, page: CampaignPage, query: &PageQuery) -> ProjectPage {
        let mut projects = join_all(
            page.campaigns
                .into_iter()
                .map(|c| self.summarise(c.to_record(), Some(c))),
        )
        .await;
        sort_projects(&mut projects, query.sort);

        ProjectPage {
            projects,
            cursor: page.cursor,
            next_cursor: page.next_cursor,
            has_more: page.has_more,
            total: page.total,
            source: DataSource::Edge,
        }
    }

    async fn page_from_chain(&self, chain: &dyn CampaignReader, factory: &str, query: &PageQuery) -> Result<ProjectPage> {
        let created = chain.created_campaigns(factory).await?;
        let total = created.len();
        let start = (query.cursor as usize).min(total);
        let end = (start + query.limit as usize).min(total);

        let records = join_all(created[start..end].iter().map(|c| read_created(chain, c))).await;
        let mut projects = join_all(
            records
                .into_iter()
                .flatten()
                .map(|record| self.summarise(record, None)),
        )
        .await;
        sort_projects(&mut projects, query.sort);

        let has_more = end < total;
        Ok(ProjectPage {
            projects,
            cursor: query.cursor,
            next_cursor: has_more.then_some(end as u64),
            has_more,
            total: total as u64,
            source: DataSource::Fallback,
        })
    }

    /// Pledges to a campaign, newest first. Chain errors yield an empty list.
    pub async fn fetch_backers(&self, campaign: &str) -> Vec<BackerRecord> {
        let (Some(chain), Some(address)) = (&self.chain, ensure_address(campaign)) else {
            return Vec::new();
        };
        match chain.pledged_events(&address).await {
            Ok(mut backers) => {
                backers.sort_by(|a, b| {
                    b.timestamp
                        .cmp(&a.timestamp)
                        .then(b.block_number.cmp(&a.block_number))
                });
                backers
            }
            Err(e) => {
                tracing::warn!(%address, error = %e, "Failed to load backers");
                Vec::new()
            }
        }
    }

    pub async fn pledge_of(&self, campaign: &str, backer: &str) -> Result<u128> {
        match &self.chain {
            Some(chain) => chain.pledge_of(campaign, backer).await,
            None => bail!("No RPC endpoint configured"),
        }
    }
}

async fn read_created(chain: &dyn CampaignReader, created: &CreatedCampaign) -> Option<CampaignRecord> {
    match chain.campaign_summary(&created.address).await {
        Ok(mut record) => {
            record.created_block = Some(created.block_number);
            Some(record)
        }
        Err(e) => {
            tracing::debug!(campaign = %created.address, error = %e, "Skipping unreadable campaign");
            None
        }
    }
}
