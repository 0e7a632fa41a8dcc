use super::{CampaignPage, CampaignSource, EdgeCampaign, PageQuery};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_EDGE_TIMEOUT: Duration = Duration::from_secs(8);

/// HTTP client for the campaign indexer.
#[derive(Clone)]
pub struct EdgeClient {
    pub base_url: String,
    timeout: Duration,
    http_client: reqwest::Client,
}

impl EdgeClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Arc<Self> {
        let base_url: String = base_url.into();
        Arc::new(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
            http_client: reqwest::Client::new(),
        })
    }

    fn page_url(&self, query: &PageQuery) -> String {
        format!(
            "{}/campaigns?cursor={}&limit={}&sort={}",
            self.base_url,
            query.cursor,
            query.limit,
            query.sort.edge_sort()
        )
    }
}

#[async_trait]
impl CampaignSource for EdgeClient {
    async fn fetch_page(&self, query: &PageQuery) -> Result<CampaignPage> {
        let url = self.page_url(query);
        let resp = self
            .http_client
            .get(&url)
            .header("Accept", "application/json")
            .timeout(self.timeout)
            .send()
            .await
            .context("Failed to query campaign list from edge")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!("Edge campaign list failed: {} - {}", status, body);
        }

        let page: CampaignPage = resp
            .json()
            .await
            .context("Failed to parse campaign page")?;

        tracing::debug!(
            cursor = query.cursor,
            count = page.campaigns.len(),
            has_more = page.has_more,
            "Fetched campaign page from edge"
        );
        Ok(page)
    }

    async fn fetch_campaign(&self, address: &str) -> Result<Option<EdgeCampaign>> {
        let url = format!("{}/campaigns/{}", self.base_url, address);
        let resp = self
            .http_client
            .get(&url)
            .header("Accept", "application/json")
            .timeout(self.timeout)
            .send()
            .await
            .context("Failed to query campaign from edge")?;

        if resp.status() == StatusCode::NOT_FOUND {
            tracing::debug!(%address, "Campaign not indexed by edge");
            return Ok(None);
        }
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!("Edge campaign query failed: {} - {}", status, body);
        }

        let campaign: EdgeCampaign = resp
            .json()
            .await
            .context("Failed to parse campaign response")?;
        Ok(Some(campaign))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fundr_core::SortKey;
    use pretty_assertions::assert_eq;

    #[test]
    fn builds_page_url() {
        let client = EdgeClient::new("https://edge.example/", DEFAULT_EDGE_TIMEOUT);
        let query = PageQuery {
            cursor: 24,
            limit: 12,
            sort: SortKey::Deadline,
        };
        assert_eq!(
            client.page_url(&query),
            "https://edge.example/campaigns?cursor=24&limit=12&sort=deadline"
        );
        let progress = PageQuery {
            sort: SortKey::Progress,
            ..query
        };
        assert!(client.page_url(&progress).ends_with("sort=latest"));
    }
}
