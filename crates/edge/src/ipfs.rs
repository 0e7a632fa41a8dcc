use anyhow::{bail, Context, Result};
use fundr_core::{
    metadata::{resolve_metadata_url, DEFAULT_IPFS_GATEWAY},
    normalise_metadata, CampaignMetadataDocument, NormalisedMetadata,
};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

pub const DETAIL_METADATA_TIMEOUT: Duration = Duration::from_secs(5);
pub const LISTING_METADATA_TIMEOUT: Duration = Duration::from_secs(8);

/// Fetches and normalises metadata documents, caching by URI.
///
/// Failures resolve to the fallback metadata, which is cached as well so a
/// dead URI is only tried once per process.
#[derive(Clone)]
pub struct MetadataFetcher {
    gateway: String,
    http_client: reqwest::Client,
    cache: Arc<RwLock<HashMap<String, NormalisedMetadata>>>,
}

impl Default for MetadataFetcher {
    fn default() -> Self {
        Self::new(DEFAULT_IPFS_GATEWAY)
    }
}

impl MetadataFetcher {
    pub fn new(gateway: impl Into<String>) -> Self {
        Self {
            gateway: gateway.into(),
            http_client: reqwest::Client::new(),
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn cached(&self, uri: &str) -> Option<NormalisedMetadata> {
        self.cache.read().await.get(uri).cloned()
    }

    /// Seed the cache, e.g. with metadata embedded by the indexer.
    pub async fn remember(&self, uri: &str, metadata: NormalisedMetadata) {
        if uri.is_empty() {
            return;
        }
        self.cache.write().await.insert(uri.to_string(), metadata);
    }

    pub async fn fetch(&self, uri: &str, timeout: Duration) -> NormalisedMetadata {
        if let Some(hit) = self.cached(uri).await {
            return hit;
        }

        let Some(url) = resolve_metadata_url(uri, &self.gateway) else {
            return NormalisedMetadata::fallback();
        };

        let metadata = match self.fetch_document(&url, timeout).await {
            Ok(raw) => normalise_metadata(&raw),
            Err(e) => {
                tracing::warn!(%uri, error = %e, "Metadata fetch failed, using fallback");
                NormalisedMetadata::fallback()
            }
        };
        self.remember(uri, metadata.clone()).await;
        metadata
    }

    async fn fetch_document(&self, url: &str, timeout: Duration) -> Result<Value> {
        let resp = self
            .http_client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .context("Failed to request metadata document")?;

        if !resp.status().is_success() {
            let status = resp.status();
            bail!("Metadata request failed: {}", status);
        }

        resp.json()
            .await
            .context("Failed to parse metadata document")
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    uri: Option<String>,
    gateway_url: Option<String>,
}

/// Uploads campaign metadata documents as a multipart `file` field.
#[derive(Clone)]
pub struct MetadataUploader {
    pub upload_url: String,
    http_client: reqwest::Client,
}

impl MetadataUploader {
    pub fn new(upload_url: impl Into<String>) -> Self {
        Self {
            upload_url: upload_url.into(),
            http_client: reqwest::Client::new(),
        }
    }

    /// Returns the URI to store on chain.
    pub async fn upload(&self, document: &CampaignMetadataDocument) -> Result<String> {
        let body = document.to_json_pretty()?;
        let part = reqwest::multipart::Part::text(body)
            .file_name("metadata.json")
            .mime_str("application/json")
            .context("Invalid metadata mime type")?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let resp = self
            .http_client
            .post(&self.upload_url)
            .multipart(form)
            .send()
            .await
            .context("Failed to upload campaign metadata")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            tracing::error!(%status, %body, "Metadata upload rejected");
            bail!("Failed to upload project metadata. Please try again.");
        }

        let upload: UploadResponse = resp
            .json()
            .await
            .context("Failed to parse upload response")?;
        let uri = pick_uri(upload)?;

        tracing::info!(%uri, hash = %document.content_hash()?, "Campaign metadata uploaded");
        Ok(uri)
    }
}

fn pick_uri(upload: UploadResponse) -> Result<String> {
    let present = |u: &String| !u.trim().is_empty();
    upload
        .uri
        .filter(present)
        .or(upload.gateway_url.filter(present))
        .context("Metadata upload did not return a valid URI.")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn unresolvable_uri_yields_fallback() {
        let fetcher = MetadataFetcher::default();
        let meta = fetcher.fetch("", DETAIL_METADATA_TIMEOUT).await;
        assert!(meta.is_fallback());
        let meta = fetcher.fetch("ipfs://", DETAIL_METADATA_TIMEOUT).await;
        assert!(meta.is_fallback());
    }

    #[tokio::test]
    async fn cache_is_consulted_first() {
        let fetcher = MetadataFetcher::default();
        let seeded = normalise_metadata(&serde_json::json!({ "title": "Seeded" }));
        fetcher.remember("ipfs://bafy", seeded.clone()).await;
        let meta = fetcher.fetch("ipfs://bafy", DETAIL_METADATA_TIMEOUT).await;
        assert_eq!(meta, seeded);
    }

    #[test]
    fn upload_uri_preference() {
        let both: UploadResponse =
            serde_json::from_str(r#"{"uri":"ipfs://a","gatewayUrl":"https://gw/a"}"#).unwrap();
        assert_eq!(pick_uri(both).unwrap(), "ipfs://a");
        let gateway: UploadResponse = serde_json::from_str(r#"{"gatewayUrl":"https://gw/a"}"#).unwrap();
        assert_eq!(pick_uri(gateway).unwrap(), "https://gw/a");
        let none: UploadResponse = serde_json::from_str("{}").unwrap();
        assert!(pick_uri(none).is_err());
    }
}
