use crate::units::format_ether;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

pub const DEFAULT_IPFS_GATEWAY: &str = "https://ipfs.io/ipfs/";
pub const METADATA_VERSION: &str = "1.0.0";

pub const FALLBACK_TITLE: &str = "Untitled Project";
pub const FALLBACK_SUMMARY: &str =
    "The detailed description of the project is not available, please try again later.";
pub const FALLBACK_IMAGE_URL: &str =
    "https://images.unsplash.com/photo-1521737604893-d14cc237f11d?auto=format&fit=crop&w=1600&q=80";
pub const FALLBACK_CATEGORY: &str = "Unclassified";

/// Display metadata for a campaign. Every field is non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalisedMetadata {
    pub title: String,
    pub summary: String,
    pub description: String,
    pub image_url: String,
    pub category: String,
}

impl NormalisedMetadata {
    pub fn fallback() -> Self {
        Self {
            title: FALLBACK_TITLE.to_string(),
            summary: FALLBACK_SUMMARY.to_string(),
            description: FALLBACK_SUMMARY.to_string(),
            image_url: FALLBACK_IMAGE_URL.to_string(),
            category: FALLBACK_CATEGORY.to_string(),
        }
    }

    pub fn is_fallback(&self) -> bool {
        *self == Self::fallback()
    }
}

fn text_field<'a>(raw: &'a Value, key: &str) -> Option<&'a str> {
    raw.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

fn first_text<'a>(raw: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|k| text_field(raw, k))
}

/// Normalise a metadata object from the indexer or an IPFS document.
///
/// Non-object input and missing fields fall back to placeholder values.
pub fn normalise_metadata(raw: &Value) -> NormalisedMetadata {
    let title = text_field(raw, "title").unwrap_or(FALLBACK_TITLE).to_string();
    let summary = first_text(raw, &["summary", "tagline", "description"])
        .unwrap_or(FALLBACK_SUMMARY)
        .to_string();
    let description = text_field(raw, "description")
        .map(str::to_string)
        .unwrap_or_else(|| summary.clone());
    let image_url = first_text(raw, &["imageUrl", "image", "cover"])
        .unwrap_or(FALLBACK_IMAGE_URL)
        .to_string();
    let category = text_field(raw, "category")
        .unwrap_or(FALLBACK_CATEGORY)
        .to_string();

    NormalisedMetadata {
        title,
        summary,
        description,
        image_url,
        category,
    }
}

/// Indexer-embedded metadata is only trusted when it carries a title.
pub fn has_embedded_title(raw: &Value) -> bool {
    text_field(raw, "title").is_some()
}

/// Map a metadata URI to a fetchable URL. `ipfs://` URIs go through the gateway.
pub fn resolve_metadata_url(uri: &str, gateway: &str) -> Option<String> {
    let uri = uri.trim();
    if uri.is_empty() {
        return None;
    }
    match uri.strip_prefix("ipfs://") {
        Some(cid) if cid.is_empty() => None,
        Some(cid) => Some(format!("{}/{}", gateway.trim_end_matches('/'), cid)),
        None => Some(uri.to_string()),
    }
}

pub fn compute_sha256_hex(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// Fields collected by the campaign creation form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CampaignForm {
    pub title: String,
    pub tagline: String,
    pub description: String,
    pub goal: String,
    /// `YYYY-MM-DD`, interpreted at midnight UTC.
    pub deadline: String,
    pub category: String,
    pub cover: String,
    /// One milestone per line.
    pub milestone: String,
}

impl CampaignForm {
    pub fn milestones(&self) -> Vec<String> {
        self.milestone
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FundingSection {
    pub goal_amount_eth: String,
    pub goal_amount_wei: String,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineSection {
    pub deadline: i64,
    #[serde(rename = "deadlineISO")]
    pub deadline_iso: String,
}

/// JSON document uploaded to metadata storage before `createCampaign`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignMetadataDocument {
    pub version: String,
    pub title: String,
    pub summary: String,
    pub tagline: String,
    pub description: String,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub milestones: Option<Vec<String>>,
    pub funding: FundingSection,
    pub timeline: TimelineSection,
    pub created_at: String,
}

impl CampaignMetadataDocument {
    /// Build the upload document from a validated form.
    pub fn build(form: &CampaignForm, goal_wei: u128, deadline: i64, now: DateTime<Utc>) -> Self {
        let cover = Some(form.cover.trim().to_string()).filter(|c| !c.is_empty());
        let milestones = Some(form.milestones()).filter(|m| !m.is_empty());
        let deadline_iso = Utc
            .timestamp_opt(deadline, 0)
            .single()
            .map(|d| d.to_rfc3339_opts(chrono::SecondsFormat::Millis, true))
            .unwrap_or_default();

        Self {
            version: METADATA_VERSION.to_string(),
            title: form.title.clone(),
            summary: form.tagline.clone(),
            tagline: form.tagline.clone(),
            description: form.description.clone(),
            category: form.category.clone(),
            image: cover.clone(),
            cover,
            milestones,
            funding: FundingSection {
                goal_amount_eth: format_ether(goal_wei),
                goal_amount_wei: goal_wei.to_string(),
                currency: "ETH".to_string(),
            },
            timeline: TimelineSection {
                deadline,
                deadline_iso,
            },
            created_at: now.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        }
    }

    pub fn to_json_pretty(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn content_hash(&self) -> anyhow::Result<String> {
        Ok(compute_sha256_hex(&self.to_json_pretty()?))
    }
}
