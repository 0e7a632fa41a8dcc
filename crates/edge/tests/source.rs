use edge::{mock::MockSource, CampaignPage, CampaignSource, PageQuery};
use fundr_core::{
    metadata::FALLBACK_TITLE, units::WEI_PER_ETH, NormalisedMetadata, ProjectStatus, SortKey,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;

const PAGE: &str = r#"{
    "campaigns": [
        {
            "address": "0x00000000000000000000000000000000000000a1",
            "creator": "0x00000000000000000000000000000000000000ff",
            "goal": "2000000000000000000",
            "deadline": 1900000000,
            "status": 0,
            "totalPledged": 500000000000000000,
            "metadataURI": "ipfs://bafy-a1",
            "createdAt": 1700000001,
            "metadata": { "title": "Community Garden", "tagline": "Beds for everyone", "category": "Local" }
        },
        {
            "address": "0x00000000000000000000000000000000000000a2",
            "creator": "0x00000000000000000000000000000000000000ff",
            "goal": "1000000000000000000",
            "deadline": 1800000000,
            "status": 1,
            "totalPledged": "1000000000000000000",
            "metadataURI": "ipfs://bafy-a2",
            "createdAt": 1700000002,
            "metadata": { "summary": "no title here" }
        }
    ],
    "cursor": 0,
    "nextCursor": null,
    "hasMore": false,
    "total": 2
}"#;

fn source() -> Arc<dyn CampaignSource> {
    let page: CampaignPage = serde_json::from_str(PAGE).unwrap();
    MockSource::new(page.campaigns)
}

#[tokio::test]
async fn indexer_records_become_summaries() {
    let source = source();
    let page = source
        .fetch_page(&PageQuery {
            cursor: 0,
            limit: 1,
            sort: SortKey::Deadline,
        })
        .await
        .unwrap();

    assert!(page.has_more);
    assert_eq!(page.next_cursor, Some(1));
    assert_eq!(page.total, 2);

    let campaign = &page.campaigns[0];
    assert_eq!(campaign.address, "0x00000000000000000000000000000000000000a2");
    assert_eq!(campaign.embedded_metadata(), None);

    let summary = campaign
        .to_record()
        .to_summary(&campaign.embedded_metadata().unwrap_or_else(NormalisedMetadata::fallback));
    assert_eq!(summary.status, ProjectStatus::Successful);
    assert_eq!(summary.pledged_wei, WEI_PER_ETH);
    assert_eq!(summary.progress, 1.0);
    assert_eq!(summary.title, FALLBACK_TITLE);
}

#[tokio::test]
async fn embedded_metadata_skips_the_gateway() {
    let source = source();
    let campaign = source
        .fetch_campaign("0x00000000000000000000000000000000000000A1")
        .await
        .unwrap()
        .unwrap();

    let metadata = campaign.embedded_metadata().unwrap();
    assert_eq!(metadata.title, "Community Garden");
    assert_eq!(metadata.summary, "Beds for everyone");
    assert_eq!(metadata.category, "Local");

    let record = campaign.to_record();
    assert_eq!(record.goal_wei, 2 * WEI_PER_ETH);
    assert_eq!(record.total_pledged_wei, WEI_PER_ETH / 2);
    assert_eq!(record.to_summary(&metadata).progress, 0.25);
}
