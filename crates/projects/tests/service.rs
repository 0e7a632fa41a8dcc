use anyhow::Result;
use async_trait::async_trait;
use chain::mock::MockChain;
use edge::{ipfs::MetadataFetcher, mock::MockSource, CampaignPage, CampaignSource, EdgeCampaign, PageQuery};
use fundr_core::{
    metadata::FALLBACK_TITLE, normalise_metadata, units::WEI_PER_ETH, CampaignRecord, DataSource,
    SortKey,
};
use pretty_assertions::assert_eq;
use projects::{Explorer, ProjectService};
use serde_json::json;
use std::sync::Arc;

const CREATOR: &str = "0x00000000000000000000000000000000000000c0";
const BACKER: &str = "0x00000000000000000000000000000000000000b1";

fn address(n: u8) -> String {
    format!("0x{:040x}", n)
}

fn edge_campaign(n: u8) -> EdgeCampaign {
    EdgeCampaign {
        address: address(n),
        creator: CREATOR.into(),
        goal: (4 * WEI_PER_ETH).to_string(),
        deadline: 4_000_000_000 + n as i64,
        status: 0,
        total_pledged: (n as u128 * WEI_PER_ETH / 2).to_string(),
        metadata_uri: format!("ipfs://meta-{n}"),
        created_at: Some(1_700_000_000 + n as i64),
        created_block: Some(n as u64),
        metadata: Some(json!({ "title": format!("Project {n}"), "category": "Tech" })),
    }
}

fn chain_record(n: u8, metadata_uri: &str) -> CampaignRecord {
    CampaignRecord {
        address: address(n),
        creator: CREATOR.into(),
        goal_wei: 2 * WEI_PER_ETH,
        deadline: 4_000_000_000,
        status_index: 0,
        total_pledged_wei: 0,
        metadata_uri: metadata_uri.into(),
        created_at: None,
        created_block: None,
    }
}

fn service(edge: Option<Arc<MockSource>>, chain: Option<Arc<MockChain>>) -> ProjectService {
    let mut service = ProjectService::new(MetadataFetcher::default());
    if let Some(edge) = edge {
        service = service.with_edge(edge);
    }
    if let Some(chain) = chain {
        service = service.with_chain(chain, Some(address(0xff)));
    }
    service
}

#[tokio::test]
async fn detail_uses_indexer_metadata() {
    let edge = MockSource::new(vec![edge_campaign(1)]);
    let detail = service(Some(edge), None)
        .fetch_project_detail(&address(1))
        .await
        .unwrap();
    assert_eq!(detail.title, "Project 1");
    assert_eq!(detail.category, "Tech");
    assert_eq!(detail.owner, CREATOR);
    assert_eq!(detail.goal_wei, 4 * WEI_PER_ETH);
}

#[tokio::test]
async fn detail_falls_back_to_chain_when_indexer_fails() {
    let fetcher = MetadataFetcher::default();
    fetcher
        .remember("ipfs://solar", normalise_metadata(&json!({ "title": "Solar Roof" })))
        .await;
    let chain = Arc::new(MockChain::new().with_campaign(chain_record(2, "ipfs://solar")));
    let service = ProjectService::new(fetcher)
        .with_edge(MockSource::offline())
        .with_chain(chain, None);

    let detail = service.fetch_project_detail(&address(2)).await.unwrap();
    assert_eq!(detail.title, "Solar Roof");
    assert_eq!(detail.goal_amount, 2.0);
}

#[tokio::test]
async fn detail_falls_back_to_chain_when_not_indexed() {
    let edge = MockSource::new(vec![edge_campaign(1)]);
    let chain = Arc::new(MockChain::new().with_campaign(chain_record(3, "")));
    let detail = service(Some(edge.clone()), Some(chain))
        .fetch_project_detail(&address(3))
        .await
        .unwrap();
    assert_eq!(edge.request_count(), 1);
    assert_eq!(detail.title, FALLBACK_TITLE);
}

#[tokio::test]
async fn detail_is_none_when_every_source_fails() {
    let chain = Arc::new(MockChain::new());
    chain.set_offline(true);
    let service = service(Some(MockSource::offline()), Some(chain));
    assert_eq!(service.fetch_project_detail(&address(4)).await, None);
    assert_eq!(ProjectService::new(MetadataFetcher::default()).fetch_project_detail(&address(4)).await, None);
}

#[tokio::test]
async fn detail_rejects_malformed_ids() {
    let edge = MockSource::new(vec![edge_campaign(1)]);
    let service = service(Some(edge.clone()), None);
    assert_eq!(service.fetch_project_detail("not-an-address").await, None);
    assert_eq!(service.fetch_project_detail("0x1234").await, None);
    assert_eq!(edge.request_count(), 0);
}

#[tokio::test]
async fn listing_reports_its_source() {
    let edge = MockSource::new((1..=3).map(edge_campaign).collect());
    let page = service(Some(edge), None)
        .fetch_projects_page(&PageQuery::default())
        .await
        .unwrap();
    assert_eq!(page.source, DataSource::Edge);
    assert_eq!(page.projects.len(), 3);
    assert_eq!(page.projects[0].title, "Project 3");

    let chain = Arc::new(
        MockChain::new()
            .with_campaign(chain_record(5, ""))
            .with_campaign(chain_record(6, "")),
    );
    let page = service(Some(MockSource::offline()), Some(chain))
        .fetch_projects_page(&PageQuery::default())
        .await
        .unwrap();
    assert_eq!(page.source, DataSource::Fallback);
    assert_eq!(page.projects[0].id, address(6));
    assert_eq!(page.total, 2);
    assert!(!page.has_more);

    let unconfigured = service(Some(MockSource::offline()), None);
    assert!(unconfigured.fetch_projects_page(&PageQuery::default()).await.is_err());
}

#[tokio::test]
async fn progress_sort_is_applied_client_side() {
    let edge = MockSource::new((1..=4).map(edge_campaign).collect());
    let page = service(Some(edge), None)
        .fetch_projects_page(&PageQuery {
            sort: SortKey::Progress,
            ..Default::default()
        })
        .await
        .unwrap();
    let progress: Vec<f64> = page.projects.iter().map(|p| p.progress).collect();
    assert_eq!(progress, vec![0.5, 0.375, 0.25, 0.125]);
}

#[tokio::test]
async fn explorer_pages_until_exhausted() {
    let edge = MockSource::new((1..=5).map(edge_campaign).collect());
    let mut explorer = Explorer::new(Arc::new(service(Some(edge.clone()), None))).with_limit(2);

    explorer.reload().await;
    assert_eq!(explorer.projects.len(), 2);
    assert_eq!(explorer.next_cursor, Some(2));

    explorer.load_more().await;
    explorer.load_more().await;
    assert_eq!(explorer.projects.len(), 5);
    assert!(!explorer.has_more);
    assert_eq!(explorer.next_cursor, None);

    let requests = edge.request_count();
    explorer.load_more().await;
    assert_eq!(edge.request_count(), requests);

    explorer.reload().await;
    assert_eq!(explorer.projects.len(), 2);
    assert_eq!(explorer.cursor, 0);
}

#[tokio::test]
async fn explorer_keeps_projects_on_error() {
    let edge = MockSource::new((1..=5).map(edge_campaign).collect());
    let mut explorer = Explorer::new(Arc::new(service(Some(edge.clone()), None))).with_limit(2);
    explorer.reload().await;

    edge.set_offline(true);
    explorer.load_more().await;
    assert!(explorer.is_error);
    assert!(!explorer.is_loading);
    assert_eq!(explorer.projects.len(), 2);
}

struct StalledSource;

#[async_trait]
impl CampaignSource for StalledSource {
    async fn fetch_page(&self, query: &PageQuery) -> Result<CampaignPage> {
        Ok(CampaignPage {
            campaigns: vec![edge_campaign(1)],
            cursor: query.cursor,
            next_cursor: Some(query.cursor),
            has_more: true,
            total: 10,
        })
    }

    async fn fetch_campaign(&self, _address: &str) -> Result<Option<EdgeCampaign>> {
        Ok(None)
    }
}

#[tokio::test]
async fn explorer_stops_when_cursor_does_not_advance() {
    let service = ProjectService::new(MetadataFetcher::default()).with_edge(Arc::new(StalledSource));
    let mut explorer = Explorer::new(Arc::new(service));
    explorer.reload().await;
    assert!(!explorer.has_more);
    explorer.load_more().await;
    assert_eq!(explorer.projects.len(), 1);
}

#[tokio::test]
async fn backers_are_newest_first() {
    let chain = Arc::new(
        MockChain::new()
            .with_campaign(chain_record(7, ""))
            .with_pledge(&address(7), BACKER, WEI_PER_ETH, 1_700_000_100)
            .with_pledge(&address(7), CREATOR, WEI_PER_ETH / 2, 1_700_000_300)
            .with_pledge(&address(7), BACKER, WEI_PER_ETH / 4, 1_700_000_200),
    );
    let service = service(None, Some(chain.clone()));
    let backers = service.fetch_backers(&address(7)).await;
    let stamps: Vec<i64> = backers.iter().map(|b| b.timestamp).collect();
    assert_eq!(stamps, vec![1_700_000_300, 1_700_000_200, 1_700_000_100]);
    assert_eq!(backers[0].amount, "0.5");

    chain.set_offline(true);
    assert!(service.fetch_backers(&address(7)).await.is_empty());
    assert!(service.fetch_backers("garbage").await.is_empty());
}

#[tokio::test]
async fn account_overview_totals() {
    let mut other = chain_record(9, "");
    other.creator = address(0xee);
    let chain = Arc::new(
        MockChain::new()
            .with_campaign(chain_record(8, ""))
            .with_campaign(other)
            .with_pledge(&address(9), CREATOR, WEI_PER_ETH, 1_700_000_000)
            .with_pledge(&address(8), BACKER, 3 * WEI_PER_ETH, 1_700_000_000),
    );
    let overview = service(None, Some(chain))
        .account_overview(CREATOR)
        .await
        .unwrap();

    assert_eq!(overview.created.len(), 1);
    assert_eq!(overview.created[0].id, address(8));
    assert_eq!(overview.total_raised_wei, 3 * WEI_PER_ETH);
    assert_eq!(overview.pledged.len(), 1);
    assert_eq!(overview.pledged[0].project.id, address(9));
    assert_eq!(overview.total_pledged_wei, WEI_PER_ETH);
}
