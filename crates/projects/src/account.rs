use super::ProjectService;
use anyhow::{anyhow, Result};
use edge::PageQuery;
use fundr_core::{units::format_ether, validation::ensure_address, ProjectSummary, SortKey};
use futures::future::join_all;
use serde::{Deserialize, Serialize};

const SCAN_PAGE_LIMIT: u32 = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PledgedProject {
    pub project: ProjectSummary,
    pub pledge_wei: u128,
    /// ETH, exact decimal.
    pub pledge: String,
}

/// Campaigns an address created or supports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountOverview {
    pub address: String,
    pub created: Vec<ProjectSummary>,
    pub pledged: Vec<PledgedProject>,
    /// Sum of this address's own pledges, not the campaigns' totals.
    pub total_pledged_wei: u128,
    /// Sum raised by campaigns this address created.
    pub total_raised_wei: u128,
}

/// Indexer amounts are untrusted; totals saturate instead of overflowing.
fn sum_wei(amounts: impl Iterator<Item = u128>) -> u128 {
    amounts.fold(0, u128::saturating_add)
}

impl ProjectService {
    async fn all_projects(&self) -> Result<Vec<ProjectSummary>> {
        let mut projects = Vec::new();
        let mut cursor = 0;
        loop {
            let page = self
                .fetch_projects_page(&PageQuery {
                    cursor,
                    limit: SCAN_PAGE_LIMIT,
                    sort: SortKey::Latest,
                })
                .await?;
            projects.extend(page.projects);
            match page.next_cursor {
                Some(next) if page.has_more && next > cursor => cursor = next,
                _ => break,
            }
        }
        Ok(projects)
    }

    pub async fn account_overview(&self, address: &str) -> Result<AccountOverview> {
        let address = ensure_address(address).ok_or_else(|| anyhow!("Invalid address {}", address))?;
        let projects = self.all_projects().await?;

        let created: Vec<ProjectSummary> = projects
            .iter()
            .filter(|p| p.creator.eq_ignore_ascii_case(&address))
            .cloned()
            .collect();

        let pledged = if self.has_chain() {
            let pledges = join_all(projects.iter().map(|p| self.pledge_of(&p.id, &address))).await;
            projects
                .into_iter()
                .zip(pledges)
                .filter_map(|(project, pledge)| match pledge {
                    Ok(wei) if wei > 0 => Some(PledgedProject {
                        project,
                        pledge_wei: wei,
                        pledge: format_ether(wei),
                    }),
                    Ok(_) => None,
                    Err(e) => {
                        tracing::debug!(campaign = %project.id, error = %e, "Pledge read failed");
                        None
                    }
                })
                .collect()
        } else {
            Vec::new()
        };

        Ok(AccountOverview {
            total_pledged_wei: sum_wei(pledged.iter().map(|p| p.pledge_wei)),
            total_raised_wei: sum_wei(created.iter().map(|p| p.pledged_wei)),
            address,
            created,
            pledged,
        })
    }
}
