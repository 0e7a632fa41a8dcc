use super::{ProjectPage, ProjectService};
use edge::{PageQuery, DEFAULT_PAGE_LIMIT};
use fundr_core::{DataSource, ProjectSummary, SortKey};
use std::sync::Arc;

/// Paginated browsing state over [`ProjectService::fetch_projects_page`].
pub struct Explorer {
    service: Arc<ProjectService>,
    limit: u32,
    sort: SortKey,
    pub projects: Vec<ProjectSummary>,
    pub cursor: u64,
    pub next_cursor: Option<u64>,
    pub has_more: bool,
    pub is_loading: bool,
    pub is_error: bool,
    pub source: DataSource,
    pub total: u64,
}

impl Explorer {
    pub fn new(service: Arc<ProjectService>) -> Self {
        Self {
            service,
            limit: DEFAULT_PAGE_LIMIT,
            sort: SortKey::Latest,
            projects: Vec::new(),
            cursor: 0,
            next_cursor: None,
            has_more: true,
            is_loading: false,
            is_error: false,
            source: DataSource::Edge,
            total: 0,
        }
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit.max(1);
        self
    }

    pub fn with_sort(mut self, sort: SortKey) -> Self {
        self.sort = sort;
        self
    }

    /// Fetch the page at `cursor`, replacing or extending the list.
    /// Failures set `is_error` and keep the projects already loaded.
    pub async fn load_page(&mut self, cursor: u64, replace: bool) {
        self.is_loading = true;
        self.is_error = false;

        let query = PageQuery {
            cursor,
            limit: self.limit,
            sort: self.sort,
        };
        match self.service.fetch_projects_page(&query).await {
            Ok(page) => self.apply(page, replace),
            Err(e) => {
                tracing::error!(cursor, error = %e, "Failed to load campaigns");
                self.is_error = true;
            }
        }
        self.is_loading = false;
    }

    fn apply(&mut self, page: ProjectPage, replace: bool) {
        if replace {
            self.projects = page.projects;
        } else {
            self.projects.extend(page.projects);
        }
        self.cursor = page.cursor;
        self.total = page.total;
        self.source = page.source;

        match page.next_cursor {
            Some(next) if page.has_more && next > page.cursor => {
                self.next_cursor = Some(next);
                self.has_more = true;
            }
            stalled => {
                if page.has_more {
                    tracing::warn!(cursor = page.cursor, next = ?stalled, "Page cursor did not advance, stopping");
                }
                self.next_cursor = None;
                self.has_more = false;
            }
        }
    }

    /// Append the next page. Does nothing while loading or on the last page.
    pub async fn load_more(&mut self) {
        if self.is_loading || !self.has_more {
            return;
        }
        let Some(next) = self.next_cursor else {
            return;
        };
        self.load_page(next, false).await;
    }

    pub async fn reload(&mut self) {
        self.load_page(0, true).await;
    }
}
