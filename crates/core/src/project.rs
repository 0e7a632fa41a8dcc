//! Values derived client-side from a campaign's goal, pledges and deadline.

use crate::models::{ProjectDetail, ProjectStatus, ProjectSummary};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

const SECONDS_PER_DAY: i64 = 86_400;
const PROGRESS_SCALE: u128 = 10_000;

/// Fraction of the goal pledged, clamped to `[0, 1]`. A zero goal has no progress.
pub fn progress(goal_wei: u128, pledged_wei: u128) -> f64 {
    if goal_wei == 0 {
        return 0.0;
    }
    let ratio = match pledged_wei.checked_mul(PROGRESS_SCALE) {
        Some(scaled) => (scaled / goal_wei) as f64 / PROGRESS_SCALE as f64,
        None => pledged_wei as f64 / goal_wei as f64,
    };
    ratio.clamp(0.0, 1.0)
}

pub fn has_reached_goal(goal_wei: u128, pledged_wei: u128) -> bool {
    goal_wei > 0 && pledged_wei >= goal_wei
}

pub fn derived_status(status: ProjectStatus, goal_wei: u128, pledged_wei: u128) -> ProjectStatus {
    if status == ProjectStatus::Active && has_reached_goal(goal_wei, pledged_wei) {
        ProjectStatus::Successful
    } else {
        status
    }
}

/// Whole days until `deadline`, rounded up, never negative.
pub fn days_left(deadline: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let secs = (deadline - now).num_seconds();
    if secs <= 0 {
        return 0;
    }
    (secs + SECONDS_PER_DAY - 1) / SECONDS_PER_DAY
}

/// Common funding view over listing and detail records.
pub trait Funding {
    fn goal_wei(&self) -> u128;
    fn pledged_wei(&self) -> u128;
    fn status(&self) -> ProjectStatus;
    fn deadline(&self) -> DateTime<Utc>;
    fn creator(&self) -> &str;

    fn progress(&self) -> f64 {
        progress(self.goal_wei(), self.pledged_wei())
    }

    fn has_reached_goal(&self) -> bool {
        has_reached_goal(self.goal_wei(), self.pledged_wei())
    }

    fn derived_status(&self) -> ProjectStatus {
        derived_status(self.status(), self.goal_wei(), self.pledged_wei())
    }

    fn days_left(&self, now: DateTime<Utc>) -> i64 {
        days_left(self.deadline(), now)
    }

    /// Still accepting pledges.
    fn is_open(&self, now: DateTime<Utc>) -> bool {
        self.status() == ProjectStatus::Active && self.days_left(now) > 0 && !self.has_reached_goal()
    }

    fn is_creator(&self, viewer: &str) -> bool {
        !viewer.is_empty() && viewer.eq_ignore_ascii_case(self.creator())
    }
}

impl Funding for ProjectSummary {
    fn goal_wei(&self) -> u128 {
        self.goal_wei
    }
    fn pledged_wei(&self) -> u128 {
        self.pledged_wei
    }
    fn status(&self) -> ProjectStatus {
        self.status
    }
    fn deadline(&self) -> DateTime<Utc> {
        self.deadline
    }
    fn creator(&self) -> &str {
        &self.creator
    }
}

impl Funding for ProjectDetail {
    fn goal_wei(&self) -> u128 {
        self.goal_wei
    }
    fn pledged_wei(&self) -> u128 {
        self.pledged_wei
    }
    fn status(&self) -> ProjectStatus {
        self.status
    }
    fn deadline(&self) -> DateTime<Utc> {
        self.deadline
    }
    fn creator(&self) -> &str {
        &self.owner
    }
}

/// Which wallet actions a viewer may take on a campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionEligibility {
    pub can_pledge: bool,
    pub can_unpledge: bool,
    pub can_refund: bool,
    pub can_finalize: bool,
}

impl ActionEligibility {
    pub fn evaluate<F: Funding + ?Sized>(
        project: &F,
        my_pledge_wei: u128,
        viewer: Option<&str>,
        now: DateTime<Utc>,
    ) -> Self {
        let days_left = project.days_left(now);
        let reached = project.has_reached_goal();
        let active = project.status() == ProjectStatus::Active;
        let pledged = my_pledge_wei > 0;

        Self {
            can_pledge: project.is_open(now),
            can_unpledge: pledged && active && days_left > 0,
            can_refund: pledged
                && (project.derived_status() == ProjectStatus::Failed || (days_left == 0 && !reached)),
            can_finalize: viewer.is_some_and(|v| project.is_creator(v))
                && active
                && days_left == 0
                && reached,
        }
    }
}

/// Client-side ordering of a listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    /// Order served by the indexer.
    #[default]
    Latest,
    /// Soonest deadline first.
    Deadline,
    /// Most funded first.
    Progress,
}

impl SortKey {
    /// The indexer only sorts by `latest` or `deadline`.
    pub fn edge_sort(&self) -> &'static str {
        match self {
            Self::Deadline => "deadline",
            Self::Latest | Self::Progress => "latest",
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Latest => "latest",
            Self::Deadline => "deadline",
            Self::Progress => "progress",
        })
    }
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "latest" => Ok(Self::Latest),
            "deadline" => Ok(Self::Deadline),
            "progress" => Ok(Self::Progress),
            _ => Err("Invalid sort: latest, deadline and progress are supported".to_owned()),
        }
    }
}

pub fn sort_projects(projects: &mut [ProjectSummary], key: SortKey) {
    match key {
        SortKey::Latest => {}
        SortKey::Deadline => projects.sort_by_key(|p| p.deadline),
        SortKey::Progress => projects.sort_by(|a, b| {
            b.progress
                .partial_cmp(&a.progress)
                .unwrap_or(Ordering::Equal)
        }),
    }
}
