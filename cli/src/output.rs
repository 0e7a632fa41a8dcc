//! Text rendering for terminal output.

use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};
use fundr_core::{
    format::{format_address, format_date, format_eth, format_progress, DateStyle, DEFAULT_ETH_DECIMALS},
    units::to_eth,
    ActionEligibility, BackerRecord, Funding, ProjectDetail, ProjectSummary,
};
use queue::JobRecord;
use serde::Serialize;

const ADDRESS_CHARS: usize = 4;

pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn eth(value: f64) -> String {
    format_eth(value, DEFAULT_ETH_DECIMALS, true)
}

fn time_left<F: Funding>(project: &F, now: DateTime<Utc>) -> String {
    match project.days_left(now) {
        0 => "ended".to_string(),
        1 => "1 day left".to_string(),
        n => format!("{n} days left"),
    }
}

pub(crate) fn project_row(project: &ProjectSummary, now: DateTime<Utc>) -> String {
    format!(
        "{}  [{}]  {} of {} ({})  {}  {}",
        project.title,
        project.derived_status().label(),
        eth(project.pledged_amount),
        eth(project.goal_amount),
        format_progress(project.progress),
        time_left(project, now),
        project.id,
    )
}

pub(crate) fn detail_lines(project: &ProjectDetail, now: DateTime<Utc>) -> Vec<String> {
    let mut lines = vec![
        project.title.clone(),
        project.summary.clone(),
        String::new(),
        format!("Status:    {}", project.derived_status().label()),
        format!(
            "Raised:    {} of {} ({})",
            eth(project.pledged_amount),
            eth(project.goal_amount),
            format_progress(project.progress())
        ),
        format!(
            "Deadline:  {} ({})",
            format_date(project.deadline, DateStyle::Long),
            time_left(project, now)
        ),
        format!("Category:  {}", project.category),
        format!("Creator:   {}", project.owner),
        format!("Backers:   {}", project.backer_count),
        format!("Address:   {}", project.id),
    ];
    if !project.description.is_empty() {
        lines.push(String::new());
        lines.push(project.description.clone());
    }
    lines
}

pub(crate) fn pledge_line(pledge_wei: u128) -> String {
    format!("You have pledged: {}", eth(to_eth(pledge_wei)))
}

pub(crate) fn eligibility_line(eligibility: &ActionEligibility) -> String {
    let actions: Vec<&str> = [
        (eligibility.can_pledge, "pledge"),
        (eligibility.can_unpledge, "unpledge"),
        (eligibility.can_refund, "refund"),
        (eligibility.can_finalize, "finalize"),
    ]
    .into_iter()
    .filter_map(|(allowed, name)| allowed.then_some(name))
    .collect();

    if actions.is_empty() {
        "Available actions: none".to_string()
    } else {
        format!("Available actions: {}", actions.join(", "))
    }
}

pub(crate) fn backer_line(backer: &BackerRecord) -> String {
    let when = Utc
        .timestamp_opt(backer.timestamp, 0)
        .single()
        .map(|d| format_date(d, DateStyle::Long))
        .unwrap_or_else(|| format!("block {}", backer.block_number));
    format!(
        "{}  {}  {}",
        format_address(&backer.address, ADDRESS_CHARS),
        eth(to_eth(backer.amount_wei)),
        when
    )
}

pub(crate) fn job_line(job: &JobRecord) -> String {
    let mut line = format!(
        "{}  {}  {:<9}  {}  {}",
        job.created_at.format("%Y-%m-%d %H:%M"),
        job.job_id,
        job.state.as_str(),
        job.action,
        format_address(&job.target, ADDRESS_CHARS)
    );
    if let Some(tx) = &job.tx_hash {
        line.push_str(&format!("  tx {}", tx));
    }
    if let Some(err) = &job.last_error {
        line.push_str(&format!("  ({})", err));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use fundr_core::{units::WEI_PER_ETH, CampaignRecord, NormalisedMetadata};
    use pretty_assertions::assert_eq;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap()
    }

    fn record(pledged_wei: u128, deadline: i64) -> CampaignRecord {
        CampaignRecord {
            address: "0x00000000000000000000000000000000000000aa".into(),
            creator: "0x00000000000000000000000000000000000000a1".into(),
            goal_wei: 2 * WEI_PER_ETH,
            deadline,
            status_index: 0,
            total_pledged_wei: pledged_wei,
            metadata_uri: String::new(),
            created_at: None,
            created_block: None,
        }
    }

    #[test]
    fn renders_listing_row() {
        let deadline = now().timestamp() + 3 * 86_400;
        let summary = record(WEI_PER_ETH / 2, deadline).to_summary(&NormalisedMetadata::fallback());
        assert_eq!(
            project_row(&summary, now()),
            "Untitled Project  [In Progress]  0.50 ETH of 2 ETH (25%)  3 days left  \
             0x00000000000000000000000000000000000000aa"
        );
    }

    #[test]
    fn funded_project_reads_successful() {
        let summary = record(2 * WEI_PER_ETH, now().timestamp() - 1).to_summary(&NormalisedMetadata::fallback());
        assert!(project_row(&summary, now()).contains("[Successful]"));
        assert!(project_row(&summary, now()).contains("ended"));
    }

    #[test]
    fn lists_allowed_actions() {
        let eligibility = ActionEligibility {
            can_pledge: true,
            can_unpledge: true,
            can_refund: false,
            can_finalize: false,
        };
        assert_eq!(eligibility_line(&eligibility), "Available actions: pledge, unpledge");
        let none = ActionEligibility {
            can_pledge: false,
            can_unpledge: false,
            can_refund: false,
            can_finalize: false,
        };
        assert_eq!(eligibility_line(&none), "Available actions: none");
    }

    #[test]
    fn renders_backer() {
        let backer = BackerRecord {
            address: "0x1234567890abcdef1234567890abcdef12345678".into(),
            amount: "1.5".into(),
            amount_wei: 3 * WEI_PER_ETH / 2,
            timestamp: now().timestamp(),
            block_number: 10,
            tx_hash: "0xfeed".into(),
        };
        assert_eq!(backer_line(&backer), "0x1234...5678  1.5 ETH  January 1, 2030");
    }
}
