use super::ValidationError;
use crate::metadata::CampaignForm;
use crate::units::{parse_ether, WEI_PER_ETH};
use chrono::{DateTime, NaiveDate, Utc};

pub const TITLE_MAX_LENGTH: usize = 100;
pub const TAGLINE_MAX_LENGTH: usize = 200;
pub const DESCRIPTION_MAX_LENGTH: usize = 5000;
/// 0.01 ETH
pub const MIN_GOAL_WEI: u128 = WEI_PER_ETH / 100;
/// 10 000 ETH
pub const MAX_GOAL_WEI: u128 = 10_000 * WEI_PER_ETH;

/// A `0x`-prefixed, 20-byte hex address, trimmed.
pub fn ensure_address(value: &str) -> Option<String> {
    let trimmed = value.trim();
    let hex = trimmed.strip_prefix("0x")?;
    if hex.len() == 40 && hex.chars().all(|c| c.is_ascii_hexdigit()) {
        Some(trimmed.to_string())
    } else {
        None
    }
}

fn too_long(value: &str, max: usize) -> bool {
    value.trim().chars().count() > max
}

pub fn validate_basics(form: &CampaignForm) -> Result<(), ValidationError> {
    if form.title.trim().is_empty() {
        return Err(ValidationError::new("Please enter a project title."));
    }
    if too_long(&form.title, TITLE_MAX_LENGTH) {
        return Err(ValidationError::new(format!(
            "Project title must be at most {TITLE_MAX_LENGTH} characters."
        )));
    }
    if form.tagline.trim().is_empty() {
        return Err(ValidationError::new("Please enter a tagline."));
    }
    if too_long(&form.tagline, TAGLINE_MAX_LENGTH) {
        return Err(ValidationError::new(format!(
            "Tagline must be at most {TAGLINE_MAX_LENGTH} characters."
        )));
    }
    if form.description.trim().is_empty() {
        return Err(ValidationError::new("Please enter a description."));
    }
    if too_long(&form.description, DESCRIPTION_MAX_LENGTH) {
        return Err(ValidationError::new(format!(
            "Description must be at most {DESCRIPTION_MAX_LENGTH} characters."
        )));
    }
    Ok(())
}

/// Deadline date at midnight UTC, as unix seconds.
pub fn parse_deadline(value: &str) -> Option<i64> {
    let date = NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()?;
    Some(date.and_hms_opt(0, 0, 0)?.and_utc().timestamp())
}

/// Returns `(goal_wei, deadline)` when the funding step is valid.
pub fn validate_funding(form: &CampaignForm, now: DateTime<Utc>) -> Result<(u128, i64), ValidationError> {
    let goal = form.goal.trim();
    if goal.is_empty() {
        return Err(ValidationError::new("Please enter a valid goal amount."));
    }
    let goal_wei = parse_ether(goal)
        .map_err(|_| ValidationError::new("Please enter a valid goal amount (ETH)."))?;
    if goal_wei == 0 {
        return Err(ValidationError::new("Please enter a valid goal amount."));
    }
    if !(MIN_GOAL_WEI..=MAX_GOAL_WEI).contains(&goal_wei) {
        return Err(ValidationError::new(
            "Goal amount must be between 0.01 and 10000 ETH.",
        ));
    }

    if form.deadline.trim().is_empty() {
        return Err(ValidationError::new("Please select a deadline."));
    }
    match parse_deadline(&form.deadline) {
        Some(deadline) if deadline > now.timestamp() => Ok((goal_wei, deadline)),
        _ => Err(ValidationError::new(
            "The deadline must be later than the current time.",
        )),
    }
}

pub fn validate_pledge_amount(input: &str) -> Result<u128, ValidationError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new("Please select or enter the support amount."));
    }
    let wei = parse_ether(trimmed).map_err(|_| {
        ValidationError::new("Please enter a valid amount (support up to 18 decimal places).")
    })?;
    if wei == 0 {
        return Err(ValidationError::new("Support amount must be greater than 0."));
    }
    Ok(wei)
}
