mod rules;

pub use rules::{
    ensure_address, parse_deadline, validate_basics, validate_funding, validate_pledge_amount,
    DESCRIPTION_MAX_LENGTH, MAX_GOAL_WEI, MIN_GOAL_WEI, TAGLINE_MAX_LENGTH, TITLE_MAX_LENGTH,
};

use crate::metadata::CampaignForm;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// A form error with its user-facing message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    pub message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// On-chain arguments of a form that passed every step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatedCampaign {
    pub goal_wei: u128,
    pub deadline: i64,
}

/// Run the basics and funding steps; reports the first error of each step.
pub fn validate(form: &CampaignForm, now: DateTime<Utc>) -> Result<ValidatedCampaign, Vec<ValidationError>> {
    let mut errs = Vec::new();
    if let Err(e) = validate_basics(form) {
        errs.push(e);
    }
    match validate_funding(form, now) {
        Ok((goal_wei, deadline)) if errs.is_empty() => Ok(ValidatedCampaign { goal_wei, deadline }),
        Ok(_) => Err(errs),
        Err(e) => {
            errs.push(e);
            Err(errs)
        }
    }
}
