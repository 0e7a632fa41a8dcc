//! Campaign records, unit conversion, metadata normalization and the
//! client-side rules shared by every Fundr front end.

pub mod format;
pub mod metadata;
pub mod models;
pub mod project;
pub mod units;
pub mod validation;

pub use metadata::{normalise_metadata, CampaignForm, CampaignMetadataDocument, NormalisedMetadata};
pub use models::{
    BackerRecord, CampaignAction, CampaignRecord, DataSource, ProjectDetail, ProjectStatus,
    ProjectSummary,
};
pub use project::{sort_projects, ActionEligibility, Funding, SortKey};
