pub mod audit;

use anyhow::{anyhow, Result};
use audit::{AuditEvent, AuditLog};
use chain::CampaignWallet;
use chrono::{DateTime, Utc};
use fundr_core::{metadata::compute_sha256_hex, CampaignAction};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use sled::Db;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

pub const DEFAULT_DB_PATH: &str = ".fundr_jobs";

static GLOBAL_QUEUE: OnceCell<Arc<Queue>> = OnceCell::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Queued,
    Submitted,
    Confirmed,
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Submitted => "submitted",
            Self::Confirmed => "confirmed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: String,
    /// Contract function called.
    pub action: String,
    pub target: String,
    pub state: JobState,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub tx_hash: Option<String>,
    pub created_campaign: Option<String>,
    pub action_hash: String,
}

/// Transaction jobs persisted in sled and submitted through a wallet.
pub struct Queue {
    db: Db,
    wallet: Arc<dyn CampaignWallet>,
    audit: AuditLog,
}

impl Queue {
    pub fn new(db: Db, wallet: Arc<dyn CampaignWallet>, audit: AuditLog) -> Self {
        Self { db, wallet, audit }
    }

    fn jobs_tree(&self) -> Result<sled::Tree> {
        Ok(self.db.open_tree("jobs")?)
    }

    fn payloads_tree(&self) -> Result<sled::Tree> {
        Ok(self.db.open_tree("payloads")?)
    }

    pub fn enqueue(&self, action: &CampaignAction) -> Result<String> {
        let job_id = generate_job_id();
        let hash = compute_sha256_hex(&serde_json::to_string(action)?);
        let now = Utc::now();
        let rec = JobRecord {
            job_id: job_id.clone(),
            action: action.function_name().to_string(),
            target: action.target().to_string(),
            state: JobState::Queued,
            last_error: None,
            created_at: now,
            updated_at: now,
            tx_hash: None,
            created_campaign: None,
            action_hash: hash.clone(),
        };

        self.jobs_tree()?
            .insert(job_id.as_bytes(), serde_json::to_vec(&rec)?)?;
        self.payloads_tree()?
            .insert(job_id.as_bytes(), serde_json::to_vec(action)?)?;

        self.audit.record(
            AuditEvent::new("job_enqueued", &job_id, JobState::Queued.as_str()).with_action(
                action.function_name(),
                action.target(),
                hash,
            ),
        );
        tracing::info!(job_id = %job_id, action = action.function_name(), "Job enqueued");
        Ok(job_id)
    }

    /// Submit a queued job and wait for its receipt. Wallet and receipt
    /// failures end in `failed`; only storage errors are returned.
    pub async fn process(&self, job_id: &str) -> Result<JobRecord> {
        let jobs = self.jobs_tree()?;
        let payload = self
            .payloads_tree()?
            .get(job_id.as_bytes())?
            .ok_or_else(|| anyhow!("payload missing for job {job_id}"))?;
        let action: CampaignAction = serde_json::from_slice(&payload)?;

        let tx_hash = match self.wallet.submit(&action).await {
            Ok(hash) => hash,
            Err(err) => {
                tracing::error!(job_id = %job_id, error = %err, "Transaction submission failed");
                let rec = update_state(&jobs, job_id, |rec| {
                    rec.state = JobState::Failed;
                    rec.updated_at = Utc::now();
                    rec.last_error = Some(err.to_string());
                })?;
                self.audit.record(
                    AuditEvent::new("submission_failed", job_id, JobState::Failed.as_str())
                        .with_error(err.to_string()),
                );
                return Ok(rec);
            }
        };

        update_state(&jobs, job_id, |rec| {
            rec.state = JobState::Submitted;
            rec.updated_at = Utc::now();
            rec.tx_hash = Some(tx_hash.clone());
        })?;
        self.audit.record(
            AuditEvent::new("transaction_submitted", job_id, JobState::Submitted.as_str())
                .with_tx_hash(tx_hash.clone()),
        );

        let rec = match self.wallet.wait_for_receipt(&tx_hash).await {
            Ok(outcome) if outcome.success => {
                let rec = update_state(&jobs, job_id, |rec| {
                    rec.state = JobState::Confirmed;
                    rec.updated_at = Utc::now();
                    rec.created_campaign = outcome.created_campaign.clone();
                })?;
                self.audit.record(
                    AuditEvent::new("transaction_confirmed", job_id, JobState::Confirmed.as_str())
                        .with_tx_hash(tx_hash.clone())
                        .with_created_campaign(outcome.created_campaign),
                );
                rec
            }
            Ok(_) => self.fail(&jobs, job_id, &tx_hash, "Transaction reverted".to_string())?,
            Err(err) => self.fail(&jobs, job_id, &tx_hash, format!("receipt error: {err}"))?,
        };

        tracing::info!(job_id = %job_id, state = %rec.state, tx_hash = %tx_hash, "Job finished");
        Ok(rec)
    }

    fn fail(&self, jobs: &sled::Tree, job_id: &str, tx_hash: &str, error: String) -> Result<JobRecord> {
        let rec = update_state(jobs, job_id, |rec| {
            rec.state = JobState::Failed;
            rec.updated_at = Utc::now();
            rec.last_error = Some(error.clone());
        })?;
        self.audit.record(
            AuditEvent::new("transaction_failed", job_id, JobState::Failed.as_str())
                .with_tx_hash(tx_hash.to_string())
                .with_error(error),
        );
        Ok(rec)
    }

    pub async fn submit(&self, action: &CampaignAction) -> Result<JobRecord> {
        let job_id = self.enqueue(action)?;
        self.process(&job_id).await
    }

    pub fn get(&self, job_id: &str) -> Result<Option<JobRecord>> {
        match self.jobs_tree()?.get(job_id.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn list(&self) -> Result<Vec<JobRecord>> {
        read_jobs(&self.db)
    }
}

/// Jobs stored in `db`, newest first.
pub fn read_jobs(db: &Db) -> Result<Vec<JobRecord>> {
    let jobs = db.open_tree("jobs")?;
    let mut out = Vec::new();
    for item in jobs.iter() {
        let (_k, v) = item?;
        let rec: JobRecord = serde_json::from_slice(&v)?;
        out.push(rec);
    }
    out.sort_by_key(|r| r.created_at);
    out.reverse();
    Ok(out)
}

fn generate_job_id() -> String {
    use rand::{distributions::Alphanumeric, Rng};
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(12)
        .map(char::from)
        .collect()
}

fn update_state<F>(jobs: &sled::Tree, job_id: &str, mut f: F) -> Result<JobRecord>
where
    F: FnMut(&mut JobRecord),
{
    let key = job_id.as_bytes();
    let existing = jobs
        .get(key)?
        .ok_or_else(|| anyhow!("job not found: {job_id}"))?;
    let mut rec: JobRecord = serde_json::from_slice(&existing)?;
    f(&mut rec);
    jobs.insert(key, serde_json::to_vec(&rec)?)?;
    Ok(rec)
}

fn global() -> Result<&'static Arc<Queue>> {
    GLOBAL_QUEUE
        .get()
        .ok_or_else(|| anyhow!("queue not initialized"))
}

pub fn init(db_path: impl AsRef<Path>, wallet: Arc<dyn CampaignWallet>, audit: AuditLog) -> Result<()> {
    let db = sled::open(db_path)?;
    GLOBAL_QUEUE
        .set(Arc::new(Queue::new(db, wallet, audit)))
        .map_err(|_| anyhow!("queue already initialized"))?;
    Ok(())
}

/// Enqueue an action and drive it to `confirmed` or `failed`.
pub async fn submit_action(action: &CampaignAction) -> Result<JobRecord> {
    global()?.submit(action).await
}

/// Jobs of the initialized queue, or of the database at `db_path` when no
/// wallet was set up in this process.
pub fn list_status(db_path: impl AsRef<Path>) -> Result<Vec<JobRecord>> {
    match GLOBAL_QUEUE.get() {
        Some(queue) => queue.list(),
        None => read_jobs(&sled::open(db_path)?),
    }
}
