// src/jobs/mod.rs

//! In-process background job queue.
//!
//! Handlers enqueue a [`Job`] and get a task id back immediately; a single
//! worker task drains the channel in FIFO order and records each job's
//! state so clients can poll `/api/jobs/{task_id}`.

pub mod export;
pub mod reminder;
pub mod report;
pub mod scheduler;

use std::{collections::HashMap, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::PgPool;
use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use crate::{error::AppError, mail::Mailer};

use export::ExportFilters;
use report::ReportMonth;

/// Hard limit for a single job run.
pub const JOB_TIME_LIMIT: Duration = Duration::from_secs(30 * 60);

/// Finished job records are kept this long for polling.
const RECORD_RETENTION_HOURS: i64 = 24;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Job {
    UserExport {
        user_id: i64,
        filters: ExportFilters,
    },
    AdminExport {
        filters: ExportFilters,
    },
    MonthlyReport {
        user_id: i64,
        month: ReportMonth,
        email: Option<String>,
    },
    AllMonthlyReports {
        month: ReportMonth,
    },
    DailyReminders,
}

impl Job {
    pub fn name(&self) -> &'static str {
        match self {
            Job::UserExport { .. } => "user_export",
            Job::AdminExport { .. } => "admin_export",
            Job::MonthlyReport { .. } => "monthly_report",
            Job::AllMonthlyReports { .. } => "all_monthly_reports",
            Job::DailyReminders => "daily_reminders",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Pending,
    Progress {
        status: String,
        current: usize,
        total: usize,
    },
    Success {
        result: Value,
    },
    Failure {
        error: String,
    },
}

impl JobState {
    pub fn is_finished(&self) -> bool {
        matches!(self, JobState::Success { .. } | JobState::Failure { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JobRecord {
    pub task_id: Uuid,
    pub job: &'static str,
    /// User who submitted the job; `None` for scheduler-initiated jobs.
    #[serde(skip)]
    pub owner_id: Option<i64>,
    #[serde(flatten)]
    pub state: JobState,
    pub submitted_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Resources a running job may use.
pub struct JobContext {
    pub pool: PgPool,
    pub mailer: Arc<dyn Mailer>,
}

type Records = Arc<RwLock<HashMap<Uuid, JobRecord>>>;

#[derive(Clone)]
pub struct JobQueue {
    sender: mpsc::UnboundedSender<(Uuid, Job)>,
    records: Records,
}

impl JobQueue {
    /// Spawns the worker and returns a handle for enqueueing.
    pub fn start(ctx: JobContext) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let records: Records = Arc::new(RwLock::new(HashMap::new()));

        tokio::spawn(run_worker(ctx, receiver, records.clone()));

        Self { sender, records }
    }

    pub async fn enqueue(&self, job: Job, owner_id: Option<i64>) -> Result<Uuid, AppError> {
        let task_id = Uuid::new_v4();
        let name = job.name();

        {
            let mut records = self.records.write().await;
            prune_finished(&mut records, Utc::now());
            records.insert(
                task_id,
                JobRecord {
                    task_id,
                    job: name,
                    owner_id,
                    state: JobState::Pending,
                    submitted_at: Utc::now(),
                    finished_at: None,
                },
            );
        }

        if self.sender.send((task_id, job)).is_err() {
            self.records.write().await.remove(&task_id);
            return Err(AppError::InternalServerError(
                "Job worker is not running".to_string(),
            ));
        }

        tracing::info!(%task_id, job = name, "Job submitted");
        Ok(task_id)
    }

    pub async fn status(&self, task_id: Uuid) -> Option<JobRecord> {
        self.records.read().await.get(&task_id).cloned()
    }
}

/// Lets a running job publish progress for its own record.
#[derive(Clone)]
pub struct Progress {
    task_id: Uuid,
    records: Records,
}

impl Progress {
    pub async fn update(&self, status: impl Into<String>, current: usize, total: usize) {
        set_state(
            &self.records,
            self.task_id,
            JobState::Progress {
                status: status.into(),
                current,
                total,
            },
        )
        .await;
    }
}

async fn set_state(records: &Records, task_id: Uuid, state: JobState) {
    let mut records = records.write().await;
    if let Some(record) = records.get_mut(&task_id) {
        if state.is_finished() {
            record.finished_at = Some(Utc::now());
        }
        record.state = state;
    }
}

fn prune_finished(records: &mut HashMap<Uuid, JobRecord>, now: DateTime<Utc>) {
    let cutoff = now - chrono::Duration::hours(RECORD_RETENTION_HOURS);
    records.retain(|_, record| record.finished_at.is_none_or(|at| at > cutoff));
}

async fn run_worker(
    ctx: JobContext,
    mut receiver: mpsc::UnboundedReceiver<(Uuid, Job)>,
    records: Records,
) {
    tracing::info!("Job worker started");

    while let Some((task_id, job)) = receiver.recv().await {
        let name = job.name();
        let progress = Progress {
            task_id,
            records: records.clone(),
        };
        progress.update("Started", 0, 1).await;
        tracing::info!(%task_id, job = name, "Job started");

        let outcome = tokio::time::timeout(JOB_TIME_LIMIT, execute(&ctx, job, &progress)).await;

        let state = match outcome {
            Ok(Ok(result)) => {
                tracing::info!(%task_id, job = name, "Job succeeded");
                JobState::Success { result }
            }
            Ok(Err(e)) => {
                tracing::error!(%task_id, job = name, "Job failed: {}", e);
                JobState::Failure {
                    error: e.message().to_string(),
                }
            }
            Err(_) => {
                tracing::error!(%task_id, job = name, "Job exceeded time limit");
                JobState::Failure {
                    error: "Job exceeded its time limit".to_string(),
                }
            }
        };

        set_state(&records, task_id, state).await;
    }

    tracing::warn!("Job worker stopped: channel closed");
}

async fn execute(ctx: &JobContext, job: Job, progress: &Progress) -> Result<Value, AppError> {
    match job {
        Job::UserExport { user_id, filters } => {
            let filters = ExportFilters {
                user_id: Some(user_id),
                ..filters
            };
            let export = export::run(&ctx.pool, &filters, &format!("user_export_{}", user_id))
                .await?;
            Ok(serde_json::to_value(export)?)
        }
        Job::AdminExport { filters } => {
            let export = export::run(&ctx.pool, &filters, "admin_export").await?;
            Ok(serde_json::to_value(export)?)
        }
        Job::MonthlyReport {
            user_id,
            month,
            email,
        } => {
            let outcome = report::generate_and_send(ctx, user_id, &month, email).await?;
            Ok(serde_json::to_value(outcome)?)
        }
        Job::AllMonthlyReports { month } => {
            let summary = report::process_all(ctx, &month, progress).await?;
            Ok(serde_json::to_value(summary)?)
        }
        Job::DailyReminders => {
            let outcome = reminder::send_daily(ctx, Utc::now()).await?;
            Ok(serde_json::to_value(outcome)?)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(finished_at: Option<DateTime<Utc>>) -> JobRecord {
        JobRecord {
            task_id: Uuid::new_v4(),
            job: "daily_reminders",
            owner_id: None,
            state: JobState::Pending,
            submitted_at: Utc::now(),
            finished_at,
        }
    }

    #[test]
    fn prunes_only_old_finished_records() {
        let now = Utc::now();
        let mut records = HashMap::new();
        let running = record(None);
        let recent = record(Some(now - chrono::Duration::hours(1)));
        let stale = record(Some(now - chrono::Duration::hours(48)));
        let (running_id, recent_id, stale_id) = (running.task_id, recent.task_id, stale.task_id);
        records.insert(running_id, running);
        records.insert(recent_id, recent);
        records.insert(stale_id, stale);

        prune_finished(&mut records, now);

        assert!(records.contains_key(&running_id));
        assert!(records.contains_key(&recent_id));
        assert!(!records.contains_key(&stale_id));
    }

    #[test]
    fn record_serializes_with_flat_state() {
        let mut rec = record(None);
        rec.state = JobState::Progress {
            status: "Processing user 1/2".into(),
            current: 1,
            total: 2,
        };
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["state"], "PROGRESS");
        assert_eq!(json["current"], 1);
        assert_eq!(json["job"], "daily_reminders");
        assert!(json.get("owner_id").is_none());
    }

    #[test]
    fn success_state_carries_result() {
        let state = JobState::Success {
            result: serde_json::json!({"filename": "x.csv"}),
        };
        assert!(state.is_finished());
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["state"], "SUCCESS");
        assert_eq!(json["result"]["filename"], "x.csv");
    }
}
