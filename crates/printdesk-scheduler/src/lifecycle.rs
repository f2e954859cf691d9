// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Job lifecycle tracker — history map and exactly-once metrics.
//
// History is a map keyed by job id: every transition overwrites the entry
// for that job. The `metrics_recorded` flag and retry count are carried
// across overwrites, so a job contributes to the metrics at most once no
// matter how often it is re-run.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use printdesk_core::error::Result;
use printdesk_core::{JobId, JobStatus, PrintJob, SchedulerConfig};

use crate::events::{EventBus, SchedulerEvent};
use crate::queue::Attempt;
use crate::store::StateStore;

/// Reason recorded for jobs that were queued or running when the process stopped.
pub const INTERRUPTED_REASON: &str = "interrupted by restart";

/// Latest known state of one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(flatten)]
    pub job: PrintJob,
    pub assigned_printer: Option<String>,
    pub status: JobStatus,
    pub processed_at: DateTime<Utc>,
    /// Sheets reserved for the job (pages plus overhead).
    pub pages_printed: u32,
    /// Page count of the fetched document, once known.
    #[serde(default)]
    pub total_pages: Option<u32>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub document_hash: Option<String>,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default)]
    pub metrics_recorded: bool,
}

/// Running totals for one bucket (all-time or a single UTC day).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsTotals {
    pub total_pages: u64,
    pub monochrome_jobs: u64,
    pub color_jobs: u64,
    pub total_income: f64,
}

impl MetricsTotals {
    fn add(&mut self, job: &PrintJob, payout_fraction: f64) {
        self.total_pages += u64::from(job.number_of_pages);
        if job.is_color() {
            self.color_jobs += 1;
        } else {
            self.monochrome_jobs += 1;
        }
        self.total_income += job.amount * payout_fraction;
    }
}

/// Details attached to a transition.
#[derive(Debug, Clone, Default)]
pub struct Outcome {
    pub reason: Option<String>,
    pub total_pages: Option<u32>,
    pub document_hash: Option<String>,
}

impl Outcome {
    pub fn reason(reason: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
            ..Self::default()
        }
    }
}

#[derive(Default)]
struct Ledger {
    history: HashMap<JobId, HistoryEntry>,
    totals: MetricsTotals,
    daily: BTreeMap<String, MetricsTotals>,
}

/// Owner of the job history and metrics.
pub struct LifecycleTracker {
    ledger: Mutex<Ledger>,
    state: Arc<StateStore>,
    events: EventBus,
    sheet_overhead: u32,
    payout_fraction: f64,
}

impl LifecycleTracker {
    /// Load persisted history and metrics.
    pub fn load(state: Arc<StateStore>, events: EventBus, config: &SchedulerConfig) -> Result<Self> {
        let history = state
            .load_history()?
            .into_iter()
            .map(|entry| (entry.job.id.clone(), entry))
            .collect();
        let (totals, daily) = state.load_metrics()?;

        Ok(Self {
            ledger: Mutex::new(Ledger {
                history,
                totals,
                daily,
            }),
            state,
            events,
            sheet_overhead: config.sheet_overhead,
            payout_fraction: config.payout_fraction,
        })
    }

    fn ledger(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Write a new entry for `job`, carrying forward accounting fields.
    ///
    /// Entering `completed` on an original run applies the metrics if they
    /// were never applied for this job.
    pub fn record(
        &self,
        job: &PrintJob,
        printer: Option<&str>,
        status: JobStatus,
        attempt: Attempt,
        outcome: Outcome,
    ) -> HistoryEntry {
        let now = Utc::now();
        let mut ledger = self.ledger();
        let previous = ledger.history.get(&job.id);

        let mut entry = HistoryEntry {
            job: job.clone(),
            assigned_printer: printer.map(str::to_owned),
            status,
            processed_at: now,
            pages_printed: job.pages_needed(self.sheet_overhead),
            total_pages: outcome
                .total_pages
                .or_else(|| previous.and_then(|p| p.total_pages)),
            reason: outcome.reason,
            document_hash: outcome
                .document_hash
                .or_else(|| previous.and_then(|p| p.document_hash.clone())),
            retry_count: previous.map_or(0, |p| p.retry_count),
            metrics_recorded: previous.is_some_and(|p| p.metrics_recorded),
        };
        if status == JobStatus::Retrying {
            entry.retry_count += 1;
        }

        let count_metrics = status == JobStatus::Completed
            && attempt == Attempt::Original
            && !entry.metrics_recorded;
        if count_metrics {
            entry.metrics_recorded = true;
        }

        if let Err(e) = self.state.save_history_entry(&entry) {
            error!(job_id = %job.id, error = %e, "failed to persist history entry");
        }
        ledger.history.insert(job.id.clone(), entry.clone());

        if count_metrics {
            let day = now.date_naive().to_string();
            ledger.totals.add(job, self.payout_fraction);
            let totals = ledger.totals.clone();
            let bucket = ledger.daily.entry(day.clone()).or_default();
            bucket.add(job, self.payout_fraction);
            if let Err(e) = self.state.save_metrics(&totals, &day, bucket) {
                error!(job_id = %job.id, error = %e, "failed to persist metrics");
            }
        }
        drop(ledger);

        info!(job_id = %job.id, printer = ?printer, %status, "job status recorded");
        self.events.emit(SchedulerEvent::HistoryUpdated {
            job_id: job.id.clone(),
            status,
        });
        if count_metrics {
            self.events.emit(SchedulerEvent::MetricsUpdated);
        }
        entry
    }

    /// Mark every non-terminal entry as failed.
    ///
    /// Queues live in memory only, so anything still `received`,
    /// `in-progress` or `retrying` at startup will never run. Returns the
    /// number of entries rewritten.
    pub fn recover_interrupted(&self) -> usize {
        let stale: Vec<HistoryEntry> = self
            .ledger()
            .history
            .values()
            .filter(|e| !e.status.is_terminal())
            .cloned()
            .collect();

        for entry in &stale {
            warn!(job_id = %entry.job.id, status = %entry.status, "job interrupted by restart");
            let attempt = if entry.status == JobStatus::Retrying {
                Attempt::Retry
            } else {
                Attempt::Original
            };
            self.record(
                &entry.job,
                entry.assigned_printer.as_deref(),
                JobStatus::Failed,
                attempt,
                Outcome::reason(INTERRUPTED_REASON),
            );
        }
        stale.len()
    }

    pub fn get(&self, job_id: &JobId) -> Option<HistoryEntry> {
        self.ledger().history.get(job_id).cloned()
    }

    pub fn status_of(&self, job_id: &JobId) -> Option<JobStatus> {
        self.ledger().history.get(job_id).map(|e| e.status)
    }

    /// All entries, most recently processed first.
    pub fn history(&self) -> Vec<HistoryEntry> {
        let mut entries: Vec<HistoryEntry> = self.ledger().history.values().cloned().collect();
        entries.sort_by(|a, b| b.processed_at.cmp(&a.processed_at));
        entries
    }

    pub fn totals(&self) -> MetricsTotals {
        self.ledger().totals.clone()
    }

    /// Per-day buckets keyed by `YYYY-MM-DD` (UTC).
    pub fn daily(&self) -> BTreeMap<String, MetricsTotals> {
        self.ledger().daily.clone()
    }
}
