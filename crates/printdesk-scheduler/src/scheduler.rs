// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scheduler — the context object tying intake, matching, queues, execution
// and state together.
//
// A `Scheduler` is a cheap handle (`Arc` inside). Intake and admin calls are
// synchronous; queue drains run as Tokio tasks tracked in a `JoinSet` so the
// caller can wait for them or abort them.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, instrument, warn};

use printdesk_bridge::{CapabilityProbe, DocumentInspector, FileFetcher, PrintExecutor, StatusSink};
use printdesk_core::error::{PrintdeskError, Result};
use printdesk_core::{
    AppConfig, DetectedCapabilities, JobId, JobRequest, JobStatus, PaperSize, PrintJob,
    StatusEvent, StatusKind,
};

use crate::audit::{AuditAction, AuditEntry, AuditLog};
use crate::capabilities::{CapabilityStore, PrinterOffer, PrinterSet, RoutingRules};
use crate::events::{EventBus, SchedulerEvent};
use crate::lifecycle::{HistoryEntry, LifecycleTracker, MetricsTotals, Outcome};
use crate::matcher::{Selection, select_printer};
use crate::orchestrator::Orchestrator;
use crate::queue::{Attempt, PrinterQueues, QueueEntry};
use crate::store::StateStore;

/// The external systems the scheduler drives.
#[derive(Clone)]
pub struct Collaborators {
    pub fetcher: Arc<dyn FileFetcher>,
    pub executor: Arc<dyn PrintExecutor>,
    pub probe: Arc<dyn CapabilityProbe>,
    pub inspector: Arc<dyn DocumentInspector>,
    pub sink: Arc<dyn StatusSink>,
}

/// Result of submitting a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Admission {
    Queued { printer: String },
    /// No compatible printer; the job is recorded as failed.
    Rejected { reason: String },
    /// The job id is already completed, running or queued. Nothing changed.
    Duplicate,
}

struct Inner {
    config: AppConfig,
    capabilities: Arc<CapabilityStore>,
    lifecycle: Arc<LifecycleTracker>,
    queues: PrinterQueues,
    orchestrator: Orchestrator,
    audit: Arc<AuditLog>,
    probe: Arc<dyn CapabilityProbe>,
    sink: Arc<dyn StatusSink>,
    events: EventBus,
    /// Serializes the duplicate check with the enqueue it guards.
    intake: Mutex<()>,
    drains: Mutex<JoinSet<()>>,
}

/// Print job scheduler.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl Scheduler {
    /// Load persisted state and wire up the collaborators.
    ///
    /// Jobs that were still queued or running when the previous process
    /// stopped are marked failed.
    pub fn open(
        config: AppConfig,
        state: Arc<StateStore>,
        audit: AuditLog,
        collaborators: Collaborators,
    ) -> Result<Self> {
        let events = EventBus::new(config.scheduler.event_capacity);
        let capabilities = Arc::new(CapabilityStore::load(Arc::clone(&state), events.clone())?);
        let lifecycle = Arc::new(LifecycleTracker::load(
            state,
            events.clone(),
            &config.scheduler,
        )?);

        let recovered = lifecycle.recover_interrupted();
        if recovered > 0 {
            warn!(recovered, "jobs interrupted by restart marked failed");
        }

        let audit = Arc::new(audit);
        let orchestrator = Orchestrator::new(
            &collaborators,
            Arc::clone(&capabilities),
            Arc::clone(&lifecycle),
            Arc::clone(&audit),
            events.clone(),
            config.scheduler.clone(),
        );

        info!(printers = capabilities.snapshot().len(), "scheduler ready");
        Ok(Self {
            inner: Arc::new(Inner {
                config,
                capabilities,
                lifecycle,
                queues: PrinterQueues::new(events.clone()),
                orchestrator,
                audit,
                probe: collaborators.probe,
                sink: collaborators.sink,
                events,
                intake: Mutex::new(()),
                drains: Mutex::new(JoinSet::new()),
            }),
        })
    }

    fn intake(&self) -> MutexGuard<'_, ()> {
        self.inner
            .intake
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn drains(&self) -> MutexGuard<'_, JoinSet<()>> {
        self.inner
            .drains
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    // -----------------------------------------------------------------------
    // Intake
    // -----------------------------------------------------------------------

    /// Accept a job: match it to a printer and queue it, or reject it.
    ///
    /// # Panics
    ///
    /// Must be called from within a Tokio runtime; the queue drain is spawned
    /// onto it.
    #[instrument(skip(self, request), fields(job_id = %request.id))]
    pub fn submit(&self, request: JobRequest) -> Admission {
        let job = PrintJob::from_request(request);
        let intake = self.intake();
        if self.is_duplicate(&job.id) {
            info!("duplicate submission ignored");
            return Admission::Duplicate;
        }

        let pages_needed = job.pages_needed(self.inner.config.scheduler.sheet_overhead);
        let snapshot = self.inner.capabilities.snapshot();
        match select_printer(&snapshot, &job, pages_needed, |name| {
            self.inner.queues.len(name)
        }) {
            Selection::NoCandidate => {
                let reason = PrintdeskError::NoSuitablePrinter.to_string();
                warn!(%reason, "job rejected");
                self.fail_job(&job, None, Attempt::Original, &reason);
                Admission::Rejected { reason }
            }
            Selection::Selected {
                printer,
                candidates,
            } => {
                info!(%printer, candidates, "job accepted");
                self.inner.lifecycle.record(
                    &job,
                    Some(&printer),
                    JobStatus::Received,
                    Attempt::Original,
                    Outcome::default(),
                );
                self.inner
                    .sink
                    .publish(&StatusEvent::new(&job, StatusKind::Received, "Job queued"));
                self.inner
                    .queues
                    .enqueue(&printer, QueueEntry::new(job, Attempt::Original));
                drop(intake);
                self.schedule_drain(&printer);
                Admission::Queued { printer }
            }
        }
    }

    fn is_duplicate(&self, job_id: &JobId) -> bool {
        matches!(
            self.inner.lifecycle.status_of(job_id),
            Some(JobStatus::Completed | JobStatus::InProgress)
        ) || self.inner.queues.contains(job_id)
    }

    /// Re-run a `failed` or `completed` job, on `printer` if given, otherwise
    /// on a freshly matched one. Returns the printer it was queued on.
    ///
    /// Retries consume paper but never count towards the metrics.
    ///
    /// # Panics
    ///
    /// Must be called from within a Tokio runtime.
    #[instrument(skip(self))]
    pub fn retry(&self, job_id: &JobId, printer: Option<&str>) -> Result<String> {
        let intake = self.intake();
        let entry = self
            .inner
            .lifecycle
            .get(job_id)
            .ok_or_else(|| PrintdeskError::JobNotFound(job_id.to_string()))?;
        if !entry.status.is_terminal() || self.inner.queues.contains(job_id) {
            return Err(PrintdeskError::RetryNotAllowed {
                job_id: job_id.to_string(),
                status: entry.status.to_string(),
            });
        }

        let job = entry.job;
        let snapshot = self.inner.capabilities.snapshot();
        let target = match printer {
            Some(name) => {
                if !snapshot.contains(name) {
                    return Err(PrintdeskError::UnknownPrinter(name.to_owned()));
                }
                if snapshot.is_discarded(name) {
                    return Err(PrintdeskError::PrinterUnavailable(name.to_owned()));
                }
                name.to_owned()
            }
            None => {
                let pages_needed = job.pages_needed(self.inner.config.scheduler.sheet_overhead);
                match select_printer(&snapshot, &job, pages_needed, |name| {
                    self.inner.queues.len(name)
                }) {
                    Selection::Selected { printer, .. } => printer,
                    Selection::NoCandidate => return Err(PrintdeskError::NoSuitablePrinter),
                }
            }
        };

        info!(printer = %target, "job queued for retry");
        self.inner.lifecycle.record(
            &job,
            Some(&target),
            JobStatus::Retrying,
            Attempt::Retry,
            Outcome::default(),
        );
        self.inner
            .sink
            .publish(&StatusEvent::new(&job, StatusKind::Received, "Retry queued"));
        self.inner
            .queues
            .enqueue(&target, QueueEntry::new(job, Attempt::Retry));
        drop(intake);
        self.schedule_drain(&target);
        Ok(target)
    }

    /// Record a failure that never reached the orchestrator.
    fn fail_job(&self, job: &PrintJob, printer: Option<&str>, attempt: Attempt, reason: &str) {
        self.inner
            .lifecycle
            .record(job, printer, JobStatus::Failed, attempt, Outcome::reason(reason));
        if let Err(e) = self.inner.audit.record(
            AuditAction::for_outcome(attempt, false),
            job.id.as_str(),
            printer,
            None,
            Some(reason),
        ) {
            error!(job_id = %job.id, error = %e, "failed to write audit entry");
        }
        self.inner.events.emit(SchedulerEvent::JobFailed {
            job_id: job.id.clone(),
            printer: printer.map(str::to_owned),
            reason: reason.to_owned(),
        });
        self.inner
            .sink
            .publish(&StatusEvent::new(job, StatusKind::Failed, reason));
    }

    // -----------------------------------------------------------------------
    // Queue processing
    // -----------------------------------------------------------------------

    fn schedule_drain(&self, printer: &str) {
        let scheduler = self.clone();
        let printer = printer.to_owned();
        let mut drains = self.drains();
        while let Some(finished) = drains.try_join_next() {
            log_join(finished);
        }
        drains.spawn(async move {
            scheduler.drain(&printer).await;
        });
    }

    async fn drain(&self, printer: &str) -> bool {
        let inner: &Inner = &self.inner;
        inner
            .queues
            .drain(printer, move |entry| async move {
                inner
                    .queues
                    .mark_head(printer, &entry.job.id, JobStatus::InProgress);
                inner.orchestrator.run(&entry, printer).await;
            })
            .await
    }

    /// Wait until every spawned drain has finished.
    pub async fn wait_idle(&self) {
        loop {
            let mut running = std::mem::take(&mut *self.drains());
            if running.is_empty() {
                return;
            }
            while let Some(finished) = running.join_next().await {
                log_join(finished);
            }
        }
    }

    /// Abort all drains. Jobs cut off mid-run are recovered on next start.
    pub async fn shutdown(&self) {
        let mut running = std::mem::take(&mut *self.drains());
        running.abort_all();
        while let Some(finished) = running.join_next().await {
            log_join(finished);
        }
        info!("scheduler stopped");
    }

    // -----------------------------------------------------------------------
    // Printer administration
    // -----------------------------------------------------------------------

    /// Probe `name` and add it. Detection failures fall back to a
    /// monochrome, simplex record. Returns `true` if the printer was new.
    #[instrument(skip(self))]
    pub async fn register_printer(&self, name: &str) -> bool {
        let caps = match self.inner.probe.detect(name).await {
            Ok(caps) => caps,
            Err(e) => {
                warn!(error = %e, "capability detection failed, using conservative defaults");
                DetectedCapabilities::conservative()
            }
        };
        self.inner.capabilities.upsert_printer(name, caps)
    }

    /// Reconcile the printer set with what the print system reports.
    ///
    /// Virtual printers are skipped, new printers are probed and added, and
    /// printers that disappeared are removed. Returns the physical printers.
    #[instrument(skip(self))]
    pub async fn sync_printers(&self) -> Result<Vec<String>> {
        let listed = self.inner.probe.list_printers().await?;
        let (physical, skipped): (Vec<String>, Vec<String>) = listed
            .into_iter()
            .partition(|name| !self.inner.config.is_virtual_printer(name));
        for name in &skipped {
            debug!(printer = %name, "virtual printer ignored");
        }

        let known = self.inner.capabilities.snapshot();
        for name in &physical {
            if !known.contains(name) {
                self.register_printer(name).await;
            }
        }

        let stale: Vec<String> = known
            .names()
            .filter(|name| !physical.iter().any(|p| p == name))
            .map(str::to_owned)
            .collect();
        for name in &stale {
            info!(printer = %name, "printer no longer reported");
            self.remove_printer(name);
        }

        info!(printers = physical.len(), skipped = skipped.len(), "printers synchronised");
        Ok(physical)
    }

    /// Forget a printer and fail the jobs still waiting for it. A job that is
    /// already running finishes on its own.
    #[instrument(skip(self))]
    pub fn remove_printer(&self, name: &str) -> bool {
        let removed = self.inner.capabilities.remove_printer(name);
        let purged = self.inner.queues.purge(name);
        if !purged.is_empty() {
            let reason = PrintdeskError::PrinterUnavailable(name.to_owned()).to_string();
            for entry in purged
                .into_iter()
                .filter(|e| e.status != JobStatus::InProgress)
            {
                warn!(job_id = %entry.job.id, "queued job dropped with its printer");
                self.fail_job(&entry.job, Some(name), entry.attempt, &reason);
            }
        }
        removed
    }

    /// Replace the discarded set. Returns `true` when every printer is discarded.
    pub fn set_discarded(&self, names: BTreeSet<String>) -> bool {
        self.inner.capabilities.set_discarded(names)
    }

    pub fn set_routing_rules(&self, name: &str, rules: RoutingRules) -> Result<bool> {
        self.inner.capabilities.set_routing_rules(name, rules)
    }

    pub fn set_paper_sizes(
        &self,
        name: &str,
        sizes: &BTreeSet<PaperSize>,
    ) -> Option<BTreeSet<PaperSize>> {
        self.inner.capabilities.set_paper_sizes(name, sizes)
    }

    pub fn adjust_inventory(&self, name: &str, size: PaperSize, delta: i64) -> Option<u32> {
        self.inner.capabilities.adjust_inventory(name, size, delta)
    }

    pub fn set_inventory_levels(&self, name: &str, levels: &BTreeMap<PaperSize, u32>) -> bool {
        self.inner.capabilities.set_inventory_levels(name, levels)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn printers(&self) -> Arc<PrinterSet> {
        self.inner.capabilities.snapshot()
    }

    pub fn queue(&self, printer: &str) -> Vec<QueueEntry> {
        self.inner.queues.snapshot(printer)
    }

    pub fn queues(&self) -> BTreeMap<String, Vec<QueueEntry>> {
        self.inner.queues.all()
    }

    pub fn history(&self) -> Vec<HistoryEntry> {
        self.inner.lifecycle.history()
    }

    pub fn job(&self, job_id: &JobId) -> Option<HistoryEntry> {
        self.inner.lifecycle.get(job_id)
    }

    pub fn metrics(&self) -> MetricsTotals {
        self.inner.lifecycle.totals()
    }

    pub fn daily_metrics(&self) -> BTreeMap<String, MetricsTotals> {
        self.inner.lifecycle.daily()
    }

    pub fn supported_settings(&self) -> Vec<PrinterOffer> {
        self.inner.capabilities.supported_settings()
    }

    pub fn audit_trail(&self, job_id: &JobId) -> Result<Vec<AuditEntry>> {
        self.inner.audit.entries_for_job(job_id.as_str())
    }

    /// The latest `limit` audit entries across all jobs, newest first.
    pub fn recent_audit(&self, limit: u32) -> Result<Vec<AuditEntry>> {
        self.inner.audit.recent_entries(limit)
    }

    /// False once every known printer has been discarded.
    pub fn intake_enabled(&self) -> bool {
        !self.inner.capabilities.snapshot().all_discarded()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.inner.events.subscribe()
    }
}

fn log_join(finished: std::result::Result<(), JoinError>) {
    if let Err(e) = finished {
        if e.is_panic() {
            error!(error = %e, "queue drain panicked");
        } else if !e.is_cancelled() {
            warn!(error = %e, "queue drain ended abnormally");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::lifecycle::INTERRUPTED_REASON;
    use crate::testing::{Fakes, fake_document};
    use printdesk_core::{DuplexMode, PageRange};

    fn caps(color: bool, duplex: bool) -> DetectedCapabilities {
        DetectedCapabilities {
            color,
            duplex,
            paper_sizes: PaperSize::all(),
            max_copies: 99,
            resolutions: vec!["600dpi".into()],
        }
    }

    fn open(fakes: &Fakes, state: Arc<StateStore>) -> Scheduler {
        Scheduler::open(
            AppConfig::default(),
            state,
            AuditLog::open_in_memory().expect("audit"),
            fakes.collaborators(),
        )
        .expect("scheduler")
    }

    fn scheduler(fakes: &Fakes) -> Scheduler {
        open(fakes, Arc::new(StateStore::open_in_memory().expect("state")))
    }

    async fn add_printer(s: &Scheduler, fakes: &Fakes, name: &str, caps: DetectedCapabilities, a4: u32) {
        fakes.probe.set_capabilities(name, caps);
        assert!(s.register_printer(name).await);
        assert!(s.set_inventory_levels(name, &BTreeMap::from([(PaperSize::A4, a4)])));
    }

    fn request(id: &str, body: serde_json::Value) -> JobRequest {
        let mut base = serde_json::json!({
            "id": id,
            "user_id": "u1",
            "combined_file_path": "doc.pdf",
            "amount": 10.0,
        });
        if let (Some(base), Some(extra)) = (base.as_object_mut(), body.as_object()) {
            base.extend(extra.clone());
        }
        serde_json::from_value(base).expect("request")
    }

    fn level(s: &Scheduler, printer: &str) -> u32 {
        s.printers()
            .get(printer)
            .expect("printer")
            .level(PaperSize::A4)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn basic_match_prints_and_accounts() {
        let fakes = Fakes::new();
        fakes.fetcher.insert("doc.pdf", fake_document(10));
        let s = scheduler(&fakes);
        add_printer(&s, &fakes, "P1", caps(true, false), 500).await;

        let admission = s.submit(request(
            "j1",
            serde_json::json!({ "number_of_pages": 10, "color_mode": "color" }),
        ));
        assert_eq!(admission, Admission::Queued { printer: "P1".into() });
        s.wait_idle().await;

        let entry = s.job(&JobId::from("j1")).expect("history");
        assert_eq!(entry.status, JobStatus::Completed);
        assert_eq!(entry.assigned_printer.as_deref(), Some("P1"));
        assert_eq!(level(&s, "P1"), 488);

        let totals = s.metrics();
        assert_eq!(totals.total_pages, 10);
        assert_eq!(totals.color_jobs, 1);
        assert!((totals.total_income - 8.0).abs() < 1e-9);
        assert!(s.queues().is_empty());
    }

    #[tokio::test]
    async fn incompatible_job_is_rejected() {
        let fakes = Fakes::new();
        let s = scheduler(&fakes);
        add_printer(&s, &fakes, "P1", caps(false, false), 500).await;

        let admission = s.submit(request("j1", serde_json::json!({ "color_mode": "color" })));
        assert_eq!(
            admission,
            Admission::Rejected {
                reason: "No suitable printer available".into()
            }
        );

        let entry = s.job(&JobId::from("j1")).expect("history");
        assert_eq!(entry.status, JobStatus::Failed);
        assert_eq!(entry.reason.as_deref(), Some("No suitable printer available"));
        assert!(entry.assigned_printer.is_none());
        assert!(s.queue("P1").is_empty());

        let events = fakes.sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].status, StatusKind::Failed);
        assert_eq!(s.audit_trail(&JobId::from("j1")).expect("audit")[0].action, "print_failed");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn busy_printer_loses_tie_break() {
        let fakes = Fakes::new();
        fakes.fetcher.insert("doc.pdf", fake_document(10));
        fakes.executor.set_delay(Duration::from_millis(200));
        let s = scheduler(&fakes);
        add_printer(&s, &fakes, "P1", caps(false, false), 1000).await;
        add_printer(&s, &fakes, "P2", caps(false, false), 1000).await;

        let job = serde_json::json!({ "number_of_pages": 10 });
        assert_eq!(s.submit(request("j1", job.clone())), Admission::Queued { printer: "P1".into() });
        assert_eq!(s.submit(request("j2", job)), Admission::Queued { printer: "P2".into() });
        s.wait_idle().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn one_printer_runs_jobs_in_order_one_at_a_time() {
        let fakes = Fakes::new();
        fakes.fetcher.insert("doc.pdf", fake_document(1));
        fakes.executor.set_delay(Duration::from_millis(10));
        let s = scheduler(&fakes);
        add_printer(&s, &fakes, "P1", caps(false, false), 1000).await;

        let ids = ["j1", "j2", "j3", "j4", "j5"];
        for id in ids {
            assert!(matches!(
                s.submit(request(id, serde_json::json!({}))),
                Admission::Queued { .. }
            ));
        }
        s.wait_idle().await;

        let completed: Vec<String> = fakes
            .sink
            .events()
            .iter()
            .filter(|e| e.status == StatusKind::Completed)
            .map(|e| e.job_id.to_string())
            .collect();
        assert_eq!(completed, ids);
        assert_eq!(fakes.executor.peak_concurrency("P1"), 1);
        assert_eq!(level(&s, "P1"), 1000 - 5 * 3);
    }

    #[tokio::test]
    async fn duplex_job_with_cover_prints_in_two_parts() {
        let fakes = Fakes::new();
        fakes.fetcher.insert("doc.pdf", fake_document(5));
        let s = scheduler(&fakes);
        add_printer(&s, &fakes, "P1", caps(false, true), 100).await;

        s.submit(request(
            "j1",
            serde_json::json!({ "number_of_pages": 4, "duplex": "vertical" }),
        ));
        s.wait_idle().await;

        let calls = fakes.executor.invocations();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].pages, PageRange::single(1));
        assert!(calls[0].monochrome);
        assert_eq!(calls[0].duplex, DuplexMode::Simplex);
        assert_eq!(calls[1].pages, PageRange::new(2, 5));
        assert_eq!(calls[1].duplex, DuplexMode::LongEdge);
        assert_eq!(s.job(&JobId::from("j1")).expect("entry").total_pages, Some(5));
    }

    #[tokio::test]
    async fn duplicate_submission_is_ignored() {
        let fakes = Fakes::new();
        fakes.fetcher.insert("doc.pdf", fake_document(2));
        let s = scheduler(&fakes);
        add_printer(&s, &fakes, "P1", caps(false, false), 100).await;

        s.submit(request("j1", serde_json::json!({ "number_of_pages": 2 })));
        s.wait_idle().await;
        assert_eq!(
            s.submit(request("j1", serde_json::json!({ "number_of_pages": 2 }))),
            Admission::Duplicate
        );
        s.wait_idle().await;

        assert_eq!(fakes.executor.invocations().len(), 1);
        assert_eq!(s.metrics().total_pages, 2);
        assert_eq!(level(&s, "P1"), 96);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_submissions_of_one_job_admit_it_once() {
        let fakes = Fakes::new();
        fakes.fetcher.insert("doc.pdf", fake_document(1));
        let s = scheduler(&fakes);
        add_printer(&s, &fakes, "P1", caps(false, false), 1000).await;

        let rounds = 50;
        for round in 0..rounds {
            let barrier = Arc::new(std::sync::Barrier::new(4));
            let submits: Vec<_> = (0..4)
                .map(|_| {
                    let s = s.clone();
                    let barrier = Arc::clone(&barrier);
                    tokio::task::spawn_blocking(move || {
                        barrier.wait();
                        s.submit(request(&format!("j{round}"), serde_json::json!({})))
                    })
                })
                .collect();

            let mut queued = 0;
            for submit in submits {
                match submit.await.expect("join") {
                    Admission::Queued { .. } => queued += 1,
                    Admission::Duplicate => {}
                    other => panic!("unexpected admission {other:?}"),
                }
            }
            assert_eq!(queued, 1, "round {round}");
        }
        s.wait_idle().await;

        assert_eq!(fakes.executor.invocations().len(), rounds);
        assert_eq!(s.metrics().total_pages, rounds as u64);
    }

    #[tokio::test]
    async fn manual_retry_reprints_without_counting() {
        let fakes = Fakes::new();
        fakes.fetcher.insert("doc.pdf", fake_document(3));
        fakes.executor.fail_with("paper jam");
        let s = scheduler(&fakes);
        add_printer(&s, &fakes, "P1", caps(false, false), 100).await;

        s.submit(request("j1", serde_json::json!({ "number_of_pages": 3 })));
        s.wait_idle().await;
        let id = JobId::from("j1");
        assert_eq!(s.job(&id).expect("entry").status, JobStatus::Failed);
        assert_eq!(level(&s, "P1"), 100);

        fakes.executor.succeed();
        assert_eq!(s.retry(&id, None).expect("retry"), "P1");
        s.wait_idle().await;

        let entry = s.job(&id).expect("entry");
        assert_eq!(entry.status, JobStatus::Completed);
        assert_eq!(entry.retry_count, 1);
        assert_eq!(s.metrics(), MetricsTotals::default());
        assert_eq!(level(&s, "P1"), 95);

        let actions: Vec<String> = s
            .audit_trail(&id)
            .expect("audit")
            .into_iter()
            .map(|e| e.action)
            .collect();
        assert_eq!(actions, ["print_failed", "retry_completed"]);

        let recent = s.recent_audit(1).expect("recent");
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].action, "retry_completed");
        assert_eq!(recent[0].printer.as_deref(), Some("P1"));
    }

    #[tokio::test]
    async fn retry_errors() {
        let fakes = Fakes::new();
        let s = scheduler(&fakes);
        add_printer(&s, &fakes, "P1", caps(false, false), 100).await;

        assert!(matches!(
            s.retry(&JobId::from("nope"), None),
            Err(PrintdeskError::JobNotFound(_))
        ));

        // Rejected at intake (missing document is irrelevant here).
        s.submit(request("j1", serde_json::json!({ "paper_size": "A3" })));
        assert!(matches!(
            s.retry(&JobId::from("j1"), Some("ghost")),
            Err(PrintdeskError::UnknownPrinter(_))
        ));
        assert!(matches!(
            s.retry(&JobId::from("j1"), None),
            Err(PrintdeskError::NoSuitablePrinter)
        ));
    }

    #[tokio::test]
    async fn sync_skips_virtual_and_falls_back_on_probe_failure() {
        let fakes = Fakes::new();
        let s = scheduler(&fakes);
        fakes.probe.set_printers(&["Office", "Virtual PDF", "FAX-1", "Broken"]);
        fakes.probe.set_capabilities("Office", caps(true, true));

        let physical = s.sync_printers().await.expect("sync");
        assert_eq!(physical, ["Office", "Broken"]);
        let set = s.printers();
        assert!(set.get("Office").expect("office").color);
        let broken = set.get("Broken").expect("broken");
        assert!(!broken.color && !broken.duplex);
        assert_eq!(broken.paper_sizes, PaperSize::all());

        fakes.probe.set_printers(&["Office"]);
        s.sync_printers().await.expect("sync");
        let names: Vec<String> = s.printers().names().map(str::to_owned).collect();
        assert_eq!(names, ["Office"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn removing_a_printer_fails_waiting_jobs() {
        let fakes = Fakes::new();
        fakes.fetcher.insert("doc.pdf", fake_document(1));
        fakes.executor.set_delay(Duration::from_millis(200));
        let s = scheduler(&fakes);
        add_printer(&s, &fakes, "P1", caps(false, false), 100).await;

        s.submit(request("j1", serde_json::json!({})));
        s.submit(request("j2", serde_json::json!({})));
        while s.job(&JobId::from("j1")).map(|e| e.status) != Some(JobStatus::InProgress) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        assert!(s.remove_printer("P1"));
        let waiting = s.job(&JobId::from("j2")).expect("j2");
        assert_eq!(waiting.status, JobStatus::Failed);
        assert!(waiting.reason.is_some_and(|r| r.contains("no longer available")));

        s.wait_idle().await;
        assert!(s.job(&JobId::from("j1")).expect("j1").status.is_terminal());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn printer_readded_mid_job_still_prints_one_job_at_a_time() {
        let fakes = Fakes::new();
        fakes.fetcher.insert("doc.pdf", fake_document(1));
        fakes.executor.set_delay(Duration::from_millis(300));
        let s = scheduler(&fakes);
        add_printer(&s, &fakes, "P1", caps(false, false), 100).await;

        s.submit(request("j1", serde_json::json!({})));
        while fakes.executor.peak_concurrency("P1") == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        assert!(s.remove_printer("P1"));
        add_printer(&s, &fakes, "P1", caps(false, false), 100).await;
        assert_eq!(
            s.submit(request("j2", serde_json::json!({}))),
            Admission::Queued { printer: "P1".into() }
        );
        s.wait_idle().await;

        assert_eq!(fakes.executor.invocations().len(), 2);
        assert_eq!(fakes.executor.peak_concurrency("P1"), 1);
        assert_eq!(s.job(&JobId::from("j2")).expect("j2").status, JobStatus::Completed);
        assert_eq!(level(&s, "P1"), 94);
    }

    #[tokio::test]
    async fn discarding_every_printer_stops_intake() {
        let fakes = Fakes::new();
        let s = scheduler(&fakes);
        add_printer(&s, &fakes, "P1", caps(false, false), 100).await;
        let mut events = s.subscribe();

        assert!(s.intake_enabled());
        assert!(s.set_discarded(["P1".to_string()].into_iter().collect()));
        assert!(!s.intake_enabled());
        assert!(s.supported_settings().is_empty());

        let mut saw_signal = false;
        while let Ok(event) = events.try_recv() {
            saw_signal |= event == SchedulerEvent::AllPrintersDiscarded;
        }
        assert!(saw_signal);
        assert!(matches!(
            s.submit(request("j1", serde_json::json!({}))),
            Admission::Rejected { .. }
        ));
    }

    #[tokio::test]
    async fn restart_fails_interrupted_jobs() {
        let fakes = Fakes::new();
        let state = Arc::new(StateStore::open_in_memory().expect("state"));
        {
            let tracker = LifecycleTracker::load(
                Arc::clone(&state),
                EventBus::new(8),
                &AppConfig::default().scheduler,
            )
            .expect("tracker");
            let job = PrintJob::from_request(request("j1", serde_json::json!({})));
            tracker.record(&job, Some("P1"), JobStatus::InProgress, Attempt::Original, Outcome::default());
        }

        let s = open(&fakes, state);
        let entry = s.job(&JobId::from("j1")).expect("entry");
        assert_eq!(entry.status, JobStatus::Failed);
        assert_eq!(entry.reason.as_deref(), Some(INTERRUPTED_REASON));
    }
}
