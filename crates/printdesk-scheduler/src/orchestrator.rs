// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Print execution orchestrator — fetch, inspect, plan and print one job,
// then reconcile the outcome into inventory, history, audit and events.
//
// Jobs that need different settings for their cover page are split in two:
//
//   1. cover   page 1, monochrome, 1 copy, simplex, portrait
//   2. content pages 2..=N with the job's own settings
//
// A job is split when it is landscape, duplex or multi-copy, carries a cover
// page and has at least two pages.
//
// Page counts: `number_of_pages` is what the customer pays for, summed over
// all copies. The document itself holds `total_pages` pages, one of which is
// the cover sheet the job source prepends. Printing every document page for
// every copy produces `total_pages * copies` pages, so
//
//   number_of_pages < total_pages * copies
//
// means some printed pages are not paid content, i.e. the document carries a
// cover. A job without a cover has `number_of_pages == total_pages * copies`.

use std::path::Path;
use std::sync::Arc;

use tracing::{error, info, instrument, warn};

use printdesk_bridge::{DocumentInspector, FileFetcher, PrintExecutor, StatusSink};
use printdesk_core::error::{PrintdeskError, Result};
use printdesk_core::{
    DuplexMode, JobStatus, Orientation, PageRange, PaperSize, PrintInvocation, PrintJob,
    SchedulerConfig, StatusEvent, StatusKind,
};

use crate::audit::{AuditAction, AuditLog, hash_bytes};
use crate::capabilities::{CapabilityStore, PrinterRecord, PrinterSet};
use crate::events::{EventBus, SchedulerEvent};
use crate::lifecycle::{LifecycleTracker, Outcome};
use crate::queue::QueueEntry;
use crate::scheduler::Collaborators;

// ---------------------------------------------------------------------------
// Planning
// ---------------------------------------------------------------------------

/// Whether `job` needs a separate cover invocation for a `total_pages` document.
pub fn is_multi_part(job: &PrintJob, total_pages: u32) -> bool {
    let special = job.settings.orientation == Orientation::Landscape
        || job.wants_duplex()
        || job.copies > 1;
    let has_cover = u64::from(job.number_of_pages) < u64::from(total_pages) * u64::from(job.copies);
    special && has_cover && total_pages >= 2
}

/// Build the print calls for `job` on `record`.
///
/// Options are clamped to what the printer can do: copies to `max_copies`,
/// colour to monochrome on mono devices, duplex to simplex on simplex
/// devices, and a disabled paper size to A4.
pub fn plan(job: &PrintJob, record: &PrinterRecord, total_pages: u32) -> Vec<PrintInvocation> {
    let paper_size = if record.supports_size(job.settings.paper_size) {
        job.settings.paper_size
    } else {
        PaperSize::A4
    };
    let duplex = if record.duplex {
        job.settings.duplex
    } else {
        DuplexMode::Simplex
    };
    let content = PrintInvocation {
        printer: record.name.clone(),
        pages: PageRange::new(1, total_pages),
        copies: job.copies.clamp(1, record.max_copies.max(1)),
        monochrome: !job.is_color() || !record.color,
        paper_size,
        orientation: job.settings.orientation,
        duplex,
        resolution: record.resolutions.first().cloned(),
    };

    if is_multi_part(job, total_pages) {
        let cover = PrintInvocation {
            pages: PageRange::single(1),
            copies: 1,
            monochrome: true,
            orientation: Orientation::Portrait,
            duplex: DuplexMode::Simplex,
            ..content.clone()
        };
        let main = PrintInvocation {
            pages: PageRange::new(2, total_pages),
            ..content
        };
        return vec![cover, main];
    }

    let start = job.start_page.unwrap_or(1).clamp(1, total_pages);
    let end = job.end_page.unwrap_or(total_pages).clamp(start, total_pages);
    vec![PrintInvocation {
        pages: PageRange::new(start, end),
        ..content
    }]
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

/// What happened while executing one job.
#[derive(Debug)]
pub struct ExecutionReport {
    pub document_hash: Option<String>,
    pub total_pages: Option<u32>,
    /// Invocations the print system accepted, in order.
    pub invocations: Vec<PrintInvocation>,
    pub result: Result<()>,
}

impl ExecutionReport {
    fn new() -> Self {
        Self {
            document_hash: None,
            total_pages: None,
            invocations: Vec::new(),
            result: Ok(()),
        }
    }
}

/// Runs queue heads against their printer.
pub struct Orchestrator {
    fetcher: Arc<dyn FileFetcher>,
    executor: Arc<dyn PrintExecutor>,
    inspector: Arc<dyn DocumentInspector>,
    sink: Arc<dyn StatusSink>,
    capabilities: Arc<CapabilityStore>,
    lifecycle: Arc<LifecycleTracker>,
    audit: Arc<AuditLog>,
    events: EventBus,
    config: SchedulerConfig,
}

impl Orchestrator {
    pub fn new(
        collaborators: &Collaborators,
        capabilities: Arc<CapabilityStore>,
        lifecycle: Arc<LifecycleTracker>,
        audit: Arc<AuditLog>,
        events: EventBus,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            fetcher: Arc::clone(&collaborators.fetcher),
            executor: Arc::clone(&collaborators.executor),
            inspector: Arc::clone(&collaborators.inspector),
            sink: Arc::clone(&collaborators.sink),
            capabilities,
            lifecycle,
            audit,
            events,
            config,
        }
    }

    /// Execute `entry` on `printer` and record the outcome. Never fails; any
    /// error becomes a `failed` history entry.
    #[instrument(skip(self, entry), fields(job_id = %entry.job.id, attempt = ?entry.attempt))]
    pub async fn run(&self, entry: &QueueEntry, printer: &str) -> JobStatus {
        let job = &entry.job;
        self.lifecycle.record(
            job,
            Some(printer),
            JobStatus::InProgress,
            entry.attempt,
            Outcome::default(),
        );
        self.sink
            .publish(&StatusEvent::new(job, StatusKind::Printing, "Processing started"));

        let report = self.execute(job, printer).await;
        self.reconcile(entry, printer, report)
    }

    /// Fetch, inspect and print. The fetched file is always released.
    pub async fn execute(&self, job: &PrintJob, printer: &str) -> ExecutionReport {
        let mut report = ExecutionReport::new();
        let path = match self.fetcher.fetch(&job.combined_file_path).await {
            Ok(path) => path,
            Err(e) => {
                report.result = Err(e);
                return report;
            }
        };

        let result = self.print_fetched(job, printer, &path, &mut report).await;
        report.result = result;
        self.fetcher.release(&path).await;
        report
    }

    async fn print_fetched(
        &self,
        job: &PrintJob,
        printer: &str,
        path: &Path,
        report: &mut ExecutionReport,
    ) -> Result<()> {
        let bytes = tokio::fs::read(path).await?;
        report.document_hash = Some(hash_bytes(&bytes));

        let total_pages = self.inspector.page_count(&bytes)?;
        report.total_pages = Some(total_pages);
        let minimum = self.config.min_document_pages.max(1);
        if total_pages < minimum {
            return Err(PrintdeskError::DocumentTooShort {
                pages: total_pages,
                minimum,
            });
        }

        let snapshot = self.capabilities.snapshot();
        let record = self.revalidate(&snapshot, job, printer)?;

        for invocation in plan(job, record, total_pages) {
            info!(
                job_id = %job.id,
                printer,
                pages = %invocation.pages,
                copies = invocation.copies,
                monochrome = invocation.monochrome,
                "sending to printer"
            );
            self.executor.print(path, &invocation).await?;
            report.invocations.push(invocation);
        }
        Ok(())
    }

    /// Check the printer is still usable for `job` right before printing.
    fn revalidate<'a>(
        &self,
        snapshot: &'a PrinterSet,
        job: &PrintJob,
        printer: &str,
    ) -> Result<&'a PrinterRecord> {
        let record = snapshot
            .get(printer)
            .ok_or_else(|| PrintdeskError::UnknownPrinter(printer.to_owned()))?;
        if snapshot.is_discarded(printer) {
            return Err(PrintdeskError::PrinterUnavailable(printer.to_owned()));
        }
        if self.config.revalidate_inventory {
            let needed = job.pages_needed(self.config.sheet_overhead);
            let available = record.level(job.settings.paper_size);
            if available < needed {
                return Err(PrintdeskError::InsufficientPaper {
                    printer: printer.to_owned(),
                    paper_size: job.settings.paper_size,
                    available,
                    needed,
                });
            }
        }
        Ok(record)
    }

    fn reconcile(&self, entry: &QueueEntry, printer: &str, report: ExecutionReport) -> JobStatus {
        let job = &entry.job;
        let outcome = Outcome {
            reason: None,
            total_pages: report.total_pages,
            document_hash: report.document_hash.clone(),
        };
        let success = report.result.is_ok();
        let action = AuditAction::for_outcome(entry.attempt, success);

        match report.result {
            Ok(()) => {
                let needed = job.pages_needed(self.config.sheet_overhead);
                self.capabilities.adjust_inventory(
                    printer,
                    job.settings.paper_size,
                    -i64::from(needed),
                );
                self.lifecycle
                    .record(job, Some(printer), JobStatus::Completed, entry.attempt, outcome);
                info!(job_id = %job.id, printer, invocations = report.invocations.len(), "job completed");

                self.audit_outcome(action, job, printer, report.document_hash.as_deref(), None);
                self.events.emit(SchedulerEvent::JobCompleted {
                    job_id: job.id.clone(),
                    printer: printer.to_owned(),
                });
                self.sink
                    .publish(&StatusEvent::new(job, StatusKind::Completed, "Printed successfully"));
                JobStatus::Completed
            }
            Err(e) => {
                let reason = e.to_string();
                if !report.invocations.is_empty() {
                    warn!(job_id = %job.id, printed = report.invocations.len(), "job failed after partial output");
                }
                error!(job_id = %job.id, printer, %reason, "job failed");
                self.lifecycle.record(
                    job,
                    Some(printer),
                    JobStatus::Failed,
                    entry.attempt,
                    Outcome {
                        reason: Some(reason.clone()),
                        ..outcome
                    },
                );

                self.audit_outcome(
                    action,
                    job,
                    printer,
                    report.document_hash.as_deref(),
                    Some(&reason),
                );
                self.events.emit(SchedulerEvent::JobFailed {
                    job_id: job.id.clone(),
                    printer: Some(printer.to_owned()),
                    reason: reason.clone(),
                });
                self.sink
                    .publish(&StatusEvent::new(job, StatusKind::Failed, reason));
                JobStatus::Failed
            }
        }
    }

    fn audit_outcome(
        &self,
        action: AuditAction,
        job: &PrintJob,
        printer: &str,
        document_hash: Option<&str>,
        details: Option<&str>,
    ) {
        if let Err(e) = self
            .audit
            .record(action, job.id.as_str(), Some(printer), document_hash, details)
        {
            error!(job_id = %job.id, error = %e, "failed to write audit entry");
        }
    }
}
