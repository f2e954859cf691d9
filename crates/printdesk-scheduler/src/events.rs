// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scheduler event broadcast.

use serde::Serialize;
use tokio::sync::broadcast;

use printdesk_core::{JobId, JobStatus};

/// Notifications for observers of scheduler state (UI, remote channel).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum SchedulerEvent {
    /// A printer's queue changed; `jobs` is the new queue order.
    QueueUpdated { printer: String, jobs: Vec<JobId> },
    JobCompleted { job_id: JobId, printer: String },
    JobFailed {
        job_id: JobId,
        printer: Option<String>,
        reason: String,
    },
    /// Capabilities, inventory, routing or the discarded set changed.
    PrinterInfoUpdated,
    /// Every known printer is discarded; intake should stop.
    AllPrintersDiscarded,
    HistoryUpdated { job_id: JobId, status: JobStatus },
    MetricsUpdated,
}

/// Cloneable handle to the event broadcast channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SchedulerEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn emit(&self, event: SchedulerEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.tx.subscribe()
    }
}
