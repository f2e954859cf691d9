// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// printdesk-scheduler — Print job scheduling and dispatch.
//
// Accepts jobs, matches each to a compatible printer under capability and
// paper-stock constraints, keeps one FIFO queue per printer drained by a
// single worker at a time, executes the cover/content print sequence, and
// reconciles outcomes into inventory, history and metrics.

pub mod audit;
pub mod capabilities;
pub mod events;
pub mod lifecycle;
pub mod matcher;
pub mod orchestrator;
pub mod queue;
pub mod scheduler;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use audit::{AuditAction, AuditEntry, AuditLog, hash_bytes};
pub use capabilities::{CapabilityStore, PrinterOffer, PrinterRecord, PrinterSet, RoutingRules};
pub use events::{EventBus, SchedulerEvent};
pub use lifecycle::{HistoryEntry, LifecycleTracker, MetricsTotals};
pub use matcher::{Selection, select_printer};
pub use orchestrator::{ExecutionReport, Orchestrator, plan};
pub use queue::{Attempt, PrinterQueues, QueueEntry};
pub use scheduler::{Admission, Collaborators, Scheduler};
pub use store::StateStore;
