// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Per-printer FIFO queues with single-flight draining.
//
// Each printer owns an ordered queue and an async mutex. A drain acquires the
// mutex with `try_lock_owned`; if another drain already holds it the call is
// a no-op. The head entry stays in the queue while it executes and is only
// popped once its run has finished. The guard is an RAII value, so it is
// released on every exit path, including unwinding.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use printdesk_core::{JobId, JobStatus, PrintJob};

use crate::events::{EventBus, SchedulerEvent};

/// Whether a queue entry is the job's first run or a manual retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Attempt {
    Original,
    Retry,
}

/// A job waiting in, or executing at the head of, a printer queue.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueEntry {
    pub job: PrintJob,
    pub status: JobStatus,
    pub attempt: Attempt,
}

impl QueueEntry {
    pub fn new(job: PrintJob, attempt: Attempt) -> Self {
        let status = match attempt {
            Attempt::Original => JobStatus::Received,
            Attempt::Retry => JobStatus::Retrying,
        };
        Self {
            job,
            status,
            attempt,
        }
    }
}

type DrainLock = Arc<tokio::sync::Mutex<()>>;

/// All printer queues plus their drain locks.
pub struct PrinterQueues {
    queues: Mutex<HashMap<String, VecDeque<QueueEntry>>>,
    locks: Mutex<HashMap<String, DrainLock>>,
    events: EventBus,
}

impl PrinterQueues {
    pub fn new(events: EventBus) -> Self {
        Self {
            queues: Mutex::new(HashMap::new()),
            locks: Mutex::new(HashMap::new()),
            events,
        }
    }

    fn queues(&self) -> MutexGuard<'_, HashMap<String, VecDeque<QueueEntry>>> {
        self.queues.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_for(&self, printer: &str) -> DrainLock {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(printer.to_owned()).or_default())
    }

    fn announce(&self, printer: &str, queue: Option<&VecDeque<QueueEntry>>) {
        let jobs = queue
            .map(|q| q.iter().map(|e| e.job.id.clone()).collect())
            .unwrap_or_default();
        self.events.emit(SchedulerEvent::QueueUpdated {
            printer: printer.to_owned(),
            jobs,
        });
    }

    /// Append to the tail of `printer`'s queue. Returns the new length.
    pub fn enqueue(&self, printer: &str, entry: QueueEntry) -> usize {
        let mut queues = self.queues();
        let queue = queues.entry(printer.to_owned()).or_default();
        queue.push_back(entry);
        let len = queue.len();
        self.announce(printer, Some(queue));
        len
    }

    /// Clone of the head entry, left in place.
    pub fn head(&self, printer: &str) -> Option<QueueEntry> {
        self.queues().get(printer).and_then(|q| q.front().cloned())
    }

    /// Update the status of the head entry if it is `job_id`.
    pub fn mark_head(&self, printer: &str, job_id: &JobId, status: JobStatus) {
        let mut queues = self.queues();
        if let Some(head) = queues.get_mut(printer).and_then(|q| q.front_mut())
            && head.job.id == *job_id
        {
            head.status = status;
        }
    }

    /// Remove the head entry if it is `job_id`.
    pub fn pop_head(&self, printer: &str, job_id: &JobId) -> Option<QueueEntry> {
        let mut queues = self.queues();
        let queue = queues.get_mut(printer)?;
        if queue.front().is_some_and(|e| e.job.id == *job_id) {
            let popped = queue.pop_front();
            self.announce(printer, Some(queue));
            popped
        } else {
            None
        }
    }

    pub fn len(&self, printer: &str) -> usize {
        self.queues().get(printer).map_or(0, VecDeque::len)
    }

    pub fn is_empty(&self, printer: &str) -> bool {
        self.len(printer) == 0
    }

    /// Queue contents in execution order.
    pub fn snapshot(&self, printer: &str) -> Vec<QueueEntry> {
        self.queues()
            .get(printer)
            .map(|q| q.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Every non-empty queue, keyed by printer.
    pub fn all(&self) -> BTreeMap<String, Vec<QueueEntry>> {
        self.queues()
            .iter()
            .filter(|(_, q)| !q.is_empty())
            .map(|(name, q)| (name.clone(), q.iter().cloned().collect()))
            .collect()
    }

    /// Whether `job_id` is waiting or executing on any printer.
    pub fn contains(&self, job_id: &JobId) -> bool {
        self.queues()
            .values()
            .any(|q| q.iter().any(|e| e.job.id == *job_id))
    }

    /// Drop a printer's queue. Returns the entries that were waiting.
    ///
    /// The drain lock is kept: a drain still running for the printer must
    /// exclude any new drain if the printer is registered again.
    pub fn purge(&self, printer: &str) -> Vec<QueueEntry> {
        let removed: Vec<QueueEntry> = self
            .queues()
            .remove(printer)
            .map(Vec::from)
            .unwrap_or_default();
        if !removed.is_empty() {
            self.announce(printer, None);
        }
        removed
    }

    #[cfg(test)]
    fn is_draining(&self, printer: &str) -> bool {
        self.lock_for(printer).try_lock().is_err()
    }

    /// Drain `printer`'s queue head-first, awaiting `run` for each entry and
    /// popping it afterwards.
    ///
    /// Returns `false` without doing anything when another drain already holds
    /// the lock.
    #[instrument(skip(self, run))]
    pub async fn drain<F, Fut>(&self, printer: &str, mut run: F) -> bool
    where
        F: FnMut(QueueEntry) -> Fut,
        Fut: Future<Output = ()>,
    {
        let lock = self.lock_for(printer);
        let mut acquired = false;

        loop {
            let Ok(guard) = Arc::clone(&lock).try_lock_owned() else {
                debug!("queue already being drained");
                return acquired;
            };
            acquired = true;

            while let Some(entry) = self.head(printer) {
                let job_id = entry.job.id.clone();
                run(entry).await;
                if self.pop_head(printer, &job_id).is_none() {
                    // Purged while running. Whatever is queued now is new
                    // work and goes through the re-check below.
                    debug!(%job_id, "queue replaced during run");
                    break;
                }
            }

            drop(guard);

            // A job enqueued between the last empty check and the release
            // would otherwise wait for the next submission.
            if self.is_empty(printer) {
                debug!("queue drained");
                return true;
            }
        }
    }
}
