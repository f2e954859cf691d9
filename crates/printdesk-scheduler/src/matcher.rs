// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printer matcher — filter compatible printers and pick the best one.
//
// Score for each candidate when there is more than one:
//
//   100 + 0.3 * paper + 0.4 * capability - min(queue_len * 10, 30)
//
//   paper      = min(inventory / pages_needed * 20, 100)
//   capability = 50 + 25 (colour mode match) + 25 (duplex mode match)
//
// The highest score wins; ties go to the earlier printer in registration order.

use tracing::debug;

use printdesk_core::PrintJob;

use crate::capabilities::{PrinterRecord, PrinterSet};

const BASE_SCORE: f64 = 100.0;
const PAPER_WEIGHT: f64 = 0.3;
const CAPABILITY_WEIGHT: f64 = 0.4;
const QUEUE_PENALTY_PER_JOB: f64 = 10.0;
const MAX_QUEUE_PENALTY: f64 = 30.0;

/// Score components for one candidate, kept for logging.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreBreakdown {
    pub paper: f64,
    pub capability: f64,
    pub queue_penalty: f64,
    pub total: f64,
}

/// Matcher result.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    /// The chosen printer and how many candidates were considered.
    Selected { printer: String, candidates: usize },
    NoCandidate,
}

/// Whether `printer` can take `job` right now (stock included).
pub fn is_candidate(set: &PrinterSet, printer: &PrinterRecord, job: &PrintJob, pages_needed: u32) -> bool {
    !set.is_discarded(&printer.name)
        && printer.level(job.settings.paper_size) >= pages_needed
        && printer.accepts(job)
}

/// All candidates, in registration order.
pub fn candidates<'a>(set: &'a PrinterSet, job: &PrintJob, pages_needed: u32) -> Vec<&'a PrinterRecord> {
    set.printers()
        .iter()
        .filter(|p| is_candidate(set, p, job, pages_needed))
        .collect()
}

/// Score one candidate.
pub fn score(printer: &PrinterRecord, job: &PrintJob, pages_needed: u32, queue_len: usize) -> ScoreBreakdown {
    let inventory = printer.level(job.settings.paper_size);
    let paper = if pages_needed == 0 {
        100.0
    } else if inventory < pages_needed {
        0.0
    } else {
        (f64::from(inventory) / f64::from(pages_needed) * 20.0).min(100.0)
    };

    let mut capability = 50.0;
    if job.is_color() == printer.color {
        capability += 25.0;
    }
    if job.wants_duplex() == printer.duplex {
        capability += 25.0;
    }

    let queue_penalty = (queue_len as f64 * QUEUE_PENALTY_PER_JOB).min(MAX_QUEUE_PENALTY);
    let total = BASE_SCORE + PAPER_WEIGHT * paper + CAPABILITY_WEIGHT * capability - queue_penalty;

    ScoreBreakdown {
        paper,
        capability,
        queue_penalty,
        total,
    }
}

/// Pick a printer for `job`.
///
/// A single candidate is selected without scoring.
pub fn select_printer(
    set: &PrinterSet,
    job: &PrintJob,
    pages_needed: u32,
    queue_len: impl Fn(&str) -> usize,
) -> Selection {
    let candidates = candidates(set, job, pages_needed);

    match candidates.as_slice() {
        [] => {
            debug!(job_id = %job.id, pages_needed, "no candidate printer");
            Selection::NoCandidate
        }
        [only] => {
            debug!(job_id = %job.id, printer = %only.name, "single candidate selected");
            Selection::Selected {
                printer: only.name.clone(),
                candidates: 1,
            }
        }
        many => {
            let mut best: Option<(&PrinterRecord, f64)> = None;
            for &printer in many {
                let breakdown = score(printer, job, pages_needed, queue_len(&printer.name));
                debug!(
                    job_id = %job.id,
                    printer = %printer.name,
                    paper = breakdown.paper,
                    capability = breakdown.capability,
                    queue_penalty = breakdown.queue_penalty,
                    total = breakdown.total,
                    "candidate scored"
                );
                // Strictly greater keeps the first-seen printer on ties.
                if best.is_none_or(|(_, top)| breakdown.total > top) {
                    best = Some((printer, breakdown.total));
                }
            }
            match best {
                Some((printer, _)) => Selection::Selected {
                    printer: printer.name.clone(),
                    candidates: many.len(),
                },
                None => Selection::NoCandidate,
            }
        }
    }
}
