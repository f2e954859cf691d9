// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Printdesk.

use thiserror::Error;

use crate::types::PaperSize;

/// Top-level error type for all Printdesk operations.
#[derive(Debug, Error)]
pub enum PrintdeskError {
    // -- Scheduling errors --
    #[error("No suitable printer available")]
    NoSuitablePrinter,

    #[error("unknown printer: {0}")]
    UnknownPrinter(String),

    #[error("printer {0} is no longer available for scheduling")]
    PrinterUnavailable(String),

    #[error("conflicting routing rules for {printer}: {detail}")]
    ConflictingRoutingRules { printer: String, detail: String },

    #[error(
        "not enough {paper_size} paper on {printer}: {available} sheets available, {needed} needed"
    )]
    InsufficientPaper {
        printer: String,
        paper_size: PaperSize,
        available: u32,
        needed: u32,
    },

    #[error("job {0} not found")]
    JobNotFound(String),

    #[error("job {job_id} cannot be retried while {status}")]
    RetryNotAllowed { job_id: String, status: String },

    // -- Collaborator errors --
    #[error("file fetch failed: {0}")]
    Fetch(String),

    #[error("print invocation failed: {0}")]
    PrintInvocation(String),

    #[error("capability probe failed: {0}")]
    Probe(String),

    // -- Document errors --
    #[error("document error: {0}")]
    Document(String),

    #[error("document has {pages} page(s), at least {minimum} required")]
    DocumentTooShort { pages: u32, minimum: u32 },

    // -- Storage / persistence --
    #[error("database error: {0}")]
    Database(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // -- Platform --
    #[error("feature not available on this platform")]
    PlatformUnavailable,
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, PrintdeskError>;
