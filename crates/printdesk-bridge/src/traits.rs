// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Trait definitions for the scheduler's external collaborators.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use printdesk_core::error::Result;
use printdesk_core::{DetectedCapabilities, PrintInvocation, StatusEvent};

/// Print + probe capabilities of one host platform.
pub trait PlatformBridge: PrintExecutor + CapabilityProbe {
    /// Human-readable platform name (e.g. "CUPS").
    fn platform_name(&self) -> &str;
}

/// Retrieves job documents from the remote store into local temporary files.
#[async_trait]
pub trait FileFetcher: Send + Sync {
    /// Fetch `reference` and return a local path to the document.
    async fn fetch(&self, reference: &str) -> Result<PathBuf>;

    /// Release a path returned by [`FileFetcher::fetch`]. Never fails.
    async fn release(&self, path: &Path);
}

/// Sends a document to a physical printer.
#[async_trait]
pub trait PrintExecutor: Send + Sync {
    /// Print `document` with the given options. `Ok` means the print system
    /// accepted the job.
    async fn print(&self, document: &Path, invocation: &PrintInvocation) -> Result<()>;
}

/// Enumerates printers and detects their physical capabilities.
#[async_trait]
pub trait CapabilityProbe: Send + Sync {
    /// Names of all printers known to the host print system.
    async fn list_printers(&self) -> Result<Vec<String>>;

    /// Detect the capabilities of one printer.
    async fn detect(&self, printer: &str) -> Result<DetectedCapabilities>;
}

/// Counts the pages of a fetched document.
pub trait DocumentInspector: Send + Sync {
    fn page_count(&self, document: &[u8]) -> Result<u32>;
}

/// Fire-and-forget relay of job status updates to external observers.
pub trait StatusSink: Send + Sync {
    fn publish(&self, event: &StatusEvent);
}
