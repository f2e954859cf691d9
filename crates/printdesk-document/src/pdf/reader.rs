// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF reader — open existing job documents with `lopdf` and inspect them.

use lopdf::Document;
use printdesk_core::error::PrintdeskError;
use tracing::{debug, instrument};

/// Read-only view of a job document.
pub struct PdfReader {
    document: Document,
}

impl PdfReader {
    /// Load a PDF already in memory.
    #[instrument(skip_all, fields(bytes_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self, PrintdeskError> {
        let document = Document::load_mem(data).map_err(|err| {
            PrintdeskError::Document(format!("failed to load PDF from memory: {}", err))
        })?;

        debug!(pages = document.get_pages().len(), "PDF loaded from bytes");
        Ok(Self { document })
    }

    /// Number of pages in the document.
    pub fn page_count(&self) -> u32 {
        u32::try_from(self.document.get_pages().len()).unwrap_or(u32::MAX)
    }
}
