// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF-backed document inspector.

use printdesk_core::error::Result;
use printdesk_document::PdfReader;

use crate::traits::DocumentInspector;

/// Counts pages with `lopdf` via [`PdfReader`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfInspector;

impl DocumentInspector for PdfInspector {
    fn page_count(&self, document: &[u8]) -> Result<u32> {
        Ok(PdfReader::from_bytes(document)?.page_count())
    }
}
