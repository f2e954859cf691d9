// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// printdesk-document — Document inspection for the Printdesk scheduler.
//
// Opens fetched job documents to count their pages before dispatch. The
// `test-support` feature adds a blank multi-page PDF builder for fixtures.

pub mod pdf;

pub use pdf::reader::PdfReader;
#[cfg(any(test, feature = "test-support"))]
pub use pdf::writer::PdfWriter;
