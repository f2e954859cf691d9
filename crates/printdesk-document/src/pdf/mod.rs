// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF module — reading PDFs, plus a blank-PDF builder for fixtures.

pub mod reader;
#[cfg(any(test, feature = "test-support"))]
pub mod writer;

pub use reader::PdfReader;
#[cfg(any(test, feature = "test-support"))]
pub use writer::PdfWriter;
