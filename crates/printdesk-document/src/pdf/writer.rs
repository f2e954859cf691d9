// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF writer — build blank multi-page documents with `lopdf`. Only compiled
// for tests and the `test-support` feature.

use lopdf::{Dictionary, Document, Object};
use printdesk_core::PaperSize;
use printdesk_core::error::PrintdeskError;
use tracing::{debug, instrument};

const POINTS_PER_MM: f64 = 72.0 / 25.4;

/// Portrait (width, height) in millimetres.
fn dimensions_mm(size: PaperSize) -> (u32, u32) {
    match size {
        PaperSize::A4 => (210, 297),
        PaperSize::A3 => (297, 420),
        PaperSize::Letter => (216, 279),
        PaperSize::Legal => (216, 356),
    }
}

/// Creates blank PDF documents of a given paper size.
pub struct PdfWriter {
    paper_size: PaperSize,
}

impl PdfWriter {
    pub fn new(paper_size: PaperSize) -> Self {
        Self { paper_size }
    }

    /// Page size in PDF points.
    fn media_box(&self) -> Vec<Object> {
        let (w_mm, h_mm) = dimensions_mm(self.paper_size);
        let w = (f64::from(w_mm) * POINTS_PER_MM).round() as i64;
        let h = (f64::from(h_mm) * POINTS_PER_MM).round() as i64;
        vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Integer(w),
            Object::Integer(h),
        ]
    }

    /// Build a PDF with `count` empty pages.
    #[instrument(skip(self), fields(paper = %self.paper_size))]
    pub fn blank_pages(&self, count: u32) -> Result<Vec<u8>, PrintdeskError> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let mut kids = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let mut page = Dictionary::new();
            page.set("Type", Object::Name(b"Page".to_vec()));
            page.set("Parent", Object::Reference(pages_id));
            page.set("MediaBox", Object::Array(self.media_box()));
            kids.push(Object::Reference(doc.add_object(Object::Dictionary(page))));
        }

        let mut pages = Dictionary::new();
        pages.set("Type", Object::Name(b"Pages".to_vec()));
        pages.set("Kids", Object::Array(kids));
        pages.set("Count", Object::Integer(i64::from(count)));
        doc.objects.insert(pages_id, Object::Dictionary(pages));

        let mut catalog = Dictionary::new();
        catalog.set("Type", Object::Name(b"Catalog".to_vec()));
        catalog.set("Pages", Object::Reference(pages_id));
        let catalog_id = doc.add_object(Object::Dictionary(catalog));
        doc.trailer.set("Root", Object::Reference(catalog_id));

        let mut output = Vec::new();
        doc.save_to(&mut output)
            .map_err(|err| PrintdeskError::Document(format!("failed to serialise PDF: {}", err)))?;

        debug!(count, output_bytes = output.len(), "Blank PDF created");
        Ok(output)
    }
}
