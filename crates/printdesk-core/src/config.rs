// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Application and scheduler configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Tunables for matching, execution and accounting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Extra sheets reserved per job (cover + trailer).
    pub sheet_overhead: u32,
    /// Fraction of a job's amount counted as shop income.
    pub payout_fraction: f64,
    /// Documents with fewer pages fail at execution.
    pub min_document_pages: u32,
    /// Re-check printer eligibility and stock immediately before printing.
    pub revalidate_inventory: bool,
    /// Capacity of the scheduler event broadcast channel.
    pub event_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            sheet_overhead: 2,
            payout_fraction: 0.8,
            min_document_pages: 1,
            revalidate_inventory: true,
            event_capacity: 256,
        }
    }
}

/// Top-level configuration persisted as `config.json` in the data directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub scheduler: SchedulerConfig,
    /// Printer names containing any of these (case-insensitive) are ignored.
    pub virtual_printer_keywords: Vec<String>,
    /// Directory job references are resolved against. `None` = data dir `inbox/`.
    pub source_dir: Option<PathBuf>,
    /// Where fetched documents are staged. `None` = data dir `spool/`.
    pub spool_dir: Option<PathBuf>,
    /// SQLite file name inside the data directory.
    pub database_file: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            scheduler: SchedulerConfig::default(),
            virtual_printer_keywords: vec!["virtual".into(), "fax".into()],
            source_dir: None,
            spool_dir: None,
            database_file: "printdesk.db".into(),
        }
    }
}

impl AppConfig {
    /// Whether a printer name looks like a virtual (non-physical) device.
    pub fn is_virtual_printer(&self, name: &str) -> bool {
        let lower = name.to_lowercase();
        self.virtual_printer_keywords
            .iter()
            .any(|k| !k.is_empty() && lower.contains(&k.to_lowercase()))
    }
}
