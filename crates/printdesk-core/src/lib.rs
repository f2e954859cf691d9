// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printdesk — Core types, settings-code codec, and error definitions shared
// across all crates.

pub mod config;
pub mod error;
pub mod settings_code;
pub mod types;

pub use config::{AppConfig, SchedulerConfig};
pub use error::PrintdeskError;
pub use types::*;
