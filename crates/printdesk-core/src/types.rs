// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Printdesk scheduler.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::settings_code;

/// Unique identifier for a print job, as assigned by the job source.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// The fixed set of paper sizes a print shop stocks.
///
/// Declaration order is the settings-code index order (`A4 = 0` .. `Legal = 3`).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum PaperSize {
    #[default]
    A4,
    A3,
    Letter,
    Legal,
}

impl PaperSize {
    /// Every stocked size, in settings-code index order.
    pub const ALL: [PaperSize; 4] = [Self::A4, Self::A3, Self::Letter, Self::Legal];

    /// Index used by the settings code.
    pub fn code_index(&self) -> u32 {
        match self {
            Self::A4 => 0,
            Self::A3 => 1,
            Self::Letter => 2,
            Self::Legal => 3,
        }
    }

    /// Inverse of [`PaperSize::code_index`]. Unknown indices fall back to A4.
    pub fn from_code_index(index: u32) -> Self {
        match index {
            1 => Self::A3,
            2 => Self::Letter,
            3 => Self::Legal,
            _ => Self::A4,
        }
    }

    /// CUPS `media` option value.
    pub fn media_keyword(&self) -> &'static str {
        match self {
            Self::A4 => "A4",
            Self::A3 => "A3",
            Self::Letter => "Letter",
            Self::Legal => "Legal",
        }
    }

    /// All sizes as a set (the default when detection finds nothing).
    pub fn all() -> BTreeSet<PaperSize> {
        Self::ALL.into_iter().collect()
    }
}

impl fmt::Display for PaperSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.media_keyword())
    }
}

impl FromStr for PaperSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "a4" => Ok(Self::A4),
            "a3" => Ok(Self::A3),
            "letter" => Ok(Self::Letter),
            "legal" => Ok(Self::Legal),
            other => Err(format!("unknown paper size '{other}'")),
        }
    }
}

/// Colour mode requested by a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    Color,
    #[default]
    Monochrome,
}

/// Duplex printing mode.
///
/// The job source uses `vertical` for long-edge and `horizontal` for
/// short-edge binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum DuplexMode {
    #[default]
    #[serde(rename = "simplex")]
    Simplex,
    #[serde(rename = "vertical", alias = "duplex", alias = "long-edge")]
    LongEdge,
    #[serde(rename = "horizontal", alias = "short-edge")]
    ShortEdge,
}

impl DuplexMode {
    pub fn is_duplex(&self) -> bool {
        !matches!(self, Self::Simplex)
    }

    /// IPP / CUPS `sides` keyword (RFC 8011 §5.2.8).
    pub fn sides_keyword(&self) -> &'static str {
        match self {
            Self::Simplex => "one-sided",
            Self::LongEdge => "two-sided-long-edge",
            Self::ShortEdge => "two-sided-short-edge",
        }
    }
}

/// Page orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

impl Orientation {
    /// IPP `orientation-requested` enum value (RFC 8011 §5.2.10).
    pub fn ipp_enum_value(&self) -> i32 {
        match self {
            Self::Portrait => 3,
            Self::Landscape => 4,
        }
    }
}

/// The four independent axes carried by a settings code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct PrintSettings {
    #[serde(default)]
    pub orientation: Orientation,
    #[serde(default)]
    pub color_mode: ColorMode,
    #[serde(default)]
    pub duplex: DuplexMode,
    #[serde(default)]
    pub paper_size: PaperSize,
}

impl PrintSettings {
    pub fn is_color(&self) -> bool {
        self.color_mode == ColorMode::Color
    }
}

/// Inclusive, 1-indexed page range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    pub start: u32,
    pub end: u32,
}

impl PageRange {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn single(page: u32) -> Self {
        Self::new(page, page)
    }
}

impl fmt::Display for PageRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

/// Lifecycle states of a print job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobStatus {
    /// Accepted at intake, waiting in a printer queue.
    Received,
    /// Currently being fetched / printed.
    InProgress,
    /// Successfully printed.
    Completed,
    /// Rejected at intake or failed during execution.
    Failed,
    /// Manually re-queued after a terminal outcome.
    Retrying,
}

impl JobStatus {
    /// `completed` and `failed` are terminal; nothing happens without a manual retry.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Received => "received",
            Self::InProgress => "in-progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Retrying => "retrying",
        };
        f.write_str(s)
    }
}

/// Job payload as delivered by the job source.
///
/// Every settings field is optional; a `printsettings_code` overrides them all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRequest {
    pub id: JobId,
    pub user_id: String,
    #[serde(default)]
    pub number_of_pages: Option<u32>,
    #[serde(default)]
    pub copies: Option<u32>,
    #[serde(default)]
    pub paper_size: Option<PaperSize>,
    #[serde(default)]
    pub color_mode: Option<ColorMode>,
    #[serde(default)]
    pub duplex: Option<DuplexMode>,
    #[serde(default)]
    pub orientation: Option<Orientation>,
    #[serde(default)]
    pub amount: f64,
    pub combined_file_path: String,
    #[serde(default)]
    pub printsettings_code: Option<u32>,
    #[serde(default)]
    pub start_page: Option<u32>,
    #[serde(default)]
    pub end_page: Option<u32>,
}

/// A normalised print job, ready for matching and execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrintJob {
    pub id: JobId,
    pub user_id: String,
    /// Pages the customer paid for, across all copies.
    pub number_of_pages: u32,
    pub copies: u32,
    #[serde(flatten)]
    pub settings: PrintSettings,
    pub amount: f64,
    /// Reference to the source document in the remote store.
    pub combined_file_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub printsettings_code: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_page: Option<u32>,
}

impl PrintJob {
    /// Normalise an intake payload.
    ///
    /// Zero or missing page and copy counts become 1.
    pub fn from_request(request: JobRequest) -> Self {
        let settings = match request.printsettings_code {
            Some(code) => settings_code::decode(code),
            None => PrintSettings {
                orientation: request.orientation.unwrap_or_default(),
                color_mode: request.color_mode.unwrap_or_default(),
                duplex: request.duplex.unwrap_or_default(),
                paper_size: request.paper_size.unwrap_or_default(),
            },
        };

        Self {
            id: request.id,
            user_id: request.user_id,
            number_of_pages: request.number_of_pages.filter(|n| *n > 0).unwrap_or(1),
            copies: request.copies.filter(|n| *n > 0).unwrap_or(1),
            settings,
            amount: request.amount,
            combined_file_path: request.combined_file_path,
            printsettings_code: request.printsettings_code,
            start_page: request.start_page,
            end_page: request.end_page,
        }
    }

    pub fn is_color(&self) -> bool {
        self.settings.is_color()
    }

    pub fn wants_duplex(&self) -> bool {
        self.settings.duplex.is_duplex()
    }

    /// Sheets reserved for this job: its pages plus the cover/trailer overhead.
    pub fn pages_needed(&self, overhead: u32) -> u32 {
        self.number_of_pages.saturating_add(overhead)
    }
}

/// Capabilities reported by a printer probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectedCapabilities {
    pub color: bool,
    pub duplex: bool,
    pub paper_sizes: BTreeSet<PaperSize>,
    pub max_copies: u32,
    /// Ordered; the first entry is used for printing.
    pub resolutions: Vec<String>,
}

impl DetectedCapabilities {
    /// Record used when detection fails: monochrome, simplex, every stocked size.
    pub fn conservative() -> Self {
        Self {
            color: false,
            duplex: false,
            paper_sizes: PaperSize::all(),
            max_copies: 999,
            resolutions: vec!["300dpi".into()],
        }
    }
}

/// One physical print call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrintInvocation {
    pub printer: String,
    pub pages: PageRange,
    pub copies: u32,
    pub monochrome: bool,
    pub paper_size: PaperSize,
    pub orientation: Orientation,
    pub duplex: DuplexMode,
    pub resolution: Option<String>,
}

/// Status values relayed to the job source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusKind {
    Received,
    Printing,
    Completed,
    Failed,
}

/// A job status update for external observers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusEvent {
    pub job_id: JobId,
    pub user_id: String,
    pub status: StatusKind,
    pub reason: String,
}

impl StatusEvent {
    pub fn new(job: &PrintJob, status: StatusKind, reason: impl Into<String>) -> Self {
        Self {
            job_id: job.id.clone(),
            user_id: job.user_id.clone(),
            status,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(json: &str) -> JobRequest {
        serde_json::from_str(json).expect("valid job request")
    }

    #[test]
    fn request_defaults_are_applied() {
        let job = PrintJob::from_request(request(
            r#"{"id":"j1","user_id":"u1","combined_file_path":"a.pdf","number_of_pages":0}"#,
        ));
        assert_eq!(job.number_of_pages, 1);
        assert_eq!(job.copies, 1);
        assert_eq!(job.settings, PrintSettings::default());
        assert_eq!(job.settings.paper_size, PaperSize::A4);
    }

    #[test]
    fn explicit_fields_used_without_code() {
        let job = PrintJob::from_request(request(
            r#"{"id":"j2","user_id":"u1","combined_file_path":"a.pdf","number_of_pages":7,
                "copies":2,"paper_size":"Letter","color_mode":"color","duplex":"vertical",
                "orientation":"landscape","amount":40.0}"#,
        ));
        assert_eq!(job.number_of_pages, 7);
        assert_eq!(job.copies, 2);
        assert!(job.is_color());
        assert!(job.wants_duplex());
        assert_eq!(job.settings.orientation, Orientation::Landscape);
        assert_eq!(job.settings.paper_size, PaperSize::Letter);
    }

    #[test]
    fn settings_code_overrides_fields() {
        let job = PrintJob::from_request(request(
            r#"{"id":"j3","user_id":"u1","combined_file_path":"a.pdf",
                "color_mode":"color","printsettings_code":1101}"#,
        ));
        assert_eq!(job.settings.paper_size, PaperSize::A3);
        assert_eq!(job.settings.duplex, DuplexMode::LongEdge);
        assert_eq!(job.settings.color_mode, ColorMode::Monochrome);
        assert_eq!(job.settings.orientation, Orientation::Landscape);
    }

    #[test]
    fn settings_without_fields_default_to_a4_portrait_mono_simplex() {
        assert_eq!(PaperSize::default(), PaperSize::A4);
        let settings: PrintSettings = serde_json::from_str("{}").expect("settings");
        assert_eq!(settings, PrintSettings::default());
        assert_eq!(settings.paper_size, PaperSize::A4);
        assert_eq!(settings.orientation, Orientation::Portrait);
        assert_eq!(settings.color_mode, ColorMode::Monochrome);
        assert_eq!(settings.duplex, DuplexMode::Simplex);
    }

    #[test]
    fn pages_needed_adds_overhead() {
        let job = PrintJob::from_request(request(
            r#"{"id":"j4","user_id":"u1","combined_file_path":"a.pdf","number_of_pages":10}"#,
        ));
        assert_eq!(job.pages_needed(2), 12);
    }

    #[test]
    fn page_range_display() {
        assert_eq!(PageRange::single(1).to_string(), "1");
        assert_eq!(PageRange::new(2, 5).to_string(), "2-5");
    }

    #[test]
    fn status_serialises_as_kebab_case() {
        let json = serde_json::to_string(&JobStatus::InProgress).expect("serialize");
        assert_eq!(json, "\"in-progress\"");
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Retrying.is_terminal());
    }

    #[test]
    fn status_event_uses_camel_case() {
        let job = PrintJob::from_request(request(
            r#"{"id":"j5","user_id":"u9","combined_file_path":"a.pdf"}"#,
        ));
        let event = StatusEvent::new(&job, StatusKind::Printing, "Processing started");
        let json = serde_json::to_value(&event).expect("serialize");
        assert_eq!(json["jobId"], "j5");
        assert_eq!(json["userId"], "u9");
        assert_eq!(json["status"], "printing");
    }

    #[test]
    fn paper_size_parses_case_insensitively() {
        assert_eq!("LETTER".parse::<PaperSize>(), Ok(PaperSize::Letter));
        assert!("B5".parse::<PaperSize>().is_err());
    }
}
