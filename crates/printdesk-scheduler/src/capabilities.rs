// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Capability store — per-printer capabilities, routing rules and paper stock.
//
// The printer set is an immutable snapshot behind a `RwLock<Arc<_>>`. Every
// mutation clones the current set, edits the copy, persists it and swaps it
// in under the write lock, so readers (the matcher) never observe a
// half-applied update and inventory changes are serialised.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use printdesk_core::error::{PrintdeskError, Result};
use printdesk_core::settings_code;
use printdesk_core::{
    ColorMode, DetectedCapabilities, DuplexMode, Orientation, PaperSize, PrintJob, PrintSettings,
};

use crate::events::{EventBus, SchedulerEvent};
use crate::store::StateStore;

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Administrative restrictions on which jobs a printer accepts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingRules {
    pub color_jobs_only: bool,
    pub monochrome_jobs_only: bool,
    pub duplex_jobs_only: bool,
    pub simplex_jobs_only: bool,
}

impl RoutingRules {
    /// Reject rule sets that exclude both values of one axis.
    pub fn validate(&self, printer: &str) -> Result<()> {
        let conflict = if self.color_jobs_only && self.monochrome_jobs_only {
            Some("color_jobs_only and monochrome_jobs_only are both set")
        } else if self.duplex_jobs_only && self.simplex_jobs_only {
            Some("duplex_jobs_only and simplex_jobs_only are both set")
        } else {
            None
        };
        match conflict {
            Some(detail) => Err(PrintdeskError::ConflictingRoutingRules {
                printer: printer.to_owned(),
                detail: detail.to_owned(),
            }),
            None => Ok(()),
        }
    }

    /// Whether a job with these settings passes the rules.
    pub fn admits(&self, settings: &PrintSettings) -> bool {
        let color = settings.is_color();
        let duplex = settings.duplex.is_duplex();
        !(self.color_jobs_only && !color
            || self.monochrome_jobs_only && color
            || self.duplex_jobs_only && !duplex
            || self.simplex_jobs_only && duplex)
    }
}

/// Detected and administered profile of one physical printer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrinterRecord {
    pub name: String,
    pub color: bool,
    pub duplex: bool,
    /// Sizes reported by detection. Upper bound for `paper_sizes`.
    pub physical_paper_sizes: BTreeSet<PaperSize>,
    /// Sizes currently enabled for scheduling.
    pub paper_sizes: BTreeSet<PaperSize>,
    pub max_copies: u32,
    pub resolutions: Vec<String>,
    #[serde(default)]
    pub routing: RoutingRules,
    /// Sheets in stock, one entry per enabled size.
    pub inventory: BTreeMap<PaperSize, u32>,
}

impl PrinterRecord {
    /// New record from a probe result. Every detected size starts enabled with
    /// an empty tray.
    pub fn from_detected(name: impl Into<String>, caps: DetectedCapabilities) -> Self {
        let inventory = caps.paper_sizes.iter().map(|size| (*size, 0)).collect();
        Self {
            name: name.into(),
            color: caps.color,
            duplex: caps.duplex,
            physical_paper_sizes: caps.paper_sizes.clone(),
            paper_sizes: caps.paper_sizes,
            max_copies: caps.max_copies.max(1),
            resolutions: caps.resolutions,
            routing: RoutingRules::default(),
            inventory,
        }
    }

    /// Sheets of `size` in stock (0 when the size is not enabled).
    pub fn level(&self, size: PaperSize) -> u32 {
        self.inventory.get(&size).copied().unwrap_or(0)
    }

    pub fn supports_size(&self, size: PaperSize) -> bool {
        self.paper_sizes.contains(&size)
    }

    /// Physical and administrative compatibility, ignoring stock.
    pub fn accepts(&self, job: &PrintJob) -> bool {
        self.supports_size(job.settings.paper_size)
            && (!job.is_color() || self.color)
            && (!job.wants_duplex() || self.duplex)
            && self.routing.admits(&job.settings)
    }

    /// Every settings code this printer can satisfy.
    pub fn settings_codes(&self) -> Vec<u32> {
        let colors: &[ColorMode] = if self.color {
            &[ColorMode::Color, ColorMode::Monochrome]
        } else {
            &[ColorMode::Monochrome]
        };
        let sides: &[DuplexMode] = if self.duplex {
            &[DuplexMode::LongEdge, DuplexMode::Simplex]
        } else {
            &[DuplexMode::Simplex]
        };

        let mut codes = Vec::new();
        for paper_size in &self.paper_sizes {
            for orientation in [Orientation::Portrait, Orientation::Landscape] {
                for color_mode in colors {
                    for duplex in sides {
                        let settings = PrintSettings {
                            orientation,
                            color_mode: *color_mode,
                            duplex: *duplex,
                            paper_size: *paper_size,
                        };
                        if self.routing.admits(&settings) {
                            codes.push(settings_code::encode(&settings));
                        }
                    }
                }
            }
        }
        codes
    }
}

/// Immutable view of every registered printer and the discarded set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrinterSet {
    printers: Vec<PrinterRecord>,
    discarded: BTreeSet<String>,
}

impl PrinterSet {
    pub fn new(printers: Vec<PrinterRecord>, discarded: BTreeSet<String>) -> Self {
        Self {
            printers,
            discarded,
        }
    }

    /// Printers in registration order.
    pub fn printers(&self) -> &[PrinterRecord] {
        &self.printers
    }

    pub fn get(&self, name: &str) -> Option<&PrinterRecord> {
        self.printers.iter().find(|p| p.name == name)
    }

    fn get_mut(&mut self, name: &str) -> Option<&mut PrinterRecord> {
        self.printers.iter_mut().find(|p| p.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.printers.iter().map(|p| p.name.as_str())
    }

    pub fn discarded(&self) -> &BTreeSet<String> {
        &self.discarded
    }

    pub fn is_discarded(&self, name: &str) -> bool {
        self.discarded.contains(name)
    }

    /// True when at least one printer exists and all of them are discarded.
    pub fn all_discarded(&self) -> bool {
        !self.printers.is_empty() && self.printers.iter().all(|p| self.is_discarded(&p.name))
    }

    pub fn is_empty(&self) -> bool {
        self.printers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.printers.len()
    }
}

/// Settings a printer advertises to the job source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrinterOffer {
    pub printer: String,
    pub settings_codes: Vec<u32>,
    pub paper_levels: BTreeMap<PaperSize, u32>,
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Owner of the printer set. Cheap to share behind an `Arc`.
pub struct CapabilityStore {
    current: RwLock<Arc<PrinterSet>>,
    state: Arc<StateStore>,
    events: EventBus,
}

impl CapabilityStore {
    /// Load the persisted printer set.
    pub fn load(state: Arc<StateStore>, events: EventBus) -> Result<Self> {
        let set = state.load_printers()?;
        info!(
            printers = set.len(),
            discarded = set.discarded().len(),
            "capability store loaded"
        );
        Ok(Self {
            current: RwLock::new(Arc::new(set)),
            state,
            events,
        })
    }

    /// Current snapshot. Never blocks on a reader.
    pub fn snapshot(&self) -> Arc<PrinterSet> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Copy-modify-swap. `edit` returns `None` to abandon the change.
    fn mutate<R>(&self, edit: impl FnOnce(&mut PrinterSet) -> Option<R>) -> Option<R> {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = PrinterSet::clone(&guard);
        let out = edit(&mut next)?;

        if let Err(e) = self.state.save_printers(&next) {
            error!(error = %e, "failed to persist printer set");
        }
        *guard = Arc::new(next);
        drop(guard);

        self.events.emit(SchedulerEvent::PrinterInfoUpdated);
        Some(out)
    }

    /// Insert a newly detected printer. An existing record keeps its
    /// administrative state; only missing structural fields are filled.
    ///
    /// Returns `true` if the printer was new.
    pub fn upsert_printer(&self, name: &str, caps: DetectedCapabilities) -> bool {
        self.mutate(|set| {
            match set.get_mut(name) {
                Some(existing) => {
                    if existing.resolutions.is_empty() {
                        existing.resolutions = caps.resolutions;
                    }
                    if existing.physical_paper_sizes.is_empty() {
                        existing.physical_paper_sizes = caps.paper_sizes;
                    }
                    debug!(printer = name, "printer rediscovered");
                    Some(false)
                }
                None => {
                    set.printers.push(PrinterRecord::from_detected(name, caps));
                    info!(printer = name, "printer registered");
                    Some(true)
                }
            }
        })
        .unwrap_or(false)
    }

    /// Forget a printer entirely. Idempotent.
    pub fn remove_printer(&self, name: &str) -> bool {
        self.mutate(|set| {
            let before = set.printers.len();
            set.printers.retain(|p| p.name != name);
            let removed = set.printers.len() != before;
            let was_discarded = set.discarded.remove(name);
            (removed || was_discarded).then(|| {
                info!(printer = name, "printer removed");
                removed
            })
        })
        .unwrap_or(false)
    }

    /// Add `delta` sheets (negative to deduct) of `size`, clamping at zero.
    ///
    /// Returns the new level, or `None` for an unknown printer or a size that
    /// is not enabled on it.
    pub fn adjust_inventory(&self, name: &str, size: PaperSize, delta: i64) -> Option<u32> {
        let result = self.mutate(|set| {
            let printer = set.get_mut(name)?;
            let level = printer.inventory.get_mut(&size)?;
            let next = i64::from(*level)
                .saturating_add(delta)
                .clamp(0, i64::from(u32::MAX));
            *level = u32::try_from(next).unwrap_or(0);
            debug!(printer = name, %size, delta, level = *level, "inventory adjusted");
            Some(*level)
        });
        if result.is_none() {
            warn!(printer = name, %size, "inventory adjustment ignored: unknown printer or size");
        }
        result
    }

    /// Replace stock levels wholesale. Sizes not enabled on the printer are ignored.
    pub fn set_inventory_levels(&self, name: &str, levels: &BTreeMap<PaperSize, u32>) -> bool {
        let result = self.mutate(|set| {
            let printer = set.get_mut(name)?;
            for (size, level) in levels {
                match printer.inventory.get_mut(size) {
                    Some(slot) => *slot = *level,
                    None => debug!(printer = name, %size, "level for disabled size ignored"),
                }
            }
            Some(())
        });
        if result.is_none() {
            warn!(printer = name, "inventory levels ignored: unknown printer");
        }
        result.is_some()
    }

    /// Replace the discarded set.
    ///
    /// Returns `true` (and broadcasts `AllPrintersDiscarded`) when every known
    /// printer is now discarded.
    pub fn set_discarded(&self, names: BTreeSet<String>) -> bool {
        let all = self
            .mutate(|set| {
                set.discarded = names;
                Some(set.all_discarded())
            })
            .unwrap_or(false);
        if all {
            warn!("all printers discarded");
            self.events.emit(SchedulerEvent::AllPrintersDiscarded);
        }
        all
    }

    /// Replace a printer's routing rules.
    ///
    /// Conflicting rules are an error; an unknown printer is a logged no-op
    /// (`Ok(false)`).
    pub fn set_routing_rules(&self, name: &str, rules: RoutingRules) -> Result<bool> {
        rules.validate(name)?;
        let applied = self
            .mutate(|set| {
                set.get_mut(name)?.routing = rules;
                info!(printer = name, ?rules, "routing rules updated");
                Some(())
            })
            .is_some();
        if !applied {
            warn!(printer = name, "routing rules ignored: unknown printer");
        }
        Ok(applied)
    }

    /// Enable exactly `requested` paper sizes, limited to what the printer
    /// physically supports. New sizes start with an empty tray; stock for
    /// disabled sizes is dropped.
    ///
    /// Returns the effective set, or `None` for an unknown printer.
    pub fn set_paper_sizes(
        &self,
        name: &str,
        requested: &BTreeSet<PaperSize>,
    ) -> Option<BTreeSet<PaperSize>> {
        let result = self.mutate(|set| {
            let printer = set.get_mut(name)?;
            let effective: BTreeSet<PaperSize> = requested
                .intersection(&printer.physical_paper_sizes)
                .copied()
                .collect();
            if effective.len() != requested.len() {
                debug!(printer = name, "unsupported paper sizes dropped");
            }

            printer.inventory.retain(|size, _| effective.contains(size));
            for size in &effective {
                printer.inventory.entry(*size).or_insert(0);
            }
            printer.paper_sizes = effective.clone();
            info!(printer = name, sizes = ?effective, "paper sizes updated");
            Some(effective)
        });
        if result.is_none() {
            warn!(printer = name, "paper sizes ignored: unknown printer");
        }
        result
    }

    /// What every non-discarded printer can print, plus its stock.
    pub fn supported_settings(&self) -> Vec<PrinterOffer> {
        let set = self.snapshot();
        set.printers()
            .iter()
            .filter(|p| !set.is_discarded(&p.name))
            .map(|p| PrinterOffer {
                printer: p.name.clone(),
                settings_codes: p.settings_codes(),
                paper_levels: p.inventory.clone(),
            })
            .collect()
    }
}
