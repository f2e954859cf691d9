// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Central service layer — opens persistent state, picks the platform bridge
// and wires everything into a `Scheduler`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, warn};

use printdesk_bridge::{ChannelSink, DirectoryFetcher, PdfInspector};
use printdesk_core::error::Result;
use printdesk_core::{AppConfig, StatusEvent};
use printdesk_scheduler::{AuditLog, Collaborators, Scheduler, StateStore};

use super::data_dir;

const CONFIG_FILE: &str = "config.json";
const AUDIT_FILE: &str = "audit.db";

/// Everything the daemon needs at runtime.
pub struct AppServices {
    pub scheduler: Scheduler,
    pub config: AppConfig,
    pub data_dir: PathBuf,
}

impl AppServices {
    /// Initialise all services. Call once at startup.
    ///
    /// Returns the receiving end of the status relay alongside the services.
    pub fn init() -> Result<(Self, mpsc::UnboundedReceiver<StatusEvent>)> {
        let dir = data_dir::data_dir();
        info!(path = %dir.display(), "initialising app services");

        let config = match load_config(&dir) {
            Some(config) => config,
            None => {
                let config = AppConfig::default();
                if let Err(e) = persist_config(&dir, &config) {
                    warn!(error = %e, "could not write default config");
                }
                config
            }
        };

        let state = Arc::new(StateStore::open(dir.join(&config.database_file))?);
        let audit = AuditLog::open(dir.join(AUDIT_FILE))?;

        let source_dir = config
            .source_dir
            .clone()
            .unwrap_or_else(|| data_dir::data_subdir("inbox"));
        let spool_dir = config
            .spool_dir
            .clone()
            .unwrap_or_else(|| data_dir::data_subdir("spool"));

        let bridge = printdesk_bridge::platform_bridge();
        info!(platform = bridge.platform_name(), "print bridge selected");
        let (sink, statuses) = ChannelSink::new();
        let collaborators = Collaborators {
            fetcher: Arc::new(DirectoryFetcher::new(source_dir, spool_dir)),
            executor: bridge.clone(),
            probe: bridge,
            inspector: Arc::new(PdfInspector),
            sink: Arc::new(sink),
        };

        let scheduler = Scheduler::open(config.clone(), state, audit, collaborators)?;
        info!("app services initialised");

        Ok((
            Self {
                scheduler,
                config,
                data_dir: dir,
            },
            statuses,
        ))
    }
}

fn load_config(data_dir: &Path) -> Option<AppConfig> {
    let path = data_dir.join(CONFIG_FILE);
    let data = std::fs::read_to_string(&path).ok()?;
    match serde_json::from_str(&data) {
        Ok(config) => Some(config),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring unreadable config");
            None
        }
    }
}

fn persist_config(data_dir: &Path, config: &AppConfig) -> Result<()> {
    let path = data_dir.join(CONFIG_FILE);
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(&path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_round_trips_through_data_dir() {
        let dir = tempfile::tempdir().expect("temp dir");
        assert!(load_config(dir.path()).is_none());

        let mut config = AppConfig::default();
        config.scheduler.sheet_overhead = 4;
        config.virtual_printer_keywords.push("pdf".into());
        persist_config(dir.path(), &config).expect("persist");

        assert_eq!(load_config(dir.path()), Some(config));
    }

    #[test]
    fn partial_config_fills_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            r#"{ "scheduler": { "payout_fraction": 0.5 } }"#,
        )
        .expect("write");

        let config = load_config(dir.path()).expect("config");
        assert!((config.scheduler.payout_fraction - 0.5).abs() < 1e-9);
        assert_eq!(config.scheduler.sheet_overhead, 2);
        assert_eq!(config.database_file, "printdesk.db");
    }

    #[test]
    fn broken_config_is_ignored() {
        let dir = tempfile::tempdir().expect("temp dir");
        std::fs::write(dir.path().join(CONFIG_FILE), "{ not json").expect("write");
        assert!(load_config(dir.path()).is_none());
    }
}
