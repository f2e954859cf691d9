// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Data directory resolution.

use std::path::{Path, PathBuf};

use tracing::warn;

/// Overrides every other location when set and non-empty.
pub const DATA_DIR_ENV: &str = "PRINTDESK_DATA_DIR";

/// Return the application data directory, creating it if needed.
pub fn data_dir() -> PathBuf {
    let dir = resolve(|key| std::env::var(key).ok());
    ensure(&dir);
    dir
}

/// Return a subdirectory inside the data dir (e.g. "inbox", "spool").
pub fn data_subdir(name: &str) -> PathBuf {
    let dir = data_dir().join(name);
    ensure(&dir);
    dir
}

fn ensure(dir: &Path) {
    if let Err(e) = std::fs::create_dir_all(dir) {
        warn!(path = %dir.display(), error = %e, "cannot create data directory");
    }
}

fn resolve(env: impl Fn(&str) -> Option<String>) -> PathBuf {
    let set = |key: &str| env(key).filter(|value| !value.is_empty());

    if let Some(dir) = set(DATA_DIR_ENV) {
        return PathBuf::from(dir);
    }
    let base = if let Some(xdg) = set("XDG_DATA_HOME") {
        PathBuf::from(xdg)
    } else if let Some(home) = set("HOME") {
        PathBuf::from(home).join(".local").join("share")
    } else {
        // Last resort
        PathBuf::from("/tmp")
    };
    base.join("printdesk")
}
