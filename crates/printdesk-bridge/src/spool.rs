// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Spool-directory file fetcher.
//
// Job references are relative paths under a source directory (a synced inbox
// or mounted bucket). Each fetch copies the document into the spool directory
// under a unique name so concurrent jobs never share a temporary file.

use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use printdesk_core::error::{PrintdeskError, Result};

use crate::traits::FileFetcher;

/// Copies documents from `source_dir` into `spool_dir`.
#[derive(Debug)]
pub struct DirectoryFetcher {
    source_dir: PathBuf,
    spool_dir: PathBuf,
    sequence: AtomicU64,
}

impl DirectoryFetcher {
    pub fn new(source_dir: impl Into<PathBuf>, spool_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_dir: source_dir.into(),
            spool_dir: spool_dir.into(),
            sequence: AtomicU64::new(0),
        }
    }

    /// Resolve a reference to a path inside the source directory.
    ///
    /// Only plain relative components are accepted.
    fn resolve(&self, reference: &str) -> Result<PathBuf> {
        let relative = Path::new(reference);
        let plain = !reference.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !plain {
            return Err(PrintdeskError::Fetch(format!(
                "invalid document reference '{reference}'"
            )));
        }
        Ok(self.source_dir.join(relative))
    }
}

#[async_trait]
impl FileFetcher for DirectoryFetcher {
    #[instrument(skip(self))]
    async fn fetch(&self, reference: &str) -> Result<PathBuf> {
        let source = self.resolve(reference)?;
        let file_name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".into());
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        let target = self.spool_dir.join(format!("{seq:06}-{file_name}"));

        tokio::fs::create_dir_all(&self.spool_dir).await?;
        tokio::fs::copy(&source, &target).await.map_err(|e| {
            PrintdeskError::Fetch(format!("cannot fetch {}: {e}", source.display()))
        })?;

        debug!(target = %target.display(), "document spooled");
        Ok(target)
    }

    async fn release(&self, path: &Path) {
        if let Err(e) = tokio::fs::remove_file(path).await {
            warn!(path = %path.display(), error = %e, "failed to release spooled document");
        }
    }
}
