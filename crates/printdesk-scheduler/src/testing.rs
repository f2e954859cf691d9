// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-memory collaborator fakes shared by the scheduler tests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use printdesk_bridge::{
    CapabilityProbe, DocumentInspector, FileFetcher, PrintExecutor, StatusSink,
};
use printdesk_core::error::{PrintdeskError, Result};
use printdesk_core::{DetectedCapabilities, PrintInvocation, StatusEvent};

use crate::scheduler::Collaborators;

const FAKE_PREFIX: &str = "%FAKE pages=";

/// Bytes that [`FakeInspector`] reports as a `pages`-page document.
pub(crate) fn fake_document(pages: u32) -> Vec<u8> {
    format!("{FAKE_PREFIX}{pages}").into_bytes()
}

/// Serves documents from memory by writing them into a temp directory.
pub(crate) struct FakeFetcher {
    dir: tempfile::TempDir,
    documents: Mutex<HashMap<String, Vec<u8>>>,
    released: Mutex<Vec<PathBuf>>,
    seq: AtomicU64,
}

impl FakeFetcher {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("temp dir"),
            documents: Mutex::new(HashMap::new()),
            released: Mutex::new(Vec::new()),
            seq: AtomicU64::new(0),
        }
    }

    pub(crate) fn insert(&self, reference: &str, bytes: Vec<u8>) {
        self.documents
            .lock()
            .expect("documents")
            .insert(reference.to_owned(), bytes);
    }

    pub(crate) fn released(&self) -> Vec<PathBuf> {
        self.released.lock().expect("released").clone()
    }
}

#[async_trait]
impl FileFetcher for FakeFetcher {
    async fn fetch(&self, reference: &str) -> Result<PathBuf> {
        let bytes = self
            .documents
            .lock()
            .expect("documents")
            .get(reference)
            .cloned()
            .ok_or_else(|| PrintdeskError::Fetch(format!("no such document: {reference}")))?;
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        let path = self.dir.path().join(format!("{seq:06}.pdf"));
        tokio::fs::write(&path, bytes).await?;
        Ok(path)
    }

    async fn release(&self, path: &Path) {
        let _ = tokio::fs::remove_file(path).await;
        self.released.lock().expect("released").push(path.to_path_buf());
    }
}

/// Reads the page count back out of [`fake_document`] bytes.
pub(crate) struct FakeInspector;

impl DocumentInspector for FakeInspector {
    fn page_count(&self, document: &[u8]) -> Result<u32> {
        std::str::from_utf8(document)
            .ok()
            .and_then(|text| text.strip_prefix(FAKE_PREFIX))
            .and_then(|count| count.parse().ok())
            .ok_or_else(|| PrintdeskError::Document("not a fake document".into()))
    }
}

/// Records every accepted invocation and the peak per-printer concurrency.
#[derive(Default)]
pub(crate) struct RecordingExecutor {
    invocations: Mutex<Vec<PrintInvocation>>,
    failure: Mutex<Option<String>>,
    delay: Mutex<Duration>,
    in_flight: Mutex<HashMap<String, usize>>,
    peak: Mutex<HashMap<String, usize>>,
}

impl RecordingExecutor {
    pub(crate) fn invocations(&self) -> Vec<PrintInvocation> {
        self.invocations.lock().expect("invocations").clone()
    }

    pub(crate) fn fail_with(&self, message: &str) {
        *self.failure.lock().expect("failure") = Some(message.to_owned());
    }

    pub(crate) fn succeed(&self) {
        *self.failure.lock().expect("failure") = None;
    }

    pub(crate) fn set_delay(&self, delay: Duration) {
        *self.delay.lock().expect("delay") = delay;
    }

    /// Highest number of simultaneous print calls seen for `printer`.
    pub(crate) fn peak_concurrency(&self, printer: &str) -> usize {
        self.peak
            .lock()
            .expect("peak")
            .get(printer)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl PrintExecutor for RecordingExecutor {
    async fn print(&self, _document: &Path, invocation: &PrintInvocation) -> Result<()> {
        let printer = invocation.printer.clone();
        {
            let mut in_flight = self.in_flight.lock().expect("in flight");
            let now = in_flight.entry(printer.clone()).or_default();
            *now += 1;
            let mut peak = self.peak.lock().expect("peak");
            let top = peak.entry(printer.clone()).or_default();
            *top = (*top).max(*now);
        }

        let delay = *self.delay.lock().expect("delay");
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if let Some(now) = self.in_flight.lock().expect("in flight").get_mut(&printer) {
            *now -= 1;
        }

        if let Some(message) = self.failure.lock().expect("failure").clone() {
            return Err(PrintdeskError::PrintInvocation(message));
        }
        self.invocations
            .lock()
            .expect("invocations")
            .push(invocation.clone());
        Ok(())
    }
}

/// Printer list and per-printer capabilities; printers without an entry
/// fail detection.
#[derive(Default)]
pub(crate) struct FakeProbe {
    printers: Mutex<Vec<String>>,
    capabilities: Mutex<HashMap<String, DetectedCapabilities>>,
}

impl FakeProbe {
    pub(crate) fn set_printers(&self, names: &[&str]) {
        *self.printers.lock().expect("printers") = names.iter().map(|n| n.to_string()).collect();
    }

    pub(crate) fn set_capabilities(&self, printer: &str, caps: DetectedCapabilities) {
        self.capabilities
            .lock()
            .expect("capabilities")
            .insert(printer.to_owned(), caps);
    }
}

#[async_trait]
impl CapabilityProbe for FakeProbe {
    async fn list_printers(&self) -> Result<Vec<String>> {
        Ok(self.printers.lock().expect("printers").clone())
    }

    async fn detect(&self, printer: &str) -> Result<DetectedCapabilities> {
        self.capabilities
            .lock()
            .expect("capabilities")
            .get(printer)
            .cloned()
            .ok_or_else(|| PrintdeskError::Probe(format!("{printer} did not answer")))
    }
}

/// Collects published status events.
#[derive(Default)]
pub(crate) struct RecordingSink {
    events: Mutex<Vec<StatusEvent>>,
}

impl RecordingSink {
    pub(crate) fn events(&self) -> Vec<StatusEvent> {
        self.events.lock().expect("events").clone()
    }
}

impl StatusSink for RecordingSink {
    fn publish(&self, event: &StatusEvent) {
        self.events.lock().expect("events").push(event.clone());
    }
}

/// One of each fake, with typed handles kept for assertions.
pub(crate) struct Fakes {
    pub(crate) fetcher: Arc<FakeFetcher>,
    pub(crate) executor: Arc<RecordingExecutor>,
    pub(crate) probe: Arc<FakeProbe>,
    pub(crate) sink: Arc<RecordingSink>,
}

impl Fakes {
    pub(crate) fn new() -> Self {
        Self {
            fetcher: Arc::new(FakeFetcher::new()),
            executor: Arc::new(RecordingExecutor::default()),
            probe: Arc::new(FakeProbe::default()),
            sink: Arc::new(RecordingSink::default()),
        }
    }

    pub(crate) fn collaborators(&self) -> Collaborators {
        Collaborators {
            fetcher: Arc::clone(&self.fetcher) as Arc<dyn FileFetcher>,
            executor: Arc::clone(&self.executor) as Arc<dyn PrintExecutor>,
            probe: Arc::clone(&self.probe) as Arc<dyn CapabilityProbe>,
            inspector: Arc::new(FakeInspector),
            sink: Arc::clone(&self.sink) as Arc<dyn StatusSink>,
        }
    }
}
