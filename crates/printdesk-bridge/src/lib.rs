// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printdesk — Collaborator interfaces and platform bridges.
//
// The scheduler only talks to the outside world through the traits in
// `traits`: fetching documents, printing them, probing printers, counting
// pages and relaying status events. This crate also ships the concrete
// implementations used by the daemon.

pub mod inspect;
pub mod sinks;
pub mod spool;
pub mod traits;

#[cfg(unix)]
pub mod cups;

#[cfg(not(unix))]
pub mod stub;

use std::sync::Arc;

pub use inspect::PdfInspector;
pub use sinks::{ChannelSink, TracingSink};
pub use spool::DirectoryFetcher;
pub use traits::*;

/// Returns the print/probe bridge for the host operating system.
///
/// Unix hosts drive the CUPS command-line tools; everything else gets a stub
/// that reports `PlatformUnavailable`.
pub fn platform_bridge() -> Arc<dyn PlatformBridge> {
    #[cfg(unix)]
    {
        Arc::new(cups::CupsBridge::new())
    }
    #[cfg(not(unix))]
    {
        Arc::new(stub::StubBridge)
    }
}
