// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Stub bridge for hosts without CUPS.
//
// Every method returns `PlatformUnavailable`; the scheduler then falls back to
// conservative capabilities and fails print attempts cleanly.

use std::path::Path;

use async_trait::async_trait;
use printdesk_core::error::{PrintdeskError, Result};
use printdesk_core::{DetectedCapabilities, PrintInvocation};

use crate::traits::*;

/// No-op bridge returned on non-Unix platforms.
pub struct StubBridge;

impl PlatformBridge for StubBridge {
    fn platform_name(&self) -> &str {
        "Unsupported platform (stub)"
    }
}

#[async_trait]
impl PrintExecutor for StubBridge {
    async fn print(&self, _document: &Path, _invocation: &PrintInvocation) -> Result<()> {
        tracing::warn!("PrintExecutor::print called on stub bridge");
        Err(PrintdeskError::PlatformUnavailable)
    }
}

#[async_trait]
impl CapabilityProbe for StubBridge {
    async fn list_printers(&self) -> Result<Vec<String>> {
        tracing::warn!("CapabilityProbe::list_printers called on stub bridge");
        Err(PrintdeskError::PlatformUnavailable)
    }

    async fn detect(&self, _printer: &str) -> Result<DetectedCapabilities> {
        Err(PrintdeskError::PlatformUnavailable)
    }
}
