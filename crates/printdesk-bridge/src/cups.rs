// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// CUPS bridge — drives the `lpstat`, `lpoptions` and `lp` command-line tools.
//
// Enumeration uses `lpstat -e`, capability detection combines
// `lpoptions -p <name>` (current option values) with `lpstat -l -p <name>`
// (supported paper sizes), and printing submits through `lp`.

use std::collections::BTreeSet;
use std::ffi::OsString;
use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

use printdesk_core::error::{PrintdeskError, Result};
use printdesk_core::{DetectedCapabilities, PaperSize, PrintInvocation};

use crate::traits::{CapabilityProbe, PlatformBridge, PrintExecutor};

/// Resolution reported when the driver does not expose one.
const DEFAULT_RESOLUTION: &str = "300dpi";

/// Upper bound on copies; CUPS has no per-queue limit to query.
const DEFAULT_MAX_COPIES: u32 = 999;

/// Bridge to the local CUPS installation.
#[derive(Debug, Clone)]
pub struct CupsBridge {
    lp: String,
    lpstat: String,
    lpoptions: String,
}

impl Default for CupsBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl CupsBridge {
    pub fn new() -> Self {
        Self {
            lp: "lp".into(),
            lpstat: "lpstat".into(),
            lpoptions: "lpoptions".into(),
        }
    }
}

impl PlatformBridge for CupsBridge {
    fn platform_name(&self) -> &str {
        "CUPS"
    }
}

#[async_trait]
impl CapabilityProbe for CupsBridge {
    #[instrument(skip(self))]
    async fn list_printers(&self) -> Result<Vec<String>> {
        let stdout = run(&self.lpstat, ["-e"], PrintdeskError::Probe).await?;
        let names = parse_printer_names(&stdout);
        debug!(count = names.len(), "printers enumerated");
        Ok(names)
    }

    #[instrument(skip(self))]
    async fn detect(&self, printer: &str) -> Result<DetectedCapabilities> {
        let options = run(&self.lpoptions, ["-p", printer], PrintdeskError::Probe).await?;
        let details = run(&self.lpstat, ["-l", "-p", printer], PrintdeskError::Probe).await?;
        let caps = capabilities_from(&options, &details);
        info!(
            printer,
            color = caps.color,
            duplex = caps.duplex,
            sizes = caps.paper_sizes.len(),
            "capabilities detected"
        );
        Ok(caps)
    }
}

#[async_trait]
impl PrintExecutor for CupsBridge {
    #[instrument(skip(self, invocation), fields(printer = %invocation.printer, pages = %invocation.pages))]
    async fn print(&self, document: &Path, invocation: &PrintInvocation) -> Result<()> {
        let args = lp_arguments(document, invocation);
        let stdout = run(&self.lp, args, PrintdeskError::PrintInvocation).await?;
        info!(response = stdout.trim(), "lp accepted job");
        Ok(())
    }
}

/// Run a CUPS tool and return its stdout, mapping any failure through `wrap`.
async fn run<I, S>(program: &str, args: I, wrap: fn(String) -> PrintdeskError) -> Result<String>
where
    I: IntoIterator<Item = S>,
    S: Into<OsString>,
{
    let args: Vec<OsString> = args.into_iter().map(Into::into).collect();
    let output = Command::new(program)
        .args(&args)
        .output()
        .await
        .map_err(|e| wrap(format!("failed to run {program}: {e}")))?;

    let stderr = String::from_utf8_lossy(&output.stderr);
    if !output.status.success() {
        return Err(wrap(format!(
            "{program} exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }
    if !stderr.trim().is_empty() {
        warn!(program, stderr = %stderr.trim(), "CUPS tool wrote to stderr");
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

// -- Parsing -----------------------------------------------------------------

/// One printer name per line, as printed by `lpstat -e`.
pub fn parse_printer_names(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Values of interest from `lpoptions -p <name>`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LpOptions {
    pub color: bool,
    pub duplex: bool,
    pub resolution: Option<String>,
}

/// Parse the space-separated `key=value` list printed by `lpoptions -p`.
///
/// A `ColorModel` containing "gray" means monochrome and a `Duplex` containing
/// "none" means simplex. Missing keys are treated as unsupported.
pub fn parse_lpoptions(stdout: &str) -> LpOptions {
    let mut options = LpOptions::default();
    for token in stdout.split_whitespace() {
        let Some((key, value)) = token.split_once('=') else {
            continue;
        };
        let value = value.trim_matches('\'');
        match key {
            "ColorModel" => options.color = !value.to_lowercase().contains("gray"),
            "Duplex" => options.duplex = !value.to_lowercase().contains("none"),
            "Resolution" if !value.is_empty() => options.resolution = Some(value.to_owned()),
            _ => {}
        }
    }
    options
}

/// Stocked paper sizes listed on the `PaperSize Supported:` line of
/// `lpstat -l -p`. Unknown sizes are skipped.
pub fn parse_supported_paper_sizes(stdout: &str) -> BTreeSet<PaperSize> {
    stdout
        .lines()
        .find_map(|line| line.split_once("PaperSize Supported:").map(|(_, rest)| rest))
        .map(|list| {
            list.split(',')
                .filter_map(|size| size.trim().parse::<PaperSize>().ok())
                .collect()
        })
        .unwrap_or_default()
}

/// Combine both tool outputs into a capability record.
pub fn capabilities_from(lpoptions: &str, lpstat: &str) -> DetectedCapabilities {
    let options = parse_lpoptions(lpoptions);
    let mut paper_sizes = parse_supported_paper_sizes(lpstat);
    if paper_sizes.is_empty() {
        paper_sizes = PaperSize::all();
    }

    DetectedCapabilities {
        color: options.color,
        duplex: options.duplex,
        paper_sizes,
        max_copies: DEFAULT_MAX_COPIES,
        resolutions: vec![
            options
                .resolution
                .unwrap_or_else(|| DEFAULT_RESOLUTION.to_owned()),
        ],
    }
}

/// Build the `lp` argument list for one invocation.
pub fn lp_arguments(document: &Path, invocation: &PrintInvocation) -> Vec<OsString> {
    let color_mode = if invocation.monochrome {
        "monochrome"
    } else {
        "color"
    };

    let mut args: Vec<OsString> = vec![
        "-d".into(),
        invocation.printer.clone().into(),
        "-n".into(),
        invocation.copies.to_string().into(),
        "-P".into(),
        invocation.pages.to_string().into(),
        "-o".into(),
        format!("media={}", invocation.paper_size.media_keyword()).into(),
        "-o".into(),
        format!("sides={}", invocation.duplex.sides_keyword()).into(),
        "-o".into(),
        format!(
            "orientation-requested={}",
            invocation.orientation.ipp_enum_value()
        )
        .into(),
        "-o".into(),
        format!("print-color-mode={color_mode}").into(),
    ];
    if let Some(resolution) = &invocation.resolution {
        args.push("-o".into());
        args.push(format!("Resolution={resolution}").into());
    }
    args.push("--".into());
    args.push(document.as_os_str().to_owned());
    args
}
