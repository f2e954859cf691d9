// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// JSON-lines control protocol.
//
// Each input line is one command object tagged by `command`:
//
//   {"command":"submit","job":{"id":"j1","user_id":"u1","combined_file_path":"a.pdf"}}
//   {"command":"adjust_inventory","printer":"Office","paper_size":"A4","delta":500}
//
// Each command produces exactly one `response` line on stdout. Job status
// updates are interleaved as `status` lines.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::{debug, error, info, warn};

use printdesk_core::error::{PrintdeskError, Result};
use printdesk_core::{JobId, JobRequest, PaperSize, StatusEvent};
use printdesk_scheduler::{RoutingRules, Scheduler};

/// A control command read from the input stream.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    Submit {
        job: JobRequest,
    },
    Retry {
        job_id: JobId,
        #[serde(default)]
        printer: Option<String>,
    },
    SyncPrinters,
    RemovePrinter {
        printer: String,
    },
    SetDiscarded {
        printers: BTreeSet<String>,
    },
    SetRoutingRules {
        printer: String,
        rules: RoutingRules,
    },
    SetPaperSizes {
        printer: String,
        sizes: BTreeSet<PaperSize>,
    },
    AdjustInventory {
        printer: String,
        paper_size: PaperSize,
        delta: i64,
    },
    SetInventoryLevels {
        printer: String,
        levels: BTreeMap<PaperSize, u32>,
    },
    Printers,
    Queues,
    History,
    Metrics,
    SupportedSettings,
    Audit {
        job_id: JobId,
    },
    AuditRecent {
        #[serde(default = "default_audit_limit")]
        limit: u32,
    },
}

fn default_audit_limit() -> u32 {
    50
}

/// One line written to stdout.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Output {
    Response {
        ok: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        result: Option<Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    Status(StatusEvent),
}

impl Output {
    fn ok(result: Value) -> Self {
        Self::Response {
            ok: true,
            result: Some(result),
            error: None,
        }
    }

    fn error(e: &PrintdeskError) -> Self {
        Self::Response {
            ok: false,
            result: None,
            error: Some(e.to_string()),
        }
    }
}

/// Write one output line.
pub fn emit(output: &Output) {
    match serde_json::to_string(output) {
        Ok(line) => println!("{line}"),
        Err(e) => error!(error = %e, "failed to encode output"),
    }
}

/// Read commands until the input closes.
pub async fn serve<R>(scheduler: &Scheduler, input: R)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(input).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                emit(&respond(scheduler, line).await);
            }
            Ok(None) => {
                info!("command input closed");
                return;
            }
            Err(e) => {
                error!(error = %e, "failed to read command input");
                return;
            }
        }
    }
}

/// Parse and execute one command line.
pub async fn respond(scheduler: &Scheduler, line: &str) -> Output {
    let result = match serde_json::from_str::<Command>(line) {
        Ok(command) => {
            debug!(?command, "command received");
            handle(scheduler, command).await
        }
        Err(e) => Err(e.into()),
    };
    match result {
        Ok(value) => Output::ok(value),
        Err(e) => {
            warn!(error = %e, "command failed");
            Output::error(&e)
        }
    }
}

pub async fn handle(scheduler: &Scheduler, command: Command) -> Result<Value> {
    let value = match command {
        Command::Submit { job } => serde_json::to_value(scheduler.submit(job))?,
        Command::Retry { job_id, printer } => {
            json!({ "printer": scheduler.retry(&job_id, printer.as_deref())? })
        }
        Command::SyncPrinters => json!({ "printers": scheduler.sync_printers().await? }),
        Command::RemovePrinter { printer } => {
            json!({ "removed": scheduler.remove_printer(&printer) })
        }
        Command::SetDiscarded { printers } => {
            json!({ "all_discarded": scheduler.set_discarded(printers) })
        }
        Command::SetRoutingRules { printer, rules } => {
            json!({ "applied": scheduler.set_routing_rules(&printer, rules)? })
        }
        Command::SetPaperSizes { printer, sizes } => {
            json!({ "paper_sizes": scheduler.set_paper_sizes(&printer, &sizes) })
        }
        Command::AdjustInventory {
            printer,
            paper_size,
            delta,
        } => json!({ "level": scheduler.adjust_inventory(&printer, paper_size, delta) }),
        Command::SetInventoryLevels { printer, levels } => {
            json!({ "applied": scheduler.set_inventory_levels(&printer, &levels) })
        }
        Command::Printers => {
            let set = scheduler.printers();
            json!({
                "printers": set.printers(),
                "discarded": set.discarded(),
                "intake_enabled": scheduler.intake_enabled(),
            })
        }
        Command::Queues => serde_json::to_value(scheduler.queues())?,
        Command::History => serde_json::to_value(scheduler.history())?,
        Command::Metrics => json!({
            "total": scheduler.metrics(),
            "daily": scheduler.daily_metrics(),
        }),
        Command::SupportedSettings => serde_json::to_value(scheduler.supported_settings())?,
        Command::Audit { job_id } => serde_json::to_value(scheduler.audit_trail(&job_id)?)?,
        Command::AuditRecent { limit } => serde_json::to_value(scheduler.recent_audit(limit)?)?,
    };
    Ok(value)
}
