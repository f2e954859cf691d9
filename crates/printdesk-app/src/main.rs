// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printdesk — print shop job scheduler
//
// Entry point. Initialises logging and backend services, synchronises the
// printer list, then serves JSON-lines commands on stdin while relaying job
// status updates to stdout. Logs go to stderr.

mod commands;
mod services;

use std::process::ExitCode;

use commands::Output;
use services::app_services::AppServices;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Printdesk starting");

    let (services, mut statuses) = match AppServices::init() {
        Ok(initialised) => initialised,
        Err(e) => {
            tracing::error!(error = %e, "startup failed");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(
        data_dir = %services.data_dir.display(),
        virtual_keywords = ?services.config.virtual_printer_keywords,
        "configuration loaded"
    );

    let scheduler = services.scheduler.clone();
    match scheduler.sync_printers().await {
        Ok(printers) => tracing::info!(?printers, "printers available"),
        Err(e) => tracing::warn!(error = %e, "printer enumeration failed; continuing with stored printers"),
    }

    let relay = tokio::spawn(async move {
        while let Some(event) = statuses.recv().await {
            commands::emit(&Output::Status(event));
        }
    });

    let interrupted = tokio::select! {
        () = commands::serve(&scheduler, tokio::io::stdin()) => {
            // Let accepted jobs finish before exiting.
            scheduler.wait_idle().await;
            false
        }
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                tracing::error!(error = %e, "signal handler failed");
            }
            tracing::info!("interrupt received");
            true
        }
    };

    scheduler.shutdown().await;
    // Dropping the last scheduler handle closes the status channel.
    drop(scheduler);
    drop(services);
    if let Err(e) = relay.await {
        tracing::warn!(error = %e, "status relay ended abnormally");
    }
    tracing::info!("Printdesk stopped");
    if interrupted {
        // The blocking stdin reader would otherwise hold up runtime shutdown.
        std::process::exit(0);
    }
    ExitCode::SUCCESS
}
