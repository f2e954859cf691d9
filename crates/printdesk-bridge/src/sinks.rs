// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Status sinks.

use tokio::sync::mpsc;
use tracing::{debug, info};

use printdesk_core::StatusEvent;

use crate::traits::StatusSink;

/// Logs every status event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl StatusSink for TracingSink {
    fn publish(&self, event: &StatusEvent) {
        info!(
            job_id = %event.job_id,
            user_id = %event.user_id,
            status = ?event.status,
            reason = %event.reason,
            "job status"
        );
    }
}

/// Forwards status events to an async consumer (e.g. the job-source relay).
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<StatusEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<StatusEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl StatusSink for ChannelSink {
    fn publish(&self, event: &StatusEvent) {
        if self.tx.send(event.clone()).is_err() {
            debug!(job_id = %event.job_id, "status receiver dropped, event discarded");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use printdesk_core::{JobId, StatusKind};

    fn event(status: StatusKind) -> StatusEvent {
        StatusEvent {
            job_id: JobId::from("j1"),
            user_id: "u1".into(),
            status,
            reason: String::new(),
        }
    }

    #[test]
    fn channel_sink_forwards_in_order() {
        let (sink, mut rx) = ChannelSink::new();
        sink.publish(&event(StatusKind::Printing));
        sink.publish(&event(StatusKind::Completed));
        assert_eq!(rx.try_recv().expect("first").status, StatusKind::Printing);
        assert_eq!(rx.try_recv().expect("second").status, StatusKind::Completed);
    }

    #[test]
    fn closed_channel_is_silent() {
        let (sink, rx) = ChannelSink::new();
        drop(rx);
        sink.publish(&event(StatusKind::Failed));
        TracingSink.publish(&event(StatusKind::Failed));
    }
}
