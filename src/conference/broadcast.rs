//! Asynchronous layout broadcasting.
//!
//! Per-call conference-info dispatch goes through a dedicated task so no
//! call into the signalling layer ever runs under a conference lock.
//! Jobs are processed in submission order, which keeps broadcasts FIFO
//! with respect to mixer source updates.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::debug;

use crate::call::Call;

/// One queued per-call dispatch.
struct BroadcastJob {
    call: Arc<dyn Call>,
    payload: String,
}

/// Handle onto the broadcaster task.
#[derive(Clone)]
pub(crate) struct Broadcaster {
    tx: mpsc::UnboundedSender<BroadcastJob>,
}

impl Broadcaster {
    /// Spawn the broadcaster task and return its handle. The task exits
    /// when the last handle is dropped.
    pub(crate) fn spawn() -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<BroadcastJob>();
        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                job.call.send_conf_info(job.payload).await;
            }
            debug!("Broadcaster task finished");
        });
        Self { tx }
    }

    /// Queue a conference-info payload for one call.
    pub(crate) fn send_conf_info(&self, call: Arc<dyn Call>, payload: String) {
        let _ = self.tx.send(BroadcastJob { call, payload });
    }
}
