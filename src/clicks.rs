//! Background click counting.
//!
//! Redirects hand the short code to a [`ClickRecorder`]; a single worker task
//! drains the channel and bumps the counters in storage. Failures are logged
//! and dropped.

use crate::store::Storage;
use std::sync::Arc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

#[derive(Clone)]
pub struct ClickRecorder {
    sender: UnboundedSender<String>,
}

impl ClickRecorder {
    /// Queue one click for `code`. Never blocks the caller.
    pub fn record(&self, code: &str) {
        if self.sender.send(code.to_string()).is_err() {
            tracing::error!("Click worker stopped, dropping click for {}", code);
        }
    }
}

/// Start the worker. It exits once every recorder is dropped and the queue is
/// empty, so awaiting the handle on shutdown applies all pending clicks.
pub fn spawn(storage: Arc<Storage>) -> (ClickRecorder, JoinHandle<()>) {
    let (sender, receiver) = unbounded_channel();
    let handle = tokio::spawn(run(storage, receiver));
    (ClickRecorder { sender }, handle)
}

async fn run(storage: Arc<Storage>, mut receiver: UnboundedReceiver<String>) {
    while let Some(code) = receiver.recv().await {
        match storage.increment_clicks(&code) {
            Ok(total) => tracing::debug!("Click recorded for {} (total {})", code, total),
            Err(err) => tracing::error!("Updating click counter for {} failed: {}", code, err),
        }
    }
    tracing::debug!("Click worker finished");
}
