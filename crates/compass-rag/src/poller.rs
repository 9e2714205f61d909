//! Background refresh of the document collection while server-side
//! processing is outstanding.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use compass_core::{Error, Result};

use crate::documents::DocumentLibrary;

/// Handle to control a running poller. Dropping it also stops the poller.
pub struct PollerHandle {
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl PollerHandle {
    /// Signal the poller to stop and wait for it to exit.
    pub async fn shutdown(self) -> Result<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| Error::Internal("Failed to send shutdown signal".to_string()))?;
        self.task
            .await
            .map_err(|e| Error::Internal(format!("Document poller task failed: {}", e)))
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Refreshes the collection on an interval, but only while some document
/// is `pending` or `processing`. Each refresh feeds the embedding tracker.
pub struct DocumentPoller {
    library: Arc<DocumentLibrary>,
    interval: Duration,
}

impl DocumentPoller {
    pub fn new(library: Arc<DocumentLibrary>, interval: Duration) -> Self {
        Self { library, interval }
    }

    /// Start polling in a background task.
    pub fn start(self) -> PollerHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        let task = tokio::spawn(async move {
            self.run(&mut shutdown_rx).await;
        });
        PollerHandle { shutdown_tx, task }
    }

    async fn run(&self, shutdown_rx: &mut mpsc::Receiver<()>) {
        info!(
            poll_interval_ms = self.interval.as_millis() as u64,
            "Document poller started"
        );

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Document poller received shutdown signal");
                    break;
                }
                _ = sleep(self.interval) => {}
            }

            if !self.library.has_outstanding_processing().await {
                continue;
            }

            match self.library.refresh().await {
                Ok(documents) => debug!(count = documents.len(), "Document poll refreshed"),
                Err(e) => warn!(error = %e, "Document poll failed"),
            }
        }

        info!("Document poller stopped");
    }
}
