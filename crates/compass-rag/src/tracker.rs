//! Per-document embedding jobs.
//!
//! Every document that reaches `completed` gets exactly one embedding job.
//! The status table is monotonic per id: a tracked document is never
//! launched again unless its entry is explicitly invalidated.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use compass_core::{
    DocumentRecord, EmbeddingService, EmbeddingState, EmbeddingStatus, EventBus, SessionEvent,
};

use crate::status_map::StatusMap;

/// Counts derived from the status table and the current collection.
///
/// Never stored: recompute with [`summarize`] whenever either input changes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DocumentEmbeddingSummary {
    /// Documents currently `completed`.
    pub completed_count: usize,
    pub embedded_count: usize,
    /// Pending or running jobs.
    pub embedding_count: usize,
    pub error_count: usize,
    /// Every completed document embedded; false when none are completed.
    pub all_documents_embedded: bool,
}

/// Combine the status table with the documents currently in the collection.
///
/// Entries for documents no longer in the collection are ignored.
pub fn summarize(
    statuses: &HashMap<Uuid, EmbeddingStatus>,
    documents: &[DocumentRecord],
) -> DocumentEmbeddingSummary {
    let mut summary = DocumentEmbeddingSummary::default();
    let mut all_completed_embedded = true;

    for doc in documents {
        let status = statuses.get(&doc.id);
        match status.map(|s| s.state) {
            Some(EmbeddingState::Success) => summary.embedded_count += 1,
            Some(EmbeddingState::Pending) | Some(EmbeddingState::Embedding) => {
                summary.embedding_count += 1
            }
            Some(EmbeddingState::Error) => summary.error_count += 1,
            None => {}
        }
        if doc.status.is_embeddable() {
            summary.completed_count += 1;
            if !status.is_some_and(|s| s.is_success()) {
                all_completed_embedded = false;
            }
        }
    }

    summary.all_documents_embedded = summary.completed_count > 0 && all_completed_embedded;
    summary
}

/// Launches and records document embedding jobs.
pub struct DocumentEmbeddingTracker {
    embedder: Arc<dyn EmbeddingService>,
    statuses: StatusMap<Uuid>,
    events: EventBus,
    invalidate_on_regression: bool,
    /// Bumped by [`DocumentEmbeddingTracker::reset`]; jobs from an older
    /// generation drop their result.
    generation: Arc<AtomicU64>,
    tasks: Mutex<JoinSet<()>>,
}

impl DocumentEmbeddingTracker {
    pub fn new(embedder: Arc<dyn EmbeddingService>, events: EventBus) -> Self {
        Self {
            embedder,
            statuses: StatusMap::new(),
            events,
            invalidate_on_regression: false,
            generation: Arc::new(AtomicU64::new(0)),
            tasks: Mutex::new(JoinSet::new()),
        }
    }

    /// Drop terminal entries of documents observed outside `completed`.
    pub fn with_invalidate_on_regression(mut self, enabled: bool) -> Self {
        self.invalidate_on_regression = enabled;
        self
    }

    /// Launch jobs for completed documents that are not tracked yet.
    ///
    /// Safe to call on every collection refresh: ids already in the table,
    /// including those still embedding, are skipped. Returns the ids that
    /// were launched.
    pub async fn reconcile(&self, documents: &[DocumentRecord]) -> Vec<Uuid> {
        if self.invalidate_on_regression {
            for doc in documents.iter().filter(|d| !d.status.is_embeddable()) {
                if self.statuses.invalidate(&doc.id).await {
                    info!(document_id = %doc.id, status = ?doc.status, "Embedding invalidated after status regression");
                }
            }
        }

        let mut seen = HashSet::new();
        let completed: Vec<Uuid> = documents
            .iter()
            .filter(|d| d.status.is_embeddable())
            .map(|d| d.id)
            .filter(|id| seen.insert(*id))
            .collect();

        // Claiming and spawning happen under the task lock, which reset also
        // takes, so a job never outlives the generation it was claimed in.
        let mut tasks = self.tasks.lock().await;
        let generation = self.generation.load(Ordering::SeqCst);
        let claimed = self.statuses.claim_new(completed).await;
        if claimed.is_empty() {
            return claimed;
        }
        debug!(count = claimed.len(), generation, "Launching document embedding jobs");

        // Reap finished jobs so the set does not grow for the whole session.
        while let Some(result) = tasks.try_join_next() {
            if let Err(e) = result {
                error!(error = ?e, "Embedding task panicked");
            }
        }
        for document_id in &claimed {
            self.events.emit(SessionEvent::DocumentEmbedding {
                document_id: *document_id,
                status: EmbeddingStatus::pending(),
            });
            self.mark(*document_id, EmbeddingStatus::embedding()).await;

            let job = self.clone_refs(generation);
            let document_id = *document_id;
            tasks.spawn(async move {
                job.embed(document_id).await;
            });
        }
        claimed
    }

    /// Remove a terminal entry so the next reconcile embeds the document
    /// again. In-flight entries are left alone.
    pub async fn invalidate(&self, document_id: Uuid) -> bool {
        let removed = self.statuses.invalidate(&document_id).await;
        if removed {
            info!(%document_id, "Document embedding invalidated");
        }
        removed
    }

    pub async fn status(&self, document_id: Uuid) -> Option<EmbeddingStatus> {
        self.statuses.get(&document_id).await
    }

    pub async fn statuses(&self) -> HashMap<Uuid, EmbeddingStatus> {
        self.statuses.snapshot().await
    }

    pub async fn summary(&self, documents: &[DocumentRecord]) -> DocumentEmbeddingSummary {
        summarize(&self.statuses.snapshot().await, documents)
    }

    /// Wait for every launched job to record its outcome.
    ///
    /// Jobs are joined outside the task lock so a concurrent reset is not
    /// held up by them.
    pub async fn settle(&self) {
        loop {
            let mut tasks = std::mem::take(&mut *self.tasks.lock().await);
            if tasks.is_empty() {
                return;
            }
            while let Some(result) = tasks.join_next().await {
                if let Err(e) = result {
                    error!(error = ?e, "Embedding task panicked");
                }
            }
        }
    }

    /// Forget every status. Jobs still running finish on the server but
    /// their results are discarded.
    pub async fn reset(&self) {
        let mut tasks = self.tasks.lock().await;
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.statuses.clear().await;
        tasks.detach_all();
        debug!("Document embedding statuses cleared");
    }

    async fn mark(&self, document_id: Uuid, status: EmbeddingStatus) {
        self.statuses.set(document_id, status.clone()).await;
        self.events
            .emit(SessionEvent::DocumentEmbedding { document_id, status });
    }

    /// Clone references needed for a spawned embedding job.
    fn clone_refs(&self, started_in: u64) -> EmbedJob {
        EmbedJob {
            embedder: self.embedder.clone(),
            statuses: self.statuses.clone(),
            events: self.events.clone(),
            generation: self.generation.clone(),
            started_in,
        }
    }
}

/// Reference bundle for one embedding job running in a spawned task.
struct EmbedJob {
    embedder: Arc<dyn EmbeddingService>,
    statuses: StatusMap<Uuid>,
    events: EventBus,
    generation: Arc<AtomicU64>,
    started_in: u64,
}

impl EmbedJob {
    async fn embed(self, document_id: Uuid) {
        let start = Instant::now();
        let result = self.embedder.embed_document(document_id).await;

        if self.generation.load(Ordering::SeqCst) != self.started_in {
            debug!(%document_id, "Discarding embedding result from a cleared session");
            return;
        }

        let status = match result {
            Ok(outcome) => {
                info!(
                    %document_id,
                    chunks_created = outcome.chunks_created,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Document embedded"
                );
                EmbeddingStatus::success()
            }
            Err(e) => {
                warn!(
                    %document_id,
                    error = %e,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Document embedding failed"
                );
                EmbeddingStatus::failed(e.to_string())
            }
        };
        self.statuses.set(document_id, status.clone()).await;
        self.events
            .emit(SessionEvent::DocumentEmbedding { document_id, status });
    }
}
