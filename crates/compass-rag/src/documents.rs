//! The user's document collection.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use compass_core::{DocumentApi, DocumentRecord, DownloadLink, EventBus, Result, SessionEvent};

use crate::action::ActionState;
use crate::tracker::{DocumentEmbeddingSummary, DocumentEmbeddingTracker};

/// Ordered document list, newest first. Clones share the same list.
#[derive(Debug, Clone, Default)]
pub struct DocumentCollection {
    inner: Arc<RwLock<Vec<DocumentRecord>>>,
}

impl DocumentCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole list with a fresh server listing.
    pub async fn replace(&self, documents: Vec<DocumentRecord>) {
        *self.inner.write().await = documents;
    }

    /// Insert at the head, replacing any record with the same id.
    pub async fn prepend(&self, record: DocumentRecord) {
        let mut docs = self.inner.write().await;
        docs.retain(|d| d.id != record.id);
        docs.insert(0, record);
    }

    /// Remove a record, returning its position for a later [`restore`].
    ///
    /// [`restore`]: DocumentCollection::restore
    pub async fn remove(&self, id: Uuid) -> Option<(usize, DocumentRecord)> {
        let mut docs = self.inner.write().await;
        let index = docs.iter().position(|d| d.id == id)?;
        Some((index, docs.remove(index)))
    }

    /// Put a removed record back. Skipped if a refresh already brought it
    /// back.
    pub async fn restore(&self, index: usize, record: DocumentRecord) {
        let mut docs = self.inner.write().await;
        if docs.iter().any(|d| d.id == record.id) {
            return;
        }
        let index = index.min(docs.len());
        docs.insert(index, record);
    }

    pub async fn get(&self, id: Uuid) -> Option<DocumentRecord> {
        self.inner.read().await.iter().find(|d| d.id == id).cloned()
    }

    pub async fn snapshot(&self) -> Vec<DocumentRecord> {
        self.inner.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    /// Whether any document is still pending or processing server-side.
    pub async fn has_in_progress(&self) -> bool {
        self.inner
            .read()
            .await
            .iter()
            .any(|d| d.status.is_in_progress())
    }

    pub async fn clear(&self) {
        self.inner.write().await.clear();
    }
}

/// Document list operations. Every change to the collection is handed to
/// the embedding tracker.
pub struct DocumentLibrary {
    api: Arc<dyn DocumentApi>,
    collection: DocumentCollection,
    tracker: Arc<DocumentEmbeddingTracker>,
    events: EventBus,
    action: ActionState,
}

impl DocumentLibrary {
    pub fn new(
        api: Arc<dyn DocumentApi>,
        tracker: Arc<DocumentEmbeddingTracker>,
        events: EventBus,
    ) -> Self {
        Self {
            api,
            collection: DocumentCollection::new(),
            tracker,
            events,
            action: ActionState::new(),
        }
    }

    /// Fetch the collection and launch embedding for newly completed
    /// documents.
    pub async fn refresh(&self) -> Result<Vec<DocumentRecord>> {
        let documents = self
            .action
            .track("refresh_documents", self.api.list_documents())
            .await?;
        self.collection.replace(documents.clone()).await;
        self.changed().await;
        Ok(documents)
    }

    /// Add a record produced by an upload.
    pub async fn insert_uploaded(&self, record: DocumentRecord) {
        self.collection.prepend(record).await;
        self.changed().await;
    }

    /// Remove locally first, then on the server. A failed delete puts the
    /// record back in its old position.
    pub async fn delete(&self, document_id: Uuid) -> Result<()> {
        let removed = self.collection.remove(document_id).await;
        if removed.is_some() {
            self.events.emit(SessionEvent::DocumentsChanged {
                count: self.collection.len().await,
            });
        }

        match self
            .action
            .track("delete_document", self.api.delete_document(document_id))
            .await
        {
            Ok(()) => {
                info!(%document_id, "Document deleted");
                Ok(())
            }
            Err(e) => {
                if let Some((index, record)) = removed {
                    warn!(%document_id, error = %e, "Document delete failed, restoring");
                    self.collection.restore(index, record).await;
                    self.events.emit(SessionEvent::DocumentsChanged {
                        count: self.collection.len().await,
                    });
                }
                Err(e)
            }
        }
    }

    /// Time-limited link; the caller opens it directly.
    pub async fn download_link(&self, document_id: Uuid) -> Result<DownloadLink> {
        self.action
            .track("download_document", self.api.download_link(document_id))
            .await
    }

    pub async fn documents(&self) -> Vec<DocumentRecord> {
        self.collection.snapshot().await
    }

    pub async fn has_outstanding_processing(&self) -> bool {
        self.collection.has_in_progress().await
    }

    pub async fn embedding_summary(&self) -> DocumentEmbeddingSummary {
        self.tracker.summary(&self.collection.snapshot().await).await
    }

    pub fn collection(&self) -> &DocumentCollection {
        &self.collection
    }

    pub fn tracker(&self) -> &Arc<DocumentEmbeddingTracker> {
        &self.tracker
    }

    pub fn action(&self) -> &ActionState {
        &self.action
    }

    pub async fn clear(&self) {
        self.collection.clear().await;
    }

    async fn changed(&self) {
        let documents = self.collection.snapshot().await;
        self.events.emit(SessionEvent::DocumentsChanged {
            count: documents.len(),
        });
        self.tracker.reconcile(&documents).await;
    }
}
