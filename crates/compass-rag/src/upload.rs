//! Three-phase document upload: request a ticket, transfer to the Blob
//! Store, confirm with the Account Service.
//!
//! Each phase fails with its own error variant so callers can tell "nothing
//! happened" (`RequestFailed`) from "orphaned ticket" (`TransferFailed`)
//! from "bytes stored but not visible" (`ConfirmFailed`). Only the last can
//! be resumed, via [`UploadPipeline::retry_confirm`], and only the request
//! phase is safe to repeat as a whole.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use compass_core::{
    validate_upload, BlobStore, DocumentApi, DocumentRecord, DocumentType, Error, EventBus,
    Result, SessionEvent, TransferProgress, UploadFile, UploadPhase, UploadPolicy, UploadSession,
    UploadTicketRequest,
};

use crate::documents::DocumentLibrary;

/// Upload progress callback, percent in `0..=100`.
pub type ProgressCallback = Arc<dyn Fn(u8) + Send + Sync>;

/// Forwards percentages to the caller: never decreasing, and silent once
/// the upload reached `done` or `failed`.
struct ProgressSink {
    callback: Option<ProgressCallback>,
    last: AtomicU8,
    closed: AtomicBool,
}

impl ProgressSink {
    fn new(callback: Option<ProgressCallback>) -> Arc<Self> {
        Arc::new(Self {
            callback,
            last: AtomicU8::new(0),
            closed: AtomicBool::new(false),
        })
    }

    fn report(&self, percent: u8) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        let percent = percent.min(100);
        let previous = self.last.fetch_max(percent, Ordering::SeqCst);
        if percent > previous {
            if let Some(callback) = &self.callback {
                callback(percent);
            }
        }
    }

    fn last(&self) -> u8 {
        self.last.load(Ordering::SeqCst)
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

fn percent(sent: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    ((sent.min(total) * 100) / total) as u8
}

/// Runs uploads and keeps the outcome of the most recent one.
pub struct UploadPipeline {
    documents: Arc<dyn DocumentApi>,
    blob: Arc<dyn BlobStore>,
    library: Arc<DocumentLibrary>,
    policy: UploadPolicy,
    allow_direct_fallback: bool,
    events: EventBus,
    last_session: Mutex<Option<UploadSession>>,
}

impl UploadPipeline {
    pub fn new(
        documents: Arc<dyn DocumentApi>,
        blob: Arc<dyn BlobStore>,
        library: Arc<DocumentLibrary>,
        events: EventBus,
    ) -> Self {
        Self {
            documents,
            blob,
            library,
            policy: UploadPolicy::default(),
            allow_direct_fallback: false,
            events,
            last_session: Mutex::new(None),
        }
    }

    pub fn with_policy(mut self, policy: UploadPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Use the legacy single-request upload when the ticket endpoint is
    /// missing.
    pub fn with_direct_fallback(mut self, enabled: bool) -> Self {
        self.allow_direct_fallback = enabled;
        self
    }

    /// Upload `file` and add the confirmed record to the collection.
    ///
    /// Validation runs before any network call.
    pub async fn upload(
        &self,
        file: UploadFile,
        title: &str,
        document_type: DocumentType,
        on_progress: Option<ProgressCallback>,
    ) -> Result<DocumentRecord> {
        let title = validate_upload(&file, title, &self.policy)?;
        let started = Instant::now();
        let sink = ProgressSink::new(on_progress);
        let mut session = UploadSession::new();
        self.emit_phase(&session);

        // Phase 1: request
        let request = UploadTicketRequest {
            title: title.clone(),
            document_type,
            filename: file.file_name.clone(),
            file_size: file.size(),
        };
        let ticket = match self.documents.request_upload_ticket(&request).await {
            Ok(ticket) => ticket,
            Err(e) if self.allow_direct_fallback && e.is_endpoint_unavailable() => {
                warn!(
                    file_name = %file.file_name,
                    error = %e,
                    "Upload ticket endpoint unavailable, falling back to direct upload"
                );
                sink.close();
                return self.direct(&file, &title, document_type).await;
            }
            Err(e) => {
                let err = Error::RequestFailed {
                    message: e.to_string(),
                    status: e.status(),
                };
                return Err(self.fail(session, &sink, err).await);
            }
        };

        let document_id = ticket.document_id;
        session.document_id = Some(document_id);
        session.storage_key = Some(ticket.s3_key.clone());
        self.advance(&mut session, UploadPhase::Transferring)?;
        debug!(%document_id, storage_key = %ticket.s3_key, "Upload ticket issued");

        // Phase 2: transfer. The ticket is consumed here.
        let reporter = sink.clone();
        let progress: TransferProgress = Arc::new(move |sent, total| {
            reporter.report(percent(sent, total));
        });
        if let Err(e) = self.blob.transfer(ticket, &file, progress).await {
            session.record_progress(sink.last());
            let err = Error::TransferFailed {
                document_id,
                message: e.to_string(),
            };
            return Err(self.fail(session, &sink, err).await);
        }
        session.record_progress(sink.last());
        self.advance(&mut session, UploadPhase::Confirming)?;

        // Phase 3: confirm
        let record = match self.documents.confirm_upload(document_id).await {
            Ok(record) => record,
            Err(e) => {
                let err = Error::ConfirmFailed {
                    document_id,
                    storage_key: session.storage_key.clone().unwrap_or_default(),
                    message: e.to_string(),
                };
                return Err(self.fail(session, &sink, err).await);
            }
        };

        sink.report(100);
        sink.close();
        self.advance(&mut session, UploadPhase::Done)?;
        info!(
            %document_id,
            bytes = file.size(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Upload complete"
        );
        *self.last_session.lock().await = Some(session);
        self.library.insert_uploaded(record.clone()).await;
        Ok(record)
    }

    /// Re-issue only the confirm phase for an upload whose bytes already
    /// reached the Blob Store.
    pub async fn retry_confirm(&self, document_id: Uuid) -> Result<DocumentRecord> {
        let storage_key = self
            .last_session
            .lock()
            .await
            .as_ref()
            .filter(|s| s.document_id == Some(document_id))
            .and_then(|s| s.storage_key.clone())
            .unwrap_or_default();

        match self.documents.confirm_upload(document_id).await {
            Ok(record) => {
                info!(%document_id, "Upload confirmed on retry");
                self.library.insert_uploaded(record.clone()).await;
                Ok(record)
            }
            Err(e) => {
                error!(%document_id, error = %e, "Upload confirm retry failed");
                Err(Error::ConfirmFailed {
                    document_id,
                    storage_key,
                    message: e.to_string(),
                })
            }
        }
    }

    /// Legacy single multipart request. Validation still runs first.
    pub async fn upload_direct(
        &self,
        file: UploadFile,
        title: &str,
        document_type: DocumentType,
    ) -> Result<DocumentRecord> {
        let title = validate_upload(&file, title, &self.policy)?;
        self.direct(&file, &title, document_type).await
    }

    /// The most recent upload attempt, kept for diagnostics.
    pub async fn last_session(&self) -> Option<UploadSession> {
        self.last_session.lock().await.clone()
    }

    async fn direct(
        &self,
        file: &UploadFile,
        title: &str,
        document_type: DocumentType,
    ) -> Result<DocumentRecord> {
        let started = Instant::now();
        let record = self
            .documents
            .upload_direct(file, title, document_type)
            .await
            .map_err(|e| {
                error!(file_name = %file.file_name, error = %e, "Direct upload failed");
                e
            })?;
        info!(
            document_id = %record.id,
            bytes = file.size(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Direct upload complete"
        );
        self.library.insert_uploaded(record.clone()).await;
        Ok(record)
    }

    fn advance(&self, session: &mut UploadSession, next: UploadPhase) -> Result<()> {
        session.advance(next)?;
        self.emit_phase(session);
        Ok(())
    }

    fn emit_phase(&self, session: &UploadSession) {
        debug!(document_id = ?session.document_id, phase = %session.phase, "Upload phase");
        self.events.emit(SessionEvent::UploadPhase {
            document_id: session.document_id,
            phase: session.phase,
            progress: session.progress,
        });
    }

    async fn fail(&self, mut session: UploadSession, sink: &ProgressSink, err: Error) -> Error {
        sink.close();
        let phase = session.phase;
        session.fail(err.to_string());
        error!(
            document_id = ?session.document_id,
            %phase,
            severity = err.upload_severity(),
            error = %err,
            "Upload failed"
        );
        self.emit_phase(&session);
        *self.last_session.lock().await = Some(session);
        err
    }
}
