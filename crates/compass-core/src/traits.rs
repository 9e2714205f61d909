//! Service traits at the boundary of the compass client.
//!
//! The orchestration crate depends only on these traits, so every component
//! can be driven by an HTTP implementation or an in-memory fake.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

// =============================================================================
// ACCOUNT SERVICE TRAITS
// =============================================================================

/// Credential state of the current session.
#[async_trait]
pub trait SessionAuth: Send + Sync {
    /// Whether a usable access token is held.
    async fn is_authenticated(&self) -> bool;

    /// Drop all local credentials.
    async fn logout(&self);
}

/// Profile reads and writes.
#[async_trait]
pub trait ProfileApi: Send + Sync {
    /// Fetch the full profile, with saved university ids merged in.
    async fn fetch_profile(&self) -> Result<ProfileSnapshot>;

    async fn update_profile(&self, update: &ProfileUpdate) -> Result<()>;

    async fn update_preferences(&self, preferences: &Preferences) -> Result<()>;

    async fn update_academic_info(&self, info: &AcademicInfo) -> Result<()>;

    async fn delete_academic_info(&self) -> Result<()>;

    /// Replace the avatar image (multipart upload).
    async fn upload_avatar(&self, file: &UploadFile) -> Result<()>;

    /// Flip the saved state of a university and return the new state.
    async fn toggle_saved_university(&self, university_id: i64) -> Result<SavedToggle>;
}

/// Document collection and the server side of the upload protocol.
#[async_trait]
pub trait DocumentApi: Send + Sync {
    async fn list_documents(&self) -> Result<Vec<DocumentRecord>>;

    /// Phase 1: allocate a provisional document and a single-use ticket.
    async fn request_upload_ticket(&self, request: &UploadTicketRequest) -> Result<UploadTicket>;

    /// Phase 3: verify the stored object and finalize the record.
    async fn confirm_upload(&self, document_id: Uuid) -> Result<DocumentRecord>;

    /// Legacy single-request upload.
    async fn upload_direct(
        &self,
        file: &UploadFile,
        title: &str,
        document_type: DocumentType,
    ) -> Result<DocumentRecord>;

    async fn delete_document(&self, document_id: Uuid) -> Result<()>;

    async fn download_link(&self, document_id: Uuid) -> Result<DownloadLink>;
}

/// Conversations and the send-message round trip.
#[async_trait]
pub trait ConversationApi: Send + Sync {
    async fn list_conversations(&self) -> Result<Vec<ConversationSummary>>;

    async fn fetch_conversation(&self, conversation_id: Uuid) -> Result<Conversation>;

    async fn create_conversation(&self, request: &CreateConversationRequest)
        -> Result<Conversation>;

    async fn delete_conversation(&self, conversation_id: Uuid) -> Result<()>;

    async fn send_message(&self, request: &SendMessageRequest) -> Result<SendMessageResponse>;
}

/// The complete Account Service surface.
pub trait AccountService: SessionAuth + ProfileApi + DocumentApi + ConversationApi {}

impl<T> AccountService for T where T: SessionAuth + ProfileApi + DocumentApi + ConversationApi {}

// =============================================================================
// EMBEDDING & RETRIEVAL SERVICE TRAITS
// =============================================================================

/// Opaque embedding and vector-search backend.
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    /// Rebuild the profile embedding from server-side data. No payload.
    async fn embed_profile(&self) -> Result<ProfileEmbedResult>;

    async fn embed_document(&self, document_id: Uuid) -> Result<DocumentEmbedResult>;

    async fn embed_text(&self, text: &str) -> Result<TextEmbedding>;

    async fn retrieve(&self, query: &str, top_k: u32) -> Result<RetrievalResult>;

    async fn stats(&self) -> Result<RagStats>;

    async fn clear(&self) -> Result<ClearResult>;
}

// =============================================================================
// BLOB STORE TRAITS
// =============================================================================

/// Transfer progress callback: `(bytes_sent, total_bytes)`.
pub type TransferProgress = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// Direct client-to-storage transfer.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Phase 2: POST the file to the ticket's target. Consumes the ticket.
    ///
    /// Any non-2xx status is an error.
    async fn transfer(
        &self,
        ticket: UploadTicket,
        file: &UploadFile,
        progress: TransferProgress,
    ) -> Result<()>;
}
