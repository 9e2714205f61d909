//! Session wiring: one authenticated user, their profile, documents and
//! conversations, and the embedding state derived from them.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::{info, warn};

use compass_core::defaults::{EMBED_TEXT_MAX_CHARS, RETRIEVE_TOP_K, RETRIEVE_TOP_K_MAX};
use compass_core::{
    AccountService, BlobStore, ClearResult, EmbeddingService, EventBus, EventEnvelope, RagStats,
    Result, RetrievalResult, SessionAuth, SessionEvent, TextEmbedding, ValidationError,
};

use crate::action::ActionState;
use crate::config::SessionConfig;
use crate::conversation::{ChatContext, ConversationSession};
use crate::documents::DocumentLibrary;
use crate::poller::{DocumentPoller, PollerHandle};
use crate::profile::ProfileStore;
use crate::profile_sync::ProfileEmbeddingSynchronizer;
use crate::readiness::{RagReadiness, RagReadinessAggregator};
use crate::tracker::DocumentEmbeddingTracker;
use crate::upload::UploadPipeline;

/// Readiness as seen by the chat session.
struct SessionContext {
    profile: Arc<ProfileStore>,
    library: Arc<DocumentLibrary>,
}

#[async_trait]
impl ChatContext for SessionContext {
    async fn profile_loaded(&self) -> bool {
        self.profile.is_loaded().await
    }

    async fn readiness(&self) -> RagReadiness {
        let profile = self.profile.synchronizer().current_status().await;
        let documents = self.library.embedding_summary().await;
        RagReadinessAggregator::compute(profile.as_ref(), &documents)
    }
}

/// Everything a signed-in user works with.
pub struct CompassSession {
    config: SessionConfig,
    events: EventBus,
    auth: Arc<dyn SessionAuth>,
    embedder: Arc<dyn EmbeddingService>,
    context: Arc<SessionContext>,
    uploads: UploadPipeline,
    conversations: ConversationSession,
    action: ActionState,
}

impl CompassSession {
    /// Wire the session components around the given services.
    pub fn new<A>(
        account: Arc<A>,
        embedder: Arc<dyn EmbeddingService>,
        blob: Arc<dyn BlobStore>,
        config: SessionConfig,
    ) -> Result<Self>
    where
        A: AccountService + 'static,
    {
        config.validate()?;
        let events = EventBus::default();

        let synchronizer = ProfileEmbeddingSynchronizer::new(embedder.clone(), events.clone());
        let profile = Arc::new(ProfileStore::new(
            account.clone(),
            synchronizer,
            events.clone(),
        ));

        let tracker = Arc::new(
            DocumentEmbeddingTracker::new(embedder.clone(), events.clone())
                .with_invalidate_on_regression(config.invalidate_on_regression),
        );
        let library = Arc::new(DocumentLibrary::new(
            account.clone(),
            tracker,
            events.clone(),
        ));
        let uploads = UploadPipeline::new(account.clone(), blob, library.clone(), events.clone())
            .with_policy(config.upload.clone())
            .with_direct_fallback(config.allow_direct_fallback);

        let context = Arc::new(SessionContext { profile, library });
        let conversations = ConversationSession::new(
            account.clone(),
            account.clone(),
            context.clone(),
            events.clone(),
        )
        .with_use_rag(config.use_rag);

        Ok(Self {
            config,
            events,
            auth: account,
            embedder,
            context,
            uploads,
            conversations,
            action: ActionState::new(),
        })
    }

    /// Load the profile, then documents and conversations.
    ///
    /// Loading the profile and documents launches any embedding they need.
    pub async fn start(&self) -> Result<()> {
        let started = Instant::now();
        self.profile().load().await?;
        futures::try_join!(
            self.documents().refresh(),
            self.conversations.load_conversations(),
        )?;
        info!(
            documents = self.documents().collection().len().await,
            conversations = self.conversations.conversations().await.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Session started"
        );
        Ok(())
    }

    /// Poll the document collection while server-side processing runs.
    pub fn start_polling(&self) -> PollerHandle {
        DocumentPoller::new(self.context.library.clone(), self.config.poll_interval()).start()
    }

    pub async fn readiness(&self) -> RagReadiness {
        self.context.readiness().await
    }

    /// Wait until every launched embedding call has recorded its outcome.
    pub async fn settle(&self) {
        self.profile().synchronizer().settle().await;
        self.documents().tracker().settle().await;
    }

    // =========================================================================
    // RAG UTILITIES
    // =========================================================================

    /// Retrieve context for `query`. `top_k` defaults to 5 and is clamped
    /// to `1..=20`.
    pub async fn retrieve(&self, query: &str, top_k: Option<u32>) -> Result<RetrievalResult> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ValidationError::EmptyQuery.into());
        }
        let top_k = top_k
            .unwrap_or(RETRIEVE_TOP_K)
            .clamp(1, RETRIEVE_TOP_K_MAX);

        let started = Instant::now();
        let result = self
            .action
            .track("retrieve", self.embedder.retrieve(query, top_k))
            .await?;
        info!(
            top_k,
            contexts = result.contexts.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Context retrieved"
        );
        Ok(result)
    }

    pub async fn embed_text(&self, text: &str) -> Result<TextEmbedding> {
        if text.trim().is_empty() {
            return Err(ValidationError::Field {
                field: "text",
                reason: "must not be empty".to_string(),
            }
            .into());
        }
        let chars = text.chars().count();
        if chars > EMBED_TEXT_MAX_CHARS {
            return Err(ValidationError::Field {
                field: "text",
                reason: format!("{} characters exceeds {}", chars, EMBED_TEXT_MAX_CHARS),
            }
            .into());
        }
        self.action
            .track("embed_text", self.embedder.embed_text(text))
            .await
    }

    pub async fn stats(&self) -> Result<RagStats> {
        self.action.track("rag_stats", self.embedder.stats()).await
    }

    /// Delete the server-side embeddings and forget every local status.
    pub async fn clear_rag(&self) -> Result<ClearResult> {
        let result = self
            .action
            .track("clear_rag", self.embedder.clear())
            .await?;
        self.profile().synchronizer().reset_embeddings().await;
        self.documents().tracker().reset().await;
        self.events.emit(SessionEvent::SessionCleared);
        warn!(message = %result.message, "RAG data cleared");
        Ok(result)
    }

    /// Clear credentials and every piece of session state.
    pub async fn logout(&self) {
        self.auth.logout().await;
        self.profile().clear().await;
        self.profile().synchronizer().reset().await;
        self.documents().tracker().reset().await;
        self.documents().clear().await;
        self.conversations.clear().await;
        self.events.emit(SessionEvent::SessionCleared);
        info!("Session logged out");
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    pub fn profile(&self) -> &ProfileStore {
        &self.context.profile
    }

    pub fn documents(&self) -> &DocumentLibrary {
        &self.context.library
    }

    pub fn uploads(&self) -> &UploadPipeline {
        &self.uploads
    }

    pub fn conversations(&self) -> &ConversationSession {
        &self.conversations
    }

    /// Busy flag and last error of the RAG utilities.
    pub fn action(&self) -> &ActionState {
        &self.action
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.events.subscribe()
    }
}
