//! Session events and the broadcast bus that carries them.
//!
//! State owners (tracker, synchronizer, upload pipeline, stores) emit after
//! each committed change; presentation-layer subscribers receive a stream of
//! [`EventEnvelope`]s and re-read whatever snapshot they care about.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::{EmbeddingStatus, UploadPhase};

// ============================================================================
// Envelope
// ============================================================================

/// Event wrapper with id and timestamp.
#[derive(Debug, Clone, Serialize)]
pub struct EventEnvelope {
    pub event_id: Uuid,
    /// Dot-namespaced type, e.g. `"document.embedding"`.
    pub event_type: String,
    pub occurred_at: DateTime<Utc>,
    pub payload: SessionEvent,
}

impl EventEnvelope {
    pub fn new(event: SessionEvent) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            event_type: event.event_type().to_string(),
            occurred_at: Utc::now(),
            payload: event,
        }
    }
}

// ============================================================================
// Session Event (domain payloads)
// ============================================================================

/// Serialized with a `type` tag, e.g.
/// `{"type":"DocumentEmbedding","document_id":"...","status":{"state":"success"}}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum SessionEvent {
    /// A fresh profile snapshot replaced the previous one.
    ProfileLoaded { signature: String },
    /// Profile embedding status changed for a signature.
    ProfileEmbedding {
        signature: String,
        status: EmbeddingStatus,
    },
    /// Document embedding status changed.
    DocumentEmbedding {
        document_id: Uuid,
        status: EmbeddingStatus,
    },
    /// Upload attempt moved to a new phase.
    UploadPhase {
        #[serde(skip_serializing_if = "Option::is_none")]
        document_id: Option<Uuid>,
        phase: UploadPhase,
        progress: u8,
    },
    /// The document collection changed.
    DocumentsChanged { count: usize },
    /// The conversation list changed.
    ConversationsChanged { count: usize },
    /// Messages were reconciled into a conversation.
    ConversationUpdated {
        conversation_id: Uuid,
        message_count: u32,
    },
    /// All session state was dropped (logout or RAG clear).
    SessionCleared,
}

impl SessionEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            SessionEvent::ProfileLoaded { .. } => "profile.loaded",
            SessionEvent::ProfileEmbedding { .. } => "profile.embedding",
            SessionEvent::DocumentEmbedding { .. } => "document.embedding",
            SessionEvent::UploadPhase { .. } => "upload.phase",
            SessionEvent::DocumentsChanged { .. } => "documents.changed",
            SessionEvent::ConversationsChanged { .. } => "conversations.changed",
            SessionEvent::ConversationUpdated { .. } => "conversation.updated",
            SessionEvent::SessionCleared => "session.cleared",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Broadcast channel for session events. Cheap to clone.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EventEnvelope>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(crate::defaults::EVENT_BUS_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Emit to all subscribers. Dropped silently when nobody listens.
    pub fn emit(&self, event: SessionEvent) {
        let envelope = EventEnvelope::new(event);
        tracing::trace!(
            event_type = %envelope.event_type,
            subscriber_count = self.tx.receiver_count(),
            "EventBus emit"
        );
        let _ = self.tx.send(envelope);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
