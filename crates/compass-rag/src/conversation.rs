//! Chat session: sending messages and reconciling local conversation state
//! with the server's answer.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use compass_core::defaults::NEW_CONVERSATION_TITLE;
use compass_core::{
    Conversation, ConversationApi, ConversationSummary, CreateConversationRequest, Error,
    EventBus, Result, SendMessageRequest, SendMessageResponse, SessionAuth, SessionEvent,
    ValidationError,
};

use crate::action::ActionState;
use crate::readiness::RagReadiness;

/// What the chat session needs to know about the rest of the session.
#[async_trait]
pub trait ChatContext: Send + Sync {
    async fn profile_loaded(&self) -> bool;

    /// Current readiness, attached to outgoing messages as a hint.
    async fn readiness(&self) -> RagReadiness;
}

#[derive(Debug, Default)]
struct ConversationState {
    /// Newest first. May contain one pending entry.
    conversations: Vec<ConversationSummary>,
    current: Option<Conversation>,
}

impl ConversationState {
    /// Replace the entry with `replacing` or the same id in place, or
    /// insert at the head. Never leaves two entries with one id.
    fn upsert(&mut self, summary: ConversationSummary, replacing: Option<Uuid>) {
        let existing = self
            .conversations
            .iter()
            .position(|c| c.id == summary.id || Some(c.id) == replacing);
        match existing {
            Some(index) => {
                self.conversations[index] = summary;
                // A pending entry and the server entry may both exist.
                let id = self.conversations[index].id;
                let mut seen = false;
                self.conversations.retain(|c| {
                    if c.id == id || Some(c.id) == replacing {
                        let keep = !seen;
                        seen = true;
                        keep
                    } else {
                        true
                    }
                });
            }
            None => self.conversations.insert(0, summary),
        }
    }
}

pub struct ConversationSession {
    api: Arc<dyn ConversationApi>,
    auth: Arc<dyn SessionAuth>,
    context: Arc<dyn ChatContext>,
    events: EventBus,
    use_rag: bool,
    state: RwLock<ConversationState>,
    action: ActionState,
}

impl ConversationSession {
    pub fn new(
        api: Arc<dyn ConversationApi>,
        auth: Arc<dyn SessionAuth>,
        context: Arc<dyn ChatContext>,
        events: EventBus,
    ) -> Self {
        Self {
            api,
            auth,
            context,
            events,
            use_rag: true,
            state: RwLock::new(ConversationState::default()),
            action: ActionState::new(),
        }
    }

    pub fn with_use_rag(mut self, use_rag: bool) -> Self {
        self.use_rag = use_rag;
        self
    }

    /// Send one message and fold the reply into local state.
    ///
    /// Fails with `NotReady` unless the session is authenticated and a
    /// profile is loaded.
    pub async fn send_message(
        &self,
        content: &str,
        conversation_id: Option<Uuid>,
    ) -> Result<SendMessageResponse> {
        let content = content.trim();
        if content.is_empty() {
            return Err(ValidationError::EmptyMessage.into());
        }
        self.ensure_ready().await?;

        let readiness = self.context.readiness().await;
        let request = SendMessageRequest {
            message: content.to_string(),
            conversation_id,
            use_rag: self.use_rag,
            metadata: json!({ "client_readiness": readiness }),
        };

        let started = Instant::now();
        let response = self
            .action
            .track("send_message", self.api.send_message(&request))
            .await?;
        info!(
            conversation_id = %response.conversation_id,
            rag_used = response.rag_info.rag_used,
            contexts_used = response.rag_info.contexts_used,
            duration_ms = started.elapsed().as_millis() as u64,
            "Message answered"
        );

        self.reconcile(&response).await;
        Ok(response)
    }

    /// Start a conversation, either by sending `initial_message` or, when
    /// it is empty, through the creation endpoint.
    pub async fn start_new_conversation(&self, initial_message: Option<&str>) -> Result<Conversation> {
        if let Some(text) = initial_message.filter(|t| !t.trim().is_empty()) {
            let response = self.send_message(text, None).await?;
            return self
                .state
                .read()
                .await
                .current
                .clone()
                .ok_or_else(|| {
                    Error::Internal(format!(
                        "conversation {} missing after reconciliation",
                        response.conversation_id
                    ))
                });
        }

        self.ensure_ready().await?;
        let placeholder = Conversation::pending(NEW_CONVERSATION_TITLE);
        let pending_id = placeholder.id;
        {
            let mut state = self.state.write().await;
            state.upsert(placeholder.summary(), None);
            state.current = Some(placeholder);
        }
        self.emit_list_changed().await;

        let request = CreateConversationRequest {
            title: NEW_CONVERSATION_TITLE.to_string(),
        };
        match self
            .action
            .track("create_conversation", self.api.create_conversation(&request))
            .await
        {
            Ok(conversation) => {
                info!(conversation_id = %conversation.id, "Conversation created");
                self.adopt(conversation.clone(), Some(pending_id)).await;
                Ok(conversation)
            }
            Err(e) => {
                let mut state = self.state.write().await;
                state.conversations.retain(|c| c.id != pending_id);
                if state.current.as_ref().is_some_and(|c| c.id == pending_id) {
                    state.current = None;
                }
                drop(state);
                warn!(error = %e, "Conversation create failed, placeholder removed");
                self.emit_list_changed().await;
                Err(e)
            }
        }
    }

    /// Fetch the conversation list.
    ///
    /// Pending placeholders are kept, as is the open conversation when the
    /// listing predates it.
    pub async fn load_conversations(&self) -> Result<Vec<ConversationSummary>> {
        let listed = self
            .action
            .track("list_conversations", self.api.list_conversations())
            .await?;

        let mut state = self.state.write().await;
        let listed_ids: HashSet<Uuid> = listed.iter().map(|c| c.id).collect();
        let current_id = state.current.as_ref().map(|c| c.id);
        let local: Vec<_> = state
            .conversations
            .iter()
            .filter(|c| !listed_ids.contains(&c.id))
            .filter(|c| c.pending || Some(c.id) == current_id)
            .cloned()
            .collect();
        if !local.is_empty() {
            debug!(kept = local.len(), "Keeping local conversations missing from listing");
        }
        state.conversations = local.into_iter().chain(listed).collect();
        let snapshot = state.conversations.clone();
        drop(state);

        self.emit_list_changed().await;
        Ok(snapshot)
    }

    /// Open a conversation with its full history.
    pub async fn select_conversation(&self, conversation_id: Uuid) -> Result<Conversation> {
        let conversation = self
            .action
            .track("load_conversation", self.api.fetch_conversation(conversation_id))
            .await?;
        self.adopt(conversation.clone(), None).await;
        Ok(conversation)
    }

    /// Remove locally, then on the server. A failed delete is reported and
    /// not reverted. Placeholders never reached the server and are only
    /// removed locally.
    pub async fn delete_conversation(&self, conversation_id: Uuid) -> Result<()> {
        let pending = {
            let mut state = self.state.write().await;
            let pending = state
                .conversations
                .iter()
                .any(|c| c.id == conversation_id && c.pending)
                || state
                    .current
                    .as_ref()
                    .is_some_and(|c| c.id == conversation_id && c.pending);
            state.conversations.retain(|c| c.id != conversation_id);
            if state.current.as_ref().is_some_and(|c| c.id == conversation_id) {
                state.current = None;
            }
            pending
        };
        self.emit_list_changed().await;

        if pending {
            debug!(%conversation_id, "Pending conversation discarded locally");
            return Ok(());
        }

        self.action
            .track(
                "delete_conversation",
                self.api.delete_conversation(conversation_id),
            )
            .await?;
        info!(%conversation_id, "Conversation deleted");
        Ok(())
    }

    pub async fn current(&self) -> Option<Conversation> {
        self.state.read().await.current.clone()
    }

    pub async fn conversations(&self) -> Vec<ConversationSummary> {
        self.state.read().await.conversations.clone()
    }

    pub fn action(&self) -> &ActionState {
        &self.action
    }

    pub async fn clear(&self) {
        *self.state.write().await = ConversationState::default();
    }

    async fn ensure_ready(&self) -> Result<()> {
        if !self.auth.is_authenticated().await {
            return Err(Error::NotReady("not authenticated".to_string()));
        }
        if !self.context.profile_loaded().await {
            return Err(Error::NotReady("profile not loaded".to_string()));
        }
        Ok(())
    }

    /// Fold a send-message response into the open conversation or the list.
    async fn reconcile(&self, response: &SendMessageResponse) {
        let mut state = self.state.write().await;
        let now = Utc::now();

        let current_matches = state
            .current
            .as_ref()
            .is_some_and(|c| c.id == response.conversation_id);

        if current_matches {
            if let Some(current) = state.current.as_mut() {
                for message in [&response.user_message, &response.ai_message] {
                    if !current.messages.iter().any(|m| m.id == message.id) {
                        current.messages.push(message.clone());
                    }
                }
                current.message_count = response.conversation.message_count;
                if !response.conversation.title.is_empty() {
                    current.title = response.conversation.title.clone();
                }
                current.updated_at = Some(now);
                let summary = current.summary();
                state.upsert(summary, None);
            }
            debug!(
                conversation_id = %response.conversation_id,
                message_count = response.conversation.message_count,
                "Reply appended to open conversation"
            );
        } else {
            let replacing = state
                .current
                .as_ref()
                .filter(|c| c.pending)
                .map(|c| c.id);
            let conversation = Conversation {
                id: response.conversation_id,
                title: response.conversation.title.clone(),
                message_count: response.conversation.message_count,
                messages: vec![response.user_message.clone(), response.ai_message.clone()],
                created_at: Some(response.user_message.created_at),
                updated_at: Some(now),
                pending: false,
            };
            state.upsert(conversation.summary(), replacing);
            state.current = Some(conversation);
            debug!(
                conversation_id = %response.conversation_id,
                replaced_pending = replacing.is_some(),
                "Conversation opened from reply"
            );
        }

        let count = state.conversations.len();
        drop(state);
        self.events.emit(SessionEvent::ConversationUpdated {
            conversation_id: response.conversation_id,
            message_count: response.conversation.message_count,
        });
        self.events.emit(SessionEvent::ConversationsChanged { count });
    }

    /// Make `conversation` current and put it in the list.
    async fn adopt(&self, conversation: Conversation, replacing: Option<Uuid>) {
        let mut state = self.state.write().await;
        state.upsert(conversation.summary(), replacing);
        state.current = Some(conversation);
        drop(state);
        self.emit_list_changed().await;
    }

    async fn emit_list_changed(&self) {
        let count = self.state.read().await.conversations.len();
        self.events.emit(SessionEvent::ConversationsChanged { count });
    }
}
