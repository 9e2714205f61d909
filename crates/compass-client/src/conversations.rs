//! Conversation endpoints and the send-message round trip.

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use compass_core::{
    Conversation, ConversationApi, ConversationSummary, CreateConversationRequest, Result,
    SendMessageRequest, SendMessageResponse,
};

use crate::client::CompassClient;
use crate::documents::Listing;

#[async_trait]
impl ConversationApi for CompassClient {
    async fn list_conversations(&self) -> Result<Vec<ConversationSummary>> {
        let listing: Listing<ConversationSummary> =
            self.get_json("/api/messaging/conversations/").await?;
        Ok(listing.into_vec())
    }

    async fn fetch_conversation(&self, conversation_id: Uuid) -> Result<Conversation> {
        self.get_json(&format!("/api/messaging/conversations/{}/", conversation_id)).await
    }

    async fn create_conversation(
        &self,
        request: &CreateConversationRequest,
    ) -> Result<Conversation> {
        self.post_json("/api/messaging/conversations/", request).await
    }

    async fn delete_conversation(&self, conversation_id: Uuid) -> Result<()> {
        self.delete(&format!("/api/messaging/conversations/{}/", conversation_id)).await
    }

    async fn send_message(&self, request: &SendMessageRequest) -> Result<SendMessageResponse> {
        let response: SendMessageResponse =
            self.post_json("/api/messaging/send-message/", request).await?;
        debug!(
            conversation_id = %response.conversation_id,
            message_count = response.conversation.message_count,
            rag_used = response.rag_info.rag_used,
            "Message sent"
        );
        Ok(response)
    }
}
