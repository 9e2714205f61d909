//! Embedding & Retrieval Service endpoints.

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

use compass_core::{
    ClearResult, DocumentEmbedResult, EmbeddingService, ProfileEmbedResult, RagStats, Result,
    RetrievalResult, TextEmbedding,
};

use crate::client::CompassClient;

#[async_trait]
impl EmbeddingService for CompassClient {
    async fn embed_profile(&self) -> Result<ProfileEmbedResult> {
        let result: ProfileEmbedResult =
            self.post_json("/api/messaging/rag/profile/", &json!({})).await?;
        debug!(
            cached = result.cached,
            content_length = result.content_length,
            "Profile embedded"
        );
        Ok(result)
    }

    async fn embed_document(&self, document_id: Uuid) -> Result<DocumentEmbedResult> {
        let body = json!({ "document_id": document_id });
        let result: DocumentEmbedResult =
            self.post_json("/api/messaging/rag/document/", &body).await?;
        debug!(
            %document_id,
            chunks_created = result.chunks_created,
            "Document embedded"
        );
        Ok(result)
    }

    async fn embed_text(&self, text: &str) -> Result<TextEmbedding> {
        self.post_json("/api/messaging/embed/", &json!({ "text": text })).await
    }

    async fn retrieve(&self, query: &str, top_k: u32) -> Result<RetrievalResult> {
        let body = json!({ "query": query, "top_k": top_k });
        self.post_json("/api/messaging/rag/retrieve/", &body).await
    }

    async fn stats(&self) -> Result<RagStats> {
        self.get_json("/api/messaging/rag/stats/").await
    }

    async fn clear(&self) -> Result<ClearResult> {
        let url = self.config().url("/api/messaging/rag/stats/");
        let response = self.send(|http| http.delete(&url)).await?;
        Ok(response.json().await?)
    }
}
