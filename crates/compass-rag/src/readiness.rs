//! RAG readiness verdict.

use serde::Serialize;

use compass_core::{EmbeddingState, EmbeddingStatus};

use crate::tracker::DocumentEmbeddingSummary;

/// Combined profile and document embedding state.
///
/// Also sent with each chat message as a diagnostic hint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RagReadiness {
    /// `None` until a profile has been observed.
    pub profile_status: Option<EmbeddingState>,
    pub documents: DocumentEmbeddingSummary,
    pub is_system_ready: bool,
    pub has_embedding_errors: bool,
}

/// Stateless: every call recomputes from its inputs.
pub struct RagReadinessAggregator;

impl RagReadinessAggregator {
    pub fn compute(
        profile: Option<&EmbeddingStatus>,
        documents: &DocumentEmbeddingSummary,
    ) -> RagReadiness {
        let profile_status = profile.map(|s| s.state);
        let is_system_ready = profile_status == Some(EmbeddingState::Success)
            && documents.embedded_count > 0
            && documents.embedding_count == 0;
        let has_embedding_errors =
            profile_status == Some(EmbeddingState::Error) || documents.error_count > 0;

        RagReadiness {
            profile_status,
            documents: *documents,
            is_system_ready,
            has_embedding_errors,
        }
    }
}
