//! Request and response shapes of the Account Service and Embedding &
//! Retrieval Service endpoints.

use std::sync::Arc;

use compass_client::{ClientConfig, CompassClient, Credentials, TokenStore};
use compass_core::{
    ConversationApi, DocumentApi, DocumentStatus, DocumentType, EmbeddingService, Error,
    ProfileApi, SendMessageRequest, UploadFile, UploadTicketRequest,
};
use uuid::Uuid;
use wiremock::matchers::{body_json, body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DOC_ID: &str = "6f1c2b9e-0c1a-4c55-9d1e-3f1f4f5a6b7c";
const CONV_ID: &str = "0b9e3d4c-7d2e-4c1b-8f43-5a2b1c0d9e8f";

fn client_for(server: &MockServer) -> CompassClient {
    let tokens = Arc::new(TokenStore::with_credentials(Credentials {
        access: "token".into(),
        refresh: Some("refresh".into()),
    }));
    CompassClient::with_tokens(ClientConfig::default().with_base_url(server.uri()), tokens)
        .expect("client")
}

fn document_json(status: &str) -> serde_json::Value {
    serde_json::json!({
        "id": DOC_ID,
        "title": "Transcript",
        "document_type": "transcript",
        "status": status,
        "validation_passed": null,
        "validation_confidence": null,
        "validation_notes": "",
        "original_filename": "transcript.pdf",
        "file_size": 2048,
        "uploaded_at": "2026-03-01T12:00:00Z"
    })
}

#[tokio::test]
async fn test_fetch_profile_merges_saved_ids() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/profile/"))
        .and(header("Authorization", "Bearer token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "user": {"id": 3, "username": "ada", "email": "ada@example.com",
                     "first_name": "Ada", "last_name": "Lovelace"},
            "phone_number": "",
            "preferences": {"applying_for": "bachelor", "fields_of_interest": ["math"]},
            "academic_info": {"gpa": 3.9, "sat_score": 1540}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/universities/saved_ids/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"saved_university_ids": [12, 4]})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let profile = client_for(&server).fetch_profile().await.unwrap();
    assert_eq!(profile.user.id, 3);
    assert_eq!(profile.saved_university_ids, vec![12, 4]);
    assert_eq!(profile.academic_info.unwrap().sat_score, Some(1540));
}

#[tokio::test]
async fn test_toggle_saved_university() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/universities/12/toggle_save/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "saved": true,
            "message": "university saved"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let toggle = client_for(&server).toggle_saved_university(12).await.unwrap();
    assert!(toggle.saved);
}

#[tokio::test]
async fn test_list_documents_accepts_paginated_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/documents/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "count": 1,
            "next": null,
            "previous": null,
            "results": [document_json("completed")]
        })))
        .mount(&server)
        .await;

    let docs = client_for(&server).list_documents().await.unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].status, DocumentStatus::Completed);
}

#[tokio::test]
async fn test_request_upload_ticket() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/documents/request_upload_url/"))
        .and(body_json(serde_json::json!({
            "title": "Transcript",
            "document_type": "transcript",
            "filename": "transcript.pdf",
            "file_size": 2048
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "document_id": DOC_ID,
            "upload_url": "https://bucket.s3.amazonaws.com/",
            "upload_fields": {"key": "documents/user_3/x.pdf", "policy": "abc"},
            "s3_key": "documents/user_3/x.pdf",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;

    let ticket = client_for(&server)
        .request_upload_ticket(&UploadTicketRequest {
            title: "Transcript".into(),
            document_type: DocumentType::Transcript,
            filename: "transcript.pdf".into(),
            file_size: 2048,
        })
        .await
        .unwrap();
    assert_eq!(ticket.document_id.to_string(), DOC_ID);
    assert_eq!(ticket.upload_fields.get("policy").map(String::as_str), Some("abc"));
}

#[tokio::test]
async fn test_validation_error_body_is_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/documents/request_upload_url/"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": "validation failed",
            "details": {"title": ["title is required"]}
        })))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .request_upload_ticket(&UploadTicketRequest {
            title: String::new(),
            document_type: DocumentType::Other,
            filename: "a.pdf".into(),
            file_size: 1,
        })
        .await
        .unwrap_err();
    match err {
        Error::Api { status, message } => {
            assert_eq!(status, 400);
            assert!(message.starts_with("validation failed"));
            assert!(message.contains("title is required"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_confirm_upload_returns_record() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/api/documents/{}/confirm_upload/", DOC_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(document_json("processing")))
        .expect(1)
        .mount(&server)
        .await;

    let doc = client_for(&server)
        .confirm_upload(DOC_ID.parse().unwrap())
        .await
        .unwrap();
    assert_eq!(doc.status, DocumentStatus::Processing);
}

#[tokio::test]
async fn test_upload_direct_sends_multipart() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/documents/"))
        .and(body_string_contains("name=\"title\""))
        .and(body_string_contains("personal_statement"))
        .and(body_string_contains("filename=\"essay.txt\""))
        .respond_with(ResponseTemplate::new(201).set_body_json(document_json("pending")))
        .expect(1)
        .mount(&server)
        .await;

    let file = UploadFile::new("essay.txt", b"Why I want to study physics".to_vec());
    let doc = client_for(&server)
        .upload_direct(&file, "Essay", DocumentType::PersonalStatement)
        .await
        .unwrap();
    assert_eq!(doc.status, DocumentStatus::Pending);
}

#[tokio::test]
async fn test_missing_ticket_endpoint_is_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/documents/request_upload_url/"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .request_upload_ticket(&UploadTicketRequest {
            title: "t".into(),
            document_type: DocumentType::Other,
            filename: "a.pdf".into(),
            file_size: 1,
        })
        .await
        .unwrap_err();
    assert!(err.is_endpoint_unavailable());
}

#[tokio::test]
async fn test_send_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/messaging/send-message/"))
        .and(body_json(serde_json::json!({
            "message": "Which schools fit my GPA?",
            "conversation_id": CONV_ID,
            "use_rag": true,
            "metadata": {"rag_ready": true}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "conversation_id": CONV_ID,
            "user_message": {"id": Uuid::new_v4(), "content": "Which schools fit my GPA?",
                             "sender": "user", "created_at": "2026-05-01T10:00:00Z"},
            "ai_message": {"id": Uuid::new_v4(), "content": "Based on your 3.9 GPA...",
                           "sender": "assistant", "created_at": "2026-05-01T10:00:02Z"},
            "conversation": {"id": CONV_ID, "title": "Which schools fit my GPA?", "message_count": 6},
            "rag_info": {"rag_used": true, "contexts_used": 2, "has_context": true}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = client_for(&server)
        .send_message(&SendMessageRequest {
            message: "Which schools fit my GPA?".into(),
            conversation_id: Some(CONV_ID.parse().unwrap()),
            use_rag: true,
            metadata: serde_json::json!({"rag_ready": true}),
        })
        .await
        .unwrap();
    assert_eq!(response.conversation.message_count, 6);
    assert!(response.rag_info.rag_used);
}

#[tokio::test]
async fn test_delete_conversation() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path(format!("/api/messaging/conversations/{}/", CONV_ID)))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    client_for(&server)
        .delete_conversation(CONV_ID.parse().unwrap())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_embed_document_and_retrieve() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/messaging/rag/document/"))
        .and(body_json(serde_json::json!({"document_id": DOC_ID})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "message": "document embedded successfully",
            "chunks_created": 4,
            "processing_time": 1.2,
            "document_type": "transcript"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/messaging/rag/retrieve/"))
        .and(body_json(serde_json::json!({"query": "gpa", "top_k": 5})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "contexts": [{"content": "GPA 3.9", "type": "profile", "source": "academic",
                          "similarity": 0.8, "metadata": {}}],
            "has_context": true,
            "processing_time": 0.05
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let embedded = client.embed_document(DOC_ID.parse().unwrap()).await.unwrap();
    assert_eq!(embedded.chunks_created, 4);

    let retrieved = client.retrieve("gpa", 5).await.unwrap();
    assert!(retrieved.has_context);
    assert_eq!(retrieved.contexts[0].source, "academic");
}

#[tokio::test]
async fn test_embed_document_failure_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/messaging/rag/document/"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": "no document content to embed"
        })))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .embed_document(DOC_ID.parse().unwrap())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("no document content to embed"));
}

#[tokio::test]
async fn test_stats_and_clear() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/messaging/rag/stats/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "user_stats": {"total_chunks": 9, "profile_chunks": 5,
                           "document_chunks": 4, "unique_documents": 1},
            "embedding_stats": {"cache_hits": 3},
            "system_ready": true
        })))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/messaging/rag/stats/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "message": "rag data cleared successfully",
            "cleared": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let stats = client.stats().await.unwrap();
    assert_eq!(stats.user_stats.total_chunks, 9);
    assert!(stats.system_ready);

    let cleared = client.clear().await.unwrap();
    assert!(cleared.cleared);
}
