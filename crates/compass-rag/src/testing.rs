//! In-memory service fakes for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Semaphore;
use uuid::Uuid;

use compass_client::status::to_error;
use compass_core::*;

pub fn document(status: DocumentStatus) -> DocumentRecord {
    let id = Uuid::new_v4();
    DocumentRecord {
        id,
        title: format!("doc {}", &id.to_string()[..8]),
        document_type: DocumentType::Transcript,
        status,
        validation: ValidationMetadata::default(),
        original_filename: Some("transcript.pdf".to_string()),
        content_type: Some("application/pdf".to_string()),
        file_size: Some(1024),
        s3_key: None,
        uploaded_at: Some(Utc::now()),
        processed_at: None,
    }
}

pub fn profile(first_name: &str) -> ProfileSnapshot {
    ProfileSnapshot {
        user: UserIdentity {
            id: 1,
            username: "ada".to_string(),
            email: "ada@example.com".to_string(),
            first_name: first_name.to_string(),
            last_name: "Lovelace".to_string(),
        },
        preferences: Some(Preferences {
            fields_of_interest: vec!["mathematics".to_string()],
            ..Preferences::default()
        }),
        ..ProfileSnapshot::default()
    }
}

/// Poll `check` until it holds, failing the test after a few seconds.
pub async fn eventually<F: Fn() -> bool>(check: F) {
    let wait = async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    };
    tokio::time::timeout(Duration::from_secs(5), wait)
        .await
        .expect("condition not reached in time");
}

// =============================================================================
// EMBEDDING SERVICE
// =============================================================================

/// Embedding service fake. A gated fake blocks every call until released.
#[derive(Default)]
pub struct FakeEmbedder {
    gate: Option<Arc<Semaphore>>,
    document_calls: Mutex<Vec<Uuid>>,
    document_failures: Mutex<HashMap<Uuid, String>>,
    profile_calls: AtomicUsize,
    profile_failures: Mutex<VecDeque<String>>,
    retrieve_calls: Mutex<Vec<(String, u32)>>,
    pub cleared: AtomicBool,
}

impl FakeEmbedder {
    pub fn gated() -> Self {
        Self {
            gate: Some(Arc::new(Semaphore::new(0))),
            ..Self::default()
        }
    }

    /// Let every current and future call through.
    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1_000_000);
        }
    }

    /// Let exactly one call through.
    pub fn release_one(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1);
        }
    }

    async fn pass_gate(&self) {
        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate closed").forget();
        }
    }

    pub fn fail_document(&self, id: Uuid, message: &str) {
        self.document_failures
            .lock()
            .unwrap()
            .insert(id, message.to_string());
    }

    /// The next profile embed fails with `message`.
    pub fn fail_next_profile(&self, message: &str) {
        self.profile_failures
            .lock()
            .unwrap()
            .push_back(message.to_string());
    }

    pub fn document_calls(&self) -> Vec<Uuid> {
        self.document_calls.lock().unwrap().clone()
    }

    pub fn profile_calls(&self) -> usize {
        self.profile_calls.load(Ordering::SeqCst)
    }

    pub fn retrieve_calls(&self) -> Vec<(String, u32)> {
        self.retrieve_calls.lock().unwrap().clone()
    }

    pub async fn wait_for_document_calls(&self, n: usize) {
        eventually(|| self.document_calls.lock().unwrap().len() >= n).await;
    }

    pub async fn wait_for_profile_calls(&self, n: usize) {
        eventually(|| self.profile_calls() >= n).await;
    }
}

#[async_trait]
impl EmbeddingService for FakeEmbedder {
    async fn embed_profile(&self) -> Result<ProfileEmbedResult> {
        self.profile_calls.fetch_add(1, Ordering::SeqCst);
        self.pass_gate().await;
        if let Some(message) = self.profile_failures.lock().unwrap().pop_front() {
            return Err(Error::Server {
                status: 500,
                message,
            });
        }
        Ok(ProfileEmbedResult {
            message: "Profile embedded successfully".to_string(),
            ..ProfileEmbedResult::default()
        })
    }

    async fn embed_document(&self, document_id: Uuid) -> Result<DocumentEmbedResult> {
        self.document_calls.lock().unwrap().push(document_id);
        self.pass_gate().await;
        if let Some(message) = self.document_failures.lock().unwrap().get(&document_id) {
            return Err(Error::Api {
                status: 400,
                message: message.clone(),
            });
        }
        Ok(DocumentEmbedResult {
            chunks_created: 3,
            ..DocumentEmbedResult::default()
        })
    }

    async fn embed_text(&self, text: &str) -> Result<TextEmbedding> {
        Ok(TextEmbedding {
            embedding: vec![0.0; 4],
            dimensions: 4,
            model: Some(format!("fake:{}", text.len())),
            ..TextEmbedding::default()
        })
    }

    async fn retrieve(&self, query: &str, top_k: u32) -> Result<RetrievalResult> {
        self.retrieve_calls
            .lock()
            .unwrap()
            .push((query.to_string(), top_k));
        Ok(RetrievalResult::default())
    }

    async fn stats(&self) -> Result<RagStats> {
        Ok(RagStats::default())
    }

    async fn clear(&self) -> Result<ClearResult> {
        self.cleared.store(true, Ordering::SeqCst);
        Ok(ClearResult {
            message: "RAG data cleared".to_string(),
            cleared: true,
        })
    }
}

// =============================================================================
// ACCOUNT SERVICE
// =============================================================================

/// Account service fake backed by in-memory collections.
pub struct FakeAccount {
    authenticated: AtomicBool,
    pub profile: Mutex<ProfileSnapshot>,
    pub documents: Mutex<Vec<DocumentRecord>>,
    pub conversations: Mutex<Vec<Conversation>>,
    provisional: Mutex<HashMap<Uuid, UploadTicketRequest>>,
    failures: Mutex<HashMap<&'static str, (u16, String)>>,
    calls: Mutex<Vec<&'static str>>,
    pub sent: Mutex<Vec<SendMessageRequest>>,
}

impl Default for FakeAccount {
    fn default() -> Self {
        Self {
            authenticated: AtomicBool::new(true),
            profile: Mutex::new(profile("Ada")),
            documents: Mutex::new(Vec::new()),
            conversations: Mutex::new(Vec::new()),
            provisional: Mutex::new(HashMap::new()),
            failures: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
        }
    }
}

impl FakeAccount {
    /// Every later call to `operation` answers with `status` and `body`.
    pub fn fail(&self, operation: &'static str, status: u16, body: &str) {
        self.failures
            .lock()
            .unwrap()
            .insert(operation, (status, body.to_string()));
    }

    pub fn recover(&self, operation: &'static str) {
        self.failures.lock().unwrap().remove(operation);
    }

    pub fn set_authenticated(&self, value: bool) {
        self.authenticated.store(value, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, operation: &str) -> usize {
        self.calls().iter().filter(|c| **c == operation).count()
    }

    fn enter(&self, operation: &'static str) -> Result<()> {
        self.calls.lock().unwrap().push(operation);
        match self.failures.lock().unwrap().get(operation) {
            Some((status, body)) => Err(to_error(*status, body)),
            None => Ok(()),
        }
    }

    pub fn set_document_status(&self, id: Uuid, status: DocumentStatus) {
        if let Some(doc) = self
            .documents
            .lock()
            .unwrap()
            .iter_mut()
            .find(|d| d.id == id)
        {
            doc.status = status;
        }
    }

    fn record(id: Uuid, title: &str, document_type: DocumentType, filename: &str, size: u64) -> DocumentRecord {
        DocumentRecord {
            id,
            title: title.to_string(),
            document_type,
            status: DocumentStatus::Pending,
            validation: ValidationMetadata::default(),
            original_filename: Some(filename.to_string()),
            content_type: None,
            file_size: Some(size),
            s3_key: Some(format!("documents/user_1/{}_{}", id, filename)),
            uploaded_at: Some(Utc::now()),
            processed_at: None,
        }
    }

    fn message(sender: Sender, content: &str) -> Message {
        Message {
            id: Uuid::new_v4(),
            sender,
            content: content.to_string(),
            created_at: Utc::now(),
            metadata: serde_json::Value::Null,
            response_time: None,
            model_used: None,
        }
    }
}

#[async_trait]
impl SessionAuth for FakeAccount {
    async fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::SeqCst)
    }

    async fn logout(&self) {
        self.calls.lock().unwrap().push("logout");
        self.authenticated.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl ProfileApi for FakeAccount {
    async fn fetch_profile(&self) -> Result<ProfileSnapshot> {
        self.enter("fetch_profile")?;
        Ok(self.profile.lock().unwrap().clone())
    }

    async fn update_profile(&self, update: &ProfileUpdate) -> Result<()> {
        self.enter("update_profile")?;
        let mut profile = self.profile.lock().unwrap();
        if let Some(v) = &update.first_name {
            profile.user.first_name = v.clone();
        }
        if let Some(v) = &update.last_name {
            profile.user.last_name = v.clone();
        }
        if let Some(v) = &update.email {
            profile.user.email = v.clone();
        }
        if let Some(v) = &update.phone_number {
            profile.phone_number = v.clone();
        }
        Ok(())
    }

    async fn update_preferences(&self, preferences: &Preferences) -> Result<()> {
        self.enter("update_preferences")?;
        self.profile.lock().unwrap().preferences = Some(preferences.clone());
        Ok(())
    }

    async fn update_academic_info(&self, info: &AcademicInfo) -> Result<()> {
        self.enter("update_academic_info")?;
        self.profile.lock().unwrap().academic_info = Some(info.clone());
        Ok(())
    }

    async fn delete_academic_info(&self) -> Result<()> {
        self.enter("delete_academic_info")?;
        self.profile.lock().unwrap().academic_info = None;
        Ok(())
    }

    async fn upload_avatar(&self, file: &UploadFile) -> Result<()> {
        self.enter("upload_avatar")?;
        self.profile.lock().unwrap().avatar = Some(format!("/media/avatars/{}", file.file_name));
        Ok(())
    }

    async fn toggle_saved_university(&self, university_id: i64) -> Result<SavedToggle> {
        self.enter("toggle_saved_university")?;
        let mut profile = self.profile.lock().unwrap();
        let ids = &mut profile.saved_university_ids;
        let saved = if let Some(pos) = ids.iter().position(|id| *id == university_id) {
            ids.remove(pos);
            false
        } else {
            ids.push(university_id);
            true
        };
        Ok(SavedToggle {
            saved,
            message: String::new(),
        })
    }
}

#[async_trait]
impl DocumentApi for FakeAccount {
    async fn list_documents(&self) -> Result<Vec<DocumentRecord>> {
        self.enter("list_documents")?;
        Ok(self.documents.lock().unwrap().clone())
    }

    async fn request_upload_ticket(&self, request: &UploadTicketRequest) -> Result<UploadTicket> {
        self.enter("request_upload_ticket")?;
        let document_id = Uuid::new_v4();
        let s3_key = format!("documents/user_1/{}_{}", document_id, request.filename);
        self.provisional
            .lock()
            .unwrap()
            .insert(document_id, request.clone());
        let mut upload_fields = std::collections::BTreeMap::new();
        upload_fields.insert("key".to_string(), s3_key.clone());
        Ok(UploadTicket {
            document_id,
            upload_url: "memory://bucket".to_string(),
            upload_fields,
            s3_key,
            expires_in: Some(3600),
        })
    }

    async fn confirm_upload(&self, document_id: Uuid) -> Result<DocumentRecord> {
        self.enter("confirm_upload")?;
        let request = self
            .provisional
            .lock()
            .unwrap()
            .remove(&document_id)
            .ok_or_else(|| Error::NotFound(format!("document {}", document_id)))?;
        let record = Self::record(
            document_id,
            &request.title,
            request.document_type,
            &request.filename,
            request.file_size,
        );
        self.documents.lock().unwrap().insert(0, record.clone());
        Ok(record)
    }

    async fn upload_direct(
        &self,
        file: &UploadFile,
        title: &str,
        document_type: DocumentType,
    ) -> Result<DocumentRecord> {
        self.enter("upload_direct")?;
        let record = Self::record(Uuid::new_v4(), title, document_type, &file.file_name, file.size());
        self.documents.lock().unwrap().insert(0, record.clone());
        Ok(record)
    }

    async fn delete_document(&self, document_id: Uuid) -> Result<()> {
        self.enter("delete_document")?;
        let mut docs = self.documents.lock().unwrap();
        let before = docs.len();
        docs.retain(|d| d.id != document_id);
        if docs.len() == before {
            return Err(Error::NotFound(format!("document {}", document_id)));
        }
        Ok(())
    }

    async fn download_link(&self, document_id: Uuid) -> Result<DownloadLink> {
        self.enter("download_link")?;
        Ok(DownloadLink {
            download_url: format!("https://blob.example.com/{}?sig=abc", document_id),
            filename: Some("transcript.pdf".to_string()),
            file_size: Some("1.0 KB".to_string()),
            content_type: Some("application/pdf".to_string()),
            expires_in: Some(3600),
        })
    }
}

#[async_trait]
impl ConversationApi for FakeAccount {
    async fn list_conversations(&self) -> Result<Vec<ConversationSummary>> {
        self.enter("list_conversations")?;
        Ok(self
            .conversations
            .lock()
            .unwrap()
            .iter()
            .map(Conversation::summary)
            .collect())
    }

    async fn fetch_conversation(&self, conversation_id: Uuid) -> Result<Conversation> {
        self.enter("fetch_conversation")?;
        self.conversations
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id == conversation_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("conversation {}", conversation_id)))
    }

    async fn create_conversation(
        &self,
        request: &CreateConversationRequest,
    ) -> Result<Conversation> {
        self.enter("create_conversation")?;
        let conversation = Conversation {
            id: Uuid::new_v4(),
            title: request.title.clone(),
            message_count: 0,
            messages: Vec::new(),
            created_at: Some(Utc::now()),
            updated_at: Some(Utc::now()),
            pending: false,
        };
        self.conversations
            .lock()
            .unwrap()
            .insert(0, conversation.clone());
        Ok(conversation)
    }

    async fn delete_conversation(&self, conversation_id: Uuid) -> Result<()> {
        self.enter("delete_conversation")?;
        self.conversations
            .lock()
            .unwrap()
            .retain(|c| c.id != conversation_id);
        Ok(())
    }

    async fn send_message(&self, request: &SendMessageRequest) -> Result<SendMessageResponse> {
        self.enter("send_message")?;
        self.sent.lock().unwrap().push(request.clone());

        let user_message = Self::message(Sender::User, &request.message);
        let ai_message = Self::message(Sender::Assistant, "Here is what I found.");

        let mut conversations = self.conversations.lock().unwrap();
        let index = match request
            .conversation_id
            .and_then(|id| conversations.iter().position(|c| c.id == id))
        {
            Some(index) => index,
            None => {
                let title: String = request.message.chars().take(defaults::CONVERSATION_TITLE_CHARS).collect();
                conversations.insert(
                    0,
                    Conversation {
                        id: request.conversation_id.unwrap_or_else(Uuid::new_v4),
                        title,
                        message_count: 0,
                        messages: Vec::new(),
                        created_at: Some(Utc::now()),
                        updated_at: None,
                        pending: false,
                    },
                );
                0
            }
        };
        let conversation = &mut conversations[index];
        conversation.messages.push(user_message.clone());
        conversation.messages.push(ai_message.clone());
        conversation.message_count += 2;
        conversation.updated_at = Some(Utc::now());

        Ok(SendMessageResponse {
            conversation_id: conversation.id,
            user_message,
            ai_message,
            conversation: ConversationRef {
                id: conversation.id,
                title: conversation.title.clone(),
                message_count: conversation.message_count,
            },
            rag_info: RagInfo::default(),
        })
    }
}

// =============================================================================
// BLOB STORE
// =============================================================================

/// Blob store fake reporting progress in quarters.
#[derive(Default)]
pub struct FakeBlobStore {
    pub transfers: Mutex<Vec<(Uuid, String)>>,
    failure: Mutex<Option<(u16, String)>>,
}

impl FakeBlobStore {
    pub fn fail(&self, status: u16, body: &str) {
        *self.failure.lock().unwrap() = Some((status, body.to_string()));
    }

    pub fn transfer_count(&self) -> usize {
        self.transfers.lock().unwrap().len()
    }
}

#[async_trait]
impl BlobStore for FakeBlobStore {
    async fn transfer(
        &self,
        ticket: UploadTicket,
        file: &UploadFile,
        progress: TransferProgress,
    ) -> Result<()> {
        let total = file.size();
        progress(total / 4, total);
        progress(total / 2, total);
        if let Some((status, body)) = self.failure.lock().unwrap().clone() {
            return Err(to_error(status, &body));
        }
        progress(total, total);
        self.transfers
            .lock()
            .unwrap()
            .push((ticket.document_id, ticket.s3_key));
        Ok(())
    }
}
