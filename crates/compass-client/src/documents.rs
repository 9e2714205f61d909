//! Document collection endpoints and the server side of the upload
//! protocol.

use async_trait::async_trait;
use reqwest::multipart::Form;
use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

use compass_core::{
    DocumentApi, DocumentRecord, DocumentType, DownloadLink, Result, UploadFile, UploadTicket,
    UploadTicketRequest,
};

use crate::client::CompassClient;
use crate::form::file_part;

/// List endpoints return either a bare array or a paginated page.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum Listing<T> {
    Plain(Vec<T>),
    Page { results: Vec<T> },
}

impl<T> Listing<T> {
    pub(crate) fn into_vec(self) -> Vec<T> {
        match self {
            Listing::Plain(items) => items,
            Listing::Page { results } => results,
        }
    }
}

#[async_trait]
impl DocumentApi for CompassClient {
    async fn list_documents(&self) -> Result<Vec<DocumentRecord>> {
        let listing: Listing<DocumentRecord> = self.get_json("/api/documents/").await?;
        let documents = listing.into_vec();
        debug!(count = documents.len(), "Fetched document collection");
        Ok(documents)
    }

    async fn request_upload_ticket(&self, request: &UploadTicketRequest) -> Result<UploadTicket> {
        self.post_json("/api/documents/request_upload_url/", request).await
    }

    async fn confirm_upload(&self, document_id: Uuid) -> Result<DocumentRecord> {
        let path = format!("/api/documents/{}/confirm_upload/", document_id);
        self.post_json(&path, &serde_json::json!({})).await
    }

    async fn upload_direct(
        &self,
        file: &UploadFile,
        title: &str,
        document_type: DocumentType,
    ) -> Result<DocumentRecord> {
        let url = self.config().url("/api/documents/");
        let response = self
            .send(|http| {
                let form = Form::new()
                    .text("title", title.to_string())
                    .text("document_type", document_type.as_str())
                    .part("file", file_part(file));
                http.post(&url).multipart(form)
            })
            .await?;
        Ok(response.json().await?)
    }

    async fn delete_document(&self, document_id: Uuid) -> Result<()> {
        self.delete(&format!("/api/documents/{}/", document_id)).await
    }

    async fn download_link(&self, document_id: Uuid) -> Result<DownloadLink> {
        self.get_json(&format!("/api/documents/{}/download/", document_id)).await
    }
}
