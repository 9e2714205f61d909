//! Direct transfer to the Blob Store using a pre-authorized upload ticket.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client};
use tracing::{debug, trace};

use compass_core::defaults::TRANSFER_CHUNK_BYTES;
use compass_core::{
    detect_content_type, BlobStore, Error, Result, TransferProgress, UploadFile, UploadTicket,
};

use crate::config::ClientConfig;
use crate::status::to_error;

/// Blob Store client. Sends no credentials: the ticket's fields are the
/// authorization.
#[derive(Debug, Clone)]
pub struct HttpBlobStore {
    http: Client,
}

impl HttpBlobStore {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.transfer_timeout_seconds))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { http })
    }
}

/// Split `content` into transfer chunks without copying.
fn chunks(content: &Bytes) -> Vec<Bytes> {
    (0..content.len())
        .step_by(TRANSFER_CHUNK_BYTES)
        .map(|start| content.slice(start..(start + TRANSFER_CHUNK_BYTES).min(content.len())))
        .collect()
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    async fn transfer(
        &self,
        ticket: UploadTicket,
        file: &UploadFile,
        progress: TransferProgress,
    ) -> Result<()> {
        let total = file.size();
        let started = Instant::now();
        let sent = Arc::new(AtomicU64::new(0));

        let reporter = progress.clone();
        let counter = sent.clone();
        let body = futures::stream::iter(chunks(&file.content).into_iter().map(move |chunk| {
            let done = counter.fetch_add(chunk.len() as u64, Ordering::Relaxed) + chunk.len() as u64;
            trace!(bytes_sent = done, total, "Transfer chunk");
            reporter(done, total);
            Ok::<Bytes, std::io::Error>(chunk)
        }));

        let content_type = detect_content_type(&file.file_name, &file.content);
        let part = Part::stream_with_length(Body::wrap_stream(body), total)
            .file_name(file.file_name.clone())
            .mime_str(&content_type)?;

        // Ticket fields must precede the file part.
        let mut form = Form::new();
        for (name, value) in ticket.upload_fields {
            form = form.text(name, value);
        }
        let form = form.part("file", part);

        let response = self
            .http
            .post(&ticket.upload_url)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(to_error(status.as_u16(), &body));
        }

        if sent.load(Ordering::Relaxed) < total {
            progress(total, total);
        }
        debug!(
            document_id = %ticket.document_id,
            bytes = total,
            duration_ms = started.elapsed().as_millis() as u64,
            "Transfer complete"
        );
        Ok(())
    }
}
