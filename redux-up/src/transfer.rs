//! Transfer client: one multipart POST to the processing endpoint
//!
//! The file is streamed to the endpoint in fixed-size chunks so every chunk
//! handed to the transport advances the [`ProgressReporter`]. The response
//! body is read as raw bytes; metadata comes from two response headers.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream;
use futures::StreamExt;
use redux_common::ResultMetadata;
use reqwest::header::HeaderMap;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::UploadError;
use crate::progress::ProgressReporter;
use crate::selection::PendingSelection;

/// Multipart field carrying the file
pub const FILE_FIELD: &str = "file";

/// Response header: number of variables before reduction
pub const HEADER_INITIAL_VARIABLES: &str = "X-Nb-Variables-Initiales";

/// Response header: number of components retained
pub const HEADER_RETAINED_COMPONENTS: &str = "X-Nb-Composantes-Retenues";

/// Chunk size used when streaming the file body
pub const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// Raw outcome of an exchange that reached the server
#[derive(Debug, Clone)]
pub struct TransferResponse {
    pub status: u16,
    pub body: Bytes,
    pub metadata: Option<ResultMetadata>,
}

impl TransferResponse {
    /// Only 200 counts as success
    pub fn is_success(&self) -> bool {
        self.status == 200
    }
}

/// Anything that can carry a selection to the processing endpoint
///
/// Implementations report send progress through `progress` and drop it when
/// sending is over. Transport failures are returned as
/// [`UploadError::Network`]; any HTTP status is a successful exchange.
#[async_trait]
pub trait TransferClient: Send + Sync {
    async fn send(
        &self,
        selection: &PendingSelection,
        progress: ProgressReporter,
    ) -> Result<TransferResponse, UploadError>;
}

/// reqwest-backed transfer client
#[derive(Debug, Clone)]
pub struct HttpTransferClient {
    http_client: Client,
    endpoint: String,
}

impl HttpTransferClient {
    /// Create a client for `endpoint`
    ///
    /// `timeout` bounds the whole exchange; `None` waits indefinitely.
    pub fn new(endpoint: impl Into<String>, timeout: Option<Duration>) -> Result<Self, UploadError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http_client = builder
            .build()
            .map_err(|e| UploadError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Split the payload into chunks that advance `progress` as the transport pulls them
fn progress_body(data: Bytes, mut progress: ProgressReporter) -> Body {
    let chunks: Vec<Bytes> = (0..data.len())
        .step_by(UPLOAD_CHUNK_SIZE)
        .map(|start| data.slice(start..(start + UPLOAD_CHUNK_SIZE).min(data.len())))
        .collect();

    progress.record(0);
    let mut sent: u64 = 0;
    let stream = stream::iter(chunks).map(move |chunk| {
        sent += chunk.len() as u64;
        progress.record(sent);
        Ok::<Bytes, std::io::Error>(chunk)
    });

    Body::wrap_stream(stream)
}

#[async_trait]
impl TransferClient for HttpTransferClient {
    async fn send(
        &self,
        selection: &PendingSelection,
        progress: ProgressReporter,
    ) -> Result<TransferResponse, UploadError> {
        let total_bytes = selection.size_bytes();
        let part = Part::stream_with_length(progress_body(selection.data(), progress), total_bytes)
            .file_name(selection.file_name().to_string())
            .mime_str(selection.kind().mime_type())
            .map_err(|e| UploadError::Network(format!("Invalid part MIME type: {}", e)))?;
        let form = Form::new().part(FILE_FIELD, part);

        info!(
            "transfer_start: {} bytes={} endpoint={}",
            selection.file_name(),
            total_bytes,
            self.endpoint
        );

        let response = self
            .http_client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                warn!("transfer_failed: {} {}", selection.file_name(), e);
                UploadError::Network(format!("Upload request failed: {}", e))
            })?;

        let status = response.status().as_u16();
        let metadata = parse_metadata(response.headers());
        debug!("transfer_response: {} status={}", selection.file_name(), status);

        let body = response
            .bytes()
            .await
            .map_err(|e| UploadError::Network(format!("Failed to read response body: {}", e)))?;

        info!(
            "transfer_finish: {} status={} response_bytes={}",
            selection.file_name(),
            status,
            body.len()
        );

        Ok(TransferResponse {
            status,
            body,
            metadata,
        })
    }
}

/// Read both metadata headers; `None` unless both are well-formed integers
pub fn parse_metadata(headers: &HeaderMap) -> Option<ResultMetadata> {
    let read = |name: &str| -> Option<u32> {
        headers.get(name)?.to_str().ok()?.trim().parse().ok()
    };

    Some(ResultMetadata {
        initial_variables: read(HEADER_INITIAL_VARIABLES)?,
        retained_components: read(HEADER_RETAINED_COMPONENTS)?,
    })
}
