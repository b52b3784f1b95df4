//! Shared test utilities: a scripted transfer client and session builders

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use redux_common::{EventBus, ResultMetadata};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use redux_up::progress::ProgressReporter;
use redux_up::selection::PendingSelection;
use redux_up::transfer::{TransferClient, TransferResponse};
use redux_up::{SessionConfig, UploadError, UploadSession};

/// What the fake endpoint answers
#[derive(Debug, Clone)]
pub enum Reply {
    Status {
        status: u16,
        body: Bytes,
        metadata: Option<ResultMetadata>,
    },
    NetworkError,
}

impl Reply {
    pub fn ok(body: &'static [u8]) -> Self {
        Reply::Status {
            status: 200,
            body: Bytes::from_static(body),
            metadata: None,
        }
    }

    pub fn ok_with_metadata(body: &'static [u8], initial: u32, retained: u32) -> Self {
        Reply::Status {
            status: 200,
            body: Bytes::from_static(body),
            metadata: Some(ResultMetadata {
                initial_variables: initial,
                retained_components: retained,
            }),
        }
    }

    pub fn status(status: u16) -> Self {
        Reply::Status {
            status,
            body: Bytes::from_static(b"error"),
            metadata: None,
        }
    }
}

/// Scripted [`TransferClient`]
///
/// Reports progress at 0, half and all of the payload, then answers with the
/// configured reply. With a gate set, the answer waits for [`FakeClient::release`].
pub struct FakeClient {
    reply: Mutex<Reply>,
    calls: AtomicUsize,
    gate: Option<Arc<Notify>>,
    received: Mutex<Vec<String>>,
}

impl FakeClient {
    pub fn new(reply: Reply) -> Arc<Self> {
        Arc::new(Self {
            reply: Mutex::new(reply),
            calls: AtomicUsize::new(0),
            gate: None,
            received: Mutex::new(Vec::new()),
        })
    }

    pub fn gated(reply: Reply) -> Arc<Self> {
        Arc::new(Self {
            reply: Mutex::new(reply),
            calls: AtomicUsize::new(0),
            gate: Some(Arc::new(Notify::new())),
            received: Mutex::new(Vec::new()),
        })
    }

    pub fn set_reply(&self, reply: Reply) {
        *self.reply.lock().unwrap() = reply;
    }

    /// Let a gated send finish
    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.notify_one();
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// File names seen, in call order
    pub fn received(&self) -> Vec<String> {
        self.received.lock().unwrap().clone()
    }
}

#[async_trait]
impl TransferClient for FakeClient {
    async fn send(
        &self,
        selection: &PendingSelection,
        mut progress: ProgressReporter,
    ) -> Result<TransferResponse, UploadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.received
            .lock()
            .unwrap()
            .push(selection.file_name().to_string());

        let total = progress.total_bytes();
        progress.record(0);
        progress.record(total / 2);
        progress.record(total);
        drop(progress);

        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        let reply = self.reply.lock().unwrap().clone();
        match reply {
            Reply::Status {
                status,
                body,
                metadata,
            } => Ok(TransferResponse {
                status,
                body,
                metadata,
            }),
            Reply::NetworkError => Err(UploadError::Network("connection refused".to_string())),
        }
    }
}

/// Session over `client` with default settings
pub fn session_with(client: Arc<FakeClient>) -> UploadSession {
    UploadSession::new(client, EventBus::new(64), SessionConfig::default())
}

/// Session over `client` with explicit settings
pub fn session_with_config(client: Arc<FakeClient>, config: SessionConfig) -> UploadSession {
    UploadSession::new(client, EventBus::new(64), config)
}

/// A payload whose halfway point lands on a whole percentage
pub fn payload() -> Bytes {
    Bytes::from(vec![7u8; 1000])
}
