//! Upload session: the selection validator and transfer orchestrator
//!
//! One [`UploadSession`] owns the view state, the pending selection and the
//! current result artifact behind a single lock. The in-flight check and the
//! move into `Uploading` happen under the same write guard, so at most one
//! transfer runs at a time. Every applied transition is broadcast on the
//! [`EventBus`].

use bytes::Bytes;
use chrono::Utc;
use futures::StreamExt;
use redux_common::events::{FailureKind, ReleaseReason};
use redux_common::{EventBus, ReduxEvent};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::artifact::{ReleaseTimer, ResultArtifact, DOWNLOAD_URL, PREVIEW_URL};
use crate::error::{UploadError, MSG_SUCCEEDED};
use crate::progress::{self, ProgressUpdate};
use crate::selection::{PendingSelection, SelectionSummary};
use crate::state::{Action, ResultView, TransferState, Transition};
use crate::transfer::{TransferClient, TransferResponse};

/// How long to wait for queued progress updates once the exchange is over
const PROGRESS_DRAIN_TIMEOUT: Duration = Duration::from_millis(250);

/// Session tunables
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Where successful results are written; `None` leaves saving to the browser
    pub output_dir: Option<PathBuf>,
    /// Safety-net upper bound on how long a result is kept
    pub release_after: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            output_dir: None,
            release_after: Duration::from_secs(redux_common::config::DEFAULT_RELEASE_AFTER_SECS),
        }
    }
}

/// How a transfer ended
#[derive(Debug)]
pub enum TransferOutcome {
    Succeeded {
        artifact: Arc<ResultArtifact>,
        /// Path written when an output directory is configured and the write worked
        saved_to: Option<PathBuf>,
    },
    Failed {
        error: UploadError,
    },
}

/// Handle on a running transfer
#[derive(Debug)]
pub struct TransferHandle {
    transfer_id: Uuid,
    task: JoinHandle<TransferOutcome>,
}

impl TransferHandle {
    pub fn transfer_id(&self) -> Uuid {
        self.transfer_id
    }

    /// Wait for the transfer to finish
    pub async fn wait(self) -> TransferOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) => TransferOutcome::Failed {
                error: UploadError::Network(format!("Transfer task ended unexpectedly: {}", e)),
            },
        }
    }
}

struct SessionInner {
    state: TransferState,
    pending: Option<PendingSelection>,
    artifact: Option<Arc<ResultArtifact>>,
    release_timer: Option<ReleaseTimer>,
}

struct Shared {
    inner: RwLock<SessionInner>,
    client: Arc<dyn TransferClient>,
    bus: EventBus,
    config: SessionConfig,
}

/// Per-session upload view model
#[derive(Clone)]
pub struct UploadSession {
    shared: Arc<Shared>,
}

impl UploadSession {
    pub fn new(client: Arc<dyn TransferClient>, bus: EventBus, config: SessionConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                inner: RwLock::new(SessionInner {
                    state: TransferState::default(),
                    pending: None,
                    artifact: None,
                    release_timer: None,
                }),
                client,
                bus,
                config,
            }),
        }
    }

    pub fn bus(&self) -> &EventBus {
        &self.shared.bus
    }

    pub fn config(&self) -> &SessionConfig {
        &self.shared.config
    }

    /// Copy of the current view state
    pub async fn snapshot(&self) -> TransferState {
        self.shared.inner.read().await.state.clone()
    }

    /// Current result artifact, if one is being served
    pub async fn artifact(&self) -> Option<Arc<ResultArtifact>> {
        self.shared.inner.read().await.artifact.clone()
    }

    /// Offer a file to the selection validator
    ///
    /// While a transfer is running this returns [`UploadError::Busy`] and
    /// changes nothing. Otherwise a valid file replaces any pending selection
    /// and releases the previous result; an invalid one clears the selection.
    pub async fn select(
        &self,
        file_name: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Result<SelectionSummary, UploadError> {
        let file_name = file_name.into();
        let candidate = PendingSelection::new(file_name.clone(), data);
        self.offer(file_name, candidate).await
    }

    /// Offer a file on disk to the selection validator
    ///
    /// Unsupported names are rejected without reading the file. A read
    /// failure leaves the session untouched.
    pub async fn select_path(&self, path: &Path) -> Result<SelectionSummary, UploadError> {
        if self.snapshot().await.is_uploading() {
            return Err(UploadError::Busy);
        }

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        match PendingSelection::from_path(path).await {
            Err(err @ UploadError::Io(_)) => Err(err),
            candidate => self.offer(file_name, candidate).await,
        }
    }

    async fn offer(
        &self,
        file_name: String,
        candidate: Result<PendingSelection, UploadError>,
    ) -> Result<SelectionSummary, UploadError> {
        let mut inner = self.shared.inner.write().await;

        if inner.state.is_uploading() {
            debug!("select ignored while uploading: {}", file_name);
            return Err(UploadError::Busy);
        }

        match candidate {
            Ok(selection) => {
                let summary = selection.summary();
                self.release_locked(&mut inner, ReleaseReason::NewSelection);
                inner.pending = Some(selection);
                inner.state.apply(Action::SelectionAccepted(summary.clone()));
                info!("selection_accepted: {} bytes={}", summary.file_name, summary.size_bytes);

                self.shared.bus.emit_lossy(ReduxEvent::SelectionAccepted {
                    file_name: summary.file_name.clone(),
                    size_bytes: summary.size_bytes,
                    status_message: inner.state.status_message.clone(),
                    timestamp: Utc::now(),
                });
                Ok(summary)
            }
            Err(err) => {
                inner.pending = None;
                inner.state.apply(Action::SelectionRejected);
                info!("selection_rejected: {}", file_name);

                self.shared.bus.emit_lossy(ReduxEvent::SelectionRejected {
                    file_name,
                    status_message: inner.state.status_message.clone(),
                    timestamp: Utc::now(),
                });
                Err(err)
            }
        }
    }

    /// Start uploading the pending selection
    ///
    /// Fails with [`UploadError::Busy`] during a transfer and with
    /// [`UploadError::NoFileSelected`] (after updating the status) when
    /// nothing is pending. No network call happens in either case.
    pub async fn start_upload(&self) -> Result<TransferHandle, UploadError> {
        let mut inner = self.shared.inner.write().await;

        if inner.state.is_uploading() {
            debug!("start_upload ignored while uploading");
            return Err(UploadError::Busy);
        }

        let Some(selection) = inner.pending.clone() else {
            inner.state.apply(Action::StartWithoutSelection);
            return Err(UploadError::NoFileSelected);
        };

        let transfer_id = Uuid::new_v4();
        if inner.state.apply(Action::TransferStarted { transfer_id }) == Transition::Ignored {
            return Err(UploadError::NoFileSelected);
        }

        self.shared.bus.emit_lossy(ReduxEvent::TransferStarted {
            transfer_id,
            file_name: selection.file_name().to_string(),
            total_bytes: selection.size_bytes(),
            status_message: inner.state.status_message.clone(),
            timestamp: Utc::now(),
        });
        drop(inner);

        let session = self.clone();
        let task = tokio::spawn(async move { session.run_transfer(transfer_id, selection).await });

        Ok(TransferHandle { transfer_id, task })
    }

    /// Drop the current result at the user's request
    ///
    /// Returns false when there was nothing to release.
    pub async fn dismiss_result(&self) -> bool {
        let mut inner = self.shared.inner.write().await;
        self.release_locked(&mut inner, ReleaseReason::Dismissed).is_some()
    }

    /// Release everything the session holds
    pub async fn shutdown(&self) {
        let mut inner = self.shared.inner.write().await;
        self.release_locked(&mut inner, ReleaseReason::Shutdown);
    }

    async fn run_transfer(&self, transfer_id: Uuid, selection: PendingSelection) -> TransferOutcome {
        let (reporter, mut updates) = progress::channel(selection.size_bytes());

        let forwarder = {
            let session = self.clone();
            tokio::spawn(async move {
                while let Some(update) = updates.next().await {
                    session.publish_progress(transfer_id, update).await;
                }
            })
        };

        let result = self.shared.client.send(&selection, reporter).await;

        let mut forwarder = forwarder;
        if tokio::time::timeout(PROGRESS_DRAIN_TIMEOUT, &mut forwarder).await.is_err() {
            forwarder.abort();
        }

        match result {
            Ok(response) if response.is_success() => {
                self.complete_success(transfer_id, &selection, response).await
            }
            Ok(response) => {
                warn!("transfer_rejected: {} status={}", selection.file_name(), response.status);
                self.complete_failure(
                    transfer_id,
                    UploadError::ServerProcessing {
                        status: response.status,
                    },
                )
                .await
            }
            Err(err) => {
                warn!("transfer_error: {} {}", selection.file_name(), err);
                self.complete_failure(transfer_id, err).await
            }
        }
    }

    async fn publish_progress(&self, transfer_id: Uuid, update: ProgressUpdate) {
        let mut inner = self.shared.inner.write().await;
        if inner.state.transfer_id != Some(transfer_id) {
            return;
        }
        if inner.state.apply(Action::Progress { percent: update.percent }) == Transition::Applied {
            self.shared.bus.emit_lossy(ReduxEvent::TransferProgress {
                transfer_id,
                percent: inner.state.progress_percent,
                sent_bytes: update.sent_bytes,
                total_bytes: update.total_bytes,
                timestamp: Utc::now(),
            });
        }
    }

    async fn complete_success(
        &self,
        transfer_id: Uuid,
        selection: &PendingSelection,
        response: TransferResponse,
    ) -> TransferOutcome {
        let artifact = Arc::new(ResultArtifact::new(
            transfer_id,
            selection.file_name(),
            selection.kind(),
            response.body,
            response.metadata,
        ));

        let saved_to = match &self.shared.config.output_dir {
            Some(dir) => match artifact.save_to_dir(dir).await {
                Ok(path) => Some(path),
                Err(e) => {
                    warn!("Failed to save {} to {}: {}", artifact.download_name, dir.display(), e);
                    None
                }
            },
            None => None,
        };

        let view = ResultView {
            transfer_id,
            download_name: artifact.download_name.clone(),
            size_bytes: artifact.size_bytes(),
            download_url: DOWNLOAD_URL.to_string(),
            preview_url: artifact.previewable().then(|| PREVIEW_URL.to_string()),
        };

        let mut inner = self.shared.inner.write().await;
        inner.pending = None;
        inner.state.apply(Action::Succeeded {
            result: view,
            metadata: artifact.metadata,
        });
        inner.artifact = Some(artifact.clone());
        inner.release_timer = Some(self.schedule_release(transfer_id));

        info!(
            "transfer_succeeded: {} -> {} bytes={} metadata={}",
            selection.file_name(),
            artifact.download_name,
            artifact.size_bytes(),
            artifact
                .metadata
                .map(|m| m.to_string())
                .unwrap_or_else(|| "none".to_string())
        );

        self.shared.bus.emit_lossy(ReduxEvent::TransferSucceeded {
            transfer_id,
            download_name: artifact.download_name.clone(),
            size_bytes: artifact.size_bytes(),
            metadata: artifact.metadata,
            has_preview: artifact.previewable(),
            status_message: MSG_SUCCEEDED.to_string(),
            timestamp: Utc::now(),
        });

        TransferOutcome::Succeeded { artifact, saved_to }
    }

    async fn complete_failure(&self, transfer_id: Uuid, error: UploadError) -> TransferOutcome {
        let kind = match error {
            UploadError::ServerProcessing { .. } => FailureKind::ServerProcessing,
            _ => FailureKind::Network,
        };

        let mut inner = self.shared.inner.write().await;
        inner.pending = None;
        inner.state.apply(Action::Failed { kind });

        self.shared.bus.emit_lossy(ReduxEvent::TransferFailed {
            transfer_id,
            kind,
            status_message: inner.state.status_message.clone(),
            timestamp: Utc::now(),
        });

        TransferOutcome::Failed { error }
    }

    fn schedule_release(&self, transfer_id: Uuid) -> ReleaseTimer {
        let weak: Weak<Shared> = Arc::downgrade(&self.shared);
        ReleaseTimer::schedule(self.shared.config.release_after, async move {
            if let Some(shared) = weak.upgrade() {
                let session = UploadSession { shared };
                session.release_expired(transfer_id).await;
            }
        })
    }

    async fn release_expired(&self, transfer_id: Uuid) {
        let mut inner = self.shared.inner.write().await;
        let is_current = inner
            .artifact
            .as_ref()
            .is_some_and(|a| a.transfer_id == transfer_id);
        if is_current {
            self.release_locked(&mut inner, ReleaseReason::Expired);
        }
    }

    /// Drop the current artifact and its timer; returns the released transfer id
    fn release_locked(&self, inner: &mut SessionInner, reason: ReleaseReason) -> Option<Uuid> {
        let timer = inner.release_timer.take();
        let artifact = inner.artifact.take()?;
        let transfer_id = artifact.transfer_id;

        inner.state.apply(Action::ResultReleased { transfer_id });
        info!("artifact_released: {} reason={:?}", artifact.download_name, reason);

        self.shared.bus.emit_lossy(ReduxEvent::ArtifactReleased {
            transfer_id,
            reason,
            timestamp: Utc::now(),
        });

        // Dropped last: on expiry this aborts the task running this very call.
        drop(timer);
        Some(transfer_id)
    }
}
