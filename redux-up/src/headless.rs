//! One select → upload → result cycle without the web page
//!
//! Used by `redux-up upload <FILE>`. Progress is logged as it is published
//! and the processed file lands in the session's output directory.

use futures::StreamExt;
use redux_common::{ReduxEvent, ResultMetadata};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{info, warn};

use crate::error::UploadError;
use crate::session::{TransferOutcome, UploadSession};

/// Why a headless cycle ended without a saved result
#[derive(Debug, Error)]
pub enum HeadlessError {
    #[error(transparent)]
    Upload(#[from] UploadError),

    /// The endpoint answered 200 but the output directory could not be written
    #[error("Processed {file_name} but could not save it to {}", dir.display())]
    NotSaved { file_name: String, dir: PathBuf },
}

impl HeadlessError {
    /// Short status line, same wording as the page
    pub fn status_message(&self) -> String {
        match self {
            HeadlessError::Upload(err) => err.status_message(),
            HeadlessError::NotSaved { .. } => self.to_string(),
        }
    }
}

/// What a successful cycle produced
#[derive(Debug, Clone)]
pub struct HeadlessReport {
    pub download_name: String,
    /// `None` only when the session has no output directory
    pub saved_to: Option<PathBuf>,
    pub metadata: Option<ResultMetadata>,
    /// Published percentages in order, ending at the top of the transfer band
    pub progress: Vec<u8>,
}

/// Run the full cycle for `path` on `session`
pub async fn run(session: &UploadSession, path: &Path) -> Result<HeadlessReport, HeadlessError> {
    session.select_path(path).await?;
    info!("{}", session.snapshot().await.status_message);

    let mut events = BroadcastStream::new(session.bus().subscribe());
    let handle = session.start_upload().await?;

    let progress_log = tokio::spawn(async move {
        let mut seen = Vec::new();
        while let Some(event) = events.next().await {
            match event {
                Ok(ReduxEvent::TransferProgress { percent, .. }) => {
                    info!("Upload in progress... {}%", percent);
                    seen.push(percent);
                }
                Ok(event) if event.is_terminal() => break,
                Ok(_) => {}
                Err(e) => warn!("Progress stream lagged: {}", e),
            }
        }
        seen
    });

    let outcome = handle.wait().await;
    let progress = progress_log.await.unwrap_or_default();
    let state = session.snapshot().await;

    match outcome {
        TransferOutcome::Succeeded { artifact, saved_to } => {
            info!("{} ({}%)", state.status_message, state.progress_percent);

            if let (Some(dir), None) = (&session.config().output_dir, &saved_to) {
                return Err(HeadlessError::NotSaved {
                    file_name: artifact.download_name.clone(),
                    dir: dir.clone(),
                });
            }
            if let Some(path) = &saved_to {
                info!("Saved {}", path.display());
            }

            Ok(HeadlessReport {
                download_name: artifact.download_name.clone(),
                saved_to,
                metadata: artifact.metadata,
                progress,
            })
        }
        TransferOutcome::Failed { error } => {
            warn!("{}: {}", state.status_message, error);
            Err(error.into())
        }
    }
}
