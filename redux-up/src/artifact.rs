//! Result artifacts
//!
//! The bytes returned by a successful transfer, plus what is needed to offer
//! them as a download and, for images, as a preview. The session owns the
//! current artifact; readers get shared `Arc` handles that stay valid after
//! the session releases its own.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use redux_common::ResultMetadata;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

use crate::selection::MediaKind;

/// Prefix added to the original file name for the download
pub const RESULT_PREFIX: &str = "processed_";

/// Where the web page fetches the download
pub const DOWNLOAD_URL: &str = "/api/result";

/// Where the web page fetches the inline preview
pub const PREVIEW_URL: &str = "/api/preview";

/// Suggested download name for a processed file
pub fn download_name(original: &str) -> String {
    format!("{}{}", RESULT_PREFIX, original)
}

/// Returned file held by the session
#[derive(Debug, Clone)]
pub struct ResultArtifact {
    pub transfer_id: Uuid,
    pub download_name: String,
    pub kind: MediaKind,
    pub data: Bytes,
    pub metadata: Option<ResultMetadata>,
    pub created_at: DateTime<Utc>,
}

impl ResultArtifact {
    pub fn new(
        transfer_id: Uuid,
        original_name: &str,
        kind: MediaKind,
        data: Bytes,
        metadata: Option<ResultMetadata>,
    ) -> Self {
        Self {
            transfer_id,
            download_name: download_name(original_name),
            kind,
            data,
            metadata,
            created_at: Utc::now(),
        }
    }

    pub fn content_type(&self) -> &'static str {
        self.kind.mime_type()
    }

    pub fn previewable(&self) -> bool {
        self.kind.previewable()
    }

    pub fn size_bytes(&self) -> u64 {
        self.data.len() as u64
    }

    /// `Content-Disposition` value for serving as a download
    pub fn attachment_disposition(&self) -> String {
        let safe: String = self
            .download_name
            .chars()
            .map(|c| if c == '"' || c == '\\' || c.is_control() { '_' } else { c })
            .collect();
        format!("attachment; filename=\"{}\"", safe)
    }

    /// Write the artifact into `dir` under its download name
    ///
    /// Creates `dir` if needed and returns the written path.
    pub async fn save_to_dir(&self, dir: &Path) -> std::io::Result<PathBuf> {
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(sanitize_file_name(&self.download_name));
        tokio::fs::write(&path, &self.data).await?;
        info!("artifact_saved: {} bytes={}", path.display(), self.data.len());
        Ok(path)
    }
}

/// Keep only the final path component so a crafted name cannot escape `dir`
fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    if base.is_empty() || base == "." || base == ".." {
        RESULT_PREFIX.trim_end_matches('_').to_string()
    } else {
        base.to_string()
    }
}

/// One-shot delayed release, cancelled when dropped
///
/// Holding the timer next to the artifact ties its lifetime to the artifact:
/// replacing or releasing the artifact drops the timer and aborts the task.
#[derive(Debug)]
pub struct ReleaseTimer {
    handle: JoinHandle<()>,
}

impl ReleaseTimer {
    /// Run `release` after `delay` unless the timer is dropped first
    pub fn schedule<F>(delay: Duration, release: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        debug!("release_timer: scheduled in {:?}", delay);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            release.await;
        });
        Self { handle }
    }

}

impl Drop for ReleaseTimer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
