//! Selection validation
//!
//! A file is accepted only when the lowercase text after its last `.` is one
//! of [`ALLOWED_EXTENSIONS`]. Contents are never inspected.

use bytes::Bytes;
use serde::Serialize;
use std::path::Path;

use crate::error::UploadError;

/// Extensions the processing endpoint understands
pub const ALLOWED_EXTENSIONS: [&str; 2] = ["wav", "png"];

/// What kind of media a selection holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Image,
}

impl MediaKind {
    /// Map a lowercase extension to a kind
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "wav" => Some(MediaKind::Audio),
            "png" => Some(MediaKind::Image),
            _ => None,
        }
    }

    /// MIME type sent with the multipart part and served back for results
    pub fn mime_type(self) -> &'static str {
        match self {
            MediaKind::Audio => "audio/wav",
            MediaKind::Image => "image/png",
        }
    }

    /// Only images get an inline preview
    pub fn previewable(self) -> bool {
        matches!(self, MediaKind::Image)
    }
}

/// Lowercase trailing extension of a file name, if it has one
///
/// `archive.tar.WAV` yields `wav`. `README` and `photo.` have none, and
/// neither does a bare `wav`: a name needs a dot to carry an extension.
pub fn extension_of(file_name: &str) -> Option<String> {
    let (_, ext) = file_name.rsplit_once('.')?;
    if ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Whether a file name passes the extension check
pub fn is_supported(file_name: &str) -> bool {
    extension_of(file_name)
        .and_then(|ext| MediaKind::from_extension(&ext))
        .is_some()
}

/// A validated file waiting to be uploaded
#[derive(Debug, Clone)]
pub struct PendingSelection {
    file_name: String,
    kind: MediaKind,
    data: Bytes,
}

impl PendingSelection {
    /// Validate and wrap a candidate file
    pub fn new(file_name: impl Into<String>, data: impl Into<Bytes>) -> Result<Self, UploadError> {
        let file_name = file_name.into();
        let kind = extension_of(&file_name)
            .and_then(|ext| MediaKind::from_extension(&ext))
            .ok_or_else(|| UploadError::UnsupportedFormat {
                file_name: file_name.clone(),
            })?;

        Ok(Self {
            file_name,
            kind,
            data: data.into(),
        })
    }

    /// Read a file from disk and validate it
    ///
    /// The extension is checked before the file is read, so unsupported
    /// files are rejected without touching their contents.
    pub async fn from_path(path: &Path) -> Result<Self, UploadError> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        if !is_supported(&file_name) {
            return Err(UploadError::UnsupportedFormat { file_name });
        }

        let data = tokio::fs::read(path).await?;
        Self::new(file_name, data)
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    /// Cheap clone of the file contents
    pub fn data(&self) -> Bytes {
        self.data.clone()
    }

    pub fn size_bytes(&self) -> u64 {
        self.data.len() as u64
    }

    /// Serializable summary for the view state
    pub fn summary(&self) -> SelectionSummary {
        SelectionSummary {
            file_name: self.file_name.clone(),
            kind: self.kind,
            size_bytes: self.size_bytes(),
        }
    }
}

/// What the view knows about the pending selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectionSummary {
    pub file_name: String,
    pub kind: MediaKind,
    pub size_bytes: u64,
}
