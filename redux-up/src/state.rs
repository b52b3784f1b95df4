//! Transfer view state and its reducer
//!
//! [`TransferState`] is the single view model of an upload session. It only
//! changes through [`TransferState::apply`]; actions that are not valid for
//! the current phase are ignored and reported as [`Transition::Ignored`].
//!
//! ```text
//! Idle      --select(valid)-->    Selected
//! Idle      --select(invalid)-->  Idle (status=error)
//! Selected  --select(any)-->      Selected | Idle
//! Selected  --start-->            Uploading
//! Uploading --progress-->         Uploading
//! Uploading --200-->              Succeeded
//! Uploading --non-200-->          Failed
//! Uploading --transport error-->  Failed
//! Succeeded --select(valid)-->    Selected (result cleared)
//! Failed    --select(valid)-->    Selected (result cleared)
//! ```

use redux_common::events::FailureKind;
use redux_common::ResultMetadata;
use serde::Serialize;
use uuid::Uuid;

use crate::error::{
    ready_message, MSG_NETWORK_ERROR, MSG_NO_FILE_SELECTED, MSG_PROCESSING_ERROR,
    MSG_SUCCEEDED, MSG_UNSUPPORTED_FORMAT, MSG_UPLOADING,
};
use crate::progress::{COMPLETE_PERCENT, TRANSFER_BAND_MAX};
use crate::selection::SelectionSummary;

/// Lifecycle phase of the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Idle,
    Selected,
    Uploading,
    Succeeded,
    Failed,
}

/// What the view shows about an available result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultView {
    pub transfer_id: Uuid,
    pub download_name: String,
    pub size_bytes: u64,
    pub download_url: String,
    /// Set for image results only
    pub preview_url: Option<String>,
}

/// Per-session view model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransferState {
    pub phase: Phase,
    pub progress_percent: u8,
    pub status_message: String,
    pub selection: Option<SelectionSummary>,
    pub transfer_id: Option<Uuid>,
    pub result: Option<ResultView>,
    pub metadata: Option<ResultMetadata>,
}

impl Default for TransferState {
    fn default() -> Self {
        Self {
            phase: Phase::Idle,
            progress_percent: 0,
            status_message: String::new(),
            selection: None,
            transfer_id: None,
            result: None,
            metadata: None,
        }
    }
}

/// Inputs to the reducer
#[derive(Debug, Clone)]
pub enum Action {
    /// A file passed validation
    SelectionAccepted(SelectionSummary),
    /// A file failed validation
    SelectionRejected,
    /// Upload requested with nothing pending
    StartWithoutSelection,
    /// Transfer began
    TransferStarted { transfer_id: Uuid },
    /// New published progress from the transport
    Progress { percent: u8 },
    /// Endpoint returned 200
    Succeeded {
        result: ResultView,
        metadata: Option<ResultMetadata>,
    },
    /// Transfer ended without a result
    Failed { kind: FailureKind },
    /// The result artifact stopped being served
    ResultReleased { transfer_id: Uuid },
}

/// Outcome of [`TransferState::apply`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Applied,
    /// The action is not valid in this phase; nothing changed
    Ignored,
}

impl TransferState {
    pub fn is_uploading(&self) -> bool {
        self.phase == Phase::Uploading
    }

    /// Apply one action
    pub fn apply(&mut self, action: Action) -> Transition {
        match action {
            Action::SelectionAccepted(summary) => {
                if self.is_uploading() {
                    return Transition::Ignored;
                }
                self.status_message = ready_message(&summary.file_name);
                self.selection = Some(summary);
                self.phase = Phase::Selected;
                self.progress_percent = 0;
                self.transfer_id = None;
                self.result = None;
                self.metadata = None;
            }
            Action::SelectionRejected => {
                if self.is_uploading() {
                    return Transition::Ignored;
                }
                self.selection = None;
                self.phase = Phase::Idle;
                self.status_message = MSG_UNSUPPORTED_FORMAT.to_string();
            }
            Action::StartWithoutSelection => {
                if self.is_uploading() {
                    return Transition::Ignored;
                }
                self.status_message = MSG_NO_FILE_SELECTED.to_string();
            }
            Action::TransferStarted { transfer_id } => {
                if self.phase != Phase::Selected || self.selection.is_none() {
                    return Transition::Ignored;
                }
                self.phase = Phase::Uploading;
                self.progress_percent = 0;
                self.transfer_id = Some(transfer_id);
                self.status_message = MSG_UPLOADING.to_string();
            }
            Action::Progress { percent } => {
                if !self.is_uploading() {
                    return Transition::Ignored;
                }
                self.progress_percent = percent.min(TRANSFER_BAND_MAX);
            }
            Action::Succeeded { result, metadata } => {
                if !self.is_uploading() {
                    return Transition::Ignored;
                }
                self.phase = Phase::Succeeded;
                self.progress_percent = COMPLETE_PERCENT;
                self.status_message = MSG_SUCCEEDED.to_string();
                self.selection = None;
                self.result = Some(result);
                self.metadata = metadata;
            }
            Action::Failed { kind } => {
                if !self.is_uploading() {
                    return Transition::Ignored;
                }
                self.phase = Phase::Failed;
                self.progress_percent = 0;
                self.status_message = match kind {
                    FailureKind::ServerProcessing => MSG_PROCESSING_ERROR,
                    FailureKind::Network => MSG_NETWORK_ERROR,
                }
                .to_string();
                self.selection = None;
            }
            Action::ResultReleased { transfer_id } => {
                match &self.result {
                    Some(view) if view.transfer_id == transfer_id => self.result = None,
                    _ => return Transition::Ignored,
                }
            }
        }
        Transition::Applied
    }
}
