//! Event types for the Redux event system
//!
//! Provides the shared event definitions and the EventBus used to fan state
//! transitions out to SSE clients and the headless runner.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Integer metadata returned by the processing endpoint alongside a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultMetadata {
    /// Number of variables in the input before reduction
    pub initial_variables: u32,
    /// Number of principal components retained
    pub retained_components: u32,
}

impl fmt::Display for ResultMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} | {}", self.initial_variables, self.retained_components)
    }
}

/// Why a transfer attempt failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Endpoint answered with a status other than 200
    ServerProcessing,
    /// Connection, DNS, timeout or body read failure
    Network,
}

/// Why a result artifact was released
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseReason {
    /// A new valid selection started a fresh cycle
    NewSelection,
    /// The user dismissed the result
    Dismissed,
    /// The safety-net timer fired
    Expired,
    /// The session was shut down
    Shutdown,
}

/// Redux event types
///
/// Events are broadcast via EventBus and serialized for SSE transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ReduxEvent {
    /// A file passed validation and is pending upload
    SelectionAccepted {
        file_name: String,
        size_bytes: u64,
        status_message: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A file was rejected by extension
    SelectionRejected {
        file_name: String,
        status_message: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Upload of the pending selection began
    TransferStarted {
        transfer_id: Uuid,
        file_name: String,
        total_bytes: u64,
        status_message: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Published progress changed (0-70 while sending)
    TransferProgress {
        transfer_id: Uuid,
        percent: u8,
        sent_bytes: u64,
        total_bytes: u64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Endpoint returned 200 and the result artifact is available
    TransferSucceeded {
        transfer_id: Uuid,
        download_name: String,
        size_bytes: u64,
        metadata: Option<ResultMetadata>,
        has_preview: bool,
        status_message: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Transfer ended without a usable result
    TransferFailed {
        transfer_id: Uuid,
        kind: FailureKind,
        status_message: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The result artifact is no longer served
    ArtifactReleased {
        transfer_id: Uuid,
        reason: ReleaseReason,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl ReduxEvent {
    /// Event name used as the SSE `event:` field
    pub fn event_type(&self) -> &str {
        match self {
            ReduxEvent::SelectionAccepted { .. } => "SelectionAccepted",
            ReduxEvent::SelectionRejected { .. } => "SelectionRejected",
            ReduxEvent::TransferStarted { .. } => "TransferStarted",
            ReduxEvent::TransferProgress { .. } => "TransferProgress",
            ReduxEvent::TransferSucceeded { .. } => "TransferSucceeded",
            ReduxEvent::TransferFailed { .. } => "TransferFailed",
            ReduxEvent::ArtifactReleased { .. } => "ArtifactReleased",
        }
    }

    /// True for the two events that end a transfer
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ReduxEvent::TransferSucceeded { .. } | ReduxEvent::TransferFailed { .. }
        )
    }
}

// ========================================
// EventBus Implementation
// ========================================

/// Central event distribution bus
///
/// The EventBus uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Lagged message detection for slow subscribers
///
/// # Examples
///
/// ```
/// use redux_common::events::{EventBus, ReduxEvent};
///
/// let event_bus = EventBus::new(100);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit_lossy(ReduxEvent::SelectionRejected {
///     file_name: "notes.txt".to_string(),
///     status_message: "unsupported".to_string(),
///     timestamp: chrono::Utc::now(),
/// });
///
/// assert_eq!(rx.try_recv().unwrap().event_type(), "SelectionRejected");
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ReduxEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<ReduxEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: ReduxEvent,
    ) -> Result<usize, broadcast::error::SendError<ReduxEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: ReduxEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
