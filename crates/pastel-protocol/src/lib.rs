//! Messages exchanged between the pastel pipeline and a palette UI.
//!
//! The pipeline never touches UI state directly. Everything the palette needs
//! to render (show requests, task progress, failures) travels as a
//! [`MsgToUI`] over the channel created by [`ipc::ui_channel`].
use serde::{Deserialize, Serialize};

/// Identifier assigned by the dispatcher to every submitted task.
pub type TaskId = u64;

/// Stable failure codes carried by failed task results.
///
/// Use `to_string()` (Display) to produce the canonical code string.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    /// Math parse or evaluation error.
    #[error("InvalidExpression")]
    InvalidExpression,
    /// Input text was required but empty.
    #[error("EmptyInput")]
    EmptyInput,
    /// The AI endpoint answered with something outside the JSON contract.
    #[error("ProtocolError")]
    ProtocolError,
    /// The AI endpoint reported `status: "error"`.
    #[error("AiProviderError")]
    AiProviderError,
    /// The AI endpoint could not be reached or answered with an HTTP error.
    #[error("NetworkError")]
    NetworkError,
    /// The provider exceeded the task deadline.
    #[error("Timeout")]
    Timeout,
    /// No command is registered under the requested id.
    #[error("UnknownCommand")]
    UnknownCommand,
    /// A command with this id is already registered.
    #[error("DuplicateId")]
    DuplicateId,
    /// The registry already holds the maximum number of user commands.
    #[error("CapacityExceeded")]
    CapacityExceeded,
    /// The clipboard was written but the paste keystroke could not be delivered.
    #[error("PasteDelivery")]
    PasteDelivery,
    /// The provider succeeded but every answer was blank.
    #[error("EmptyResult")]
    EmptyResult,
}

/// IPC-related helpers: channel aliases.
pub mod ipc {
    use super::MsgToUI;

    /// Tokio unbounded sender for UI messages.
    pub type UiTx = tokio::sync::mpsc::UnboundedSender<MsgToUI>;
    /// Tokio unbounded receiver for UI messages.
    pub type UiRx = tokio::sync::mpsc::UnboundedReceiver<MsgToUI>;

    /// Create a standard unbounded UI channel (sender, receiver).
    pub fn ui_channel() -> (UiTx, UiRx) {
        tokio::sync::mpsc::unbounded_channel::<MsgToUI>()
    }
}

/// Messages sent from the pipeline to the palette.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MsgToUI {
    /// The activation chord fired; show the palette over `selection`.
    ShowPalette {
        /// Text captured from the primary selection when the chord fired.
        selection: String,
    },

    /// A task moved to `Running`.
    TaskStarted {
        /// Dispatcher-assigned task id.
        task: TaskId,
        /// Command being executed.
        command: String,
    },

    /// A task completed; the first answer has been handed to the clipboard bridge.
    TaskSucceeded {
        /// Dispatcher-assigned task id.
        task: TaskId,
        /// Command that produced the answers.
        command: String,
        /// All answers, in provider order. The first one was committed.
        answers: Vec<String>,
    },

    /// A task failed; the clipboard is untouched unless `kind` is `PasteDelivery`.
    TaskFailed {
        /// Dispatcher-assigned task id.
        task: TaskId,
        /// Command that failed.
        command: String,
        /// Failure code.
        kind: FailureKind,
        /// One concise user-facing message.
        message: String,
    },

    /// A task was superseded or dismissed before it finished.
    TaskCancelled {
        /// Dispatcher-assigned task id.
        task: TaskId,
        /// Command that was cancelled.
        command: String,
    },

}

impl MsgToUI {
    /// Task id carried by task lifecycle messages.
    pub fn task_id(&self) -> Option<TaskId> {
        match self {
            Self::TaskStarted { task, .. }
            | Self::TaskSucceeded { task, .. }
            | Self::TaskFailed { task, .. }
            | Self::TaskCancelled { task, .. } => Some(*task),
            Self::ShowPalette { .. } => None,
        }
    }
}
