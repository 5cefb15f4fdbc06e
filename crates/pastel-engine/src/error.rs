use std::result::Result as StdResult;

use pastel_protocol::FailureKind;
use thiserror::Error;

/// Convenient result type for the engine crate.
pub type Result<T> = StdResult<T, Error>;

/// Unified error type for the pastel engine.
#[derive(Debug, Error)]
pub enum Error {
    /// A command with this id is already registered.
    #[error("Command '{0}' is already registered")]
    DuplicateId(String),

    /// The registry is full.
    #[error("Cannot register '{id}': limit of {limit} user commands reached")]
    CapacityExceeded {
        /// Rejected command id.
        id: String,
        /// Configured `max_user_commands`.
        limit: usize,
    },

    /// No command is registered under this id.
    #[error("Unknown command '{0}'")]
    UnknownCommand(String),

    /// The clipboard could not be read or written.
    #[error("Clipboard error: {0}")]
    Clipboard(String),

    /// The paste keystroke could not be delivered.
    #[error("Paste failed: {0}")]
    Paste(String),

    /// The answer is not among those of the last completed task.
    #[error("No completed task offered the answer '{0}'")]
    NoSuchAnswer(String),

    /// The dispatcher has been shut down.
    #[error("Dispatcher is shut down")]
    ShutDown,

    /// The UI event channel has been closed by the receiver.
    #[error("UI channel closed")]
    ChannelClosed,

    /// The task was cancelled before its answer was pasted.
    #[error("Commit cancelled")]
    Cancelled,
}

impl Error {
    /// Failure code reported to the UI for this error.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::DuplicateId(_) => Some(FailureKind::DuplicateId),
            Self::CapacityExceeded { .. } => Some(FailureKind::CapacityExceeded),
            Self::UnknownCommand(_) => Some(FailureKind::UnknownCommand),
            Self::Paste(_) | Self::Clipboard(_) => Some(FailureKind::PasteDelivery),
            Self::NoSuchAnswer(_) | Self::ShutDown | Self::ChannelClosed | Self::Cancelled => None,
        }
    }
}
