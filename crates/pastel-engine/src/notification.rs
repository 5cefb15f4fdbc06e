use pastel_protocol::{FailureKind, MsgToUI, TaskId, ipc::UiTx};
use tracing::{error, info};

use crate::{Error, Result};

/// Sends palette and task lifecycle updates to the UI layer.
#[derive(Clone)]
pub struct NotificationDispatcher {
    /// Channel to the palette.
    tx: UiTx,
}

impl NotificationDispatcher {
    /// Create a new dispatcher from a UI message channel.
    pub fn new(tx: UiTx) -> Self {
        Self { tx }
    }

    /// Send a raw message.
    pub fn send(&self, msg: MsgToUI) -> Result<()> {
        self.tx.send(msg).map_err(|_| Error::ChannelClosed)
    }

    /// Ask the UI to show the palette over `selection`.
    pub fn show_palette(&self, selection: String) -> Result<()> {
        self.send(MsgToUI::ShowPalette { selection })
    }

    /// A task started running.
    pub fn task_started(&self, task: TaskId, command: &str) -> Result<()> {
        self.send(MsgToUI::TaskStarted {
            task,
            command: command.to_string(),
        })
    }

    /// A task completed and its first answer was pasted.
    pub fn task_succeeded(&self, task: TaskId, command: &str, answers: Vec<String>) -> Result<()> {
        info!(task, command, answers = answers.len(), "task_succeeded");
        self.send(MsgToUI::TaskSucceeded {
            task,
            command: command.to_string(),
            answers,
        })
    }

    /// A task failed.
    pub fn task_failed(
        &self,
        task: TaskId,
        command: &str,
        kind: FailureKind,
        message: String,
    ) -> Result<()> {
        // Always log failures with the code and the user-facing text.
        error!(task, command, kind = %kind, message = %message, "task_failed");
        self.send(MsgToUI::TaskFailed {
            task,
            command: command.to_string(),
            kind,
            message,
        })
    }

    /// A task was superseded, dismissed or shut down.
    pub fn task_cancelled(&self, task: TaskId, command: &str) -> Result<()> {
        info!(task, command, "task_cancelled");
        self.send(MsgToUI::TaskCancelled {
            task,
            command: command.to_string(),
        })
    }

}
