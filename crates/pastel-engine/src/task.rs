//! Task requests, results and the handle to one in-flight execution.
use std::time::SystemTime;

use pastel_protocol::{FailureKind, TaskId};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// A request to run one command over captured text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRequest {
    /// Command to run.
    pub command_id: String,
    /// Selection captured when the palette opened.
    pub selected_text: String,
    /// Text typed into the palette, if any.
    pub query: Option<String>,
    /// Submission time.
    pub submitted_at: SystemTime,
}

impl TaskRequest {
    /// Request `command_id` over `selected_text`, stamped now.
    pub fn new(command_id: impl Into<String>, selected_text: impl Into<String>) -> Self {
        Self {
            command_id: command_id.into(),
            selected_text: selected_text.into(),
            query: None,
            submitted_at: SystemTime::now(),
        }
    }

    /// Attach the palette query.
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }
}

/// Outcome of running a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskResult {
    /// Non-empty ordered answers.
    Success {
        /// Answers, best first.
        answers: Vec<String>,
    },
    /// The provider could not produce an answer.
    Failure {
        /// Failure code.
        kind: FailureKind,
        /// One concise user-facing message.
        message: String,
    },
}

impl TaskResult {
    /// A single-answer success.
    pub fn single(answer: impl Into<String>) -> Self {
        Self::Success {
            answers: vec![answer.into()],
        }
    }

    /// A failure.
    pub fn failure(kind: FailureKind, message: impl Into<String>) -> Self {
        Self::Failure {
            kind,
            message: message.into(),
        }
    }

    /// Whether this is a success.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Failure code, if any.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { kind, .. } => Some(*kind),
        }
    }
}

/// Lifecycle of one execution handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskState {
    /// Created, not yet started.
    Idle,
    /// Provider is running.
    Running,
    /// Provider succeeded and the first answer was committed.
    Completed {
        /// All answers.
        answers: Vec<String>,
    },
    /// Superseded, dismissed or shut down.
    Cancelled,
    /// Provider, timeout or delivery failure.
    Failed {
        /// Failure code.
        kind: FailureKind,
        /// User-facing message.
        message: String,
    },
}

impl TaskState {
    /// Whether the state is final.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Idle | Self::Running)
    }
}

/// Handle to one submitted task.
///
/// Cloning shares the same token and state channel.
#[derive(Debug, Clone)]
pub struct ExecutionHandle {
    /// Dispatcher-assigned id.
    id: TaskId,
    /// Command being executed.
    command_id: String,
    /// Cancelled on supersede, dismiss, timeout or shutdown.
    cancel: CancellationToken,
    /// Completion channel.
    state: watch::Receiver<TaskState>,
}

impl ExecutionHandle {
    /// Build a handle and the sender that drives its state.
    pub(crate) fn new(id: TaskId, command_id: String) -> (Self, watch::Sender<TaskState>) {
        let (tx, rx) = watch::channel(TaskState::Idle);
        (
            Self {
                id,
                command_id,
                cancel: CancellationToken::new(),
                state: rx,
            },
            tx,
        )
    }

    /// Task id.
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Command id.
    pub fn command_id(&self) -> &str {
        &self.command_id
    }

    /// Cancellation token for this task.
    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Current state.
    pub fn state(&self) -> TaskState {
        self.state.borrow().clone()
    }

    /// Wait until the task reaches a terminal state.
    pub async fn wait(&self) -> TaskState {
        let mut rx = self.state.clone();
        match rx.wait_for(TaskState::is_terminal).await {
            Ok(s) => s.clone(),
            // Sender dropped without a final state: the runner was aborted.
            Err(_) => TaskState::Cancelled,
        }
    }
}
