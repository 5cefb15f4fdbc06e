//! Single-active-task dispatcher.
//!
//! At most one task runs at a time. A new submission cancels the running one
//! and only the most recent task may reach the clipboard bridge.
use std::{
    result::Result as StdResult,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::Duration,
};

use config::Config;
use parking_lot::Mutex;
use pastel_protocol::{FailureKind, TaskId, ipc::UiTx};
use tokio::{sync::watch, time::sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{
    Error, NotificationDispatcher, Result,
    clipboard::{ClipboardBackend, ClipboardBridge, PasteTrigger},
    command::Command,
    providers::ProviderSet,
    registry::Registry,
    task::{ExecutionHandle, TaskRequest, TaskResult, TaskState},
};

/// How the provider phase of a task ended.
enum Outcome {
    /// The provider returned.
    Finished(TaskResult),
    /// The deadline passed first.
    TimedOut,
    /// The token was cancelled first.
    Cancelled,
}

/// Accepts task submissions and drives each one to a terminal state.
#[derive(Clone)]
pub struct Dispatcher {
    /// State shared with spawned tasks.
    inner: Arc<Inner>,
}

/// Shared dispatcher state, also owned by running tasks.
struct Inner {
    /// Command lookup.
    registry: Arc<Registry>,
    /// Provider instances.
    providers: Arc<ProviderSet>,
    /// Clipboard write and paste.
    bridge: Arc<ClipboardBridge>,
    /// UI lifecycle messages.
    notifier: NotificationDispatcher,
    /// Provider deadline.
    timeout: Duration,
    /// Most recently submitted task.
    active: Mutex<Option<ExecutionHandle>>,
    /// Last assigned task id.
    next_id: AtomicU64,
    /// Answers of the last completed task.
    last_answers: Mutex<Vec<String>>,
    /// Set by `shutdown`.
    closed: AtomicBool,
}

impl Dispatcher {
    /// Create a dispatcher over the given services.
    pub fn new(
        registry: Arc<Registry>,
        providers: Arc<ProviderSet>,
        bridge: Arc<ClipboardBridge>,
        notifier: NotificationDispatcher,
        timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry,
                providers,
                bridge,
                notifier,
                timeout,
                active: Mutex::new(None),
                next_id: AtomicU64::new(0),
                last_answers: Mutex::new(Vec::new()),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Wire the registry, providers and bridge described by `cfg`.
    pub fn from_config(
        cfg: &Config,
        backend: Arc<dyn ClipboardBackend>,
        paste: Arc<dyn PasteTrigger>,
        tx: UiTx,
    ) -> Result<Self> {
        Ok(Self::new(
            Arc::new(Registry::from_config(cfg)?),
            Arc::new(ProviderSet::new(cfg.ai.clone())),
            Arc::new(ClipboardBridge::from_config(cfg, backend, paste)),
            NotificationDispatcher::new(tx),
            cfg.task_timeout(),
        ))
    }

    /// The command registry.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.inner.registry
    }

    /// Capture the selection and ask the UI to show the palette over it.
    pub async fn activate(&self) -> String {
        let selection = self.inner.bridge.capture().await;
        if let Err(e) = self.inner.notifier.show_palette(selection.clone()) {
            debug!(error = %e, "show_palette_unsent");
        }
        selection
    }

    /// Submit a task, cancelling the one currently running.
    ///
    /// Must be called from within a tokio runtime. Unknown command ids fail
    /// the returned handle immediately and leave the running task alone.
    pub fn submit(&self, req: TaskRequest) -> ExecutionHandle {
        let inner = &self.inner;
        let id = inner.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let (handle, state) = ExecutionHandle::new(id, req.command_id.clone());
        info!(task = id, command = %req.command_id, len = req.selected_text.len(), "task_submit");

        if inner.closed.load(Ordering::SeqCst) {
            handle.cancel();
            inner.finish(&handle, &state, TaskState::Cancelled);
            return handle;
        }

        let command = match inner.registry.resolve(&req.command_id) {
            Ok(c) => c,
            Err(e) => {
                let kind = e.failure_kind().unwrap_or(FailureKind::UnknownCommand);
                let failed = TaskState::Failed {
                    kind,
                    message: e.to_string(),
                };
                inner.finish(&handle, &state, failed);
                return handle;
            }
        };
        if let Err(e) = inner.registry.touch(&command.id) {
            debug!(error = %e, "touch_failed");
        }

        let previous = inner.active.lock().replace(handle.clone());
        if let Some(prev) = previous {
            if !prev.state().is_terminal() {
                info!(task = prev.id(), by = id, "task_superseded");
            }
            prev.cancel();
        }

        tokio::spawn(run(inner.clone(), command, handle.clone(), state, req));
        handle
    }

    /// Commit another answer of the last completed task.
    pub async fn commit_answer(&self, answer: &str) -> Result<()> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(Error::ShutDown);
        }
        let known = self.inner.last_answers.lock().iter().any(|a| a == answer);
        if !known {
            return Err(Error::NoSuchAnswer(answer.to_string()));
        }
        info!(len = answer.len(), "answer_recommit");
        self.inner
            .bridge
            .commit(answer, &CancellationToken::new())
            .await
    }

    /// Run `req` to a terminal state without touching the clipboard.
    ///
    /// Uses the same deadline and answer filtering as [`Self::submit`], but
    /// the task is not tracked as active and nothing is committed.
    pub async fn preview(&self, req: TaskRequest) -> TaskState {
        let command = match self.inner.registry.resolve(&req.command_id) {
            Ok(c) => c,
            Err(e) => {
                return TaskState::Failed {
                    kind: e.failure_kind().unwrap_or(FailureKind::UnknownCommand),
                    message: e.to_string(),
                };
            }
        };
        debug!(command = %command.id, "task_preview");
        let token = CancellationToken::new();
        match self.inner.execute(&command, &req, &token).await {
            Ok(answers) => TaskState::Completed { answers },
            Err(ended) => ended,
        }
    }

    /// Answers of the last completed task, best first.
    pub fn last_answers(&self) -> Vec<String> {
        self.inner.last_answers.lock().clone()
    }

    /// Handle of the most recently submitted task.
    pub fn active(&self) -> Option<ExecutionHandle> {
        self.inner.active.lock().clone()
    }

    /// Cancel the running task, if any. Returns whether one was running.
    pub fn cancel_active(&self) -> bool {
        match self.inner.active.lock().as_ref() {
            Some(h) if !h.state().is_terminal() => {
                h.cancel();
                true
            }
            _ => false,
        }
    }

    /// Cancel the running task and refuse further work.
    pub fn shutdown(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        if self.cancel_active() {
            info!("dispatcher_shutdown_cancelled_task");
        }
    }
}

impl Inner {
    /// Whether `task` is still the most recent submission.
    fn is_current(&self, task: TaskId) -> bool {
        self.active.lock().as_ref().map(ExecutionHandle::id) == Some(task)
    }

    /// Report the terminal state to the UI, then publish it on the handle.
    fn finish(&self, handle: &ExecutionHandle, state: &watch::Sender<TaskState>, outcome: TaskState) {
        let (task, command) = (handle.id(), handle.command_id());
        let sent = match &outcome {
            TaskState::Completed { answers } => {
                self.notifier.task_succeeded(task, command, answers.clone())
            }
            TaskState::Failed { kind, message } => {
                self.notifier.task_failed(task, command, *kind, message.clone())
            }
            TaskState::Cancelled => self.notifier.task_cancelled(task, command),
            TaskState::Idle | TaskState::Running => Ok(()),
        };
        if let Err(e) = sent {
            debug!(task, error = %e, "ui_send_failed");
        }
        state.send_replace(outcome);
    }

    /// Run the provider phase under the deadline.
    ///
    /// Yields the non-blank answers, or the terminal state the task ends in.
    async fn execute(
        &self,
        command: &Command,
        req: &TaskRequest,
        token: &CancellationToken,
    ) -> StdResult<Vec<String>, TaskState> {
        let outcome = tokio::select! {
            biased;
            () = token.cancelled() => Outcome::Cancelled,
            result = self.providers.execute(command, req, token) => Outcome::Finished(result),
            () = sleep(self.timeout) => Outcome::TimedOut,
        };
        match outcome {
            Outcome::Cancelled => Err(TaskState::Cancelled),
            Outcome::TimedOut => {
                token.cancel();
                Err(TaskState::Failed {
                    kind: FailureKind::Timeout,
                    message: format!("Task timed out after {:?}", self.timeout),
                })
            }
            Outcome::Finished(_) if token.is_cancelled() => Err(TaskState::Cancelled),
            Outcome::Finished(TaskResult::Failure { kind, message }) => {
                Err(TaskState::Failed { kind, message })
            }
            Outcome::Finished(TaskResult::Success { answers }) => {
                let answers: Vec<String> = answers
                    .into_iter()
                    .filter(|a| !a.trim().is_empty())
                    .collect();
                if answers.is_empty() {
                    Err(TaskState::Failed {
                        kind: FailureKind::EmptyResult,
                        message: "Task did not return a result".to_string(),
                    })
                } else {
                    Ok(answers)
                }
            }
        }
    }

    /// Commit the first answer if the task is still current.
    async fn deliver(&self, handle: &ExecutionHandle, answers: Vec<String>) -> TaskState {
        // Stale results never reach the clipboard.
        if handle.token().is_cancelled() || !self.is_current(handle.id()) {
            return TaskState::Cancelled;
        }
        let Some(first) = answers.first() else {
            return TaskState::Failed {
                kind: FailureKind::EmptyResult,
                message: "Task did not return a result".to_string(),
            };
        };
        // A newer submission or a dismissal cancels the token mid-commit.
        match self.bridge.commit(first, handle.token()).await {
            Ok(()) => {
                self.last_answers.lock().clone_from(&answers);
                TaskState::Completed { answers }
            }
            Err(Error::Cancelled) => TaskState::Cancelled,
            Err(e) => TaskState::Failed {
                kind: e.failure_kind().unwrap_or(FailureKind::PasteDelivery),
                message: e.to_string(),
            },
        }
    }
}

/// Drive one task from `Running` to a terminal state.
async fn run(
    inner: Arc<Inner>,
    command: Arc<Command>,
    handle: ExecutionHandle,
    state: watch::Sender<TaskState>,
    req: TaskRequest,
) {
    let id = handle.id();
    state.send_replace(TaskState::Running);
    if let Err(e) = inner.notifier.task_started(id, &command.id) {
        debug!(task = id, error = %e, "ui_send_failed");
    }

    let terminal = match inner.execute(&command, &req, handle.token()).await {
        Ok(answers) => inner.deliver(&handle, answers).await,
        Err(ended) => ended,
    };
    inner.finish(&handle, &state, terminal);
}
