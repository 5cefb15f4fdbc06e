use pastel_engine::{Dispatcher, TaskRequest};
use pastel_protocol::{MsgToUI, ipc::UiRx};
use tokio::{signal, sync::watch};
use tracing::{debug, info, warn};

/// Stand-in for the palette window.
///
/// Every activation captures the selection and, when a command was chosen
/// on the command line, submits it. UI messages are logged.
pub struct Controller {
    /// Task pipeline.
    dispatcher: Dispatcher,
    /// Messages the pipeline sends to the palette.
    rx: UiRx,
    /// Command submitted on activation.
    command: Option<String>,
}

impl Controller {
    /// Create a controller.
    pub fn new(dispatcher: Dispatcher, rx: UiRx, command: Option<String>) -> Self {
        Self {
            dispatcher,
            rx,
            command,
        }
    }

    /// Serve activations until the listener stops or the process is interrupted.
    pub async fn run(mut self, mut activations: watch::Receiver<u64>) {
        let interrupt = signal::ctrl_c();
        tokio::pin!(interrupt);
        loop {
            tokio::select! {
                changed = activations.changed() => {
                    if changed.is_err() {
                        warn!("hotkey_listener_stopped");
                        break;
                    }
                    let count = *activations.borrow_and_update();
                    debug!(count, "activation");
                    self.on_activation().await;
                }
                Some(msg) = self.rx.recv() => log_message(&msg),
                _ = &mut interrupt => {
                    info!("interrupted");
                    break;
                }
            }
        }
        self.dispatcher.shutdown();
        while let Ok(msg) = self.rx.try_recv() {
            log_message(&msg);
        }
    }

    /// Capture the selection and submit the configured command.
    async fn on_activation(&self) {
        let selection = self.dispatcher.activate().await;
        match &self.command {
            Some(id) => {
                let handle = self
                    .dispatcher
                    .submit(TaskRequest::new(id.clone(), selection));
                debug!(task = handle.id(), command = %id, "palette_submitted");
            }
            None => info!(len = selection.len(), "palette_shown"),
        }
    }
}

/// Log one UI message.
fn log_message(msg: &MsgToUI) {
    match msg {
        MsgToUI::ShowPalette { selection } => debug!(len = selection.len(), "ui_show_palette"),
        MsgToUI::TaskStarted { task, command } => debug!(task, command = %command, "ui_task_started"),
        MsgToUI::TaskSucceeded { task, answers, .. } => {
            info!(task, answers = answers.len(), first = ?answers.first(), "ui_task_succeeded");
        }
        MsgToUI::TaskFailed {
            task, kind, message, ..
        } => warn!(task, kind = %kind, message = %message, "ui_task_failed"),
        MsgToUI::TaskCancelled { task, .. } => debug!(task, "ui_task_cancelled"),
    }
}
