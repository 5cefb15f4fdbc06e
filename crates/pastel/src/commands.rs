use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use config::Config;
use evdev_hotkey::{ChordSpec, HotkeyListener, find_keyboard};
use pastel_engine::{
    ArboardClipboard, ClipboardBackend, Dispatcher, Error as EngineError, PasteTrigger,
    Registry, Result as EngineResult, TaskRequest, TaskState, XdotoolPaste,
};
use pastel_protocol::{FailureKind, ipc::ui_channel};
use ron::ser::PrettyConfig;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::controller::Controller;

/// Validate the configuration at `explicit` (or the default path).
pub fn check(explicit: Option<&Path>, dump: bool) -> i32 {
    let resolved = match config::resolve_config_path(explicit) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("{}", e.pretty());
            return 1;
        }
    };
    let loaded = match resolved.as_deref() {
        Some(path) => config::load_from_path(path),
        None => Ok(Config::default()),
    };
    let cfg = match loaded {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("{}", e.pretty());
            return 1;
        }
    };
    // Capacity is only enforced when commands are registered.
    if let Err(e) = Registry::from_config(&cfg) {
        eprintln!("{e}");
        return 1;
    }
    if dump {
        match ron::ser::to_string_pretty(&cfg, PrettyConfig::default()) {
            Ok(s) => println!("{s}"),
            Err(e) => {
                eprintln!("Failed to serialize config: {e}");
                return 1;
            }
        }
    } else {
        let source = resolved.map_or_else(
            || "built-in defaults".to_string(),
            |p| p.display().to_string(),
        );
        println!("OK ({source})");
    }
    0
}

/// Print every command, most recently used first.
pub fn list(cfg: &Config) -> i32 {
    match Registry::from_config(cfg) {
        Ok(registry) => {
            for cmd in registry.list() {
                println!("{:<24} {}", cmd.id, cmd.label);
            }
            0
        }
        Err(e) => {
            eprintln!("{e}");
            1
        }
    }
}

/// How long `exec --paste` stays alive after a successful paste.
///
/// X11 clipboard contents are served by the owning process, so exiting as
/// soon as `xdotool` returns can lose the paste.
const CLIPBOARD_HOLD: Duration = Duration::from_millis(500);

/// Clipboard stand-in for `exec` without `--paste`; previews never commit.
struct Detached;

#[async_trait]
impl ClipboardBackend for Detached {
    async fn read_selection(&self) -> EngineResult<String> {
        Err(EngineError::Clipboard("not attached to a clipboard".to_string()))
    }

    async fn write(&self, _text: &str) -> EngineResult<()> {
        Err(EngineError::Clipboard("not attached to a clipboard".to_string()))
    }
}

#[async_trait]
impl PasteTrigger for Detached {
    async fn paste(&self, _keybinding: &str) -> EngineResult<()> {
        Err(EngineError::Paste("not attached to a display".to_string()))
    }
}

/// Run one command over `text` (or the current selection) and print its answers.
///
/// With `paste`, the first answer goes through the clipboard bridge exactly as
/// on activation. Without it the dispatcher only previews the result.
pub async fn exec(
    cfg: &Config,
    id: &str,
    text: Option<String>,
    query: Option<String>,
    paste: bool,
) -> i32 {
    let (backend, trigger): (Arc<dyn ClipboardBackend>, Arc<dyn PasteTrigger>) = if paste {
        match ArboardClipboard::new() {
            Ok(b) => (Arc::new(b), Arc::new(XdotoolPaste::new())),
            Err(e) => {
                eprintln!("{e}");
                return 1;
            }
        }
    } else {
        (Arc::new(Detached), Arc::new(Detached))
    };
    let (tx, _rx) = ui_channel();
    let dispatcher = match Dispatcher::from_config(cfg, backend, trigger, tx) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("{e}");
            return 1;
        }
    };
    let selection = match text {
        Some(t) => t,
        None if paste => dispatcher.activate().await,
        None => current_selection().await,
    };
    let req = request(id, selection, query);
    let state = if paste {
        dispatcher.submit(req).wait().await
    } else {
        dispatcher.preview(req).await
    };
    if let Some(hold) = clipboard_hold(paste, &state) {
        debug!(?hold, "clipboard_hold");
        sleep(hold).await;
    }
    match state {
        TaskState::Completed { answers } => print_answers(&answers),
        TaskState::Failed { kind, message } => print_failure(kind, &message),
        other => {
            eprintln!("Task ended as {other:?}");
            1
        }
    }
}

/// Time to keep the clipboard owner alive once `state` is reached.
fn clipboard_hold(paste: bool, state: &TaskState) -> Option<Duration> {
    (paste && matches!(state, TaskState::Completed { .. })).then_some(CLIPBOARD_HOLD)
}

/// Listen for the activation chord until interrupted.
pub async fn run(cfg: &Config, device: Option<&Path>, command: Option<String>) -> i32 {
    let Some(device) = device
        .map(Path::to_path_buf)
        .or_else(|| cfg.hotkey.device.clone())
        .or_else(find_keyboard)
    else {
        eprintln!("No keyboard device found; pass --device /dev/input/eventN");
        return 1;
    };
    let spec = match ChordSpec::new(&cfg.hotkey.modifiers, &cfg.hotkey.trigger) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{e}");
            return 1;
        }
    };
    let backend = match ArboardClipboard::new() {
        Ok(b) => Arc::new(b),
        Err(e) => {
            eprintln!("{e}");
            return 1;
        }
    };
    let (tx, rx) = ui_channel();
    let dispatcher =
        match Dispatcher::from_config(cfg, backend, Arc::new(XdotoolPaste::new()), tx) {
            Ok(d) => d,
            Err(e) => {
                eprintln!("{e}");
                return 1;
            }
        };
    if let Some(id) = &command
        && let Err(e) = dispatcher.registry().resolve(id)
    {
        eprintln!("{e}");
        return 1;
    }

    let mut listener = match spawn_listener(device, spec, cfg) {
        Ok(l) => l,
        Err(code) => return code,
    };
    Controller::new(dispatcher, rx, command)
        .run(listener.activations())
        .await;
    listener.shutdown();
    info!("pastel_stopped");
    0
}

/// Start the hotkey thread, reporting open failures on stderr.
fn spawn_listener(device: PathBuf, spec: ChordSpec, cfg: &Config) -> Result<HotkeyListener, i32> {
    let shown = device.display().to_string();
    match HotkeyListener::spawn_device(device, spec, cfg.hotkey.poll_interval()) {
        Ok(l) => {
            info!(device = %shown, modifiers = ?cfg.hotkey.modifiers, trigger = %cfg.hotkey.trigger, "hotkey_listening");
            Ok(l)
        }
        Err(e) => {
            eprintln!("{e}");
            Err(1)
        }
    }
}

/// Build a request, attaching `query` when given.
fn request(id: &str, selection: String, query: Option<String>) -> TaskRequest {
    let req = TaskRequest::new(id, selection);
    match query {
        Some(q) => req.with_query(q),
        None => req,
    }
}

/// Read the primary selection, or an empty string when it is unavailable.
async fn current_selection() -> String {
    let read = match ArboardClipboard::new() {
        Ok(cb) => cb.read_selection().await,
        Err(e) => Err(e),
    };
    read.unwrap_or_else(|e| {
        warn!(error = %e, "selection_unavailable");
        String::new()
    })
}

/// Print answers one per line.
fn print_answers(answers: &[String]) -> i32 {
    for a in answers {
        println!("{a}");
    }
    0
}

/// Print a failure on stderr.
fn print_failure(kind: FailureKind, message: &str) -> i32 {
    eprintln!("{kind}: {message}");
    1
}
