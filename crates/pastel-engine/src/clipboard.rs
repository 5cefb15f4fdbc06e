//! Selection capture and paste-back.
//!
//! The bridge reads the X11 primary selection when the palette opens and,
//! when a task completes, writes the answer to the clipboard and asks
//! `xdotool` to press the paste keybinding in the focused window.
use std::{path::PathBuf, result::Result as StdResult, sync::Arc, time::Duration};

use arboard::Clipboard;
use async_trait::async_trait;
use config::Config;
use parking_lot::Mutex;
use tokio::{process::Command, sync::Mutex as AsyncMutex, task, time::sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{Error, Result};

/// Access to the selection and the clipboard.
#[async_trait]
pub trait ClipboardBackend: Send + Sync {
    /// Current primary selection.
    async fn read_selection(&self) -> Result<String>;
    /// Replace the clipboard contents.
    async fn write(&self, text: &str) -> Result<()>;
}

/// Injects the paste keystroke into the focused window.
#[async_trait]
pub trait PasteTrigger: Send + Sync {
    /// Press `keybinding` (xdotool syntax, e.g. `shift+Insert`).
    async fn paste(&self, keybinding: &str) -> Result<()>;
}

/// System clipboard via `arboard`.
///
/// X11 clipboard contents are served by the owning process, so one
/// `Clipboard` is kept alive for the lifetime of the backend.
pub struct ArboardClipboard {
    /// Shared handle used from blocking tasks.
    inner: Arc<Mutex<Clipboard>>,
}

impl ArboardClipboard {
    /// Connect to the system clipboard.
    pub fn new() -> Result<Self> {
        let cb = Clipboard::new().map_err(|e| Error::Clipboard(e.to_string()))?;
        Ok(Self {
            inner: Arc::new(Mutex::new(cb)),
        })
    }

    /// Run `f` with the clipboard on the blocking pool.
    async fn with<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Clipboard) -> StdResult<T, arboard::Error> + Send + 'static,
    {
        let inner = self.inner.clone();
        task::spawn_blocking(move || f(&mut inner.lock()))
            .await
            .map_err(|e| Error::Clipboard(e.to_string()))?
            .map_err(|e| Error::Clipboard(e.to_string()))
    }
}

#[async_trait]
impl ClipboardBackend for ArboardClipboard {
    async fn read_selection(&self) -> Result<String> {
        self.with(read_primary).await
    }

    async fn write(&self, text: &str) -> Result<()> {
        let text = text.to_string();
        self.with(move |cb| cb.set_text(text)).await
    }
}

/// Read the primary selection, falling back to the clipboard off Linux.
#[cfg(target_os = "linux")]
fn read_primary(cb: &mut Clipboard) -> StdResult<String, arboard::Error> {
    use arboard::{GetExtLinux, LinuxClipboardKind};
    cb.get().clipboard(LinuxClipboardKind::Primary).text()
}

/// Read the primary selection, falling back to the clipboard off Linux.
#[cfg(not(target_os = "linux"))]
fn read_primary(cb: &mut Clipboard) -> StdResult<String, arboard::Error> {
    cb.get_text()
}

/// Paste by running `xdotool key <keybinding>`.
pub struct XdotoolPaste {
    /// Resolved `xdotool` binary, if installed.
    program: Option<PathBuf>,
}

impl Default for XdotoolPaste {
    fn default() -> Self {
        Self::new()
    }
}

impl XdotoolPaste {
    /// Locate `xdotool` on `PATH`. A missing binary fails at paste time.
    pub fn new() -> Self {
        let program = which::which("xdotool").ok();
        if program.is_none() {
            warn!("xdotool_not_found");
        }
        Self { program }
    }
}

#[async_trait]
impl PasteTrigger for XdotoolPaste {
    async fn paste(&self, keybinding: &str) -> Result<()> {
        let program = self
            .program
            .as_ref()
            .ok_or_else(|| Error::Paste("xdotool is not installed".to_string()))?;
        let status = Command::new(program)
            .arg("key")
            .arg(keybinding)
            .status()
            .await
            .map_err(|e| Error::Paste(format!("cannot run xdotool: {e}")))?;
        if status.success() {
            Ok(())
        } else {
            Err(Error::Paste(format!("xdotool exited with {status}")))
        }
    }
}

/// Serialised capture/commit front end over a backend and a paste trigger.
pub struct ClipboardBridge {
    /// Clipboard access.
    backend: Arc<dyn ClipboardBackend>,
    /// Keystroke injection.
    paste: Arc<dyn PasteTrigger>,
    /// Keybinding handed to the paste trigger.
    keybinding: String,
    /// Pause between the clipboard write and the keystroke.
    delay: Duration,
    /// Held for the whole write-wait-paste sequence.
    commit_lock: AsyncMutex<()>,
}

impl ClipboardBridge {
    /// Create a bridge.
    pub fn new(
        backend: Arc<dyn ClipboardBackend>,
        paste: Arc<dyn PasteTrigger>,
        keybinding: impl Into<String>,
        delay: Duration,
    ) -> Self {
        Self {
            backend,
            paste,
            keybinding: keybinding.into(),
            delay,
            commit_lock: AsyncMutex::new(()),
        }
    }

    /// Create a bridge using the paste settings from `cfg`.
    pub fn from_config(
        cfg: &Config,
        backend: Arc<dyn ClipboardBackend>,
        paste: Arc<dyn PasteTrigger>,
    ) -> Self {
        Self::new(backend, paste, cfg.paste_keybinding.clone(), cfg.paste_delay())
    }

    /// Current selection verbatim, or an empty string when unavailable.
    pub async fn capture(&self) -> String {
        match self.backend.read_selection().await {
            Ok(text) => {
                debug!(len = text.len(), "selection_captured");
                text
            }
            Err(e) => {
                warn!(error = %e, "selection_unavailable");
                String::new()
            }
        }
    }

    /// Write `text`, wait the paste delay, then send the paste keystroke.
    ///
    /// A failed keystroke leaves `text` on the clipboard. Once `cancel` fires
    /// nothing further happens: a commit cancelled before the write leaves the
    /// clipboard alone, and one cancelled after it skips the keystroke. Both
    /// return [`Error::Cancelled`].
    pub async fn commit(&self, text: &str, cancel: &CancellationToken) -> Result<()> {
        let _guard = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(cancelled("lock")),
            guard = self.commit_lock.lock() => guard,
        };
        if cancel.is_cancelled() {
            return Err(cancelled("lock"));
        }
        self.backend.write(text).await?;
        debug!(len = text.len(), "clipboard_written");
        tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(cancelled("delay")),
            () = sleep(self.delay) => {}
        }
        let pasted = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(cancelled("paste")),
            pasted = self.paste.paste(&self.keybinding) => pasted,
        };
        match pasted {
            Ok(()) => {
                info!(keybinding = %self.keybinding, "paste_sent");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, keybinding = %self.keybinding, "paste_failed");
                Err(e)
            }
        }
    }
}

/// Log where a commit was abandoned and build the error.
fn cancelled(stage: &'static str) -> Error {
    debug!(stage, "commit_cancelled");
    Error::Cancelled
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MemoryClipboard, RecordingPaste};

    fn bridge(clip: &Arc<MemoryClipboard>, paste: &Arc<RecordingPaste>) -> ClipboardBridge {
        ClipboardBridge::new(
            clip.clone(),
            paste.clone(),
            "shift+Insert",
            Duration::from_millis(300),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn commit_then_capture_round_trips() {
        let clip = Arc::new(MemoryClipboard::default());
        let paste = Arc::new(RecordingPaste::default());
        let b = bridge(&clip, &paste);
        b.commit("x", &CancellationToken::new()).await.unwrap();
        assert_eq!(b.capture().await, "x");
    }

    #[tokio::test(start_paused = true)]
    async fn paste_follows_write_after_delay() {
        let clip = Arc::new(MemoryClipboard::default());
        let paste = Arc::new(RecordingPaste::default());
        let b = bridge(&clip, &paste);
        b.commit("HELLO", &CancellationToken::new()).await.unwrap();
        let written = clip.last_write_at().unwrap();
        let pastes = paste.calls();
        assert_eq!(pastes.len(), 1);
        assert_eq!(pastes[0].0, "shift+Insert");
        assert!(pastes[0].1.duration_since(written) >= Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_paste_keeps_clipboard() {
        let clip = Arc::new(MemoryClipboard::default());
        let paste = Arc::new(RecordingPaste::failing());
        let b = bridge(&clip, &paste);
        let err = b.commit("kept", &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, Error::Paste(_)));
        assert_eq!(clip.contents(), "kept");
    }

    #[tokio::test]
    async fn unavailable_selection_is_empty() {
        let clip = Arc::new(MemoryClipboard::unavailable());
        let paste = Arc::new(RecordingPaste::default());
        assert_eq!(bridge(&clip, &paste).capture().await, "");
    }

    #[tokio::test(start_paused = true)]
    async fn commits_are_serialised() {
        let clip = Arc::new(MemoryClipboard::default());
        let paste = Arc::new(RecordingPaste::observing(clip.clone()));
        let b = bridge(&clip, &paste);
        let token = CancellationToken::new();
        let (r1, r2) = tokio::join!(b.commit("one", &token), b.commit("two", &token));
        r1.unwrap();
        r2.unwrap();
        // Each paste observed the value its own commit wrote.
        assert_eq!(paste.seen(), vec!["one".to_string(), "two".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_during_delay_skips_the_paste() {
        let clip = Arc::new(MemoryClipboard::default());
        let paste = Arc::new(RecordingPaste::default());
        let b = bridge(&clip, &paste);
        let token = CancellationToken::new();
        let (res, ()) = tokio::join!(b.commit("stale", &token), async {
            sleep(Duration::from_millis(100)).await;
            token.cancel();
        });
        assert!(matches!(res, Err(Error::Cancelled)));
        assert_eq!(clip.writes(), vec!["stale".to_string()]);
        assert!(paste.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_commit_never_writes() {
        let clip = Arc::new(MemoryClipboard::default());
        let paste = Arc::new(RecordingPaste::default());
        let b = bridge(&clip, &paste);
        let token = CancellationToken::new();
        token.cancel();
        assert!(matches!(
            b.commit("stale", &token).await,
            Err(Error::Cancelled)
        ));
        assert!(clip.writes().is_empty());
        assert!(paste.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_waiter_does_not_follow_the_lock_holder() {
        let clip = Arc::new(MemoryClipboard::default());
        let paste = Arc::new(RecordingPaste::observing(clip.clone()));
        let b = bridge(&clip, &paste);
        let (keep, stale) = (CancellationToken::new(), CancellationToken::new());
        let (r1, r2, ()) = tokio::join!(
            b.commit("kept", &keep),
            b.commit("stale", &stale),
            async {
                sleep(Duration::from_millis(100)).await;
                stale.cancel();
            }
        );
        r1.unwrap();
        assert!(matches!(r2, Err(Error::Cancelled)));
        assert_eq!(clip.writes(), vec!["kept".to_string()]);
        assert_eq!(paste.seen(), vec!["kept".to_string()]);
    }
}
