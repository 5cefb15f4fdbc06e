//! Test support utilities for pastel-engine unit and integration tests.
//! These helpers are public so the `tests/` directory can share them.
//! They are intended for use by the test suite only.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use parking_lot::Mutex;
use pastel_protocol::{MsgToUI, ipc::UiRx};
use tokio::time::Instant;

use crate::{
    Error, Result,
    clipboard::{ClipboardBackend, PasteTrigger},
};

/// In-memory stand-in for the system clipboard.
///
/// Selection and clipboard share one buffer, so a committed answer is what
/// the next capture returns.
#[derive(Default)]
pub struct MemoryClipboard {
    /// Current contents.
    text: Mutex<String>,
    /// Every write, with the time it happened.
    writes: Mutex<Vec<(String, Instant)>>,
    /// Reads fail when set.
    unavailable: bool,
    /// Writes fail when set.
    read_only: bool,
}

impl MemoryClipboard {
    /// A clipboard whose selection starts as `text`.
    pub fn with_selection(text: &str) -> Self {
        let clip = Self::default();
        clip.set_selection(text);
        clip
    }

    /// A clipboard whose reads always fail.
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    /// A clipboard whose writes always fail.
    pub fn failing_writes() -> Self {
        Self {
            read_only: true,
            ..Self::default()
        }
    }

    /// Replace the selection.
    pub fn set_selection(&self, text: &str) {
        *self.text.lock() = text.to_string();
    }

    /// Current contents.
    pub fn contents(&self) -> String {
        self.text.lock().clone()
    }

    /// Every successful write, oldest first.
    pub fn writes(&self) -> Vec<String> {
        self.writes.lock().iter().map(|(t, _)| t.clone()).collect()
    }

    /// Time of the most recent write.
    pub fn last_write_at(&self) -> Option<Instant> {
        self.writes.lock().last().map(|(_, at)| *at)
    }
}

#[async_trait]
impl ClipboardBackend for MemoryClipboard {
    async fn read_selection(&self) -> Result<String> {
        if self.unavailable {
            return Err(Error::Clipboard("no selection owner".to_string()));
        }
        Ok(self.contents())
    }

    async fn write(&self, text: &str) -> Result<()> {
        if self.read_only {
            return Err(Error::Clipboard("clipboard is read-only".to_string()));
        }
        *self.text.lock() = text.to_string();
        self.writes.lock().push((text.to_string(), Instant::now()));
        Ok(())
    }
}

/// Paste trigger that records each keystroke instead of sending it.
#[derive(Default)]
pub struct RecordingPaste {
    /// Keybinding and time of each paste.
    calls: Mutex<Vec<(String, Instant)>>,
    /// Clipboard contents at each paste, when observing.
    seen: Mutex<Vec<String>>,
    /// Clipboard sampled at paste time.
    observe: Option<Arc<MemoryClipboard>>,
    /// Pastes fail when set.
    fail: bool,
}

impl RecordingPaste {
    /// A trigger whose pastes always fail.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// A trigger that records what `clip` holds at each paste.
    pub fn observing(clip: Arc<MemoryClipboard>) -> Self {
        Self {
            observe: Some(clip),
            ..Self::default()
        }
    }

    /// Keybinding and time of every paste, oldest first.
    pub fn calls(&self) -> Vec<(String, Instant)> {
        self.calls.lock().clone()
    }

    /// Clipboard contents at every paste, oldest first.
    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().clone()
    }
}

#[async_trait]
impl PasteTrigger for RecordingPaste {
    async fn paste(&self, keybinding: &str) -> Result<()> {
        if self.fail {
            return Err(Error::Paste("no focused window".to_string()));
        }
        self.calls
            .lock()
            .push((keybinding.to_string(), Instant::now()));
        if let Some(clip) = &self.observe {
            self.seen.lock().push(clip.contents());
        }
        Ok(())
    }
}

/// Receive UI messages until `pred` matches or `timeout_ms` elapses.
pub async fn recv_until<F>(rx: &mut UiRx, timeout_ms: u64, mut pred: F) -> bool
where
    F: FnMut(&MsgToUI) -> bool,
{
    tokio::time::timeout(Duration::from_millis(timeout_ms), async {
        while let Some(msg) = rx.recv().await {
            if pred(&msg) {
                return true;
            }
        }
        false
    })
    .await
    .unwrap_or(false)
}

/// Receive the terminal lifecycle message for `task` within `timeout_ms`.
pub async fn recv_outcome(rx: &mut UiRx, task: u64, timeout_ms: u64) -> Option<MsgToUI> {
    tokio::time::timeout(Duration::from_millis(timeout_ms), async {
        while let Some(msg) = rx.recv().await {
            if msg.task_id() == Some(task)
                && !matches!(msg, MsgToUI::TaskStarted { .. })
            {
                return Some(msg);
            }
        }
        None
    })
    .await
    .ok()
    .flatten()
}
