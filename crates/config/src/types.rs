use std::{collections::BTreeMap, path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

use crate::defaults;

/// Wire style used to reach the AI endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiEndpoint {
    /// POST the `{task, selected_text}` contract directly to the base URL.
    Direct,
    /// Wrap the contract in an Ollama `/api/chat` request.
    Ollama,
}

/// AI provider settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ai {
    /// Base URL of the endpoint (no trailing path for `ollama`).
    pub base_url: String,
    /// Model name sent with `ollama` requests.
    pub model: String,
    /// Request style.
    pub endpoint: AiEndpoint,
    /// Extra `key: value` lines appended to the system prompt.
    pub user_context: BTreeMap<String, String>,
}

impl Default for Ai {
    fn default() -> Self {
        Self {
            base_url: defaults::AI_BASE_URL.to_string(),
            model: defaults::AI_MODEL.to_string(),
            endpoint: defaults::AI_ENDPOINT,
            user_context: BTreeMap::new(),
        }
    }
}

/// Hotkey listener settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hotkey {
    /// Input device to read (`/dev/input/eventN`); `None` disables the listener.
    pub device: Option<PathBuf>,
    /// Modifier key names that must all be held.
    pub modifiers: Vec<String>,
    /// Key that fires the chord.
    pub trigger: String,
    /// Poll interval in seconds.
    pub poll_interval: f64,
}

impl Default for Hotkey {
    fn default() -> Self {
        Self {
            device: None,
            modifiers: defaults::default_hotkey_modifiers(),
            trigger: defaults::HOTKEY_TRIGGER.to_string(),
            poll_interval: defaults::HOTKEY_POLL_INTERVAL_SECS,
        }
    }
}

impl Hotkey {
    /// Poll interval as a `Duration`.
    pub fn poll_interval(&self) -> Duration {
        seconds(self.poll_interval)
    }
}

/// A user-defined palette command.
///
/// Either `answer` (a fixed snippet pasted verbatim) or `query` (a saved
/// prompt sent to the AI provider) must be present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserCommand {
    /// Unique command id.
    pub id: String,
    /// Label shown in the palette.
    pub label: String,
    /// Saved prompt used as the AI task.
    #[serde(default)]
    pub query: Option<String>,
    /// Fixed answer returned without contacting any provider.
    #[serde(default)]
    pub answer: Option<String>,
}

/// Fully resolved configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Keybinding passed to `xdotool key` after writing the clipboard.
    pub paste_keybinding: String,
    /// Delay in seconds between the clipboard write and the paste keystroke.
    pub paste_delay: f64,
    /// Hotkey listener settings.
    pub hotkey: Hotkey,
    /// Upper bound on user-defined commands held by the registry.
    pub max_user_commands: usize,
    /// Per-task deadline in seconds.
    pub task_timeout: f64,
    /// AI provider settings.
    pub ai: Ai,
    /// User-defined commands, in palette insertion order.
    pub commands: Vec<UserCommand>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            paste_keybinding: defaults::PASTE_KEYBINDING.to_string(),
            paste_delay: defaults::PASTE_DELAY_SECS,
            hotkey: Hotkey::default(),
            max_user_commands: defaults::MAX_USER_COMMANDS,
            task_timeout: defaults::TASK_TIMEOUT_SECS,
            ai: Ai::default(),
            commands: Vec::new(),
        }
    }
}

impl Config {
    /// Paste delay as a `Duration`.
    pub fn paste_delay(&self) -> Duration {
        seconds(self.paste_delay)
    }

    /// Task deadline as a `Duration`.
    pub fn task_timeout(&self) -> Duration {
        seconds(self.task_timeout)
    }
}

/// Convert seconds to a `Duration`, saturating instead of panicking on values
/// `validate` would reject.
fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(if value > 0.0 {
        Duration::MAX
    } else {
        Duration::ZERO
    })
}
