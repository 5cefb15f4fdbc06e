// Defaults and constants for pipeline configuration

use crate::AiEndpoint;

// Paste-back
pub(crate) const PASTE_KEYBINDING: &str = "shift+Insert";
pub(crate) const PASTE_DELAY_SECS: f64 = 0.3;

// Hotkey listener
pub(crate) const HOTKEY_MODIFIERS: [&str; 2] = ["KEY_LEFTMETA", "KEY_RIGHTMETA"];
pub(crate) const HOTKEY_TRIGGER: &str = "KEY_SPACE";
pub(crate) const HOTKEY_POLL_INTERVAL_SECS: f64 = 0.05;

// Registry / dispatcher
pub(crate) const MAX_USER_COMMANDS: usize = 100;
pub(crate) const TASK_TIMEOUT_SECS: f64 = 60.0;

// AI endpoint
pub(crate) const AI_BASE_URL: &str = "http://localhost:11434";
pub(crate) const AI_MODEL: &str = "gemma3:4b";
pub(crate) const AI_ENDPOINT: AiEndpoint = AiEndpoint::Ollama;

pub(crate) fn default_hotkey_modifiers() -> Vec<String> {
    HOTKEY_MODIFIERS.iter().map(|s| s.to_string()).collect()
}
