use std::{
    collections::{BTreeMap, HashSet},
    path::PathBuf,
    time::Duration,
};

use serde::{Deserialize, Serialize};

use super::{AiEndpoint, Config, Error, UserCommand};

/// Raw user configuration with all optional fields for merging.
///
/// Every key is optional; omitted keys keep the value of the base config
/// they are laid over (normally [`Config::default`]).
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RawConfig {
    #[serde(default)]
    pub paste_keybinding: Option<String>,
    #[serde(default)]
    pub paste_delay: Option<f64>,
    #[serde(default)]
    pub hotkey_device: Option<PathBuf>,
    #[serde(default)]
    pub hotkey_modifiers: Option<Vec<String>>,
    #[serde(default)]
    pub hotkey_trigger: Option<String>,
    #[serde(default)]
    pub hotkey_poll_interval: Option<f64>,
    #[serde(default)]
    pub max_user_commands: Option<usize>,
    #[serde(default)]
    pub task_timeout: Option<f64>,
    #[serde(default)]
    pub ai_base_url: Option<String>,
    #[serde(default)]
    pub ai_model: Option<String>,
    #[serde(default)]
    pub ai_endpoint: Option<AiEndpoint>,
    #[serde(default)]
    pub ai_user_context: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub commands: Option<Vec<UserCommand>>,
}

impl RawConfig {
    /// Apply overrides over a base config.
    pub fn apply_over(self, base: &Config) -> Config {
        let mut out = base.clone();
        macro_rules! set {
            ($src:ident => $($dst:ident).+) => {
                if let Some(v) = self.$src {
                    out.$($dst).+ = v;
                }
            };
        }
        set!(paste_keybinding => paste_keybinding);
        set!(paste_delay => paste_delay);
        set!(hotkey_modifiers => hotkey.modifiers);
        set!(hotkey_trigger => hotkey.trigger);
        set!(hotkey_poll_interval => hotkey.poll_interval);
        set!(max_user_commands => max_user_commands);
        set!(task_timeout => task_timeout);
        set!(ai_base_url => ai.base_url);
        set!(ai_model => ai.model);
        set!(ai_endpoint => ai.endpoint);
        set!(ai_user_context => ai.user_context);
        set!(commands => commands);
        if let Some(dev) = self.hotkey_device {
            out.hotkey.device = Some(dev);
        }
        out
    }

    /// Convert to a final config with defaults applied.
    pub fn into_config(self) -> Config {
        self.apply_over(&Config::default())
    }
}

/// Check value ranges and cross-field consistency of a resolved config.
pub(crate) fn validate(cfg: &Config) -> Result<(), Error> {
    fn bad(key: &'static str, message: impl Into<String>) -> Error {
        Error::Validation {
            path: None,
            key,
            message: message.into(),
        }
    }

    // Rejects NaN, negatives and values too large for a `Duration`.
    let seconds = |v: f64| Duration::try_from_secs_f64(v).is_ok();

    if !seconds(cfg.paste_delay) {
        return Err(bad("paste_delay", "must be a non-negative number of seconds"));
    }
    if cfg.paste_keybinding.trim().is_empty() {
        return Err(bad("paste_keybinding", "must not be empty"));
    }
    if !seconds(cfg.hotkey.poll_interval) || cfg.hotkey.poll_interval <= 0.0 {
        return Err(bad(
            "hotkey_poll_interval",
            "must be a positive number of seconds",
        ));
    }
    if cfg.hotkey.trigger.trim().is_empty() {
        return Err(bad("hotkey_trigger", "must not be empty"));
    }
    if cfg.hotkey.modifiers.is_empty() {
        return Err(bad("hotkey_modifiers", "at least one modifier is required"));
    }
    if !seconds(cfg.task_timeout) || cfg.task_timeout <= 0.0 {
        return Err(bad("task_timeout", "must be a positive number of seconds"));
    }
    if cfg.ai.base_url.trim().is_empty() {
        return Err(bad("ai_base_url", "must not be empty"));
    }

    let mut seen = HashSet::new();
    for cmd in &cfg.commands {
        if cmd.id.trim().is_empty() {
            return Err(bad("commands", "command ids must not be empty"));
        }
        if !seen.insert(cmd.id.as_str()) {
            return Err(bad("commands", format!("duplicate command id '{}'", cmd.id)));
        }
        if cmd.query.is_none() && cmd.answer.is_none() {
            return Err(bad(
                "commands",
                format!("command '{}' needs a query or an answer", cmd.id),
            ));
        }
    }
    Ok(())
}
