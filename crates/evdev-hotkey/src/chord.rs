use std::collections::BTreeSet;

use crate::{Error, Result};

/// Physical key transition as reported by the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    /// Key pressed (`value == 1`).
    Down,
    /// Key released (`value == 0`).
    Up,
    /// Kernel auto-repeat while held (`value == 2`).
    Repeat,
}

impl KeyAction {
    /// Map an evdev key event value to an action.
    pub fn from_value(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::Up),
            1 => Some(Self::Down),
            2 => Some(Self::Repeat),
            _ => None,
        }
    }
}

/// Normalize a user-supplied key name to evdev's `KEY_*` spelling.
///
/// `space` and `KEY_SPACE` name the same key; `BTN_*` names pass through.
pub fn normalize_key_name(name: &str) -> String {
    let upper = name.trim().to_ascii_uppercase();
    if upper.starts_with("KEY_") || upper.starts_with("BTN_") {
        upper
    } else {
        format!("KEY_{upper}")
    }
}

/// A set of modifier keys plus one trigger key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChordSpec {
    /// Keys that must all be held.
    modifiers: BTreeSet<String>,
    /// Key whose press completes the chord.
    trigger: String,
}

impl ChordSpec {
    /// Build a chord from modifier and trigger key names.
    pub fn new<I, S>(modifiers: I, trigger: &str) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let trigger = normalize_key_name(trigger);
        if trigger == "KEY_" {
            return Err(Error::InvalidChord("trigger key is empty".into()));
        }
        let modifiers: BTreeSet<String> = modifiers
            .into_iter()
            .map(|m| normalize_key_name(m.as_ref()))
            .collect();
        if modifiers.is_empty() {
            return Err(Error::InvalidChord("at least one modifier is required".into()));
        }
        if modifiers.contains("KEY_") {
            return Err(Error::InvalidChord("modifier key name is empty".into()));
        }
        if modifiers.contains(&trigger) {
            return Err(Error::InvalidChord(format!(
                "{trigger} cannot be both modifier and trigger"
            )));
        }
        Ok(Self { modifiers, trigger })
    }

    /// Modifier key names, normalized.
    pub fn modifiers(&self) -> impl Iterator<Item = &str> {
        self.modifiers.iter().map(String::as_str)
    }

    /// Trigger key name, normalized.
    pub fn trigger(&self) -> &str {
        &self.trigger
    }
}

/// Observable chord state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChordState {
    /// Chord modifiers currently held down.
    pub modifiers_held: BTreeSet<String>,
    /// Whether the trigger key is currently held down.
    pub trigger_armed: bool,
}

/// Pure chord detector with debounce.
///
/// An activation fires on the key-down that first completes the chord. It will
/// not fire again until the trigger is released and the chord is re-entered.
#[derive(Debug)]
pub struct ChordTracker {
    /// Chord being detected.
    spec: ChordSpec,
    /// Keys currently held.
    state: ChordState,
    /// Latched after an activation; cleared on trigger release.
    fired: bool,
}

impl ChordTracker {
    /// Create a tracker with nothing held.
    pub fn new(spec: ChordSpec) -> Self {
        Self {
            spec,
            state: ChordState::default(),
            fired: false,
        }
    }

    /// Current held-key state.
    pub fn state(&self) -> &ChordState {
        &self.state
    }

    /// The chord being tracked.
    pub fn spec(&self) -> &ChordSpec {
        &self.spec
    }

    /// Feed one key transition. Returns `true` when it produces an activation.
    pub fn on_key(&mut self, key: &str, action: KeyAction) -> bool {
        let is_trigger = key == self.spec.trigger;
        let is_modifier = self.spec.modifiers.contains(key);
        if !is_trigger && !is_modifier {
            return false;
        }
        match action {
            KeyAction::Repeat => false,
            KeyAction::Up => {
                if is_trigger {
                    self.state.trigger_armed = false;
                    self.fired = false;
                } else {
                    self.state.modifiers_held.remove(key);
                }
                false
            }
            KeyAction::Down => {
                if is_trigger {
                    self.state.trigger_armed = true;
                } else {
                    self.state.modifiers_held.insert(key.to_string());
                }
                self.check_fire()
            }
        }
    }

    /// Forget all held keys, e.g. after the device was re-opened.
    pub fn reset(&mut self) {
        self.state = ChordState::default();
        self.fired = false;
    }

    /// Fire if the chord is complete and not already latched.
    fn check_fire(&mut self) -> bool {
        let complete =
            self.state.trigger_armed && self.state.modifiers_held.len() == self.spec.modifiers.len();
        if complete && !self.fired {
            self.fired = true;
            true
        } else {
            false
        }
    }
}
