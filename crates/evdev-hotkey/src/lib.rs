//! Global chord listener for Linux input devices.
//!
//! A [`HotkeyListener`] owns an OS thread that polls an evdev device, feeds
//! key transitions through a [`ChordTracker`] and publishes activations on a
//! `tokio::sync::watch` channel. The tracker is pure and can be driven
//! directly in tests; the thread reads from any [`KeySource`].
//!
//! Reading `/dev/input/event*` usually requires membership of the `input`
//! group.

mod chord;
mod error;
mod listener;

pub use chord::{ChordSpec, ChordState, ChordTracker, KeyAction, normalize_key_name};
pub use error::{Error, Result};
pub use listener::{EvdevSource, HotkeyListener, KeySource, find_keyboard};
