//! Pastel Engine
//!
//! The task pipeline behind the pastel palette:
//! - a registry of built-in and user commands, ordered most recently used first
//! - math, text and AI providers behind one closed dispatch
//! - a dispatcher that runs one task at a time and cancels superseded work
//! - a clipboard bridge that pastes the winning answer back into the focused window
//!
//! Progress and outcomes are reported to the UI layer as
//! [`pastel_protocol::MsgToUI`] messages; nothing here touches UI state.
pub mod clipboard;
pub mod command;
mod dispatcher;
mod error;
mod notification;
pub mod providers;
mod registry;
pub mod task;
pub mod test_support;

pub use clipboard::{ArboardClipboard, ClipboardBackend, ClipboardBridge, PasteTrigger, XdotoolPaste};
pub use command::{Command, MathSource, Parameters, ProviderKind, TextTransform, builtin_commands};
pub use dispatcher::Dispatcher;
pub use error::{Error, Result};
pub use notification::NotificationDispatcher;
pub use providers::{AiProvider, MathProvider, ProviderSet};
pub use registry::Registry;
pub use task::{ExecutionHandle, TaskRequest, TaskResult, TaskState};
