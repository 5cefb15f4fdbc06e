//! Error types and result alias for the evdev-hotkey crate.
use std::{io, path::PathBuf, result::Result as StdResult};

use thiserror::Error;

/// Convenient result type used throughout this crate.
pub type Result<T> = StdResult<T, Error>;

/// Error variants produced by this crate.
#[derive(Error, Debug)]
pub enum Error {
    /// The input device could not be opened or configured.
    #[error("Cannot open input device {path}: {source}")]
    DeviceOpen {
        /// Device node that failed.
        path: PathBuf,
        /// Underlying OS error.
        source: io::Error,
    },
    /// Reading from an already open device failed.
    #[error("Input device read failed: {0}")]
    Read(#[from] io::Error),
    /// The chord definition is unusable.
    #[error("Invalid chord: {0}")]
    InvalidChord(String),
    /// The listener thread exited before reporting readiness.
    #[error("Listener thread failed to start")]
    ThreadStart,
}
