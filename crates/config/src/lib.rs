//! Shared configuration types (defaults, overlay parsing, loading) used by pastel.
#![allow(missing_docs)]

use std::{
    env,
    path::{Path, PathBuf},
};

mod defaults;
mod error;
mod loader;
mod raw;
mod types;

#[cfg(test)]
mod test_merge;
#[cfg(test)]
mod test_parse;

pub use error::{Error, excerpt_at};
pub use loader::{load_from_path, load_from_str};
pub use raw::RawConfig;
pub use types::{Ai, AiEndpoint, Config, Hotkey, UserCommand};

/// Determine the preferred user config path (`$XDG_CONFIG_HOME/pastel/config.ron`).
///
/// Falls back to `~/.config/pastel/config.ron` when `XDG_CONFIG_HOME` is unset.
pub fn default_config_path() -> PathBuf {
    let mut p = match env::var_os("XDG_CONFIG_HOME") {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => {
            let mut home = PathBuf::from(env::var_os("HOME").unwrap_or_default());
            home.push(".config");
            home
        }
    };
    p.push("pastel");
    p.push("config.ron");
    p
}

/// Resolve the effective config path using the default policy.
///
/// Policy:
/// 1) Use `explicit` when provided; it must exist.
/// 2) Else use the default path when it exists.
/// 3) Else return `None`: the built-in defaults apply.
pub fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>, Error> {
    if let Some(path) = explicit {
        if !path.exists() {
            return Err(Error::Read {
                path: Some(path.to_path_buf()),
                message: "Config file does not exist".to_string(),
            });
        }
        return Ok(Some(path.to_path_buf()));
    }

    let preferred = default_config_path();
    if preferred.exists() {
        return Ok(Some(preferred));
    }
    Ok(None)
}

/// Load the configuration selected by [`resolve_config_path`], or the defaults.
pub fn load(explicit: Option<&Path>) -> Result<Config, Error> {
    match resolve_config_path(explicit)? {
        Some(path) => load_from_path(&path),
        None => {
            tracing::debug!("no_config_file_using_defaults");
            Ok(Config::default())
        }
    }
}
