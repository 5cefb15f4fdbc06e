//! Parse and load user configuration.

use std::{fs, path::Path};

use ron::{Options, extensions::Extensions};
use tracing::debug;

use crate::{Config, Error, RawConfig, error::excerpt_at, raw::validate};

/// Load a fully resolved `Config` from a RON file at `path`.
pub fn load_from_path(path: &Path) -> Result<Config, Error> {
    let source = fs::read_to_string(path).map_err(|e| Error::Read {
        path: Some(path.to_path_buf()),
        message: e.to_string(),
    })?;
    let cfg = load_from_str(&source).map_err(|e| e.with_path(path))?;
    debug!(path = %path.display(), commands = cfg.commands.len(), "config_loaded");
    Ok(cfg)
}

/// Parse RON `source`, lay it over the defaults and validate the result.
///
/// Optional keys take plain values (`paste_delay: 0.5`), no `Some(..)` wrapper.
pub fn load_from_str(source: &str) -> Result<Config, Error> {
    let options = Options::default().with_default_extension(Extensions::IMPLICIT_SOME);
    let raw: RawConfig = options.from_str(source).map_err(|e| {
        let line = e.span.start.line;
        let col = e.span.start.col;
        Error::Parse {
            path: None,
            line,
            col,
            message: e.code.to_string(),
            excerpt: excerpt_at(source, line, col),
        }
    })?;
    let cfg = raw.into_config();
    validate(&cfg)?;
    Ok(cfg)
}
