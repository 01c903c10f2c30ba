//! Load configuration for the archive orchestrator from XDG `config.toml` and a
//! project `.env`, then apply it to the process environment with priority:
//! **existing env > .env > XDG**.
//!
//! The orchestrator reads typed settings from the environment (see the
//! `archive` crate); this crate only decides which values end up there. Keys
//! are the ones documented on `Settings` (`KV_URL`, `FAST_ENGINE_URL`, ...),
//! but the loader is generic and applies whatever the files contain.

mod dotenv;
mod xdg_toml;

use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("xdg config path: {0}")]
    XdgPath(String),
    #[error("read xdg config: {0}")]
    XdgRead(std::io::Error),
    #[error("parse xdg toml: {0}")]
    XdgParse(#[from] toml::de::Error),
    #[error("read .env: {0}")]
    DotenvRead(std::io::Error),
}

/// Loads config from `$XDG_CONFIG_HOME/<app_name>/config.toml` and an optional
/// project `.env`, then sets environment variables only for keys that are
/// **not** already present, so the real environment always wins.
///
/// When a key is missing from the process environment the value is taken from:
/// 1. project `.env` (current directory, or `override_dir` when given)
/// 2. the `[env]` table of the XDG `config.toml`
///
/// * `app_name`: XDG application directory, e.g. `"archive"`.
/// * `override_dir`: look for `.env` here instead of `std::env::current_dir()`.
pub fn load_and_apply(app_name: &str, override_dir: Option<&Path>) -> Result<(), LoadError> {
    let xdg = xdg_toml::load_env_map(app_name)?;
    let dotenv = dotenv::load_env_map(override_dir).map_err(LoadError::DotenvRead)?;

    let mut keys: std::collections::HashSet<&String> = xdg.keys().collect();
    keys.extend(dotenv.keys());

    for key in keys {
        if std::env::var(key).is_ok() {
            continue; // existing env wins
        }
        if let Some(v) = dotenv.get(key).or_else(|| xdg.get(key)) {
            std::env::set_var(key, v);
        }
    }

    Ok(())
}
