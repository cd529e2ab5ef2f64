//! Site configuration.
//!
//! The configuration lives in `kiln.lua` at the project root and returns a
//! table:
//!
//! ```lua
//! return {
//!   site_name = "Example",
//!   site_url = "https://example.com",
//!   temp_dir = ".kiln",
//!   plugins = {
//!     { use = "./plugins/posts.lua", options = { dir = "content" } },
//!   },
//! }
//! ```
//!
//! Every field is optional. A project without `kiln.lua` gets the defaults.

use std::path::{Path, PathBuf};

use mlua::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::consts::{CONFIG_FILENAME, DEFAULT_TEMP_DIR};
use crate::lua::runtime;

/// Errors that can occur while loading `kiln.lua`.
#[derive(Debug, Error)]
pub enum ConfigError {
  /// Evaluating the config file failed.
  #[error("failed to evaluate {path}: {source}")]
  Lua {
    path: PathBuf,
    #[source]
    source: LuaError,
  },

  /// The config evaluated, but not to a usable shape.
  #[error("invalid config {path}: {message}")]
  Invalid { path: PathBuf, message: String },
}

/// A configured plugin: a Lua file plus its options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginEntry {
  /// Path to the plugin file, relative to the project directory.
  #[serde(rename = "use")]
  pub path: String,

  /// Identity used to attribute hook failures. Defaults to the file stem.
  #[serde(default)]
  pub id: Option<String>,

  /// Options passed verbatim to the plugin's entry function.
  #[serde(default)]
  pub options: serde_json::Value,
}

impl PluginEntry {
  pub fn new(path: impl Into<String>) -> Self {
    Self {
      path: path.into(),
      id: None,
      options: serde_json::Value::Null,
    }
  }

  /// The explicit id, or the file stem of `path`.
  pub fn display_id(&self) -> String {
    if let Some(id) = &self.id {
      return id.clone();
    }
    Path::new(&self.path)
      .file_stem()
      .map(|s| s.to_string_lossy().to_string())
      .unwrap_or_else(|| self.path.clone())
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
  pub site_name: String,
  pub site_url: Option<String>,
  /// Where generated artifacts are written, relative to the project.
  pub temp_dir: PathBuf,
  /// Dev server bind address.
  pub host: String,
  pub port: u16,
  pub plugins: Vec<PluginEntry>,
}

impl Default for SiteConfig {
  fn default() -> Self {
    Self {
      site_name: "kiln".to_string(),
      site_url: None,
      temp_dir: PathBuf::from(DEFAULT_TEMP_DIR),
      host: "127.0.0.1".to_string(),
      port: 8080,
      plugins: Vec::new(),
    }
  }
}

/// Load `kiln.lua` from the project directory.
///
/// Returns [`SiteConfig::default`] when the file does not exist.
pub fn load_config(context: &Path) -> Result<SiteConfig, ConfigError> {
  let path = context.join(CONFIG_FILENAME);
  if !path.exists() {
    debug!(path = %path.display(), "no config file, using defaults");
    return Ok(SiteConfig::default());
  }
  load_config_file(context, &path)
}

/// Load a config file at an explicit path.
pub fn load_config_file(context: &Path, path: &Path) -> Result<SiteConfig, ConfigError> {
  let lua_err = |source| ConfigError::Lua {
    path: path.to_path_buf(),
    source,
  };

  let lua = runtime::create_runtime(context).map_err(lua_err)?;
  let value = runtime::load_file(&lua, path).map_err(lua_err)?;

  match value {
    LuaValue::Table(_) => lua.from_value::<SiteConfig>(value).map_err(|e| ConfigError::Invalid {
      path: path.to_path_buf(),
      message: e.to_string(),
    }),
    LuaValue::Nil => Ok(SiteConfig::default()),
    other => Err(ConfigError::Invalid {
      path: path.to_path_buf(),
      message: format!("config must return a table, got {}", other.type_name()),
    }),
  }
}
