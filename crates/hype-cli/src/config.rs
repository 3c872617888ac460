//! Settings resolution: command-line flags over the TOML file over defaults.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

pub const DEFAULT_STORE_PATH: &str = "~/.local/share/hype/hype.db";
pub const DEFAULT_USER: &str = "local";

/// Shape of the optional TOML config file.
#[derive(Deserialize, Default, Debug, PartialEq)]
pub struct ConfigFile {
  #[serde(default)]
  pub store_path: String,
  #[serde(default)]
  pub user:       String,
  #[serde(default)]
  pub api_token:  String,
}

impl ConfigFile {
  pub fn load(path: &Path) -> Result<Self> {
    let raw = std::fs::read_to_string(path)
      .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&raw).context("parsing config file")
  }
}

/// Values supplied on the command line or through the environment.
#[derive(Debug, Default)]
pub struct Overrides {
  pub store_path: Option<PathBuf>,
  pub user:       Option<String>,
  pub api_token:  Option<String>,
}

/// Fully resolved settings.
#[derive(Debug, PartialEq)]
pub struct Settings {
  pub store_path: PathBuf,
  pub user:       String,
  pub api_token:  Option<String>,
}

impl Settings {
  pub fn resolve(overrides: Overrides, file: ConfigFile) -> Self {
    let non_empty = |s: String| (!s.is_empty()).then_some(s);

    let store_path = overrides
      .store_path
      .or_else(|| non_empty(file.store_path).map(PathBuf::from))
      .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_PATH));

    Self {
      store_path: expand_tilde(&store_path),
      user:       overrides
        .user
        .and_then(non_empty)
        .or_else(|| non_empty(file.user))
        .unwrap_or_else(|| DEFAULT_USER.to_string()),
      api_token:  overrides
        .api_token
        .and_then(non_empty)
        .or_else(|| non_empty(file.api_token)),
    }
  }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn flags_beat_file_beat_defaults() {
    let file = ConfigFile {
      store_path: "/data/file.db".into(),
      user:       "from-file".into(),
      api_token:  "file-token".into(),
    };
    let overrides = Overrides {
      user: Some("from-flag".into()),
      ..Overrides::default()
    };

    let settings = Settings::resolve(overrides, file);
    assert_eq!(settings.store_path, PathBuf::from("/data/file.db"));
    assert_eq!(settings.user, "from-flag");
    assert_eq!(settings.api_token.as_deref(), Some("file-token"));
  }

  #[test]
  fn empty_values_fall_through() {
    let overrides = Overrides {
      api_token: Some(String::new()),
      ..Overrides::default()
    };
    let settings = Settings::resolve(overrides, ConfigFile::default());
    assert_eq!(settings.user, DEFAULT_USER);
    assert_eq!(settings.api_token, None);
  }

  #[test]
  fn file_parses_partial_toml() {
    let file: ConfigFile = toml::from_str("user = \"alice\"\n").unwrap();
    assert_eq!(file.user, "alice");
    assert!(file.store_path.is_empty());
  }

  #[test]
  fn absolute_paths_are_untouched() {
    assert_eq!(expand_tilde(Path::new("/tmp/x.db")), PathBuf::from("/tmp/x.db"));
  }
}
