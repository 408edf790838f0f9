//! Configuration management for `gitbug`.
//!
//! Configuration is loaded from YAML files with support for:
//! - Repository config (.git/git-bug/config.yaml)
//! - User config (~/.config/gitbug/config.yaml)
//! - Environment variable overrides
//!
//! Repository values win over user values; environment variables win over both.

use std::fs;
use std::path::{Path, PathBuf};

use gitbug_lib::bug::HUMAN_ID_LEN;
use gitbug_lib::error::{BugError, Result};
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE: &str = "config.yaml";

const ENV_REMOTE: &str = "GITBUG_REMOTE";
const ENV_MAX_LOADED_BUGS: &str = "GITBUG_MAX_LOADED_BUGS";

/// One configuration file. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigLayer {
    pub default_remote: Option<String>,
    pub max_loaded_bugs: Option<usize>,
    pub id_length: Option<usize>,
}

/// Effective configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Remote used by pull, push and fetch when none is given.
    pub default_remote: String,
    /// Bound on fully loaded bugs in the cache.
    pub max_loaded_bugs: Option<usize>,
    /// Id characters shown in listings.
    pub id_length: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_remote: "origin".to_string(),
            max_loaded_bugs: None,
            id_length: HUMAN_ID_LEN,
        }
    }
}

impl Config {
    fn apply(&mut self, layer: ConfigLayer) {
        if let Some(remote) = layer.default_remote {
            self.default_remote = remote;
        }
        if let Some(max) = layer.max_loaded_bugs {
            self.max_loaded_bugs = Some(max);
        }
        if let Some(len) = layer.id_length {
            self.id_length = len.max(1);
        }
    }
}

/// User-level config file, if a home directory is known.
#[must_use]
pub fn user_config_path() -> Option<PathBuf> {
    std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))
        .map(|dir| dir.join("gitbug").join(CONFIG_FILE))
}

/// Read one layer. A missing file is an empty layer.
///
/// # Errors
///
/// Returns `Config` if the file exists but cannot be read or parsed.
pub fn load_layer(path: &Path) -> Result<ConfigLayer> {
    if !path.exists() {
        return Ok(ConfigLayer::default());
    }
    let contents = fs::read_to_string(path)
        .map_err(|e| BugError::Config(format!("failed to read {}: {e}", path.display())))?;
    if contents.trim().is_empty() {
        return Ok(ConfigLayer::default());
    }
    serde_yaml::from_str(&contents)
        .map_err(|e| BugError::Config(format!("failed to parse {}: {e}", path.display())))
}

/// Load the effective configuration for the repository whose private
/// directory is `private_dir`.
///
/// # Errors
///
/// Returns `Config` if a config file or environment override is malformed.
pub fn load(private_dir: &Path) -> Result<Config> {
    let mut config = Config::default();
    if let Some(path) = user_config_path() {
        config.apply(load_layer(&path)?);
    }
    config.apply(load_layer(&private_dir.join(CONFIG_FILE))?);
    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    tracing::debug!(?config, "configuration loaded");
    Ok(config)
}

/// Apply `GITBUG_*` overrides read through `lookup`.
///
/// # Errors
///
/// Returns `Config` if `GITBUG_MAX_LOADED_BUGS` is not a number.
pub fn apply_env_overrides(
    config: &mut Config,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<()> {
    if let Some(remote) = lookup(ENV_REMOTE).filter(|r| !r.trim().is_empty()) {
        config.default_remote = remote;
    }
    if let Some(raw) = lookup(ENV_MAX_LOADED_BUGS) {
        let max = raw.trim().parse::<usize>().map_err(|e| {
            BugError::Config(format!("{ENV_MAX_LOADED_BUGS}={raw} is not a number: {e}"))
        })?;
        config.max_loaded_bugs = Some(max);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.default_remote, "origin");
        assert_eq!(config.max_loaded_bugs, None);
        assert_eq!(config.id_length, 7);
    }

    #[test]
    fn test_layers_override_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let user = dir.path().join("user.yaml");
        let repo = dir.path().join("repo.yaml");
        fs::write(&user, "default_remote: upstream\nid_length: 10\n").unwrap();
        fs::write(&repo, "default_remote: mirror\n").unwrap();

        let mut config = Config::default();
        config.apply(load_layer(&user).unwrap());
        config.apply(load_layer(&repo).unwrap());
        assert_eq!(config.default_remote, "mirror");
        assert_eq!(config.id_length, 10);
    }

    #[test]
    fn test_missing_and_empty_files() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            load_layer(&dir.path().join("absent.yaml")).unwrap(),
            ConfigLayer::default()
        );
        let empty = dir.path().join("empty.yaml");
        fs::write(&empty, "\n").unwrap();
        assert_eq!(load_layer(&empty).unwrap(), ConfigLayer::default());
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.yaml");
        fs::write(&path, "colour: red\n").unwrap();
        assert!(matches!(load_layer(&path), Err(BugError::Config(_))));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        apply_env_overrides(&mut config, |key| match key {
            "GITBUG_REMOTE" => Some("backup".to_string()),
            "GITBUG_MAX_LOADED_BUGS" => Some("64".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.default_remote, "backup");
        assert_eq!(config.max_loaded_bugs, Some(64));

        let err = apply_env_overrides(&mut config, |key| {
            (key == "GITBUG_MAX_LOADED_BUGS").then(|| "lots".to_string())
        });
        assert!(err.is_err());
    }
}
