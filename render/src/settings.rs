//! Saved configurations
//!
//! Named configurations are read from a JSON settings file and offered as a
//! menu next to every view. The file is never written by the server.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

use crate::config::EffectiveConfig;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse settings file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// A configuration saved under a name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedConfig {
    pub name: String,
    #[serde(flatten)]
    pub config: EffectiveConfig,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SettingsFile {
    #[serde(default)]
    configs: Vec<NamedConfig>,
}

/// One entry of the configuration menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigMenuEntry {
    pub name: String,
    /// Relative URL selecting this configuration
    pub url: String,
    /// Matches the configuration of the current request
    pub current: bool,
    /// Defined by the user, as opposed to the built-in default
    pub user_config: bool,
}

/// Read the named configurations stored in `path`.
pub fn read_settings(path: &Path) -> Result<Vec<NamedConfig>, SettingsError> {
    let data = std::fs::read(path)?;
    let file: SettingsFile = serde_json::from_slice(&data)?;
    Ok(file.configs)
}

/// Named configurations, or none when the file is missing or unreadable.
pub fn load_configs(path: Option<&Path>) -> Vec<NamedConfig> {
    let Some(path) = path else {
        return Vec::new();
    };
    match read_settings(path) {
        Ok(configs) => configs,
        Err(e) => {
            debug!("Ignoring settings file {}: {}", path.display(), e);
            Vec::new()
        }
    }
}

/// Build the configuration menu: `Default` followed by every saved
/// configuration. The last entry equal to `current` is marked current.
pub fn config_menu(configs: &[NamedConfig], current: &EffectiveConfig) -> Vec<ConfigMenuEntry> {
    let default = NamedConfig {
        name: "Default".to_string(),
        config: EffectiveConfig::default(),
    };
    let current_query = current.to_query_string();

    let mut menu: Vec<ConfigMenuEntry> = std::iter::once(&default)
        .chain(configs)
        .enumerate()
        .map(|(i, c)| ConfigMenuEntry {
            name: c.name.clone(),
            url: format!("?{}", c.config.to_query_string()),
            current: false,
            user_config: i != 0,
        })
        .collect();

    if let Some(entry) = menu
        .iter_mut()
        .rev()
        .find(|e| e.url.strip_prefix('?') == Some(current_query.as_str()))
    {
        entry.current = true;
    }
    menu
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Granularity;

    fn lines_config() -> NamedConfig {
        NamedConfig {
            name: "by-line".to_string(),
            config: EffectiveConfig {
                granularity: Granularity::Lines,
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_default_first_and_current() {
        let menu = config_menu(&[lines_config()], &EffectiveConfig::default());
        assert_eq!(menu.len(), 2);
        assert_eq!(menu[0].name, "Default");
        assert_eq!(menu[0].url, "?");
        assert!(menu[0].current);
        assert!(!menu[0].user_config);
        assert_eq!(menu[1].url, "?g=lines");
        assert!(!menu[1].current);
        assert!(menu[1].user_config);
    }

    #[test]
    fn test_last_match_is_current() {
        let mut twin = lines_config();
        twin.name = "by-line-2".to_string();
        let menu = config_menu(&[lines_config(), twin], &lines_config().config);
        let current: Vec<&str> = menu
            .iter()
            .filter(|e| e.current)
            .map(|e| e.name.as_str())
            .collect();
        assert_eq!(current, vec!["by-line-2"]);
    }

    #[test]
    fn test_read_settings_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"configs":[{"name":"focused","focus":"main","trim":false}]}"#,
        )
        .unwrap();
        let configs = read_settings(&path).unwrap();
        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].config.focus.as_deref(), Some("main"));
        assert!(!configs[0].config.trim);
    }

    #[test]
    fn test_missing_file_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_configs(Some(&dir.path().join("absent.json"))).is_empty());
        assert!(load_configs(None).is_empty());
    }
}
