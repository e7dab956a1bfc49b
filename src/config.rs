use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::system::filter::ClassificationPolicy;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub filter: FilterConfig,
    pub bridges: BridgesConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub refresh_rate_ms: u64,
    pub history_length: usize,
    pub pass_timeout_ms: u64,
    pub action_timeout_ms: u64,
    pub default_sort: String,
    pub sort_descending: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        GeneralConfig {
            refresh_rate_ms: 2000,
            history_length: 60,
            pass_timeout_ms: 1500,
            action_timeout_ms: 3000,
            default_sort: "cpu".to_string(),
            sort_descending: true,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub show_system_processes: bool,
    pub search_text: String,
    pub system_accounts: Vec<String>,
    pub reserved_pid_below: u32,
}

impl Default for FilterConfig {
    fn default() -> Self {
        FilterConfig {
            show_system_processes: true,
            search_text: String::new(),
            system_accounts: vec![
                "root".to_string(),
                "systemd+".to_string(),
                "messagebus".to_string(),
            ],
            reserved_pid_below: 100,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct BridgesConfig {
    pub command_timeout_ms: u64,
    pub user_autostart_dir: Option<PathBuf>,
    pub system_autostart_dirs: Vec<PathBuf>,
}

impl Default for BridgesConfig {
    fn default() -> Self {
        BridgesConfig {
            command_timeout_ms: 5000,
            user_autostart_dir: None,
            system_autostart_dirs: vec![PathBuf::from("/etc/xdg/autostart")],
        }
    }
}

impl BridgesConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms.max(1))
    }

    pub fn user_autostart_dir(&self) -> Option<PathBuf> {
        self.user_autostart_dir
            .clone()
            .or_else(|| dirs::config_dir().map(|p| p.join("autostart")))
    }
}

/// What the sampler reads at the start of every pass.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplingSettings {
    pub refresh_interval: Duration,
    pub show_system_processes: bool,
    pub search_text: String,
}

impl Default for SamplingSettings {
    fn default() -> Self {
        Config::default().sampling_settings()
    }
}

impl Config {
    pub fn sampling_settings(&self) -> SamplingSettings {
        SamplingSettings {
            refresh_interval: Duration::from_millis(self.general.refresh_rate_ms.max(100)),
            show_system_processes: self.filter.show_system_processes,
            search_text: self.filter.search_text.clone(),
        }
    }

    pub fn classification(&self) -> ClassificationPolicy {
        ClassificationPolicy {
            system_accounts: self.filter.system_accounts.clone(),
            reserved_pid_below: self.filter.reserved_pid_below,
        }
    }

    pub fn pass_timeout(&self) -> Duration {
        Duration::from_millis(self.general.pass_timeout_ms.max(1))
    }

    pub fn action_timeout(&self) -> Duration {
        Duration::from_millis(self.general.action_timeout_ms.max(1))
    }
}

pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("proctide").join("config.toml"))
}

pub fn load_config() -> Config {
    match config_path() {
        Some(path) if path.exists() => load_config_from_path(&path),
        _ => Config::default(),
    }
}

pub fn load_config_from_path(path: &Path) -> Config {
    match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str(&contents) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(path = %path.display(), %err, "invalid config, using defaults");
                Config::default()
            }
        },
        Err(_) => Config::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let config = Config::default();
        assert_eq!(config.general.refresh_rate_ms, 2000);
        assert_eq!(config.general.history_length, 60);
        assert_eq!(config.action_timeout(), Duration::from_secs(3));
        assert_eq!(config.general.default_sort, "cpu");
        assert!(config.filter.show_system_processes);
        assert_eq!(config.filter.reserved_pid_below, 100);
        assert_eq!(config.bridges.command_timeout_ms, 5000);
    }

    #[test]
    fn parse_partial_toml() {
        let toml_str = r#"
[general]
refresh_rate_ms = 500
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.refresh_rate_ms, 500);
        // Other fields should be defaults
        assert_eq!(config.general.default_sort, "cpu");
        assert_eq!(config.filter.system_accounts.len(), 3);
    }

    #[test]
    fn parse_full_toml() {
        let toml_str = r#"
[general]
refresh_rate_ms = 1000
history_length = 120
default_sort = "memory"
sort_descending = false

[filter]
show_system_processes = false
search_text = "ssh"
system_accounts = ["root"]
reserved_pid_below = 300

[bridges]
command_timeout_ms = 250
user_autostart_dir = "/tmp/autostart"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.history_length, 120);
        assert!(!config.general.sort_descending);
        assert_eq!(config.filter.system_accounts, vec!["root".to_string()]);
        assert_eq!(config.filter.reserved_pid_below, 300);
        assert_eq!(
            config.bridges.user_autostart_dir(),
            Some(PathBuf::from("/tmp/autostart"))
        );

        let settings = config.sampling_settings();
        assert_eq!(settings.refresh_interval, Duration::from_millis(1000));
        assert!(!settings.show_system_processes);
        assert_eq!(settings.search_text, "ssh");
    }

    #[test]
    fn refresh_interval_has_a_floor() {
        let mut config = Config::default();
        config.general.refresh_rate_ms = 0;
        assert_eq!(
            config.sampling_settings().refresh_interval,
            Duration::from_millis(100)
        );
    }

    #[test]
    fn missing_file_returns_default() {
        let config = load_config_from_path(Path::new("/nonexistent/path/config.toml"));
        assert_eq!(config.general.refresh_rate_ms, 2000);
    }

    #[test]
    fn invalid_toml_returns_default() {
        let temp = std::env::temp_dir().join("proctide_test_invalid.toml");
        std::fs::write(&temp, "this is not valid toml {{{{").unwrap();
        let config = load_config_from_path(&temp);
        assert_eq!(config.general.refresh_rate_ms, 2000);
        let _ = std::fs::remove_file(&temp);
    }
}
