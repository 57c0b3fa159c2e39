use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::core::key::{CacheKey, Collection};
use crate::core::keyring;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/api/";
pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
/// The server rejects larger limits.
pub const MAX_PAGE_SIZE: usize = 100;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("write config {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    #[default]
    Light,
    Dark,
}

impl ThemeMode {
    pub fn toggle(self) -> Self {
        match self {
            ThemeMode::Light => ThemeMode::Dark,
            ThemeMode::Dark => ThemeMode::Light,
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "light" => Some(ThemeMode::Light),
            "dark" => Some(ThemeMode::Dark),
            _ => None,
        }
    }
}

/// How long a cached entry stays fresh, per collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaleTimes {
    pub messages: Duration,
    pub achievements: Duration,
    pub user_info: Duration,
    pub message_detail: Duration,
    pub image: Duration,
}

impl Default for StaleTimes {
    fn default() -> Self {
        StaleTimes {
            messages: Duration::from_secs(5 * 60),
            achievements: Duration::from_secs(15 * 60),
            user_info: Duration::from_secs(10 * 60),
            message_detail: Duration::ZERO,
            image: Duration::ZERO,
        }
    }
}

impl StaleTimes {
    pub fn for_key(&self, key: &CacheKey) -> Duration {
        match key.collection() {
            Collection::Messages => self.messages,
            Collection::Achievements => self.achievements,
            Collection::UserInfo => self.user_info,
            Collection::MessageDetail => self.message_detail,
            Collection::Image => self.image,
        }
    }
}

/// Resolved runtime configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// API root; `None` means [`DEFAULT_BASE_URL`].
    pub base_url: Option<Url>,
    pub page_size: usize,
    pub timeout_secs: u64,
    pub theme: ThemeMode,
    pub stale: StaleTimes,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            base_url: None,
            page_size: DEFAULT_PAGE_SIZE,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            theme: ThemeMode::Light,
            stale: StaleTimes::default(),
        }
    }
}

/// On-disk representation. Every field is optional; missing ones keep their defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FileConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_size: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme_mode: Option<ThemeMode>,
}


fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("timeline")
        .join("config.json")
}

impl FileConfig {
    pub fn load() -> Result<Option<Self>, ConfigError> {
        Self::load_from(&config_path())
    }

    pub fn load_from(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }
        let data = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Some(serde_json::from_str(&data)?))
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        let data = serde_json::to_string_pretty(self)?;
        fs::write(path, data).map_err(write_err)
    }
}

/// Parse a base URL and make sure relative paths join beneath it.
fn normalize_base_url(raw: &str) -> Option<Url> {
    let trimmed = raw.trim();
    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    };
    match Url::parse(&with_slash) {
        Ok(url) => Some(url),
        Err(e) => {
            log::warn!("Ignoring invalid API URL {raw:?}: {e}");
            None
        }
    }
}

fn checked_page_size(size: usize) -> usize {
    if (1..=MAX_PAGE_SIZE).contains(&size) {
        size
    } else {
        log::warn!("Page size {size} out of range 1..={MAX_PAGE_SIZE}, using {DEFAULT_PAGE_SIZE}");
        DEFAULT_PAGE_SIZE
    }
}

impl Config {
    /// The configured API root, or the built-in default.
    pub fn api_url(&self) -> Result<Url, url::ParseError> {
        match &self.base_url {
            Some(url) => Ok(url.clone()),
            None => Url::parse(DEFAULT_BASE_URL),
        }
    }

    /// Overlay the fields present in a config file.
    pub fn apply_file(&mut self, fc: &FileConfig) {
        if let Some(url) = fc.api_url.as_deref().and_then(normalize_base_url) {
            self.base_url = Some(url);
        }
        if let Some(size) = fc.page_size {
            self.page_size = checked_page_size(size);
        }
        if let Some(secs) = fc.timeout_secs {
            self.timeout_secs = secs;
        }
        if let Some(theme) = fc.theme_mode {
            self.theme = theme;
        }
    }

    /// Overlay `TIMELINE_*` variables, read through `lookup`. Returns whether any applied.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> bool {
        let mut applied = false;
        if let Some(url) = lookup("TIMELINE_API_URL").and_then(|v| normalize_base_url(&v)) {
            self.base_url = Some(url);
            applied = true;
        }
        if let Some(size) = lookup("TIMELINE_PAGE_SIZE").and_then(|v| v.trim().parse().ok()) {
            self.page_size = checked_page_size(size);
            applied = true;
        }
        if let Some(secs) = lookup("TIMELINE_TIMEOUT_SECS").and_then(|v| v.trim().parse().ok()) {
            self.timeout_secs = secs;
            applied = true;
        }
        if let Some(theme) = lookup("TIMELINE_THEME").and_then(|v| ThemeMode::parse(&v)) {
            self.theme = theme;
            applied = true;
        }
        applied
    }

    /// Resolution order: env vars → config file → defaults.
    pub fn resolve() -> Self {
        let mut config = Config::default();

        match FileConfig::load() {
            Ok(Some(fc)) => {
                config.apply_file(&fc);
                log::info!("Config loaded from {}", config_path().display());
            }
            Ok(None) => log::info!("No config file found, using defaults"),
            Err(e) => log::warn!("Config file error: {}", e),
        }

        if config.apply_env(|name| std::env::var(name).ok()) {
            log::info!("Config overridden from environment variables");
        }
        config
    }

    /// Persist the theme preference, keeping the rest of the file.
    pub fn save_theme(&self) -> Result<(), ConfigError> {
        let mut fc = FileConfig::load()?.unwrap_or_default();
        fc.theme_mode = Some(self.theme);
        fc.save()
    }
}

/// Token to send as `Authorization: Bearer`: the env var wins over the keyring.
pub fn auth_token() -> Option<String> {
    if let Ok(token) = std::env::var("TIMELINE_AUTH_TOKEN") {
        if !token.trim().is_empty() {
            log::info!("Auth token loaded from environment variables");
            return Some(token);
        }
    }
    match keyring::get_token() {
        Ok(token) => token,
        Err(e) => {
            log::warn!("Keyring lookup failed: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_match_server() {
        let config = Config::default();
        assert_eq!(config.api_url().unwrap().as_str(), "http://localhost:8080/api/");
        assert_eq!(config.page_size, 20);
        assert_eq!(config.timeout_secs, 10);
        assert_eq!(config.theme, ThemeMode::Light);
    }

    #[test]
    fn env_overrides_file() {
        let mut config = Config::default();
        config.apply_file(&FileConfig {
            api_url: Some("http://file.example/api".into()),
            page_size: Some(50),
            timeout_secs: None,
            theme_mode: Some(ThemeMode::Dark),
        });
        let applied = config.apply_env(env(&[
            ("TIMELINE_API_URL", "https://env.example/v1"),
            ("TIMELINE_THEME", "LIGHT"),
        ]));

        assert!(applied);
        assert_eq!(config.api_url().unwrap().as_str(), "https://env.example/v1/");
        assert_eq!(config.page_size, 50);
        assert_eq!(config.theme, ThemeMode::Light);
    }

    #[test]
    fn no_env_applies_nothing() {
        let mut config = Config::default();
        assert!(!config.apply_env(env(&[])));
        assert_eq!(config, Config::default());
    }

    #[test]
    fn out_of_range_page_size_falls_back() {
        let mut config = Config::default();
        config.apply_env(env(&[("TIMELINE_PAGE_SIZE", "500")]));
        assert_eq!(config.page_size, DEFAULT_PAGE_SIZE);
        config.apply_env(env(&[("TIMELINE_PAGE_SIZE", "0")]));
        assert_eq!(config.page_size, DEFAULT_PAGE_SIZE);
        config.apply_env(env(&[("TIMELINE_PAGE_SIZE", "35")]));
        assert_eq!(config.page_size, 35);
    }

    #[test]
    fn invalid_url_is_ignored() {
        let mut config = Config::default();
        config.apply_env(env(&[("TIMELINE_API_URL", "not a url")]));
        assert_eq!(config.base_url, None);
        assert_eq!(config.api_url().unwrap().as_str(), DEFAULT_BASE_URL);
    }

    #[test]
    fn theme_persists_under_theme_mode() {
        let dir = std::env::temp_dir().join(format!("timeline-config-{}", uuid::Uuid::new_v4()));
        let path = dir.join("config.json");

        let fc = FileConfig {
            theme_mode: Some(ThemeMode::Dark),
            ..Default::default()
        };
        fc.save_to(&path).unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"theme-mode\": \"dark\""));
        assert_eq!(FileConfig::load_from(&path).unwrap(), Some(fc));

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_file_is_none() {
        let path = std::env::temp_dir().join("timeline-does-not-exist/config.json");
        assert_eq!(FileConfig::load_from(&path).unwrap(), None);
    }

    #[test]
    fn stale_times_follow_collection() {
        let stale = StaleTimes::default();
        assert_eq!(stale.for_key(&CacheKey::messages()), Duration::from_secs(300));
        assert_eq!(stale.for_key(&CacheKey::achievements(None)), Duration::from_secs(900));
        assert_eq!(stale.for_key(&CacheKey::UserInfo), Duration::from_secs(600));
        assert_eq!(
            stale.for_key(&CacheKey::message_detail(uuid::Uuid::nil())),
            Duration::ZERO
        );
    }

    #[test]
    fn theme_toggles() {
        assert_eq!(ThemeMode::Light.toggle(), ThemeMode::Dark);
        assert_eq!(ThemeMode::Dark.toggle().toggle(), ThemeMode::Dark);
    }
}
