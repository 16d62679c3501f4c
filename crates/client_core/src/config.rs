use std::{collections::HashMap, fs, path::Path, time::Duration};

use anyhow::Context;
use url::Url;

pub const DEFAULT_CONFIG_FILE: &str = "workbench.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub server_url: String,
    pub stream_path: String,
    pub preferences_path: String,
    pub reconnect_delay: Duration,
    pub event_capacity: usize,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:5000".into(),
            stream_path: "/stream".into(),
            preferences_path: "/preferences".into(),
            reconnect_delay: Duration::from_millis(3000),
            event_capacity: 1024,
        }
    }
}

impl ClientSettings {
    pub fn endpoint(&self, path: &str) -> anyhow::Result<Url> {
        let base = Url::parse(&self.server_url)
            .with_context(|| format!("invalid server url: {}", self.server_url))?;
        join_under(&base, path)
            .with_context(|| format!("invalid endpoint path `{path}` for {}", self.server_url))
    }

    pub fn stream_url(&self) -> anyhow::Result<Url> {
        self.endpoint(&self.stream_path)
    }
}

/// Resolves `path` below `base`, keeping any prefix the server is mounted at.
pub(crate) fn join_under(base: &Url, path: &str) -> Result<Url, url::ParseError> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let mounted = format!("{}/", base.path());
        base.set_path(&mounted);
    }
    base.join(path.trim_start_matches('/'))
}

pub fn load_settings() -> ClientSettings {
    match load_settings_from(None) {
        Ok(settings) => settings,
        Err(err) => {
            tracing::warn!(error = %err, "falling back to default client settings");
            let mut settings = ClientSettings::default();
            apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
            settings
        }
    }
}

/// Reads the optional config file (explicit path or `workbench.toml`), then applies
/// environment overrides. An explicit path that cannot be read is an error.
pub fn load_settings_from(path: Option<&Path>) -> anyhow::Result<ClientSettings> {
    let mut settings = ClientSettings::default();

    match path {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {}", path.display()))?;
            apply_file_config(&mut settings, &raw)
                .with_context(|| format!("failed to parse config file {}", path.display()))?;
        }
        None => {
            if let Ok(raw) = fs::read_to_string(DEFAULT_CONFIG_FILE) {
                apply_file_config(&mut settings, &raw)
                    .with_context(|| format!("failed to parse {DEFAULT_CONFIG_FILE}"))?;
            }
        }
    }

    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    Ok(settings)
}

pub fn apply_file_config(settings: &mut ClientSettings, raw: &str) -> anyhow::Result<()> {
    let file_cfg = toml::from_str::<HashMap<String, String>>(raw)?;
    if let Some(v) = file_cfg.get("server_url") {
        settings.server_url = v.clone();
    }
    if let Some(v) = file_cfg.get("stream_path") {
        settings.stream_path = v.clone();
    }
    if let Some(v) = file_cfg.get("preferences_path") {
        settings.preferences_path = v.clone();
    }
    if let Some(v) = file_cfg.get("reconnect_delay_ms") {
        let millis = v
            .parse::<u64>()
            .with_context(|| format!("reconnect_delay_ms must be an integer, got `{v}`"))?;
        settings.reconnect_delay = Duration::from_millis(millis);
    }
    Ok(())
}

pub fn apply_env_overrides<F>(settings: &mut ClientSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup("WORKBENCH_SERVER_URL") {
        settings.server_url = v;
    }
    if let Some(v) = lookup("APP__SERVER_URL") {
        settings.server_url = v;
    }
    if let Some(v) = lookup("APP__STREAM_PATH") {
        settings.stream_path = v;
    }
    if let Some(v) = lookup("APP__PREFERENCES_PATH") {
        settings.preferences_path = v;
    }
    if let Some(v) = lookup("APP__RECONNECT_DELAY_MS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.reconnect_delay = Duration::from_millis(parsed);
        }
    }
    if let Some(v) = lookup("APP__EVENT_CAPACITY") {
        if let Ok(parsed) = v.parse::<usize>() {
            settings.event_capacity = parsed.max(1);
        }
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
