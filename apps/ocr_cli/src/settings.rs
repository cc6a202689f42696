use std::fs;

use anyhow::{bail, Context};
use serde::Deserialize;
use shared::domain::DEFAULT_EXPORT_FILE_NAME;
use tracing::warn;
use url::Url;

pub const SETTINGS_FILE: &str = "ocr_client.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server_url: String,
    pub request_timeout_secs: Option<u64>,
    pub export_file_name: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:5000".into(),
            request_timeout_secs: None,
            export_file_name: DEFAULT_EXPORT_FILE_NAME.into(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    server_url: Option<String>,
    request_timeout_secs: Option<u64>,
    export_file_name: Option<String>,
}

impl Settings {
    pub fn with_overrides(mut self, server_url: Option<String>, timeout_secs: Option<u64>) -> Self {
        if let Some(v) = server_url {
            self.server_url = v;
        }
        if let Some(v) = timeout_secs {
            self.request_timeout_secs = Some(v);
        }
        self
    }

    /// Normalizes the server URL and drops a zero timeout, which means "no
    /// timeout" in the config file.
    pub fn validated(mut self) -> anyhow::Result<Self> {
        self.server_url = normalize_server_url(&self.server_url)?;
        if self.request_timeout_secs == Some(0) {
            self.request_timeout_secs = None;
        }
        let export_file_name = self.export_file_name.trim();
        if export_file_name.is_empty() {
            self.export_file_name = DEFAULT_EXPORT_FILE_NAME.into();
        } else {
            self.export_file_name = export_file_name.to_string();
        }
        Ok(self)
    }
}

/// Defaults, then `ocr_client.toml` from the working directory, then
/// environment variables.
pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(SETTINGS_FILE) {
        if let Err(err) = apply_file_settings(&mut settings, &raw) {
            warn!(file = SETTINGS_FILE, error = %err, "ignoring unreadable settings file");
        }
    }

    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    settings
}

fn apply_file_settings(settings: &mut Settings, raw: &str) -> anyhow::Result<()> {
    let file_cfg: FileSettings = toml::from_str(raw).context("parse settings toml")?;
    if let Some(v) = file_cfg.server_url {
        settings.server_url = v;
    }
    if let Some(v) = file_cfg.request_timeout_secs {
        settings.request_timeout_secs = Some(v);
    }
    if let Some(v) = file_cfg.export_file_name {
        settings.export_file_name = v;
    }
    Ok(())
}

fn apply_env_overrides(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("OCR_SERVER_URL") {
        settings.server_url = v;
    }
    if let Some(v) = lookup("APP__SERVER_URL") {
        settings.server_url = v;
    }

    if let Some(v) = lookup("APP__REQUEST_TIMEOUT_SECS") {
        match v.parse::<u64>() {
            Ok(parsed) => settings.request_timeout_secs = Some(parsed),
            Err(_) => warn!(value = %v, "ignoring non-numeric APP__REQUEST_TIMEOUT_SECS"),
        }
    }

    if let Some(v) = lookup("APP__EXPORT_FILE_NAME") {
        settings.export_file_name = v;
    }
}

fn normalize_server_url(raw: &str) -> anyhow::Result<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(Settings::default().server_url);
    }

    let parsed = Url::parse(raw).with_context(|| format!("invalid server url '{raw}'"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        bail!(
            "unsupported scheme '{}' in server url '{raw}'",
            parsed.scheme()
        );
    }

    Ok(raw.trim_end_matches('/').to_string())
}

#[cfg(test)]
#[path = "tests/settings_tests.rs"]
mod tests;
