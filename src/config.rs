use std::path::Path;

use anyhow::Context;
use log::info;
use serde::Deserialize;

pub const DEFAULT_PORT: u16 = 8787;
pub const DEFAULT_COUNTRY_CODE: &str = "90";
pub const DEFAULT_ALERT_MESSAGE: &str = "Acil durum! Lütfen yardım edin!";
pub const DEFAULT_WHATSAPP_ENDPOINT: &str = "https://api.whatsapp.com/send";
pub const DEFAULT_OPENER: &str = "xdg-open";

#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub port: u16,
    /// Bearer token required on every request when set.
    pub api_key: Option<String>,
    /// Home country calling code, digits only.
    pub country_code: String,
    /// Used when a request arrives without a phone number.
    pub default_recipient: Option<String>,
    /// SMS body used when a request arrives without a message.
    pub alert_message: String,
    pub whatsapp_endpoint: String,
    pub sms_command: Option<String>,
    pub opener: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            api_key: None,
            country_code: DEFAULT_COUNTRY_CODE.to_string(),
            default_recipient: None,
            alert_message: DEFAULT_ALERT_MESSAGE.to_string(),
            whatsapp_endpoint: DEFAULT_WHATSAPP_ENDPOINT.to_string(),
            sms_command: None,
            opener: DEFAULT_OPENER.to_string(),
        }
    }
}

/// On-disk form of the configuration. Every key is optional.
#[derive(Deserialize, Default)]
struct ConfigFile {
    port: Option<u16>,
    api_key: Option<String>,
    country_code: Option<String>,
    default_recipient: Option<String>,
    alert_message: Option<String>,
    whatsapp_endpoint: Option<String>,
    sms_command: Option<String>,
    opener: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl DispatchConfig {
    /// Load from the process environment, layered over the plist file named
    /// by `EMERGENCY_CONFIG` when present.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = non_empty(lookup("EMERGENCY_CONFIG")) {
            info!("Reading config from {}", path);
            config.apply_file(Path::new(&path))?;
        }

        if let Some(port) = lookup("EMERGENCY_API_PORT").and_then(|p| p.parse().ok()) {
            config.port = port;
        }
        if let Some(key) = non_empty(lookup("EMERGENCY_API_KEY")) {
            config.api_key = Some(key);
        }
        if let Some(code) = non_empty(lookup("EMERGENCY_COUNTRY_CODE")) {
            config.country_code = code;
        }
        if let Some(recipient) = non_empty(lookup("EMERGENCY_DEFAULT_RECIPIENT")) {
            config.default_recipient = Some(recipient);
        }
        if let Some(message) = non_empty(lookup("EMERGENCY_ALERT_MESSAGE")) {
            config.alert_message = message;
        }
        if let Some(endpoint) = non_empty(lookup("EMERGENCY_WHATSAPP_ENDPOINT")) {
            config.whatsapp_endpoint = endpoint;
        }
        if let Some(command) = non_empty(lookup("EMERGENCY_SMS_COMMAND")) {
            config.sms_command = Some(command);
        }
        if let Some(opener) = non_empty(lookup("EMERGENCY_OPENER")) {
            config.opener = opener;
        }

        config.validate()?;
        Ok(config)
    }

    fn apply_file(&mut self, path: &Path) -> anyhow::Result<()> {
        let file: ConfigFile = plist::from_file(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;

        if let Some(port) = file.port {
            self.port = port;
        }
        if let Some(key) = non_empty(file.api_key) {
            self.api_key = Some(key);
        }
        if let Some(code) = non_empty(file.country_code) {
            self.country_code = code;
        }
        if let Some(recipient) = non_empty(file.default_recipient) {
            self.default_recipient = Some(recipient);
        }
        if let Some(message) = non_empty(file.alert_message) {
            self.alert_message = message;
        }
        if let Some(endpoint) = non_empty(file.whatsapp_endpoint) {
            self.whatsapp_endpoint = endpoint;
        }
        if let Some(command) = non_empty(file.sms_command) {
            self.sms_command = Some(command);
        }
        if let Some(opener) = non_empty(file.opener) {
            self.opener = opener;
        }
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let code = self.country_code.trim_start_matches('+');
        if code.is_empty() || !code.chars().all(|c| c.is_ascii_digit()) {
            anyhow::bail!("country code must be digits, got {:?}", self.country_code);
        }
        if code != self.country_code {
            anyhow::bail!("country code must not carry a leading '+': {:?}", self.country_code);
        }
        if self.whatsapp_endpoint.is_empty() {
            anyhow::bail!("WhatsApp endpoint must not be empty");
        }
        Ok(())
    }
}
