use crate::LightError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.lifx.com/v1";
/// Upstream calls allowed per minute.
pub const DEFAULT_RATE_LIMIT: u32 = 120;
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_TRANSITION_SECS: f64 = 1.0;
const TOKEN_LENGTH: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// LIFX personal access token.
    pub token: String,
    pub base_url: String,
    pub request_timeout: Duration,
    /// Transition time in seconds applied to writes that carry none.
    pub default_duration: f64,
    pub rate_limit: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            token: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            default_duration: DEFAULT_TRANSITION_SECS,
            rate_limit: DEFAULT_RATE_LIMIT,
        }
    }
}

fn env_parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
    let value = std::env::var(name).ok()?;
    let parsed = value.trim().parse().ok();
    if parsed.is_none() {
        log::warn!("ignoring unparsable {name}={value:?}");
    }
    parsed
}

impl Config {
    /// Defaults overridden by `LIFX_TOKEN`, `LIFX_API_BASE_URL`,
    /// `LIFX_REQUEST_TIMEOUT_SECS`, `LIFX_DEFAULT_DURATION` and
    /// `LIFX_RATE_LIMIT_MAX`.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(token) = std::env::var("LIFX_TOKEN") {
            config.token = token.trim().to_string();
        }
        if let Ok(url) = std::env::var("LIFX_API_BASE_URL") {
            config.base_url = url;
        }
        if let Some(secs) = env_parsed("LIFX_REQUEST_TIMEOUT_SECS") {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(duration) = env_parsed("LIFX_DEFAULT_DURATION") {
            config.default_duration = duration;
        }
        if let Some(max) = env_parsed("LIFX_RATE_LIMIT_MAX") {
            config.rate_limit = max;
        }

        log::debug!(
            "configuration loaded: base_url={} token={}",
            config.base_url,
            config.masked_token()
        );
        config
    }

    pub fn with_token(self, token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            ..self
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.token.is_empty()
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.token.len() < TOKEN_LENGTH {
            return Err(LightError::ConfigError {
                msg: format!("LIFX token must be at least {TOKEN_LENGTH} characters"),
            });
        }
        if self.rate_limit == 0 {
            return Err(LightError::ConfigError {
                msg: "rate limit must allow at least one call".into(),
            });
        }
        Ok(())
    }

    /// The token reduced to its first 8 and last 4 characters, for display.
    pub fn masked_token(&self) -> String {
        mask_secret(&self.token)
    }
}

pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    match chars.len() {
        0 => String::new(),
        1..=12 => "***".to_string(),
        len => format!(
            "{}...{}",
            chars[..8].iter().collect::<String>(),
            chars[len - 4..].iter().collect::<String>()
        ),
    }
}
