use crate::error::{RelayError, Result};
use crate::models::catalog;
use std::env;
use std::time::Duration;

pub const DEFAULT_MODEL_ID: &str = "black-forest-labs/FLUX.1-dev";
pub const DEFAULT_UPSTREAM_URL: &str = "https://router.huggingface.co/hf-inference";

#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    pub api_token: Option<String>,
    pub base_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub debug: bool,
    pub default_model: String,
    pub upstream: UpstreamConfig,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        UpstreamConfig {
            api_token: None,
            base_url: DEFAULT_UPSTREAM_URL.to_string(),
            timeout_secs: 120,
        }
    }
}

impl UpstreamConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        let defaults = Self::default();
        let api_token = env::var("HF_TOKEN").ok().filter(|token| !token.is_empty());
        let base_url = env::var("HF_BASE_URL").unwrap_or(defaults.base_url);
        let timeout_secs = env::var("UPSTREAM_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.timeout_secs);

        UpstreamConfig {
            api_token,
            base_url,
            timeout_secs,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: "0.0.0.0".to_string(),
            port: 5000,
            debug: true,
            default_model: DEFAULT_MODEL_ID.to_string(),
            upstream: UpstreamConfig::default(),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        let defaults = Self::default();
        let host = env::var("HOST").unwrap_or(defaults.host);
        let port = env::var("PORT")
            .ok()
            .and_then(|port| port.parse().ok())
            .unwrap_or(defaults.port);
        let debug = env::var("DEBUG")
            .ok()
            .and_then(|val| parse_bool(&val))
            .unwrap_or(defaults.debug);
        let default_model = env::var("DEFAULT_MODEL")
            .ok()
            .filter(|id| !id.is_empty())
            .unwrap_or(defaults.default_model);

        Config {
            host,
            port,
            debug,
            default_model,
            upstream: UpstreamConfig::from_env(),
        }
    }

    pub fn with_bind(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host = host.into();
        self.port = port;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_default_model(mut self, model_id: impl Into<String>) -> Self {
        self.default_model = model_id.into();
        self
    }

    pub fn with_upstream(mut self, upstream: UpstreamConfig) -> Self {
        self.upstream = upstream;
        self
    }

    /// Checks the settings the relay cannot start without.
    pub fn validate(&self) -> Result<()> {
        match self.upstream.api_token.as_deref() {
            None | Some("") => {
                return Err(RelayError::Config(
                    "Required environment variable 'HF_TOKEN' is not set".into(),
                ))
            }
            Some(token) if !token.starts_with("hf_") => {
                log::warn!("⚠️  HF_TOKEN does not start with 'hf_' and may be rejected upstream");
            }
            Some(_) => {}
        }

        if self.port < 1024 {
            return Err(RelayError::Config(format!(
                "Port {} is outside valid range (1024-65535)",
                self.port
            )));
        }

        if !catalog::is_valid_model_id(&self.default_model) {
            return Err(RelayError::Config(format!(
                "Default model '{}' is not in the model catalog",
                self.default_model
            )));
        }

        if self.upstream.timeout_secs == 0 {
            return Err(RelayError::Config(
                "Upstream timeout must be at least one second".into(),
            ));
        }

        Ok(())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        Config::new().with_upstream(UpstreamConfig::new().with_token("hf_test_token"))
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.port, 5000);
        assert_eq!(config.host, "0.0.0.0");
        assert!(config.debug);
        assert_eq!(config.default_model, DEFAULT_MODEL_ID);
        assert_eq!(config.upstream.timeout(), Duration::from_secs(120));
    }

    #[test]
    fn test_missing_token_is_fatal() {
        let err = Config::new().validate().unwrap_err();
        assert!(matches!(err, RelayError::Config(_)));
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_port_range() {
        let config = valid_config().with_bind("127.0.0.1", 80);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_default_model() {
        let config = valid_config().with_default_model("nobody/nothing");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("YES"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
