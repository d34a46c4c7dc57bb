//! Client configuration.

use crate::error::{Error, Result};

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000/api";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Where the event API lives and how long to wait for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    /// API root, e.g. `http://127.0.0.1:8000/api`.
    pub base_url: String,

    /// Per-request timeout.
    pub timeout_secs: u64,
}

impl ApiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Load configuration from environment variables.
    ///
    /// `EVENTDESK_API_URL` and `EVENTDESK_TIMEOUT_SECS`; unset values fall
    /// back to the defaults, unparsable ones are errors.
    pub fn from_env() -> Result<Self> {
        let env = EnvSettings::read();
        Self {
            base_url: env.base_url(),
            timeout_secs: env.timeout_secs()?,
        }
        .validated()
    }

    /// Reject URLs the HTTP client could never use.
    pub fn validated(self) -> Result<Self> {
        let url = self.base_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(Error::Config(format!(
                "API URL must start with http:// or https://: {}",
                self.base_url
            )));
        }
        if self.timeout_secs == 0 {
            return Err(Error::Config("timeout must be at least one second".to_string()));
        }
        Ok(Self {
            base_url: url.trim_end_matches('/').to_string(),
            timeout_secs: self.timeout_secs,
        })
    }
}

/// Raw `EVENTDESK_*` values, parsed only when a caller falls back to them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvSettings {
    pub api_url: Option<String>,
    pub timeout_secs: Option<String>,
}

impl EnvSettings {
    pub fn read() -> Self {
        Self {
            api_url: std::env::var("EVENTDESK_API_URL").ok(),
            timeout_secs: std::env::var("EVENTDESK_TIMEOUT_SECS").ok(),
        }
    }

    pub fn base_url(&self) -> String {
        self.api_url.clone().unwrap_or_else(|| DEFAULT_API_URL.to_string())
    }

    pub fn timeout_secs(&self) -> Result<u64> {
        match &self.timeout_secs {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("EVENTDESK_TIMEOUT_SECS is not a number: {}", raw))),
            None => Ok(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = ApiConfig::default();
        assert_eq!(config.base_url, "http://127.0.0.1:8000/api");
        assert_eq!(config.timeout_secs, 30);
    }

    #[test]
    fn test_env_settings() {
        let unset = EnvSettings::default();
        assert_eq!(unset.base_url(), DEFAULT_API_URL);
        assert_eq!(unset.timeout_secs().unwrap(), DEFAULT_TIMEOUT_SECS);

        let set = EnvSettings {
            api_url: Some("https://events.example.com/api".to_string()),
            timeout_secs: Some(" 5 ".to_string()),
        };
        assert_eq!(set.base_url(), "https://events.example.com/api");
        assert_eq!(set.timeout_secs().unwrap(), 5);

        let bad = EnvSettings {
            timeout_secs: Some("soon".to_string()),
            ..EnvSettings::default()
        };
        assert!(matches!(bad.timeout_secs(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validated_trims_slash() {
        let config = ApiConfig::new("https://events.example.com/api/").validated().unwrap();
        assert_eq!(config.base_url, "https://events.example.com/api");
    }

    #[test]
    fn test_validated_rejects_bad_values() {
        assert!(matches!(
            ApiConfig::new("events.example.com").validated(),
            Err(Error::Config(_))
        ));
        let zero = ApiConfig {
            timeout_secs: 0,
            ..ApiConfig::default()
        };
        assert!(zero.validated().is_err());
    }
}
