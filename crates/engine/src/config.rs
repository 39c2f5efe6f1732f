//! Engine configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `CARTSYNC_API_BASE_URL` - Base URL of the collection service (http or https)
//!
//! ## Optional
//! - `CARTSYNC_STORAGE_DIR` - Directory for guest snapshots and the credential (default: .cartsync)
//! - `CARTSYNC_MERGE_POLICY` - `clear_always` (default) or `retain_on_failure`
//! - `CARTSYNC_CURRENCY` - Currency used when displaying prices (default: USD)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::path::PathBuf;

use cartsync_core::CurrencyCode;
use thiserror::Error;
use url::Url;

use crate::merge::MergePolicy;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Sync engine configuration.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Base URL of the collection service
    pub api_base_url: Url,
    /// Directory holding guest snapshots and the persisted credential
    pub storage_dir: PathBuf,
    /// What to do with the guest snapshot when a login merge fails
    pub merge_policy: MergePolicy,
    /// Display currency
    pub currency: CurrencyCode,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

impl SyncConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_base_url = get_http_url(&lookup, "CARTSYNC_API_BASE_URL")?;
        let storage_dir =
            PathBuf::from(get_env_or_default(&lookup, "CARTSYNC_STORAGE_DIR", ".cartsync"));
        let merge_policy = get_env_or_default(&lookup, "CARTSYNC_MERGE_POLICY", "clear_always")
            .parse::<MergePolicy>()
            .map_err(|e| ConfigError::InvalidEnvVar("CARTSYNC_MERGE_POLICY".to_string(), e))?;
        let currency = get_env_or_default(&lookup, "CARTSYNC_CURRENCY", "USD")
            .parse::<CurrencyCode>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("CARTSYNC_CURRENCY".to_string(), e.to_string())
            })?;

        Ok(Self {
            api_base_url,
            storage_dir,
            merge_policy,
            currency,
            sentry_dsn: get_optional_env(&lookup, "SENTRY_DSN"),
            sentry_environment: get_optional_env(&lookup, "SENTRY_ENVIRONMENT"),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<String, ConfigError> {
    lookup(key)
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable. Blank values count as unset.
fn get_optional_env(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key).filter(|value| !value.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: &str,
) -> String {
    get_optional_env(lookup, key).unwrap_or_else(|| default.to_string())
}

/// Get a required http(s) URL.
fn get_http_url(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Url, ConfigError> {
    let raw = get_required_env(lookup, key)?;
    let url = Url::parse(raw.trim())
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("unsupported scheme '{other}' (expected http or https)"),
        )),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config =
            SyncConfig::from_vars(vars(&[("CARTSYNC_API_BASE_URL", "https://api.example.com/v1")]))
                .unwrap();

        assert_eq!(config.api_base_url.as_str(), "https://api.example.com/v1");
        assert_eq!(config.storage_dir, PathBuf::from(".cartsync"));
        assert_eq!(config.merge_policy, MergePolicy::ClearAlways);
        assert_eq!(config.currency, CurrencyCode::USD);
        assert!(config.sentry_dsn.is_none());
    }

    #[test]
    fn test_missing_base_url() {
        let err = SyncConfig::from_vars(vars(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref key) if key == "CARTSYNC_API_BASE_URL"));

        let err = SyncConfig::from_vars(vars(&[("CARTSYNC_API_BASE_URL", "  ")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(_)));
    }

    #[test]
    fn test_rejects_non_http_base_url() {
        let err = SyncConfig::from_vars(vars(&[("CARTSYNC_API_BASE_URL", "ftp://files.example")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(_, _)));

        let err = SyncConfig::from_vars(vars(&[("CARTSYNC_API_BASE_URL", "not a url")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(_, _)));
    }

    #[test]
    fn test_overrides() {
        let config = SyncConfig::from_vars(vars(&[
            ("CARTSYNC_API_BASE_URL", "http://localhost:8080"),
            ("CARTSYNC_STORAGE_DIR", "/tmp/shop"),
            ("CARTSYNC_MERGE_POLICY", "retain_on_failure"),
            ("CARTSYNC_CURRENCY", "eur"),
            ("SENTRY_DSN", "https://key@sentry.example/1"),
            ("SENTRY_ENVIRONMENT", "staging"),
        ]))
        .unwrap();

        assert_eq!(config.storage_dir, PathBuf::from("/tmp/shop"));
        assert_eq!(config.merge_policy, MergePolicy::RetainOnFailure);
        assert_eq!(config.currency, CurrencyCode::EUR);
        assert_eq!(config.sentry_environment.as_deref(), Some("staging"));
    }

    #[test]
    fn test_invalid_merge_policy() {
        let err = SyncConfig::from_vars(vars(&[
            ("CARTSYNC_API_BASE_URL", "http://localhost:8080"),
            ("CARTSYNC_MERGE_POLICY", "never"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(ref key, _) if key == "CARTSYNC_MERGE_POLICY"));
    }
}
