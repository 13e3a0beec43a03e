//! API key retrieval from the environment, `.env` files and configuration.
//!
//! Environment variables win over configuration values. A missing key
//! resolves to a placeholder because local OpenAI-compatible proxies accept
//! any bearer token.

use crate::config::constants::model;
use anyhow::Result;
use std::env;
use tracing::debug;

/// Load `.env` from the working directory. A missing file is not an error.
pub fn load_dotenv() -> Result<()> {
    match dotenvy::dotenv() {
        Ok(path) => {
            debug!(path = %path.display(), "loaded environment file");
            Ok(())
        }
        Err(dotenvy::Error::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}

/// Resolve a key: environment variable first, then the configured value,
/// then the placeholder.
pub fn resolve_api_key(env_var: &str, configured: Option<&str>) -> String {
    resolve_api_key_with(env_var, configured, |name| env::var(name).ok())
}

pub(crate) fn resolve_api_key_with<F>(env_var: &str, configured: Option<&str>, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(key) = lookup(env_var).filter(|key| !key.trim().is_empty()) {
        return key;
    }
    if let Some(key) = configured.filter(|key| !key.trim().is_empty()) {
        return key.to_string();
    }
    debug!(env_var, "no API key configured, using placeholder");
    model::DUMMY_API_KEY.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_wins_over_config() {
        let key = resolve_api_key_with("X_KEY", Some("from-config"), |_| Some("from-env".into()));
        assert_eq!(key, "from-env");
    }

    #[test]
    fn blank_values_fall_through_to_placeholder() {
        let key = resolve_api_key_with("X_KEY", Some("  "), |_| Some(String::new()));
        assert_eq!(key, model::DUMMY_API_KEY);
    }

    #[test]
    fn config_used_when_environment_missing() {
        let key = resolve_api_key_with("X_KEY", Some("sk-local"), |_| None);
        assert_eq!(key, "sk-local");
    }
}
