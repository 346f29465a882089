//! Environment variable configuration provider

use std::str::FromStr;

use super::{ConfigError, ConfigResult};

/// Reads configuration keys from environment variables.
///
/// Keys are upper-cased with dots replaced by underscores and prefixed, so
/// `max.results` under prefix `TOOL_SEARCH_` reads `TOOL_SEARCH_MAX_RESULTS`.
#[derive(Debug, Clone, Default)]
pub struct EnvConfigProvider {
    prefix: Option<String>,
}

impl EnvConfigProvider {
    /// Create a new environment provider with no prefix
    pub fn new() -> Self {
        Self { prefix: None }
    }

    /// Create an environment provider with a prefix
    pub fn prefixed(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
        }
    }

    /// Get the full environment variable name
    pub fn env_key(&self, key: &str) -> String {
        let key = key.to_uppercase().replace('.', "_");
        match &self.prefix {
            Some(prefix) => format!("{}{}", prefix, key),
            None => key,
        }
    }

    pub fn get_raw(&self, key: &str) -> ConfigResult<Option<String>> {
        match std::env::var(self.env_key(key)) {
            Ok(value) => Ok(Some(value)),
            Err(std::env::VarError::NotPresent) => Ok(None),
            Err(e) => Err(ConfigError::Env(e)),
        }
    }

    /// Parse the variable with [`FromStr`]. Surrounding whitespace is ignored.
    pub fn get<T>(&self, key: &str) -> ConfigResult<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get_raw(key)? {
            Some(raw) => raw
                .trim()
                .parse()
                .map(Some)
                .map_err(|e: T::Err| ConfigError::invalid(self.env_key(key), e.to_string())),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_key_conversion() {
        let provider = EnvConfigProvider::new();
        assert_eq!(provider.env_key("max.results"), "MAX_RESULTS");

        let provider = EnvConfigProvider::prefixed("TOOL_SEARCH_");
        assert_eq!(provider.env_key("min_score"), "TOOL_SEARCH_MIN_SCORE");
    }

    #[test]
    fn test_typed_get() {
        let provider = EnvConfigProvider::prefixed("TEST_ENV_PROVIDER_");

        // SAFETY: Test-only environment setup with a unique prefix
        unsafe {
            std::env::set_var("TEST_ENV_PROVIDER_LIMIT", " 7 ");
            std::env::set_var("TEST_ENV_PROVIDER_BROKEN", "seven");
        }
        assert_eq!(provider.get::<usize>("limit").unwrap(), Some(7));
        assert!(matches!(
            provider.get::<usize>("broken"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert_eq!(provider.get::<usize>("missing").unwrap(), None);
        unsafe {
            std::env::remove_var("TEST_ENV_PROVIDER_LIMIT");
            std::env::remove_var("TEST_ENV_PROVIDER_BROKEN");
        }
    }
}
