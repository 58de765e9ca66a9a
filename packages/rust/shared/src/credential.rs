//! API credential handling.
//!
//! The key is always an explicit value handed to the client constructor.
//! Nothing here writes to the process environment.

use secrecy::{ExposeSecret, SecretString};

use crate::config::AppConfig;
use crate::error::{Result, TestsmithError};

/// An API key for the model provider. `Debug` output is redacted.
#[derive(Clone)]
pub struct ApiKey(SecretString);

impl ApiKey {
    /// Wrap a raw key, rejecting blank input.
    pub fn new(raw: impl Into<String>) -> Result<Self> {
        let raw: String = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(TestsmithError::config("API key is empty"));
        }
        Ok(Self(SecretString::from(trimmed.to_string())))
    }

    /// Read the key from the env var named in `[openai].api_key_env`.
    ///
    /// Returns `Ok(None)` when the variable is unset or blank.
    pub fn from_env(config: &AppConfig) -> Result<Option<Self>> {
        match std::env::var(&config.openai.api_key_env) {
            Ok(val) if !val.trim().is_empty() => Self::new(val).map(Some),
            _ => Ok(None),
        }
    }

    /// The key as sent in the `Authorization` header.
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiKey([REDACTED])")
    }
}

/// Error returned when no key could be found or prompted for.
pub fn missing_api_key(config: &AppConfig) -> TestsmithError {
    let var_name = &config.openai.api_key_env;
    TestsmithError::config(format!(
        "OpenAI API key not found. Set the {var_name} environment variable \
         or run from an interactive terminal to be prompted."
    ))
}
