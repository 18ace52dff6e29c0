pub mod cache;
pub mod string;

pub use cache::SecretCache;
pub use string::SecretString;

use keyring::Entry;
use regex::Regex;
use sdk::errors::EngineError;
use std::sync::OnceLock;

/// Keychain service name used for every Reel secret
pub const SERVICE_NAME: &str = "reel";

/// Secret keys the engine knows about, in the order `reel setup` asks for them
pub const OPENAI_API_KEY: &str = "openai_api_key";
pub const CATALOG_API_KEY: &str = "catalog_api_key";
pub const TELEGRAM_TOKEN: &str = "telegram_token";

pub const KNOWN_SECRETS: &[&str] = &[OPENAI_API_KEY, CATALOG_API_KEY, TELEGRAM_TOKEN];

/// SecretManager resolves API keys and tokens.
///
/// Lookup order for a key such as `catalog_api_key`:
/// 1. `REEL_CATALOG_API_KEY` environment variable
/// 2. `CATALOG_API_KEY` environment variable
/// 3. the OS keychain (service `reel`)
///
/// The bot runs unattended, so a missing secret is an error rather than an
/// interactive prompt. `reel setup` is the place to store secrets.
///
/// The SecretManager also scrubs key-shaped strings from text that leaves
/// the process (chat replies, error messages).
pub struct SecretManager {
    service_name: String,
}

/// Regex patterns for detecting common secret formats.
static SECRET_PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();

/// Initializes and returns the secret detection patterns.
///
/// Patterns match:
/// - OpenAI API keys: sk-[a-zA-Z0-9]{20,}
/// - Telegram bot tokens: [0-9]{8,10}:[a-zA-Z0-9-_]{35}
/// - Catalog API keys: XXXXXXX-XXXXXXX-XXXXXXX-XXXXXXX
/// - Bearer tokens: Bearer\s+[^\s]{20,}
fn get_secret_patterns() -> &'static Vec<Regex> {
    SECRET_PATTERNS.get_or_init(|| {
        [
            r"sk-[a-zA-Z0-9\-_]{20,}",
            r"\b[0-9]{8,10}:[a-zA-Z0-9\-_]{35}\b",
            r"\b[A-Z0-9]{7}-[A-Z0-9]{7}-[A-Z0-9]{7}-[A-Z0-9]{7}\b",
            r"Bearer\s+[^\s]{20,}",
        ]
        .iter()
        .filter_map(|pattern| Regex::new(pattern).ok())
        .collect()
    })
}

/// Environment variable names checked for `key`, most specific first
pub fn env_var_names(key: &str) -> [String; 2] {
    let upper = key.to_ascii_uppercase();
    [format!("REEL_{}", upper), upper]
}

impl SecretManager {
    /// Creates a new SecretManager with the given service name.
    ///
    /// The service name is used to namespace secrets in the OS keychain.
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
        }
    }

    /// Retrieves a secret from the environment or the OS keychain.
    ///
    /// # Errors
    /// Returns `EngineError::SecretNotFound` if no source holds the key and
    /// `EngineError::KeyringError` if keychain access itself fails.
    pub fn get_secret(&self, key: &str) -> Result<String, EngineError> {
        for var in env_var_names(key) {
            if let Ok(value) = std::env::var(&var) {
                if !value.trim().is_empty() {
                    tracing::debug!("Resolved secret '{}' from ${}", key, var);
                    return Ok(value.trim().to_string());
                }
            }
        }

        let entry = Entry::new(&self.service_name, key).map_err(|e| {
            EngineError::KeyringError(format!("Failed to create keyring entry: {}", e))
        })?;

        match entry.get_password() {
            Ok(secret) => {
                tracing::debug!("Retrieved secret '{}' from keychain", key);
                Ok(secret)
            }
            Err(keyring::Error::NoEntry) => Err(EngineError::SecretNotFound(key.to_string())),
            Err(e) => Err(EngineError::KeyringError(format!(
                "Failed to retrieve secret '{}': {}",
                key, e
            ))),
        }
    }

    /// Stores a secret in the OS keychain.
    ///
    /// # Errors
    /// Returns `EngineError::KeyringError` if keychain access fails
    pub fn set_secret(&self, key: &str, value: &str) -> Result<(), EngineError> {
        let entry = Entry::new(&self.service_name, key).map_err(|e| {
            EngineError::KeyringError(format!("Failed to create keyring entry: {}", e))
        })?;

        entry.set_password(value).map_err(|e| {
            EngineError::KeyringError(format!("Failed to store secret '{}': {}", key, e))
        })?;

        tracing::info!("Stored secret '{}' in keychain", key);
        Ok(())
    }

    /// Deletes a secret from the OS keychain.
    pub fn delete_secret(&self, key: &str) -> Result<(), EngineError> {
        let entry = Entry::new(&self.service_name, key).map_err(|e| {
            EngineError::KeyringError(format!("Failed to create keyring entry: {}", e))
        })?;

        entry.delete_password().map_err(|e| {
            EngineError::KeyringError(format!("Failed to delete secret '{}': {}", key, e))
        })?;

        tracing::info!("Deleted secret '{}' from keychain", key);
        Ok(())
    }

    /// Checks whether any source can provide `key`.
    pub fn has_secret(&self, key: &str) -> bool {
        self.get_secret(key).is_ok()
    }

    /// Scrubs secrets from text by replacing them with [REDACTED].
    ///
    /// # Examples
    /// ```
    /// use reel_engine::secrets::SecretManager;
    ///
    /// let manager = SecretManager::new("test");
    /// let scrubbed = manager.scrub("My API key is sk-1234567890abcdefghij");
    /// assert_eq!(scrubbed, "My API key is [REDACTED]");
    /// ```
    pub fn scrub(&self, text: &str) -> String {
        scrub(text)
    }
}

/// Free-function form of [`SecretManager::scrub`]
pub fn scrub(text: &str) -> String {
    let mut result = text.to_string();

    for pattern in get_secret_patterns() {
        result = pattern.replace_all(&result, "[REDACTED]").to_string();
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_manager_creation() {
        let manager = SecretManager::new("test-service");
        assert_eq!(manager.service_name, "test-service");
    }

    #[test]
    fn test_env_var_names() {
        let names = env_var_names("catalog_api_key");
        assert_eq!(names[0], "REEL_CATALOG_API_KEY");
        assert_eq!(names[1], "CATALOG_API_KEY");
    }

    #[test]
    fn test_secret_from_env() {
        std::env::set_var("REEL_UNIT_TEST_ONLY_KEY", "value-from-env");
        let manager = SecretManager::new("reel-unit-test");
        assert_eq!(
            manager.get_secret("unit_test_only_key").unwrap(),
            "value-from-env"
        );
        std::env::remove_var("REEL_UNIT_TEST_ONLY_KEY");
    }

    #[test]
    fn test_scrub_openai_key() {
        let text = "Error with key sk-1234567890abcdefghijklmnopqrstuvwxyz";
        let scrubbed = scrub(text);
        assert!(!scrubbed.contains("sk-"));
        assert!(scrubbed.contains("[REDACTED]"));
    }

    #[test]
    fn test_scrub_telegram_token() {
        let text = "token 1234567890:ABCdefGHIjklMNOpqrSTUvwxYZ012345678 leaked";
        assert_eq!(scrub(text), "token [REDACTED] leaked");
    }

    #[test]
    fn test_scrub_catalog_key() {
        let text = "X-API-KEY: ABC1234-DEF5678-GHI9012-JKL3456";
        assert_eq!(scrub(text), "X-API-KEY: [REDACTED]");
    }

    #[test]
    fn test_scrub_leaves_plain_text() {
        let text = "The rating of Inception is 8.7";
        assert_eq!(scrub(text), text);
    }
}
