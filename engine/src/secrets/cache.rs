use crate::secrets::string::SecretString;
use crate::secrets::SecretManager;
use sdk::errors::EngineError;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// An in-memory cache in front of [`SecretManager`].
///
/// Every outbound HTTP call needs a key; the cache keeps keychain traffic to
/// one lookup per key per process.
#[derive(Clone)]
pub struct SecretCache {
    manager: Arc<SecretManager>,
    cache: Arc<RwLock<HashMap<String, SecretString>>>,
}

impl SecretCache {
    /// Creates a new SecretCache wrapping the provided SecretManager
    pub fn new(manager: Arc<SecretManager>) -> Self {
        Self {
            manager,
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Retrieves a secret, checking the memory cache first.
    pub fn get_secret(&self, key: &str) -> Result<SecretString, EngineError> {
        {
            let cache = self
                .cache
                .read()
                .map_err(|_| EngineError::KeyringError("SecretCache lock poisoned".into()))?;
            if let Some(secret) = cache.get(key) {
                return Ok(secret.clone());
            }
        }

        let raw_secret = self.manager.get_secret(key)?;
        let secret = SecretString::new(raw_secret);

        self.insert(key, secret.clone())?;

        Ok(secret)
    }

    /// Seeds the cache with a known value, bypassing the manager.
    pub fn insert(&self, key: &str, secret: SecretString) -> Result<(), EngineError> {
        let mut cache = self
            .cache
            .write()
            .map_err(|_| EngineError::KeyringError("SecretCache lock poisoned".into()))?;
        cache.insert(key.to_string(), secret);
        Ok(())
    }

    /// Resolves a set of keys up front so a missing one fails at startup.
    pub fn preload(&self, keys: &[&str]) -> Result<(), EngineError> {
        for key in keys {
            self.get_secret(key)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inserted_secret_is_served_from_cache() {
        let cache = SecretCache::new(Arc::new(SecretManager::new("reel-cache-test")));
        cache
            .insert("catalog_api_key", SecretString::new("cached"))
            .unwrap();
        assert_eq!(
            cache.get_secret("catalog_api_key").unwrap().unsecure(),
            "cached"
        );
    }
}
