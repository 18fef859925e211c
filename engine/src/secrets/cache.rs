use crate::secrets::string::SecretString;
use crate::secrets::SecretManager;
use sdk::errors::EngineError;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// In-memory cache in front of [`SecretManager`].
///
/// Keys are resolved once per process; providers built for a batch share one
/// cache through `Clone`.
#[derive(Clone)]
pub struct SecretCache {
    manager: Arc<SecretManager>,
    cache: Arc<RwLock<HashMap<String, SecretString>>>,
}

impl SecretCache {
    pub fn new(manager: Arc<SecretManager>) -> Self {
        Self {
            manager,
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Build a cache pre-populated with fixed values. Used by tests and by
    /// callers that already hold the keys.
    pub fn with_values<I, K, V>(manager: Arc<SecretManager>, values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<SecretString>,
    {
        let map = values
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            manager,
            cache: Arc::new(RwLock::new(map)),
        }
    }

    /// Retrieve a secret, checking the memory cache first.
    pub fn get_secret(&self, key: &str) -> Result<SecretString, EngineError> {
        {
            let cache = self
                .cache
                .read()
                .map_err(|_| EngineError::KeyringError("secret cache lock poisoned".into()))?;
            if let Some(secret) = cache.get(key) {
                return Ok(secret.clone());
            }
        }

        let secret = SecretString::new(self.manager.get_secret(key)?);

        {
            let mut cache = self
                .cache
                .write()
                .map_err(|_| EngineError::KeyringError("secret cache lock poisoned".into()))?;
            cache.insert(key.to_string(), secret.clone());
        }

        Ok(secret)
    }

    /// Whether a key can be resolved without failing. Used by `delve doctor`.
    pub fn is_available(&self, key: &str) -> bool {
        self.get_secret(key).is_ok()
    }

    /// The manager behind this cache, for scrubbing provider messages.
    pub fn manager(&self) -> &SecretManager {
        &self.manager
    }
}
