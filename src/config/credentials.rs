use std::collections::HashMap;

use crate::{Result, YtsError};

/// Keyring service name the API keys are stored under
pub const KEYRING_SERVICE: &str = "yts-cli";

/// Source of API keys for hosted providers, keyed by provider name
#[cfg_attr(test, mockall::automock)]
pub trait CredentialStore {
    /// Whether a key is stored for `provider`; a backend failure is an error, not `false`
    fn has_credential(&self, provider: &str) -> Result<bool>;

    /// The stored key for `provider`
    fn get_credential(&self, provider: &str) -> Result<String>;
}

/// API keys in the operating system keychain
#[derive(Debug, Clone)]
pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    pub fn new() -> Self {
        Self::with_service(KEYRING_SERVICE)
    }

    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, provider: &str) -> Result<keyring::Entry> {
        keyring::Entry::new(&self.service, provider).map_err(|e| store_failed(provider, e))
    }

    pub fn set_credential(&self, provider: &str, api_key: &str) -> Result<()> {
        self.entry(provider)?
            .set_password(api_key)
            .map_err(|e| store_failed(provider, e))?;
        tracing::debug!("Stored API key for {}", provider);
        Ok(())
    }

    /// Remove the key for `provider`; returns false when there was none
    pub fn delete_credential(&self, provider: &str) -> Result<bool> {
        match self.entry(provider)?.delete_credential() {
            Ok(()) => Ok(true),
            Err(keyring::Error::NoEntry) => {
                tracing::debug!("No keychain entry to delete for {}", provider);
                Ok(false)
            }
            Err(e) => Err(store_failed(provider, e)),
        }
    }

    /// Masked form of the stored key, showing only its last four characters
    pub fn credential_hint(&self, provider: &str) -> Result<Option<String>> {
        match self.entry(provider)?.get_password() {
            Ok(key) if key.is_empty() => Ok(None),
            Ok(key) => Ok(Some(mask_key(&key))),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(store_failed(provider, e)),
        }
    }
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore for KeyringStore {
    fn has_credential(&self, provider: &str) -> Result<bool> {
        lookup_outcome(provider, self.entry(provider)?.get_password())
    }

    fn get_credential(&self, provider: &str) -> Result<String> {
        match self.entry(provider)?.get_password() {
            Ok(key) if !key.is_empty() => Ok(key),
            Ok(_) | Err(keyring::Error::NoEntry) => Err(YtsError::CredentialNotFound {
                provider: provider.to_string(),
            }),
            Err(e) => Err(store_failed(provider, e)),
        }
    }
}

fn lookup_outcome(provider: &str, lookup: keyring::Result<String>) -> Result<bool> {
    match lookup {
        Ok(key) => Ok(!key.is_empty()),
        Err(keyring::Error::NoEntry) => Ok(false),
        Err(e) => Err(store_failed(provider, e)),
    }
}

fn store_failed(provider: &str, error: keyring::Error) -> YtsError {
    YtsError::CredentialStoreFailed {
        provider: provider.to_string(),
        reason: error.to_string(),
    }
}

fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    let tail: String = chars[chars.len().saturating_sub(4)..].iter().collect();
    format!("{}{}", "\u{2022}".repeat(8), tail)
}

/// Fixed in-memory keys, for embedding and tests
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    keys: HashMap<String, String>,
}

impl StaticCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, provider: &str, api_key: &str) -> Self {
        self.keys.insert(provider.to_string(), api_key.to_string());
        self
    }
}

impl CredentialStore for StaticCredentials {
    fn has_credential(&self, provider: &str) -> Result<bool> {
        Ok(self.keys.contains_key(provider))
    }

    fn get_credential(&self, provider: &str) -> Result<String> {
        self.keys
            .get(provider)
            .cloned()
            .ok_or_else(|| YtsError::CredentialNotFound {
                provider: provider.to_string(),
            })
    }
}
