use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod claude;
pub mod framing;
pub mod lmstudio;
pub mod ollama;
pub mod openai;
mod retry;
mod transport;

pub use claude::{ClaudeDecoder, ClaudeProvider};
pub use framing::{Decoded, LineBuffer, StreamDecoder};
pub use lmstudio::LmStudioProvider;
pub use ollama::{OllamaDecoder, OllamaProvider};
pub use openai::{OpenAiDecoder, OpenAiProvider};
pub use transport::DeltaStream;

use crate::config::{Config, CredentialStore, ProviderSettings};
use crate::{Result, YtsError};

/// The supported language model backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    LmStudio,
    Ollama,
    Claude,
    OpenAi,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 4] = [
        ProviderKind::LmStudio,
        ProviderKind::Ollama,
        ProviderKind::Claude,
        ProviderKind::OpenAi,
    ];

    /// Name used in the config file, on the command line and as the keyring user
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::LmStudio => "lmstudio",
            ProviderKind::Ollama => "ollama",
            ProviderKind::Claude => "claude",
            ProviderKind::OpenAi => "openai",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderKind::LmStudio => "LM Studio",
            ProviderKind::Ollama => "Ollama",
            ProviderKind::Claude => "Claude",
            ProviderKind::OpenAi => "OpenAI",
        }
    }

    /// Hosted vendors need an API key from the credential store
    pub fn requires_credential(&self) -> bool {
        matches!(self, ProviderKind::Claude | ProviderKind::OpenAi)
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = YtsError;

    fn from_str(name: &str) -> Result<Self> {
        let normalized = name.trim().to_lowercase();
        ProviderKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| YtsError::UnsupportedProvider(name.to_string()))
    }
}

/// Instructions plus the text they apply to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub system_prompt: String,
    pub content: String,
}

impl GenerationRequest {
    pub fn new(system_prompt: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            content: content.into(),
        }
    }
}

/// A configured client for one backend.
///
/// All variants honour the same contract: deltas arrive in wire order, empty deltas are never
/// surfaced and the first error ends the stream.
pub enum Provider {
    LmStudio(LmStudioProvider),
    Ollama(OllamaProvider),
    Claude(ClaudeProvider),
    OpenAi(OpenAiProvider),
}

impl Provider {
    /// Build a client for `kind`; hosted vendors require `api_key`
    pub fn new(kind: ProviderKind, settings: &ProviderSettings, api_key: Option<String>) -> Result<Self> {
        let missing = || YtsError::CredentialNotFound {
            provider: kind.as_str().to_string(),
        };

        Ok(match kind {
            ProviderKind::LmStudio => Provider::LmStudio(LmStudioProvider::new(settings)?),
            ProviderKind::Ollama => Provider::Ollama(OllamaProvider::new(settings)?),
            ProviderKind::Claude => {
                Provider::Claude(ClaudeProvider::new(settings, api_key.ok_or_else(missing)?)?)
            }
            ProviderKind::OpenAi => {
                Provider::OpenAi(OpenAiProvider::new(settings, api_key.ok_or_else(missing)?)?)
            }
        })
    }

    pub fn kind(&self) -> ProviderKind {
        match self {
            Provider::LmStudio(_) => ProviderKind::LmStudio,
            Provider::Ollama(_) => ProviderKind::Ollama,
            Provider::Claude(_) => ProviderKind::Claude,
            Provider::OpenAi(_) => ProviderKind::OpenAi,
        }
    }

    pub fn model(&self) -> &str {
        match self {
            Provider::LmStudio(provider) => provider.model(),
            Provider::Ollama(provider) => provider.model(),
            Provider::Claude(provider) => provider.model(),
            Provider::OpenAi(provider) => provider.model(),
        }
    }

    /// Start a generation and return its deltas as a pull-based stream
    pub async fn open(&self, request: &GenerationRequest) -> Result<DeltaStream> {
        match self {
            Provider::LmStudio(provider) => provider.open(request).await,
            Provider::Ollama(provider) => provider.open(request).await,
            Provider::Claude(provider) => provider.open(request).await,
            Provider::OpenAi(provider) => provider.open(request).await,
        }
    }

    /// Run a generation, handing every non-empty delta to `on_chunk` as it is decoded.
    ///
    /// Deltas already delivered stay delivered when a later line fails. `on_chunk` runs inline
    /// with body consumption and must not block.
    pub async fn stream<F>(&self, request: &GenerationRequest, mut on_chunk: F) -> Result<()>
    where
        F: FnMut(&str),
    {
        let mut deltas = self.open(request).await?;
        while let Some(delta) = deltas.next().await {
            on_chunk(&delta?);
        }
        Ok(())
    }
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider")
            .field("kind", &self.kind())
            .field("model", &self.model())
            .finish()
    }
}

/// Summary of one backend for listings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderStatus {
    pub kind: ProviderKind,

    /// Configured model name
    pub model: String,

    /// Configured base URL, `None` for the vendor default
    pub base_url: Option<String>,

    /// Whether this is the configured default provider
    pub active: bool,

    /// Whether everything needed to call the provider is available
    pub ready: bool,
}

/// Resolves provider names to configured clients
pub struct ProviderRegistry<'a> {
    config: &'a Config,
    credentials: &'a dyn CredentialStore,
}

impl<'a> ProviderRegistry<'a> {
    pub fn new(config: &'a Config, credentials: &'a dyn CredentialStore) -> Self {
        Self { config, credentials }
    }

    /// Client for the provider named in the configuration
    pub fn resolve(&self) -> Result<Provider> {
        self.resolve_named(&self.config.provider)
    }

    /// Client for an explicitly named provider, e.g. a command-line override.
    ///
    /// Missing API keys are reported before any network activity.
    pub fn resolve_named(&self, name: &str) -> Result<Provider> {
        let kind: ProviderKind = name.parse()?;
        let settings = self.config.providers.get(kind);

        let api_key = if kind.requires_credential() {
            if !self.credentials.has_credential(kind.as_str())? {
                return Err(YtsError::CredentialNotFound {
                    provider: kind.as_str().to_string(),
                });
            }
            Some(self.credentials.get_credential(kind.as_str())?)
        } else {
            None
        };

        tracing::debug!("Resolved provider {} with model {}", kind.display_name(), settings.model);
        Provider::new(kind, settings, api_key)
    }

    fn credential_ready(&self, kind: ProviderKind) -> bool {
        match self.credentials.has_credential(kind.as_str()) {
            Ok(ready) => ready,
            Err(e) => {
                tracing::warn!("{}", e);
                false
            }
        }
    }

    /// Every supported backend with its configuration and readiness
    pub fn list_providers(&self) -> Vec<ProviderStatus> {
        let active = self.config.provider.parse::<ProviderKind>().ok();

        ProviderKind::ALL
            .into_iter()
            .map(|kind| {
                let settings = self.config.providers.get(kind);
                ProviderStatus {
                    kind,
                    model: settings.model.clone(),
                    base_url: settings.base_url.clone(),
                    active: active == Some(kind),
                    ready: !kind.requires_credential() || self.credential_ready(kind),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MockCredentialStore;
    use mockall::predicate::eq;

    fn config_with(provider: &str) -> Config {
        Config {
            provider: provider.to_string(),
            ..Config::default()
        }
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!("lmstudio".parse::<ProviderKind>().unwrap(), ProviderKind::LmStudio);
        assert_eq!("Claude".parse::<ProviderKind>().unwrap(), ProviderKind::Claude);
        assert_eq!(" OPENAI ".parse::<ProviderKind>().unwrap(), ProviderKind::OpenAi);
        assert!(matches!(
            "gemini".parse::<ProviderKind>(),
            Err(YtsError::UnsupportedProvider(name)) if name == "gemini"
        ));
    }

    #[test]
    fn test_kind_names_round_trip() {
        for kind in ProviderKind::ALL {
            assert_eq!(kind.to_string().parse::<ProviderKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_local_providers_skip_credential_store() {
        let config = config_with("ollama");
        let store = MockCredentialStore::new();
        let registry = ProviderRegistry::new(&config, &store);

        let provider = registry.resolve().unwrap();
        assert_eq!(provider.kind(), ProviderKind::Ollama);
        assert_eq!(provider.model(), "llama3.2");

        let provider = registry.resolve_named("LMStudio").unwrap();
        assert_eq!(provider.kind(), ProviderKind::LmStudio);
    }

    #[test]
    fn test_missing_credential_is_reported_before_lookup() {
        let config = config_with("claude");
        let mut store = MockCredentialStore::new();
        store
            .expect_has_credential()
            .with(eq("claude"))
            .times(1)
            .returning(|_| Ok(false));
        store.expect_get_credential().times(0);

        let registry = ProviderRegistry::new(&config, &store);
        match registry.resolve() {
            Err(YtsError::CredentialNotFound { provider }) => assert_eq!(provider, "claude"),
            other => panic!("expected a missing credential, got {other:?}"),
        }
    }

    #[test]
    fn test_hosted_provider_with_credential() {
        let config = config_with("lmstudio");
        let mut store = MockCredentialStore::new();
        store.expect_has_credential().with(eq("openai")).returning(|_| Ok(true));
        store
            .expect_get_credential()
            .with(eq("openai"))
            .times(1)
            .returning(|_| Ok("sk-test".to_string()));

        let registry = ProviderRegistry::new(&config, &store);
        let provider = registry.resolve_named("openai").unwrap();
        assert_eq!(provider.kind(), ProviderKind::OpenAi);
        assert_eq!(provider.model(), "gpt-4o-mini");
    }

    #[test]
    fn test_store_failure_is_propagated() {
        let config = config_with("openai");
        let mut store = MockCredentialStore::new();
        store.expect_has_credential().returning(|_| Ok(true));
        store.expect_get_credential().returning(|provider| {
            Err(YtsError::CredentialStoreFailed {
                provider: provider.to_string(),
                reason: "keychain locked".to_string(),
            })
        });

        let registry = ProviderRegistry::new(&config, &store);
        assert!(matches!(
            registry.resolve(),
            Err(YtsError::CredentialStoreFailed { .. })
        ));
    }

    #[test]
    fn test_lookup_failure_is_not_a_missing_key() {
        let config = config_with("claude");
        let mut store = MockCredentialStore::new();
        store.expect_has_credential().with(eq("claude")).returning(|provider| {
            Err(YtsError::CredentialStoreFailed {
                provider: provider.to_string(),
                reason: "dbus unavailable".to_string(),
            })
        });
        store.expect_get_credential().times(0);

        let registry = ProviderRegistry::new(&config, &store);
        match registry.resolve() {
            Err(YtsError::CredentialStoreFailed { provider, reason }) => {
                assert_eq!(provider, "claude");
                assert_eq!(reason, "dbus unavailable");
            }
            other => panic!("expected a store failure, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_provider() {
        let config = config_with("gemini");
        let store = MockCredentialStore::new();
        let registry = ProviderRegistry::new(&config, &store);
        assert!(matches!(registry.resolve(), Err(YtsError::UnsupportedProvider(_))));
    }

    #[test]
    fn test_list_providers() {
        let config = config_with("claude");
        let mut store = MockCredentialStore::new();
        store
            .expect_has_credential()
            .returning(|provider| match provider {
                "claude" => Ok(true),
                "openai" => Err(YtsError::CredentialStoreFailed {
                    provider: provider.to_string(),
                    reason: "keychain locked".to_string(),
                }),
                _ => Ok(false),
            });

        let registry = ProviderRegistry::new(&config, &store);
        let listing = registry.list_providers();

        assert_eq!(listing.len(), 4);
        let claude = listing.iter().find(|status| status.kind == ProviderKind::Claude).unwrap();
        assert!(claude.active && claude.ready);
        let openai = listing.iter().find(|status| status.kind == ProviderKind::OpenAi).unwrap();
        assert!(!openai.active && !openai.ready);
        assert!(listing.iter().filter(|status| status.active).count() == 1);
    }

    #[tokio::test]
    async fn test_stream_delivers_deltas_before_failure() {
        let chunks = futures_util::stream::iter(vec![Ok(
            b"{\"response\":\"a\",\"done\":false}\n{\"error\":\"boom\"}\n".to_vec(),
        )]);
        let mut deltas = DeltaStream::from_chunks(ProviderKind::Ollama, chunks, Box::new(OllamaDecoder));

        let mut seen = Vec::new();
        let mut failure = None;
        while let Some(delta) = deltas.next().await {
            match delta {
                Ok(text) => seen.push(text),
                Err(e) => failure = Some(e),
            }
        }

        assert_eq!(seen, vec!["a"]);
        assert!(failure.is_some());
    }
}
