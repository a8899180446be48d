use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub mod credentials;
pub mod prompts;

pub use credentials::{CredentialStore, KeyringStore, StaticCredentials, KEYRING_SERVICE};
pub use prompts::{render_query, PromptConfig};

#[cfg(test)]
pub use credentials::MockCredentialStore;

use crate::providers::{lmstudio, ollama, ProviderKind};

const CONFIG_DIR_NAME: &str = "yts";
const CONFIG_FILE_NAME: &str = "config.yaml";

pub const ENV_PROVIDER: &str = "YTS_PROVIDER";
pub const ENV_LLM_URL: &str = "YTS_LLM_URL";
pub const ENV_MODEL: &str = "YTS_MODEL";

const SETTABLE_FIELDS: [&str; 4] = ["base_url", "model", "timeout_secs", "max_retries"];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Provider used when none is given on the command line
    pub provider: String,

    /// Per-provider connection settings
    pub providers: ProvidersConfig,

    /// Caption track selection
    pub transcript: TranscriptConfig,

    /// System prompts
    pub prompts: PromptConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub lmstudio: ProviderSettings,
    pub ollama: ProviderSettings,
    pub claude: ProviderSettings,
    pub openai: ProviderSettings,
}

impl ProvidersConfig {
    pub fn get(&self, kind: ProviderKind) -> &ProviderSettings {
        match kind {
            ProviderKind::LmStudio => &self.lmstudio,
            ProviderKind::Ollama => &self.ollama,
            ProviderKind::Claude => &self.claude,
            ProviderKind::OpenAi => &self.openai,
        }
    }

    pub fn get_mut(&mut self, kind: ProviderKind) -> &mut ProviderSettings {
        match kind {
            ProviderKind::LmStudio => &mut self.lmstudio,
            ProviderKind::Ollama => &mut self.ollama,
            ProviderKind::Claude => &mut self.claude,
            ProviderKind::OpenAi => &mut self.openai,
        }
    }
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            lmstudio: ProviderSettings::for_kind(ProviderKind::LmStudio),
            ollama: ProviderSettings::for_kind(ProviderKind::Ollama),
            claude: ProviderSettings::for_kind(ProviderKind::Claude),
            openai: ProviderSettings::for_kind(ProviderKind::OpenAi),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// Server root; the vendor's public endpoint when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Model name passed through to the vendor
    #[serde(default)]
    pub model: String,

    /// Sampling temperature
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Upper bound on generated tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Connect, first-byte and idle-read timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Retries while establishing a stream
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// OpenAI organization ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_id: Option<String>,
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_max_retries() -> u32 {
    3
}

impl ProviderSettings {
    /// Built-in defaults for one provider
    pub fn for_kind(kind: ProviderKind) -> Self {
        let (base_url, model) = match kind {
            ProviderKind::LmStudio => (Some(lmstudio::DEFAULT_BASE_URL), "llama-3.2-3b-instruct"),
            ProviderKind::Ollama => (Some(ollama::DEFAULT_BASE_URL), "llama3.2"),
            ProviderKind::Claude => (None, "claude-3-5-sonnet-latest"),
            ProviderKind::OpenAi => (None, "gpt-4o-mini"),
        };

        Self {
            base_url: base_url.map(str::to_string),
            model: model.to_string(),
            temperature: Some(0.7),
            max_tokens: Some(4096),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            org_id: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptConfig {
    /// Preferred caption languages, most wanted first; empty takes the first listed track
    pub languages: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: ProviderKind::LmStudio.as_str().to_string(),
            providers: ProvidersConfig::default(),
            transcript: TranscriptConfig::default(),
            prompts: PromptConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from `path` (or the default location), apply environment overrides
    /// and validate the result
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::config_path()?,
        };

        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Read the file at `path`, creating it with defaults when missing
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = fs_err::read_to_string(path).context("Failed to read config file")?;

            let config: Config =
                serde_yaml::from_str(&content).context("Failed to parse config file")?;

            tracing::debug!("Loaded configuration from {}", path.display());
            Ok(config)
        } else {
            let config = Self::default();
            config.save_to(path)?;
            tracing::info!("Wrote default configuration to {}", path.display());
            Ok(config)
        }
    }

    /// Save configuration to `path`
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self).context("Failed to serialize config")?;

        fs_err::write(path, content).context("Failed to write config file")?;

        Ok(())
    }

    /// Default configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("Could not determine config directory")?;

        Ok(config_dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Apply `YTS_PROVIDER`, then `YTS_LLM_URL` and `YTS_MODEL` to the resulting provider
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(provider) = lookup(ENV_PROVIDER).filter(|value| !value.is_empty()) {
            tracing::debug!("{} overrides provider with {}", ENV_PROVIDER, provider);
            self.provider = provider;
        }

        let Ok(kind) = self.provider.parse::<ProviderKind>() else {
            return;
        };
        let settings = self.providers.get_mut(kind);

        if let Some(url) = lookup(ENV_LLM_URL).filter(|value| !value.is_empty()) {
            settings.base_url = Some(url);
        }
        if let Some(model) = lookup(ENV_MODEL).filter(|value| !value.is_empty()) {
            settings.model = model;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.provider
            .parse::<ProviderKind>()
            .with_context(|| format!("Invalid provider in config: {}", self.provider))?;

        for kind in ProviderKind::ALL {
            let settings = self.providers.get(kind);
            if settings.model.trim().is_empty() {
                anyhow::bail!("providers.{}.model must be set", kind);
            }
            if settings.timeout_secs == 0 {
                anyhow::bail!("providers.{}.timeout_secs must be greater than zero", kind);
            }
            if let Some(base_url) = &settings.base_url {
                url::Url::parse(base_url)
                    .with_context(|| format!("providers.{}.base_url is not a valid URL", kind))?;
            }
        }

        Ok(())
    }

    /// Keys accepted by [`Config::set_value`]
    pub fn settable_keys() -> Vec<String> {
        let mut keys = vec!["provider".to_string()];
        for kind in ProviderKind::ALL {
            for field in SETTABLE_FIELDS {
                keys.push(format!("providers.{}.{}", kind, field));
            }
        }
        keys.push(format!("providers.{}.org_id", ProviderKind::OpenAi));
        keys
    }

    /// Set one value by its dotted key, then validate the result
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        let key = key.trim().to_lowercase();
        let invalid_key = || {
            anyhow::anyhow!(
                "Invalid configuration key: {}\nValid keys: {}",
                key,
                Self::settable_keys().join(", ")
            )
        };

        if key == "provider" {
            let kind: ProviderKind = value
                .parse()
                .with_context(|| format!("Invalid provider: {}", value))?;
            self.provider = kind.as_str().to_string();
        } else {
            let mut parts = key.split('.');
            let (Some("providers"), Some(name), Some(field), None) =
                (parts.next(), parts.next(), parts.next(), parts.next())
            else {
                return Err(invalid_key());
            };
            let kind: ProviderKind = name.parse().map_err(|_| invalid_key())?;
            let settings = self.providers.get_mut(kind);

            match field {
                "base_url" => settings.base_url = Some(value.to_string()),
                "model" => settings.model = value.to_string(),
                "timeout_secs" => {
                    settings.timeout_secs = value
                        .parse()
                        .with_context(|| format!("{} must be a whole number of seconds", key))?
                }
                "max_retries" => {
                    settings.max_retries = value
                        .parse()
                        .with_context(|| format!("{} must be a whole number", key))?
                }
                "org_id" if kind == ProviderKind::OpenAi => {
                    settings.org_id = Some(value.to_string()).filter(|id| !id.is_empty())
                }
                _ => return Err(invalid_key()),
            }
        }

        self.validate()
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  Provider: {}", self.provider);
        for kind in ProviderKind::ALL {
            let settings = self.providers.get(kind);
            println!("  {}:", kind.display_name());
            println!(
                "    Base URL: {}",
                settings.base_url.as_deref().unwrap_or("(vendor default)")
            );
            println!("    Model: {}", settings.model);
            println!("    Timeout: {}s, retries: {}", settings.timeout_secs, settings.max_retries);
        }
        if self.transcript.languages.is_empty() {
            println!("  Caption languages: (first available)");
        } else {
            println!("  Caption languages: {}", self.transcript.languages.join(", "));
        }
    }
}
