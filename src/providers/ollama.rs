use serde::{Deserialize, Serialize};

use super::framing::{Decoded, StreamDecoder};
use super::transport::{DeltaStream, StreamTransport};
use super::{GenerationRequest, ProviderKind};
use crate::config::ProviderSettings;
use crate::{Result, YtsError};

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
    #[serde(skip_serializing_if = "GenerateOptions::is_empty")]
    options: GenerateOptions,
}

#[derive(Debug, Default, Serialize)]
struct GenerateOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

impl GenerateOptions {
    fn is_empty(&self) -> bool {
        self.temperature.is_none() && self.num_predict.is_none()
    }
}

#[derive(Debug, Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Ollama has no system role on `/api/generate`, so both halves go into one prompt
fn build_prompt(request: &GenerationRequest) -> String {
    format!(
        "### System Instructions:\n{}\n\n### Content to Process:\n{}",
        request.system_prompt, request.content
    )
}

/// Decoder for Ollama's newline-delimited JSON objects
#[derive(Debug, Default)]
pub struct OllamaDecoder;

impl StreamDecoder for OllamaDecoder {
    fn decode_line(&mut self, line: &str) -> Result<Decoded> {
        let chunk: GenerateChunk =
            serde_json::from_str(line).map_err(|e| YtsError::VendorStreamProtocolError {
                provider: ProviderKind::Ollama.display_name().to_string(),
                reason: format!("unreadable stream chunk ({}): {}", e, line),
            })?;

        if let Some(error) = chunk.error {
            return Err(YtsError::VendorStreamProtocolError {
                provider: ProviderKind::Ollama.display_name().to_string(),
                reason: error,
            });
        }

        if chunk.done {
            return Ok(Decoded::Done(Some(chunk.response)));
        }

        Ok(Decoded::Delta(chunk.response))
    }
}

/// Local Ollama server
pub struct OllamaProvider {
    transport: StreamTransport,
    endpoint: String,
    model: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

impl OllamaProvider {
    pub fn new(settings: &ProviderSettings) -> Result<Self> {
        let base_url = settings.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);

        Ok(Self {
            transport: StreamTransport::new(ProviderKind::Ollama, settings)?,
            endpoint: format!("{}/api/generate", base_url.trim_end_matches('/')),
            model: settings.model.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn open(&self, request: &GenerationRequest) -> Result<DeltaStream> {
        let body = GenerateRequest {
            model: &self.model,
            prompt: build_prompt(request),
            stream: true,
            options: GenerateOptions {
                temperature: self.temperature,
                num_predict: self.max_tokens,
            },
        };
        tracing::debug!("Streaming from Ollama at {} with model {}", self.endpoint, self.model);

        self.transport
            .open(
                |http| http.post(&self.endpoint).json(&body),
                Box::new(OllamaDecoder),
            )
            .await
    }
}
