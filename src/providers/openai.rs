use serde::{Deserialize, Serialize};

use super::framing::{is_sse_metadata, sse_data, sse_event, Decoded, StreamDecoder};
use super::transport::{DeltaStream, StreamTransport};
use super::{GenerationRequest, ProviderKind};
use crate::config::ProviderSettings;
use crate::{Result, YtsError};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const ORGANIZATION_HEADER: &str = "OpenAI-Organization";

#[derive(Debug, Serialize)]
pub(crate) struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

/// Request body of `/v1/chat/completions`
#[derive(Debug, Serialize)]
pub(crate) struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

impl<'a> ChatRequest<'a> {
    pub(crate) fn new(
        model: &'a str,
        request: &'a GenerationRequest,
        temperature: Option<f32>,
        max_tokens: Option<u32>,
    ) -> Self {
        Self {
            model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: &request.content,
                },
            ],
            stream: true,
            temperature,
            max_tokens,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Decoder for OpenAI-style `data: {json}` streams terminated by `data: [DONE]`
pub struct OpenAiDecoder {
    kind: ProviderKind,
    error_events: bool,
}

impl OpenAiDecoder {
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            error_events: false,
        }
    }

    /// LM Studio reports server-side failures as a bare `event: error` line
    pub fn lm_studio() -> Self {
        Self {
            kind: ProviderKind::LmStudio,
            error_events: true,
        }
    }

    fn protocol_error(&self, reason: impl Into<String>) -> YtsError {
        YtsError::VendorStreamProtocolError {
            provider: self.kind.display_name().to_string(),
            reason: reason.into(),
        }
    }
}

impl StreamDecoder for OpenAiDecoder {
    fn decode_line(&mut self, line: &str) -> Result<Decoded> {
        if let Some(event) = sse_event(line) {
            if self.error_events && event == "error" {
                return Err(self.protocol_error(
                    "the server reported an error; check the Developer tab > Developer Logs for details",
                ));
            }
            return Ok(Decoded::Skip);
        }

        if is_sse_metadata(line) {
            return Ok(Decoded::Skip);
        }

        let payload = sse_data(line).unwrap_or(line);
        if payload == "[DONE]" {
            return Ok(Decoded::Done(None));
        }

        let chunk: ChatChunk = serde_json::from_str(payload)
            .map_err(|e| self.protocol_error(format!("unreadable stream chunk ({}): {}", e, payload)))?;

        if let Some(error) = chunk.error {
            return Err(self.protocol_error(error.to_string()));
        }

        Ok(chunk
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta.content)
            .map_or(Decoded::Skip, Decoded::Delta))
    }
}

/// Hosted OpenAI chat completions
pub struct OpenAiProvider {
    transport: StreamTransport,
    endpoint: String,
    model: String,
    api_key: String,
    org_id: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

impl OpenAiProvider {
    pub fn new(settings: &ProviderSettings, api_key: String) -> Result<Self> {
        let base_url = settings.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);

        Ok(Self {
            transport: StreamTransport::new(ProviderKind::OpenAi, settings)?,
            endpoint: format!("{}/v1/chat/completions", base_url.trim_end_matches('/')),
            model: settings.model.clone(),
            api_key,
            org_id: settings.org_id.clone().filter(|org| !org.is_empty()),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn open(&self, request: &GenerationRequest) -> Result<DeltaStream> {
        let body = ChatRequest::new(&self.model, request, self.temperature, self.max_tokens);
        tracing::debug!("Streaming from {} with model {}", self.endpoint, self.model);

        self.transport
            .open(
                |http| {
                    let builder = http
                        .post(&self.endpoint)
                        .bearer_auth(&self.api_key)
                        .json(&body);
                    match &self.org_id {
                        Some(org_id) => builder.header(ORGANIZATION_HEADER, org_id),
                        None => builder,
                    }
                },
                Box::new(OpenAiDecoder::new(ProviderKind::OpenAi)),
            )
            .await
    }
}
