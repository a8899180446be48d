use serde::{Deserialize, Serialize};

use super::framing::{sse_data, sse_event, Decoded, StreamDecoder};
use super::transport::{DeltaStream, StreamTransport};
use super::{GenerationRequest, ProviderKind};
use crate::config::ProviderSettings;
use crate::{Result, YtsError};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    system: &'a str,
    messages: Vec<Message<'a>>,
    max_tokens: u32,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct StreamEvent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    delta: Option<EventDelta>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct EventDelta {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

fn protocol_error(reason: impl Into<String>) -> YtsError {
    YtsError::VendorStreamProtocolError {
        provider: ProviderKind::Claude.display_name().to_string(),
        reason: reason.into(),
    }
}

/// Decoder for the Messages API event stream.
///
/// Only `text_delta` content is surfaced. An `event: error` line makes the next `data:` payload
/// the error message.
#[derive(Debug, Default)]
pub struct ClaudeDecoder {
    awaiting_error: bool,
}

impl StreamDecoder for ClaudeDecoder {
    fn decode_line(&mut self, line: &str) -> Result<Decoded> {
        if self.awaiting_error {
            self.awaiting_error = false;
            return Err(match sse_data(line) {
                Some(payload) => protocol_error(payload),
                None => protocol_error("stream error (no details available)"),
            });
        }

        if let Some(event) = sse_event(line) {
            self.awaiting_error = event == "error";
            return Ok(Decoded::Skip);
        }

        let Some(payload) = sse_data(line) else {
            return Ok(Decoded::Skip);
        };

        let event: StreamEvent = serde_json::from_str(payload)
            .map_err(|e| protocol_error(format!("unreadable stream event ({}): {}", e, payload)))?;

        match event.kind.as_str() {
            "content_block_delta" => Ok(event
                .delta
                .filter(|delta| delta.kind == "text_delta")
                .and_then(|delta| delta.text)
                .map_or(Decoded::Skip, Decoded::Delta)),
            "message_stop" => Ok(Decoded::Done(None)),
            "error" => Err(protocol_error(
                event
                    .error
                    .map(|error| error.to_string())
                    .unwrap_or_else(|| payload.to_string()),
            )),
            _ => Ok(Decoded::Skip),
        }
    }

    fn finish(&mut self) -> Result<()> {
        if self.awaiting_error {
            return Err(protocol_error("stream error (no details available)"));
        }
        Ok(())
    }
}

/// Anthropic Messages API
pub struct ClaudeProvider {
    transport: StreamTransport,
    endpoint: String,
    model: String,
    api_key: String,
    temperature: Option<f32>,
    max_tokens: u32,
}

impl ClaudeProvider {
    pub fn new(settings: &ProviderSettings, api_key: String) -> Result<Self> {
        let base_url = settings.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);

        Ok(Self {
            transport: StreamTransport::new(ProviderKind::Claude, settings)?,
            endpoint: format!("{}/v1/messages", base_url.trim_end_matches('/')),
            model: settings.model.clone(),
            api_key,
            temperature: settings.temperature,
            max_tokens: settings.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn open(&self, request: &GenerationRequest) -> Result<DeltaStream> {
        let body = MessagesRequest {
            model: &self.model,
            system: &request.system_prompt,
            messages: vec![Message {
                role: "user",
                content: &request.content,
            }],
            max_tokens: self.max_tokens,
            stream: true,
            temperature: self.temperature,
        };
        tracing::debug!("Streaming from {} with model {}", self.endpoint, self.model);

        self.transport
            .open(
                |http| {
                    http.post(&self.endpoint)
                        .header("x-api-key", &self.api_key)
                        .header("anthropic-version", API_VERSION)
                        .json(&body)
                },
                Box::new(ClaudeDecoder::default()),
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    const HELLO_WORLD: &str = concat!(
        "event: message_start\n",
        "data: {\"type\":\"message_start\",\"message\":{\"id\":\"msg_1\",\"role\":\"assistant\"}}\n\n",
        "event: content_block_start\n",
        "data: {\"type\":\"content_block_start\",\"index\":0,\"content_block\":{\"type\":\"text\",\"text\":\"\"}}\n\n",
        "event: ping\n",
        "data: {\"type\":\"ping\"}\n\n",
        "event: content_block_delta\n",
        "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Hello\"}}\n\n",
        "event: content_block_delta\n",
        "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\" world\"}}\n\n",
        "event: content_block_stop\n",
        "data: {\"type\":\"content_block_stop\",\"index\":0}\n\n",
        "event: message_delta\n",
        "data: {\"type\":\"message_delta\",\"delta\":{\"stop_reason\":\"end_turn\"}}\n\n",
        "event: message_stop\n",
        "data: {\"type\":\"message_stop\"}\n\n",
    );

    async fn collect(body: &'static str, split_at: usize) -> Vec<Result<String>> {
        let (head, tail) = body.as_bytes().split_at(split_at);
        let chunks = stream::iter(vec![Ok(head.to_vec()), Ok(tail.to_vec())]);
        let mut deltas =
            DeltaStream::from_chunks(ProviderKind::Claude, chunks, Box::new(ClaudeDecoder::default()));

        let mut items = Vec::new();
        while let Some(item) = deltas.next().await {
            items.push(item);
        }
        items
    }

    #[tokio::test]
    async fn test_text_deltas_in_order() {
        for split_at in [0, 37, 300, HELLO_WORLD.len()] {
            let deltas: Vec<String> = collect(HELLO_WORLD, split_at)
                .await
                .into_iter()
                .map(|item| item.unwrap())
                .collect();
            assert_eq!(deltas, vec!["Hello", " world"], "split at {}", split_at);
        }
    }

    #[test]
    fn test_request_body() {
        let request = GenerationRequest::new("You summarize videos.", "transcript");
        let body = MessagesRequest {
            model: "claude-3-5-sonnet-latest",
            system: &request.system_prompt,
            messages: vec![Message {
                role: "user",
                content: &request.content,
            }],
            max_tokens: DEFAULT_MAX_TOKENS,
            stream: true,
            temperature: None,
        };

        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({
                "model": "claude-3-5-sonnet-latest",
                "system": "You summarize videos.",
                "messages": [{"role": "user", "content": "transcript"}],
                "max_tokens": 4096,
                "stream": true
            })
        );
    }

    #[test]
    fn test_non_text_deltas_are_skipped() {
        let mut decoder = ClaudeDecoder::default();
        let line = r#"data: {"type":"content_block_delta","index":1,"delta":{"type":"input_json_delta","partial_json":"{"}}"#;
        assert_eq!(decoder.decode_line(line).unwrap(), Decoded::Skip);
    }

    #[tokio::test]
    async fn test_error_event_payload_is_surfaced() {
        let body = concat!(
            "event: content_block_delta\n",
            "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Hi\"}}\n\n",
            "event: error\n",
            "data: {\"type\":\"error\",\"error\":{\"type\":\"overloaded_error\",\"message\":\"Overloaded\"}}\n\n",
        );
        let items = collect(body, 10).await;

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_deref().unwrap(), "Hi");
        match &items[1] {
            Err(YtsError::VendorStreamProtocolError { reason, .. }) => {
                assert!(reason.contains("Overloaded"))
            }
            other => panic!("expected a protocol error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_error_event_without_payload() {
        let items = collect("event: error\n", 3).await;
        assert_eq!(items.len(), 1);
        assert!(items[0]
            .as_ref()
            .unwrap_err()
            .to_string()
            .contains("no details available"));
    }
}
