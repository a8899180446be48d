use super::openai::{ChatRequest, OpenAiDecoder};
use super::transport::{DeltaStream, StreamTransport};
use super::{GenerationRequest, ProviderKind};
use crate::config::ProviderSettings;
use crate::Result;

pub const DEFAULT_BASE_URL: &str = "http://localhost:1234";

/// Local LM Studio server speaking the OpenAI chat-completions dialect
pub struct LmStudioProvider {
    transport: StreamTransport,
    endpoint: String,
    model: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

impl LmStudioProvider {
    pub fn new(settings: &ProviderSettings) -> Result<Self> {
        let base_url = settings.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);

        Ok(Self {
            transport: StreamTransport::new(ProviderKind::LmStudio, settings)?,
            endpoint: format!("{}/v1/chat/completions", base_url.trim_end_matches('/')),
            model: settings.model.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub async fn open(&self, request: &GenerationRequest) -> Result<DeltaStream> {
        let body = ChatRequest::new(&self.model, request, self.temperature, self.max_tokens);
        tracing::debug!("Streaming from LM Studio at {} with model {}", self.endpoint, self.model);

        self.transport
            .open(
                |http| http.post(&self.endpoint).json(&body),
                Box::new(OpenAiDecoder::lm_studio()),
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::framing::{Decoded, StreamDecoder};
    use crate::YtsError;
    use futures_util::stream;

    fn settings(base_url: Option<&str>) -> ProviderSettings {
        ProviderSettings {
            base_url: base_url.map(str::to_string),
            ..ProviderSettings::for_kind(ProviderKind::LmStudio)
        }
    }

    #[test]
    fn test_endpoint_from_base_url() {
        let provider = LmStudioProvider::new(&settings(None)).unwrap();
        assert_eq!(provider.endpoint(), "http://localhost:1234/v1/chat/completions");

        let provider = LmStudioProvider::new(&settings(Some("http://10.0.0.5:1234/"))).unwrap();
        assert_eq!(provider.endpoint(), "http://10.0.0.5:1234/v1/chat/completions");
    }

    #[test]
    fn test_done_marker_without_space() {
        let mut decoder = OpenAiDecoder::lm_studio();
        assert_eq!(decoder.decode_line("data:[DONE]").unwrap(), Decoded::Done(None));
    }

    #[tokio::test]
    async fn test_error_event_ends_stream() {
        let body = concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"partial\"}}]}\n\n",
            "event: error\n",
            "data: {\"error\":\"model crashed\"}\n\n",
        );
        let chunks = stream::iter(vec![Ok(body.as_bytes().to_vec())]);
        let mut deltas =
            DeltaStream::from_chunks(ProviderKind::LmStudio, chunks, Box::new(OpenAiDecoder::lm_studio()));

        assert_eq!(deltas.next().await.unwrap().unwrap(), "partial");
        assert!(matches!(
            deltas.next().await,
            Some(Err(YtsError::VendorStreamProtocolError { .. }))
        ));
        assert!(deltas.next().await.is_none());
    }
}
