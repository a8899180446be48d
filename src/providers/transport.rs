use futures_util::stream::{self, BoxStream};
use futures_util::{Stream, StreamExt};
use std::time::Duration;

use super::framing::{Decoded, LineBuffer, StreamDecoder};
use super::retry::{with_retries, Backoff};
use super::ProviderKind;
use crate::config::ProviderSettings;
use crate::{Result, YtsError};

/// HTTP plumbing shared by every vendor client
pub(crate) struct StreamTransport {
    http: reqwest::Client,
    kind: ProviderKind,
    timeout: Duration,
    max_retries: u32,
}

impl StreamTransport {
    pub(crate) fn new(kind: ProviderKind, settings: &ProviderSettings) -> Result<Self> {
        let timeout = Duration::from_secs(settings.timeout_secs.max(1));
        let http = reqwest::Client::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(YtsError::HttpClient)?;

        Ok(Self {
            http,
            kind,
            timeout,
            max_retries: settings.max_retries,
        })
    }

    /// Send the request built by `build` and hand the body to `decoder`.
    ///
    /// Connection failures, timeouts, 429 and 5xx responses are retried with backoff. Nothing is
    /// retried once the body is being read.
    pub(crate) async fn open<F>(&self, build: F, decoder: Box<dyn StreamDecoder>) -> Result<DeltaStream>
    where
        F: Fn(&reqwest::Client) -> reqwest::RequestBuilder,
    {
        let response = with_retries(self.kind, Backoff::new(self.max_retries), || {
            self.send_once(build(&self.http))
        })
        .await?;

        Ok(DeltaStream::from_response(self.kind, response, decoder, Some(self.timeout)))
    }

    async fn send_once(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let provider = self.kind.display_name();

        let response = tokio::time::timeout(self.timeout, request.send())
            .await
            .map_err(|_| self.timed_out())?
            .map_err(|source| {
                if source.is_timeout() {
                    self.timed_out()
                } else {
                    YtsError::VendorUnreachable {
                        provider: provider.to_string(),
                        source,
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::debug!("{} answered {}: {}", provider, status, body);
            return Err(YtsError::VendorRequestFailed {
                provider: provider.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!("{} stream opened ({})", provider, status);
        Ok(response)
    }

    fn timed_out(&self) -> YtsError {
        YtsError::VendorTimeout {
            provider: self.kind.display_name().to_string(),
            secs: self.timeout.as_secs(),
        }
    }
}

/// A lazy, single-pass sequence of text deltas from one generation call.
///
/// Deltas come out in wire order. After the first `Err` or the end of the stream, `next`
/// returns `None`.
pub struct DeltaStream {
    kind: ProviderKind,
    body: BoxStream<'static, Result<Vec<u8>>>,
    decoder: Box<dyn StreamDecoder>,
    lines: LineBuffer,
    idle_timeout: Option<Duration>,
    body_done: bool,
    finished: bool,
}

impl DeltaStream {
    /// Decode an arbitrary sequence of body chunks
    pub fn from_chunks<S>(kind: ProviderKind, chunks: S, decoder: Box<dyn StreamDecoder>) -> Self
    where
        S: Stream<Item = Result<Vec<u8>>> + Send + 'static,
    {
        Self {
            kind,
            body: chunks.boxed(),
            decoder,
            lines: LineBuffer::new(),
            idle_timeout: None,
            body_done: false,
            finished: false,
        }
    }

    fn from_response(
        kind: ProviderKind,
        response: reqwest::Response,
        decoder: Box<dyn StreamDecoder>,
        idle_timeout: Option<Duration>,
    ) -> Self {
        let body = response.bytes_stream().map(move |chunk| {
            chunk
                .map(|bytes| bytes.to_vec())
                .map_err(|e| YtsError::VendorStreamProtocolError {
                    provider: kind.display_name().to_string(),
                    reason: format!("response body interrupted: {}", e),
                })
        });

        let mut deltas = Self::from_chunks(kind, body, decoder);
        deltas.idle_timeout = idle_timeout;
        deltas
    }

    pub fn provider(&self) -> ProviderKind {
        self.kind
    }

    /// Next text delta, reading more of the body as needed
    pub async fn next(&mut self) -> Option<Result<String>> {
        loop {
            if self.finished {
                return None;
            }

            match self.lines.next_line() {
                Some(Ok(line)) => {
                    if let Some(item) = self.decode(&line) {
                        return Some(item);
                    }
                    continue;
                }
                Some(Err(e)) => {
                    self.finished = true;
                    return Some(Err(self.protocol_error(format!("invalid UTF-8 in stream: {}", e))));
                }
                None => {}
            }

            if self.body_done {
                self.finished = true;
                return self.decoder.finish().err().map(Err);
            }

            match self.read_chunk().await {
                Ok(Some(chunk)) => self.lines.push(&chunk),
                Ok(None) => {
                    self.body_done = true;
                    self.lines.close();
                }
                Err(e) => {
                    self.finished = true;
                    return Some(Err(e));
                }
            }
        }
    }

    /// Adapt into a `futures` stream
    pub fn into_stream(self) -> impl Stream<Item = Result<String>> {
        stream::unfold(self, |mut deltas| async move {
            deltas.next().await.map(|item| (item, deltas))
        })
    }

    async fn read_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        let next = match self.idle_timeout {
            Some(idle) => tokio::time::timeout(idle, self.body.next())
                .await
                .map_err(|_| YtsError::VendorTimeout {
                    provider: self.kind.display_name().to_string(),
                    secs: idle.as_secs(),
                })?,
            None => self.body.next().await,
        };

        next.transpose()
    }

    fn decode(&mut self, line: &str) -> Option<Result<String>> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        match self.decoder.decode_line(line) {
            Ok(Decoded::Skip) => None,
            Ok(Decoded::Delta(text)) => (!text.is_empty()).then_some(Ok(text)),
            Ok(Decoded::Done(last)) => {
                self.finished = true;
                last.filter(|text| !text.is_empty()).map(Ok)
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }

    fn protocol_error(&self, reason: String) -> YtsError {
        YtsError::VendorStreamProtocolError {
            provider: self.kind.display_name().to_string(),
            reason,
        }
    }
}
