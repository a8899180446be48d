//! yts - fetch YouTube transcripts and stream them through a language model
//!
//! The library has two halves. [`youtube`] turns a video URL into a [`Transcript`] by scraping
//! the watch page for an InnerTube key, asking the player endpoint for caption tracks and parsing
//! the timed-text XML of the chosen track. [`providers`] exposes one streaming contract over four
//! vendor wire protocols (LM Studio, Ollama, Claude and OpenAI).
//!
//! Every network operation is an `async fn`. Dropping the returned future aborts the request in
//! flight, so callers cancel with `tokio::select!` or `tokio::time::timeout`.

pub mod cli;
pub mod config;
pub mod output;
pub mod providers;
pub mod summarize;
pub mod utils;
pub mod youtube;

pub use cli::{Cli, Commands, TranscriptFormat};
pub use config::{Config, CredentialStore, KeyringStore, ProviderSettings, StaticCredentials};
pub use providers::{DeltaStream, GenerationRequest, Provider, ProviderKind, ProviderRegistry};
pub use summarize::{Report, SummaryPipeline, Task};
pub use youtube::{TimedTextEntry, Transcript, TranscriptFetcher, VideoReference};

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, YtsError>;

/// Error types specific to transcript acquisition and generation
#[derive(thiserror::Error, Debug)]
pub enum YtsError {
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),

    #[error("could not extract a video ID from URL: {0}")]
    InvalidUrl(String),

    #[error("failed to fetch the watch page for video {video_id}: {source}")]
    PageFetchFailed {
        video_id: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("could not find the <title> tag on the watch page for video {video_id}")]
    TitleNotFound { video_id: String },

    #[error("could not extract the InnerTube API key for video {video_id}")]
    ApiKeyNotFound { video_id: String },

    #[error("YouTube is blocking requests from this IP (reCAPTCHA served for video {video_id}); wait and retry, or switch networks")]
    IpBlocked { video_id: String },

    #[error("failed to fetch the caption catalog for video {video_id}: {reason}")]
    CatalogFetchFailed { video_id: String, reason: String },

    #[error("video {video_id} is not playable ({status}): {reason}")]
    VideoNotPlayable {
        video_id: String,
        status: String,
        reason: String,
    },

    #[error("no transcript found for video {video_id}")]
    NoTranscriptFound { video_id: String },

    #[error("the caption track for video {video_id} requires a proof-of-origin token")]
    PoTokenRequired { video_id: String },

    #[error("failed to fetch the caption track for video {video_id}: {reason}")]
    TrackFetchFailed { video_id: String, reason: String },

    #[error("failed to parse the transcript of video {video_id}: {reason}")]
    TranscriptParseFailed { video_id: String, reason: String },

    #[error("unsupported provider: {0} (expected one of lmstudio, ollama, claude, openai)")]
    UnsupportedProvider(String),

    #[error("no API key stored for {provider}; run `yts apikey set {provider}` first")]
    CredentialNotFound { provider: String },

    #[error("failed to read the API key for {provider}: {reason}")]
    CredentialStoreFailed { provider: String, reason: String },

    #[error("{provider} API error ({status}): {body}")]
    VendorRequestFailed {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("could not reach {provider}: {source}")]
    VendorUnreachable {
        provider: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{provider} did not respond within {secs}s")]
    VendorTimeout { provider: String, secs: u64 },

    #[error("{provider} streaming error: {reason}")]
    VendorStreamProtocolError { provider: String, reason: String },
}

impl YtsError {
    /// Whether establishing a vendor stream may be attempted again after this error
    pub fn is_retryable(&self) -> bool {
        match self {
            YtsError::VendorUnreachable { .. } | YtsError::VendorTimeout { .. } => true,
            YtsError::VendorRequestFailed { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}
