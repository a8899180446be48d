use regex::Regex;
use reqwest::header::{ACCEPT_LANGUAGE, USER_AGENT};
use std::sync::LazyLock;

use crate::{Result, YtsError};

/// Desktop browser identity; YouTube serves a stripped page to unknown agents
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// The title suffix and the InnerTube key are only stable on the English page
const PAGE_LANGUAGE: &str = "en-US,en;q=0.9";

const RECAPTCHA_MARKER: &str = "class=\"g-recaptcha\"";

static INNERTUBE_API_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""INNERTUBE_API_KEY":\s*"([a-zA-Z0-9_-]+)""#).expect("valid API key pattern")
});

/// Downloads the public watch page of a video
pub struct WatchPageClient {
    http: reqwest::Client,
    watch_url: String,
}

impl WatchPageClient {
    pub fn new(http: reqwest::Client, watch_url: impl Into<String>) -> Self {
        Self {
            http,
            watch_url: watch_url.into(),
        }
    }

    /// Fetch the raw HTML of the watch page. Not retried.
    pub async fn get(&self, video_id: &str) -> Result<String> {
        let url = format!("{}?v={}", self.watch_url, video_id);
        tracing::debug!("Fetching watch page: {}", url);

        let page_error = |source| YtsError::PageFetchFailed {
            video_id: video_id.to_string(),
            source,
        };

        let response = self
            .http
            .get(&url)
            .header(USER_AGENT, BROWSER_USER_AGENT)
            .header(ACCEPT_LANGUAGE, PAGE_LANGUAGE)
            .send()
            .await
            .map_err(page_error)?;

        let html = response.text().await.map_err(page_error)?;
        tracing::debug!("Watch page for {} is {} bytes", video_id, html.len());

        Ok(html)
    }
}

/// Pull the video title out of the watch page
pub fn extract_title(html: &str, video_id: &str) -> Result<String> {
    let (_, after_open) = html
        .split_once("<title>")
        .ok_or_else(|| YtsError::TitleNotFound {
            video_id: video_id.to_string(),
        })?;

    let raw_title = after_open
        .split_once(" - YouTube</title>")
        .or_else(|| after_open.split_once("</title>"))
        .map(|(title, _)| title)
        .unwrap_or(after_open);

    Ok(html_escape::decode_html_entities(raw_title).into_owned())
}

/// Pull the InnerTube API key out of the watch page.
///
/// A page without a key is either a reCAPTCHA interstitial ([`YtsError::IpBlocked`]) or a layout
/// we do not understand ([`YtsError::ApiKeyNotFound`]).
pub fn extract_api_key(html: &str, video_id: &str) -> Result<String> {
    if let Some(key) = INNERTUBE_API_KEY
        .captures(html)
        .and_then(|captures| captures.get(1))
    {
        return Ok(key.as_str().to_string());
    }

    if html.contains(RECAPTCHA_MARKER) {
        tracing::warn!("reCAPTCHA served instead of the watch page for {}", video_id);
        return Err(YtsError::IpBlocked {
            video_id: video_id.to_string(),
        });
    }

    Err(YtsError::ApiKeyNotFound {
        video_id: video_id.to_string(),
    })
}
