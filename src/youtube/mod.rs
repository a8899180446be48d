use serde::{Deserialize, Serialize};
use std::time::Duration;

pub mod innertube;
pub mod timedtext;
pub mod video_id;
pub mod watch_page;

pub use innertube::{CaptionCatalog, CaptionCatalogClient, CaptionTrack, TrackKind, TrackPreference};
pub use timedtext::{parse_timed_text, TimedTextClient};
pub use video_id::extract_video_id;
pub use watch_page::{extract_api_key, extract_title, WatchPageClient};

use crate::{Result, YtsError};

/// Per-request timeout for the watch page, player endpoint and caption track
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// A video resolved from a user-supplied URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoReference {
    /// 11-character video ID
    pub id: String,

    /// URL the ID was extracted from
    pub source_url: String,
}

impl VideoReference {
    pub fn parse(url: &str) -> Result<Self> {
        Ok(Self {
            id: extract_video_id(url)?,
            source_url: url.to_string(),
        })
    }
}

/// One subtitle cue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedTextEntry {
    /// Cue text with entities decoded
    pub text: String,

    /// Start offset in seconds
    pub start: f64,

    /// Duration in seconds
    pub duration: f64,
}

/// Title plus cues of a video, in the order the caption document lists them
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    pub video: VideoReference,
    pub title: String,
    pub language_code: String,
    pub entries: Vec<TimedTextEntry>,
}

impl Transcript {
    /// Cue texts joined by newlines, as sent to a model
    pub fn text(&self) -> String {
        let mut text = String::new();
        for entry in &self.entries {
            text.push_str(&entry.text);
            text.push('\n');
        }
        text
    }

    /// End of the last cue, in seconds
    pub fn duration(&self) -> f64 {
        self.entries
            .iter()
            .map(|entry| entry.start + entry.duration)
            .fold(0.0, f64::max)
    }
}

/// YouTube endpoints used by the acquisition pipeline
#[derive(Debug, Clone)]
pub struct YoutubeEndpoints {
    pub watch_url: String,
    pub player_url: String,
}

impl Default for YoutubeEndpoints {
    fn default() -> Self {
        Self {
            watch_url: "https://www.youtube.com/watch".to_string(),
            player_url: "https://www.youtube.com/youtubei/v1/player".to_string(),
        }
    }
}

/// Turns a video URL into a [`Transcript`]
pub struct TranscriptFetcher {
    watch_page: WatchPageClient,
    catalog: CaptionCatalogClient,
    timed_text: TimedTextClient,
    preference: TrackPreference,
}

impl TranscriptFetcher {
    /// Create a fetcher against the public YouTube endpoints
    pub fn new() -> Result<Self> {
        Self::with_endpoints(YoutubeEndpoints::default())
    }

    /// Create a fetcher against custom endpoints
    pub fn with_endpoints(endpoints: YoutubeEndpoints) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(YtsError::HttpClient)?;

        Ok(Self {
            watch_page: WatchPageClient::new(http.clone(), endpoints.watch_url),
            catalog: CaptionCatalogClient::new(http.clone(), endpoints.player_url),
            timed_text: TimedTextClient::new(http),
            preference: TrackPreference::default(),
        })
    }

    /// Prefer caption tracks in these languages
    pub fn with_preference(mut self, preference: TrackPreference) -> Self {
        self.preference = preference;
        self
    }

    /// Fetch the title and transcript of a video.
    ///
    /// Stages run strictly in order and the first failure is returned unchanged.
    pub async fn fetch(&self, url: &str) -> Result<Transcript> {
        let video = VideoReference::parse(url)?;
        tracing::info!("Fetching transcript for video {}", video.id);

        let html = self.watch_page.get(&video.id).await?;
        let title = extract_title(&html, &video.id)?;
        let api_key = extract_api_key(&html, &video.id)?;

        let tracks = self
            .catalog
            .fetch_catalog(&video.id, &api_key)
            .await?
            .playable_tracks(&video.id)?;

        let track = self
            .preference
            .choose(&tracks)
            .ok_or_else(|| YtsError::NoTranscriptFound {
                video_id: video.id.clone(),
            })?;
        tracing::info!("Using {} caption track \"{}\"", track.language_code, track.name);

        let entries = self.timed_text.fetch(&video.id, track).await?;
        tracing::info!("Fetched {} cues for \"{}\"", entries.len(), title);

        Ok(Transcript {
            language_code: track.language_code.clone(),
            video,
            title,
            entries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(text: &str, start: f64, duration: f64) -> TimedTextEntry {
        TimedTextEntry {
            text: text.to_string(),
            start,
            duration,
        }
    }

    #[test]
    fn test_transcript_text_keeps_cue_order() {
        let transcript = Transcript {
            video: VideoReference::parse("https://youtu.be/dQw4w9WgXcQ").unwrap(),
            title: "t".to_string(),
            language_code: "en".to_string(),
            entries: vec![entry("later cue", 9.0, 1.0), entry("earlier cue", 1.0, 2.5)],
        };

        assert_eq!(transcript.text(), "later cue\nearlier cue\n");
        assert_eq!(transcript.duration(), 10.0);
    }

    #[test]
    fn test_video_reference() {
        let video = VideoReference::parse("https://www.youtube.com/watch?v=dQw4w9WgXcQ").unwrap();
        assert_eq!(video.id, "dQw4w9WgXcQ");
        assert_eq!(video.source_url, "https://www.youtube.com/watch?v=dQw4w9WgXcQ");
    }
}
