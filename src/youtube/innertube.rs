use reqwest::header::ACCEPT_LANGUAGE;
use serde::{Deserialize, Serialize};

use crate::{Result, YtsError};

/// The Android client is served caption tracks for the widest range of videos
const CLIENT_NAME: &str = "ANDROID";
const CLIENT_VERSION: &str = "20.10.38";

#[derive(Debug, Serialize)]
struct PlayerRequest<'a> {
    context: PlayerContext,
    #[serde(rename = "videoId")]
    video_id: &'a str,
}

#[derive(Debug, Serialize)]
struct PlayerContext {
    client: ClientIdentity,
}

#[derive(Debug, Serialize)]
struct ClientIdentity {
    #[serde(rename = "clientName")]
    client_name: &'static str,
    #[serde(rename = "clientVersion")]
    client_version: &'static str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlayerResponse {
    #[serde(default)]
    playability_status: PlayabilityStatus,
    #[serde(default)]
    captions: Option<Captions>,
}

#[derive(Debug, Deserialize)]
struct Captions {
    #[serde(rename = "playerCaptionsTracklistRenderer", default)]
    renderer: Option<TracklistRenderer>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TracklistRenderer {
    #[serde(default)]
    caption_tracks: Vec<RawCaptionTrack>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCaptionTrack {
    base_url: String,
    #[serde(default)]
    language_code: String,
    #[serde(default)]
    name: Option<TrackName>,
    #[serde(default)]
    kind: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrackName {
    #[serde(default)]
    runs: Vec<TextRun>,
    #[serde(default)]
    simple_text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TextRun {
    text: String,
}

/// Playability verdict returned alongside the caption catalog
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct PlayabilityStatus {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub reason: Option<String>,
}

impl PlayabilityStatus {
    pub fn is_ok(&self) -> bool {
        self.status == "OK"
    }
}

/// Whether a track was uploaded by a person or produced by speech recognition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackKind {
    Manual,
    AutoGenerated,
}

/// One caption stream offered for a video
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionTrack {
    /// Timed-text URL of the track
    pub base_url: String,

    /// BCP-47 language code such as `en` or `pt-BR`
    pub language_code: String,

    /// Display name, falls back to the language code
    pub name: String,

    pub kind: TrackKind,
}

impl From<RawCaptionTrack> for CaptionTrack {
    fn from(raw: RawCaptionTrack) -> Self {
        let name = raw
            .name
            .and_then(|name| {
                name.runs
                    .into_iter()
                    .next()
                    .map(|run| run.text)
                    .or(name.simple_text)
            })
            .unwrap_or_else(|| raw.language_code.clone());

        let kind = match raw.kind.as_deref() {
            Some("asr") => TrackKind::AutoGenerated,
            _ => TrackKind::Manual,
        };

        Self {
            base_url: raw.base_url,
            language_code: raw.language_code,
            name,
            kind,
        }
    }
}

/// Caption tracks and playability reported by the player endpoint
#[derive(Debug, Clone)]
pub struct CaptionCatalog {
    pub playability: PlayabilityStatus,
    pub tracks: Vec<CaptionTrack>,
}

impl CaptionCatalog {
    /// Decode a player endpoint response body
    pub fn from_json(body: &str) -> serde_json::Result<Self> {
        let response: PlayerResponse = serde_json::from_str(body)?;

        let tracks = response
            .captions
            .and_then(|captions| captions.renderer)
            .map(|renderer| renderer.caption_tracks)
            .unwrap_or_default()
            .into_iter()
            .map(CaptionTrack::from)
            .collect();

        Ok(Self {
            playability: response.playability_status,
            tracks,
        })
    }

    /// The track list, once the video is known to be playable and captioned
    pub fn playable_tracks(self, video_id: &str) -> Result<Vec<CaptionTrack>> {
        if !self.playability.is_ok() {
            return Err(YtsError::VideoNotPlayable {
                video_id: video_id.to_string(),
                status: self.playability.status,
                reason: self.playability.reason.unwrap_or_default(),
            });
        }

        if self.tracks.is_empty() {
            return Err(YtsError::NoTranscriptFound {
                video_id: video_id.to_string(),
            });
        }

        Ok(self.tracks)
    }
}

/// Language preference used to pick one track out of a catalog
#[derive(Debug, Clone, Default)]
pub struct TrackPreference {
    pub languages: Vec<String>,
}

impl TrackPreference {
    pub fn new(languages: Vec<String>) -> Self {
        Self { languages }
    }

    /// Pick a track: per preferred language a manual track beats an auto-generated one; with no
    /// preference or no match the first track is used
    pub fn choose<'a>(&self, tracks: &'a [CaptionTrack]) -> Option<&'a CaptionTrack> {
        for language in &self.languages {
            let candidates = || {
                tracks
                    .iter()
                    .filter(move |track| track.language_code.eq_ignore_ascii_case(language))
            };

            if let Some(track) = candidates()
                .find(|track| track.kind == TrackKind::Manual)
                .or_else(|| candidates().next())
            {
                return Some(track);
            }
        }

        if !self.languages.is_empty() {
            tracing::warn!(
                "No caption track in {:?}, falling back to the first available track",
                self.languages
            );
        }

        tracks.first()
    }
}

/// Client for the InnerTube player endpoint
pub struct CaptionCatalogClient {
    http: reqwest::Client,
    player_url: String,
}

impl CaptionCatalogClient {
    pub fn new(http: reqwest::Client, player_url: impl Into<String>) -> Self {
        Self {
            http,
            player_url: player_url.into(),
        }
    }

    /// Ask the player endpoint for the caption catalog of a video
    pub async fn fetch_catalog(&self, video_id: &str, api_key: &str) -> Result<CaptionCatalog> {
        let url = format!("{}?key={}", self.player_url, urlencoding::encode(api_key));
        let body = PlayerRequest {
            context: PlayerContext {
                client: ClientIdentity {
                    client_name: CLIENT_NAME,
                    client_version: CLIENT_VERSION,
                },
            },
            video_id,
        };

        let catalog_error = |reason: String| YtsError::CatalogFetchFailed {
            video_id: video_id.to_string(),
            reason,
        };

        tracing::debug!("Requesting caption catalog for {}", video_id);

        let response = self
            .http
            .post(&url)
            .header(ACCEPT_LANGUAGE, "en-US")
            .json(&body)
            .send()
            .await
            .map_err(|e| catalog_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(catalog_error(format!("InnerTube API returned status {}", status)));
        }

        let text = response
            .text()
            .await
            .map_err(|e| catalog_error(e.to_string()))?;

        let catalog = CaptionCatalog::from_json(&text)
            .map_err(|e| catalog_error(format!("unreadable InnerTube response: {}", e)))?;

        tracing::debug!(
            "Catalog for {}: status {}, {} track(s)",
            video_id,
            catalog.playability.status,
            catalog.tracks.len()
        );

        Ok(catalog)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"{
        "playabilityStatus": {"status": "OK"},
        "captions": {"playerCaptionsTracklistRenderer": {"captionTracks": [
            {"baseUrl": "https://www.youtube.com/api/timedtext?v=x&lang=en&kind=asr", "name": {"runs": [{"text": "English (auto-generated)"}]}, "languageCode": "en", "kind": "asr"},
            {"baseUrl": "https://www.youtube.com/api/timedtext?v=x&lang=de", "name": {"simpleText": "German"}, "languageCode": "de"},
            {"baseUrl": "https://www.youtube.com/api/timedtext?v=x&lang=en", "languageCode": "en"}
        ]}}
    }"#;

    #[test]
    fn test_request_shape() {
        let request = PlayerRequest {
            context: PlayerContext {
                client: ClientIdentity {
                    client_name: CLIENT_NAME,
                    client_version: CLIENT_VERSION,
                },
            },
            video_id: "dQw4w9WgXcQ",
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "context": {"client": {"clientName": "ANDROID", "clientVersion": "20.10.38"}},
                "videoId": "dQw4w9WgXcQ"
            })
        );
    }

    #[test]
    fn test_decode_catalog() {
        let catalog = CaptionCatalog::from_json(CATALOG).unwrap();
        assert!(catalog.playability.is_ok());
        assert_eq!(catalog.tracks.len(), 3);
        assert_eq!(catalog.tracks[0].kind, TrackKind::AutoGenerated);
        assert_eq!(catalog.tracks[0].name, "English (auto-generated)");
        assert_eq!(catalog.tracks[1].name, "German");
        assert_eq!(catalog.tracks[2].name, "en");
        assert_eq!(catalog.tracks[2].kind, TrackKind::Manual);
    }

    #[test]
    fn test_unplayable_video_short_circuits() {
        let body = r#"{
            "playabilityStatus": {"status": "ERROR", "reason": "Video unavailable"},
            "captions": {"playerCaptionsTracklistRenderer": {"captionTracks": [
                {"baseUrl": "https://example.com/t", "languageCode": "en"}
            ]}}
        }"#;
        let catalog = CaptionCatalog::from_json(body).unwrap();
        match catalog.playable_tracks("abc") {
            Err(YtsError::VideoNotPlayable { video_id, status, reason }) => {
                assert_eq!(video_id, "abc");
                assert_eq!(status, "ERROR");
                assert_eq!(reason, "Video unavailable");
            }
            other => panic!("expected VideoNotPlayable, got {other:?}"),
        }
    }

    #[test]
    fn test_playable_without_tracks() {
        let catalog = CaptionCatalog::from_json(r#"{"playabilityStatus": {"status": "OK"}}"#).unwrap();
        assert!(matches!(
            catalog.playable_tracks("abc"),
            Err(YtsError::NoTranscriptFound { .. })
        ));
    }

    #[test]
    fn test_preference_defaults_to_first_track() {
        let tracks = CaptionCatalog::from_json(CATALOG).unwrap().tracks;
        let chosen = TrackPreference::default().choose(&tracks).unwrap();
        assert_eq!(chosen.base_url, tracks[0].base_url);
    }

    #[test]
    fn test_preference_favours_manual_tracks() {
        let tracks = CaptionCatalog::from_json(CATALOG).unwrap().tracks;

        let english = TrackPreference::new(vec!["en".to_string()]);
        assert_eq!(english.choose(&tracks).unwrap().kind, TrackKind::Manual);
        assert_eq!(english.choose(&tracks).unwrap().language_code, "en");

        let german_first = TrackPreference::new(vec!["fr".to_string(), "DE".to_string()]);
        assert_eq!(german_first.choose(&tracks).unwrap().language_code, "de");

        let unknown = TrackPreference::new(vec!["ja".to_string()]);
        assert_eq!(unknown.choose(&tracks).unwrap().base_url, tracks[0].base_url);
    }
}
