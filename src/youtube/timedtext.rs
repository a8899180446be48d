use quick_xml::errors::IllFormedError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use url::Url;

use super::innertube::CaptionTrack;
use super::TimedTextEntry;
use crate::{Result, YtsError};

/// Marker YouTube adds to tracks that need a proof-of-origin token
const PO_TOKEN_MARKER: &str = "&exp=xpe";

/// Downloads and parses one caption track
pub struct TimedTextClient {
    http: reqwest::Client,
}

impl TimedTextClient {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// Fetch a caption track and parse it into cues, in document order
    pub async fn fetch(&self, video_id: &str, track: &CaptionTrack) -> Result<Vec<TimedTextEntry>> {
        if track.base_url.contains(PO_TOKEN_MARKER) {
            return Err(YtsError::PoTokenRequired {
                video_id: video_id.to_string(),
            });
        }

        let track_error = |reason: String| YtsError::TrackFetchFailed {
            video_id: video_id.to_string(),
            reason,
        };

        let url = strip_format_override(&track.base_url);
        let url = Url::parse(&url).map_err(|e| track_error(format!("bad track URL: {}", e)))?;

        tracing::debug!("Fetching {} caption track for {}", track.language_code, video_id);

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| track_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(track_error(format!("timed text endpoint returned status {}", status)));
        }

        let xml = response
            .text()
            .await
            .map_err(|e| track_error(e.to_string()))?;

        let entries = parse_timed_text(&xml).map_err(|e| YtsError::TranscriptParseFailed {
            video_id: video_id.to_string(),
            reason: e.to_string(),
        })?;

        if entries.is_empty() {
            return Err(YtsError::NoTranscriptFound {
                video_id: video_id.to_string(),
            });
        }

        Ok(entries)
    }
}

/// Drop any `fmt` query parameter so the endpoint answers in the default timed-text dialect.
/// The remaining parameters are kept byte for byte since the URL is signed.
pub fn strip_format_override(track_url: &str) -> String {
    let Some((base, query)) = track_url.split_once('?') else {
        return track_url.to_string();
    };

    let kept: Vec<&str> = query
        .split('&')
        .filter(|pair| !pair.is_empty() && !pair.starts_with("fmt="))
        .collect();

    if kept.is_empty() {
        base.to_string()
    } else {
        format!("{}?{}", base, kept.join("&"))
    }
}

/// Parse a timed-text document.
///
/// Each `<text start=".." dur="..">` element becomes one entry. Unreadable `start`/`dur`
/// attributes become `0.0`; only a broken document is an error. A document that ends
/// with elements still open is treated as truncated.
pub fn parse_timed_text(xml: &str) -> std::result::Result<Vec<TimedTextEntry>, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    let mut entries = Vec::new();
    let mut current: Option<(TimedTextEntry, String)> = None;
    let mut open: Vec<String> = Vec::new();

    loop {
        let event = reader.read_event()?;
        match &event {
            Event::Start(element) => {
                open.push(String::from_utf8_lossy(element.name().as_ref()).into_owned())
            }
            Event::End(_) => {
                open.pop();
            }
            _ => {}
        }

        match event {
            Event::Start(element) if element.name().as_ref() == b"text" => {
                current = Some((cue_from_attributes(&element), String::new()));
            }
            Event::Empty(element) if element.name().as_ref() == b"text" => {
                entries.push(cue_from_attributes(&element));
            }
            Event::Text(text) => {
                if let Some((_, buffer)) = current.as_mut() {
                    match text.unescape() {
                        Ok(unescaped) => buffer.push_str(&unescaped),
                        Err(_) => buffer.push_str(&String::from_utf8_lossy(&text)),
                    }
                }
            }
            Event::CData(data) => {
                if let Some((_, buffer)) = current.as_mut() {
                    buffer.push_str(&String::from_utf8_lossy(&data));
                }
            }
            Event::End(element) if element.name().as_ref() == b"text" => {
                if let Some((mut entry, raw_text)) = current.take() {
                    entry.text = html_escape::decode_html_entities(&raw_text).into_owned();
                    entries.push(entry);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(unclosed) = open.pop() {
        return Err(quick_xml::Error::IllFormed(IllFormedError::MissingEndTag(unclosed)));
    }

    Ok(entries)
}

fn cue_from_attributes(element: &BytesStart<'_>) -> TimedTextEntry {
    let mut entry = TimedTextEntry {
        text: String::new(),
        start: 0.0,
        duration: 0.0,
    };

    for attribute in element.attributes().flatten() {
        let seconds = || {
            std::str::from_utf8(&attribute.value)
                .ok()
                .and_then(|value| value.trim().parse::<f64>().ok())
                .filter(|value| value.is_finite())
                .unwrap_or(0.0)
        };

        match attribute.key.as_ref() {
            b"start" => entry.start = seconds(),
            b"dur" => entry.duration = seconds(),
            _ => {}
        }
    }

    entry
}
