use regex::Regex;
use std::sync::LazyLock;

use crate::{Result, YtsError};

/// Patterns tried in order; the first capture wins
static VIDEO_ID_PATTERNS: LazyLock<[Regex; 2]> = LazyLock::new(|| {
    [
        Regex::new(r"(?:v=|/)([0-9A-Za-z_-]{11})").expect("valid video ID pattern"),
        Regex::new(r"(?:youtu\.be/)([0-9A-Za-z_-]{11})").expect("valid short URL pattern"),
    ]
});

/// Extract the 11-character video ID from a watch, embed, shorts or youtu.be URL
pub fn extract_video_id(url: &str) -> Result<String> {
    VIDEO_ID_PATTERNS
        .iter()
        .find_map(|pattern| pattern.captures(url))
        .and_then(|captures| captures.get(1))
        .map(|id| id.as_str().to_string())
        .ok_or_else(|| YtsError::InvalidUrl(url.to_string()))
}
