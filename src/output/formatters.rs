use serde::Serialize;

use crate::youtube::{TimedTextEntry, Transcript};

/// Cue texts, one per line
pub fn format_as_text(transcript: &Transcript) -> String {
    transcript.text()
}

/// Cue texts prefixed with their start offset, e.g. `[12.5s]: hello`
pub fn format_as_timestamped(transcript: &Transcript) -> String {
    transcript
        .entries
        .iter()
        .map(|entry| format!("[{:.1}s]: {}\n", entry.start, entry.text))
        .collect()
}

#[derive(Serialize)]
struct JsonTranscript<'a> {
    video_id: &'a str,
    url: &'a str,
    title: &'a str,
    language: &'a str,
    entries: &'a [TimedTextEntry],
}

pub fn format_as_json(transcript: &Transcript) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&JsonTranscript {
        video_id: &transcript.video.id,
        url: &transcript.video.source_url,
        title: &transcript.title,
        language: &transcript.language_code,
        entries: &transcript.entries,
    })
}

/// SubRip subtitles, numbered from 1
pub fn format_as_srt(transcript: &Transcript) -> String {
    let mut srt = String::new();
    for (index, entry) in transcript.entries.iter().enumerate() {
        srt.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            index + 1,
            srt_timestamp(entry.start),
            srt_timestamp(entry.start + entry.duration),
            entry.text
        ));
    }
    srt
}

/// `HH:MM:SS,mmm`
fn srt_timestamp(seconds: f64) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let ms = total_ms % 1000;
    let total_secs = total_ms / 1000;
    format!(
        "{:02}:{:02}:{:02},{:03}",
        total_secs / 3600,
        (total_secs % 3600) / 60,
        total_secs % 60,
        ms
    )
}
