use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::summarize::Report;
use crate::utils::expand_home;
use crate::youtube::Transcript;

pub mod formatters;

pub use crate::cli::TranscriptFormat;
pub use formatters::*;

/// Render a transcript in the requested format
pub fn render_transcript(transcript: &Transcript, format: TranscriptFormat) -> String {
    match format {
        TranscriptFormat::Text => format_as_text(transcript),
        TranscriptFormat::Timestamped => format_as_timestamped(transcript),
        TranscriptFormat::Json => match format_as_json(transcript) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!("Could not serialize transcript as JSON: {}", e);
                format_as_text(transcript)
            }
        },
        TranscriptFormat::Srt => format_as_srt(transcript),
    }
}

/// Title, optional question and the model's response, as saved to a file
pub fn render_report(report: &Report) -> String {
    match &report.question {
        Some(question) => format!(
            "Title: {}\n\nQuestion: {}\n\n{}",
            report.title, question, report.response
        ),
        None => format!("Title: {}\n\n{}", report.title, report.response),
    }
}

/// Write `content` to `path`, expanding `~/` and creating missing parent directories.
///
/// Returns the path actually written.
pub fn write_output(path: &Path, content: &str) -> Result<PathBuf> {
    let path = expand_home(path)?;

    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs_err::create_dir_all(parent).context("Failed to create output directory")?;
    }

    fs_err::write(&path, content).context("Failed to write output file")?;
    tracing::debug!("Wrote {} bytes to {}", content.len(), path.display());

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(question: Option<&str>) -> Report {
        Report {
            title: "A Talk".to_string(),
            question: question.map(str::to_string),
            transcript: "words\n".to_string(),
            response: "An answer.\n".to_string(),
        }
    }

    #[test]
    fn test_render_report() {
        assert_eq!(render_report(&report(None)), "Title: A Talk\n\nAn answer.\n");
        assert_eq!(
            render_report(&report(Some("Why?"))),
            "Title: A Talk\n\nQuestion: Why?\n\nAn answer.\n"
        );
    }

    #[test]
    fn test_write_output_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes").join("2024").join("summary.md");

        let written = write_output(&path, "hello").unwrap();
        assert_eq!(written, path);
        assert_eq!(fs_err::read_to_string(&path).unwrap(), "hello");
    }
}
