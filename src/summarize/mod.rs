use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::{render_query, PromptConfig};
use crate::output::{render_transcript, TranscriptFormat};
use crate::providers::{GenerationRequest, Provider};
use crate::youtube::{Transcript, TranscriptFetcher};
use crate::Result;

/// What to ask the model about a transcript
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Task {
    /// Summarize the video, briefly or in depth
    Summary { long: bool },

    /// Answer a question from the transcript alone
    Query(String),

    /// Add punctuation and paragraphs without changing the words
    FormatTranscript { timestamps: bool },
}

/// Outcome of one pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    /// Video title
    pub title: String,

    /// Question asked, for query runs
    pub question: Option<String>,

    /// Transcript text sent to the model
    pub transcript: String,

    /// Everything the model streamed back
    pub response: String,
}

/// Fetches a transcript and streams a model's answer about it
pub struct SummaryPipeline {
    fetcher: TranscriptFetcher,
    prompts: PromptConfig,
    show_progress: bool,
}

impl SummaryPipeline {
    pub fn new(fetcher: TranscriptFetcher, prompts: PromptConfig) -> Self {
        Self {
            fetcher,
            prompts,
            show_progress: true,
        }
    }

    /// Show a spinner on stderr while the transcript downloads
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Fetch a transcript, with a spinner unless progress is disabled
    pub async fn fetch_transcript(&self, url: &str) -> Result<Transcript> {
        let progress = self.spinner("Fetching transcript...");

        match self.fetcher.fetch(url).await {
            Ok(transcript) => {
                progress.finish_and_clear();
                Ok(transcript)
            }
            Err(e) => {
                progress.abandon_with_message("Failed to fetch transcript");
                Err(e)
            }
        }
    }

    /// System prompt and content for `task`
    pub fn request_for(&self, task: &Task, transcript: &Transcript) -> GenerationRequest {
        match task {
            Task::Summary { long: false } => {
                GenerationRequest::new(&self.prompts.short_summary, transcript.text())
            }
            Task::Summary { long: true } => {
                GenerationRequest::new(&self.prompts.long_summary, transcript.text())
            }
            Task::Query(question) => GenerationRequest::new(
                render_query(&self.prompts.query, &transcript.title, question),
                transcript.text(),
            ),
            Task::FormatTranscript { timestamps } => {
                let format = if *timestamps {
                    TranscriptFormat::Timestamped
                } else {
                    TranscriptFormat::Text
                };
                GenerationRequest::new(&self.prompts.transcript, render_transcript(transcript, format))
            }
        }
    }

    /// Fetch the transcript of `url` and stream the answer to `task` through `on_chunk`
    pub async fn run<F>(&self, url: &str, task: &Task, provider: &Provider, on_chunk: F) -> Result<Report>
    where
        F: FnMut(&str),
    {
        let transcript = self.fetch_transcript(url).await?;
        self.run_on(transcript, task, provider, on_chunk).await
    }

    /// Stream the answer to `task` for an already fetched transcript
    pub async fn run_on<F>(
        &self,
        transcript: Transcript,
        task: &Task,
        provider: &Provider,
        mut on_chunk: F,
    ) -> Result<Report>
    where
        F: FnMut(&str),
    {
        let request = self.request_for(task, &transcript);
        tracing::info!(
            "Sending {} characters to {} ({})",
            request.content.len(),
            provider.kind().display_name(),
            provider.model()
        );

        let mut response = String::new();
        provider
            .stream(&request, |chunk| {
                response.push_str(chunk);
                on_chunk(chunk);
            })
            .await?;
        response.push('\n');

        Ok(Report {
            title: transcript.title,
            question: match task {
                Task::Query(question) => Some(question.clone()),
                _ => None,
            },
            transcript: request.content,
            response,
        })
    }

    fn spinner(&self, message: &'static str) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        let progress = ProgressBar::new_spinner();
        progress.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        progress.set_message(message);
        progress.enable_steady_tick(Duration::from_millis(100));
        progress
    }
}
