use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "yts",
    about = "Summarize YouTube videos or ask questions about them using their transcripts",
    version,
    long_about = "Fetches the caption track of a YouTube video and streams it through a language model. Works with local servers (LM Studio, Ollama) and hosted APIs (Claude, OpenAI)."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Use this configuration file instead of the default location
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Summarize a video, or answer a question about it
    Summarize {
        /// YouTube video URL
        #[arg(value_name = "URL")]
        url: String,

        /// Generate a detailed analysis instead of a short summary
        #[arg(short, long, conflicts_with = "query")]
        long: bool,

        /// Ask a specific question about the video content
        #[arg(short = 'Q', long, value_name = "QUESTION")]
        query: Option<String>,

        /// Provider to use instead of the configured default
        #[arg(short, long, value_name = "PROVIDER")]
        provider: Option<String>,

        /// Also save the result to this file
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Print the transcript, cleaned up by a model unless --raw is given
    Transcript {
        /// YouTube video URL
        #[arg(value_name = "URL")]
        url: String,

        /// Print the captions as fetched, without a model pass
        #[arg(short, long)]
        raw: bool,

        /// Prefix each cue with its start time
        #[arg(short, long)]
        timestamps: bool,

        /// Output format for raw transcripts
        #[arg(short, long, value_enum, default_value = "text")]
        format: TranscriptFormat,

        /// Provider to use instead of the configured default
        #[arg(short, long, value_name = "PROVIDER")]
        provider: Option<String>,

        /// Also save the result to this file
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Show or change the configuration
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,

        /// Show current configuration
        #[arg(short, long)]
        show: bool,

        /// Print the configuration file path
        #[arg(long, conflicts_with = "show")]
        path: bool,
    },

    /// Manage API keys for hosted providers
    Apikey {
        #[command(subcommand)]
        action: ApiKeyAction,
    },

    /// List providers and whether they are ready to use
    Providers,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Set a configuration value, e.g. `providers.ollama.model llama3.2`
    Set {
        /// Dotted key such as `provider` or `providers.<name>.base_url`
        key: String,

        value: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum ApiKeyAction {
    /// Store an API key in the system keychain
    Set {
        /// claude or openai
        provider: String,

        /// The key; prompted for when omitted
        api_key: Option<String>,
    },

    /// Remove a stored API key
    Delete {
        /// claude or openai
        provider: String,
    },

    /// Show whether a key is stored
    Status {
        /// claude or openai
        provider: String,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum TranscriptFormat {
    /// Plain text, one cue per line
    Text,
    /// Plain text with start offsets
    Timestamped,
    /// JSON with title and timings
    Json,
    /// SRT subtitle format
    Srt,
}

impl TranscriptFormat {
    /// `--timestamps` upgrades plain text to timestamped text
    pub fn with_timestamps(self, timestamps: bool) -> Self {
        match self {
            TranscriptFormat::Text if timestamps => TranscriptFormat::Timestamped,
            other => other,
        }
    }
}

impl std::fmt::Display for TranscriptFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TranscriptFormat::Text => write!(f, "text"),
            TranscriptFormat::Timestamped => write!(f, "timestamped"),
            TranscriptFormat::Json => write!(f, "json"),
            TranscriptFormat::Srt => write!(f, "srt"),
        }
    }
}
