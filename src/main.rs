use anyhow::{Context, Result};
use clap::Parser;
use console::{style, Term};
use std::io::Write;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use yts::cli::{ApiKeyAction, Cli, Commands, ConfigAction, TranscriptFormat};
use yts::config::{Config, KeyringStore};
use yts::output::{render_report, render_transcript, write_output};
use yts::providers::{Provider, ProviderKind, ProviderRegistry};
use yts::summarize::{SummaryPipeline, Task};
use yts::utils::{format_duration, word_count};
use yts::youtube::{TrackPreference, TranscriptFetcher};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so streamed output on stdout stays clean
    let default_filter = if cli.verbose { "yts=debug" } else { "yts=warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Summarize {
            url,
            long,
            query,
            provider,
            output,
        } => {
            let config = Config::load(cli.config.as_deref()).await?;
            let pipeline = build_pipeline(&config, cli.quiet)?;
            let provider = resolve_provider(&config, provider.as_deref())?;

            let task = match query {
                Some(question) => Task::Query(question),
                None => Task::Summary { long },
            };

            let transcript = pipeline.fetch_transcript(&url).await?;
            print_title(&transcript.title);
            if let Task::Query(question) = &task {
                println!("{} {}\n", style("Question:").bold(), question);
            }

            let report = pipeline
                .run_on(transcript, &task, &provider, print_chunk)
                .await
                .with_context(|| match &task {
                    Task::Query(_) => "Failed to answer the question",
                    _ => "Failed to generate the summary",
                })?;
            println!();

            if let Some(path) = output {
                let written = write_output(&path, &render_report(&report))?;
                let label = if report.question.is_some() { "Answer" } else { "Summary" };
                println!("\n{} saved to {}", label, written.display());
            }
        }

        Commands::Transcript {
            url,
            raw,
            timestamps,
            format,
            provider,
            output,
        } => {
            let config = Config::load(cli.config.as_deref()).await?;
            let pipeline = build_pipeline(&config, cli.quiet)?;

            let content = if raw {
                let format = format.with_timestamps(timestamps);
                let transcript = pipeline.fetch_transcript(&url).await?;
                tracing::info!(
                    "{} cues, {} words, {}",
                    transcript.entries.len(),
                    word_count(&transcript.text()),
                    format_duration(transcript.duration())
                );

                let rendered = render_transcript(&transcript, format);
                if matches!(format, TranscriptFormat::Text | TranscriptFormat::Timestamped) {
                    print_title(&transcript.title);
                }
                print!("{}", rendered);
                rendered
            } else {
                if format != TranscriptFormat::Text {
                    tracing::warn!("--format {} only applies together with --raw", format);
                }

                let provider = resolve_provider(&config, provider.as_deref())?;
                let transcript = pipeline.fetch_transcript(&url).await?;
                print_title(&transcript.title);

                let report = pipeline
                    .run_on(transcript, &Task::FormatTranscript { timestamps }, &provider, print_chunk)
                    .await
                    .context("Failed to format the transcript")?;
                println!();
                report.response
            };

            if let Some(path) = output {
                let written = write_output(&path, &content)?;
                println!("\nTranscript saved to {}", written.display());
            }
        }

        Commands::Config { action, show, path } => {
            let config_path = match cli.config {
                Some(path) => path,
                None => Config::config_path()?,
            };

            if let Some(ConfigAction::Set { key, value }) = action {
                let mut config = Config::load_from(&config_path)?;
                config.set_value(&key, &value)?;
                config.save_to(&config_path)?;
                println!("{} {} = {}", style("✓").green(), key.to_lowercase(), value);
            } else if path {
                println!("{}", config_path.display());
            } else {
                let config = Config::load(Some(config_path.as_path())).await?;
                config.display();
                if !show {
                    println!();
                    println!("Change a setting with `yts config set <key> <value>` or edit:");
                    println!("  {}", config_path.display());
                }
            }
        }

        Commands::Apikey { action } => manage_api_key(action)?,

        Commands::Providers => {
            let config = Config::load(cli.config.as_deref()).await?;
            let store = KeyringStore::new();
            let registry = ProviderRegistry::new(&config, &store);

            println!("Available providers:");
            for status in registry.list_providers() {
                let marker = if status.ready {
                    style("✓").green()
                } else {
                    style("✗").red()
                };
                let active = if status.active { " (default)" } else { "" };
                let endpoint = status.base_url.as_deref().unwrap_or("vendor default");

                println!(
                    "  {} {:<9} {} @ {}{}",
                    marker,
                    status.kind.as_str(),
                    status.model,
                    endpoint,
                    style(active).cyan()
                );
                if !status.ready {
                    println!("      run `yts apikey set {}` to enable", status.kind);
                }
            }
        }
    }

    Ok(())
}

fn build_pipeline(config: &Config, quiet: bool) -> Result<SummaryPipeline> {
    let fetcher = TranscriptFetcher::new()?
        .with_preference(TrackPreference::new(config.transcript.languages.clone()));

    Ok(SummaryPipeline::new(fetcher, config.prompts.clone()).with_progress(!quiet))
}

fn resolve_provider(config: &Config, name: Option<&str>) -> Result<Provider> {
    let store = KeyringStore::new();
    let registry = ProviderRegistry::new(config, &store);

    let provider = match name {
        Some(name) => registry.resolve_named(name),
        None => registry.resolve(),
    }
    .context("Failed to initialize provider")?;

    tracing::info!("Using {} ({})", provider.kind().display_name(), provider.model());
    Ok(provider)
}

fn print_title(title: &str) {
    println!("\n{} {}\n", style("Title:").bold(), title);
}

fn print_chunk(chunk: &str) {
    print!("{}", chunk);
    let _ = std::io::stdout().flush();
}

fn hosted_provider(name: &str) -> Result<ProviderKind> {
    let kind: ProviderKind = name.parse()?;
    if !kind.requires_credential() {
        anyhow::bail!(
            "{} does not use an API key. Valid providers: claude, openai",
            kind.display_name()
        );
    }
    Ok(kind)
}

fn manage_api_key(action: ApiKeyAction) -> Result<()> {
    let store = KeyringStore::new();

    match action {
        ApiKeyAction::Set { provider, api_key } => {
            let kind = hosted_provider(&provider)?;
            let api_key = match api_key {
                Some(key) => key,
                None => {
                    let term = Term::stderr();
                    term.write_str(&format!("{} API key: ", kind.display_name()))?;
                    term.read_secure_line().context("Failed to read API key")?
                }
            };
            let api_key = api_key.trim();

            if api_key.is_empty() {
                anyhow::bail!("API key must not be empty");
            }
            if kind == ProviderKind::Claude && !api_key.starts_with("sk-") {
                anyhow::bail!("Invalid Claude API key format. Keys should start with 'sk-'");
            }

            store.set_credential(kind.as_str(), api_key)?;
            println!("{} API key stored for {}", style("✓").green(), kind.display_name());
        }

        ApiKeyAction::Delete { provider } => {
            let kind = hosted_provider(&provider)?;
            if store.delete_credential(kind.as_str())? {
                println!("{} API key deleted for {}", style("✓").green(), kind.display_name());
            } else {
                println!("No API key stored for {}", kind.display_name());
            }
        }

        ApiKeyAction::Status { provider } => {
            let kind = hosted_provider(&provider)?;
            match store.credential_hint(kind.as_str())? {
                Some(hint) => println!("{}: {}", kind.display_name(), hint),
                None => println!(
                    "{}: not set (run `yts apikey set {}`)",
                    kind.display_name(),
                    kind
                ),
            }
        }
    }

    Ok(())
}
