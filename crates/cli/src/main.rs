//! Newsroom CLI entry point.
//!
//! This binary is the composition root for the entire system:
//!
//! 1. **Parse configuration**: load `newsroom.toml`, apply environment
//!    overrides and validate.
//! 2. **Wire observability**: JSON logs on stderr, optional OTLP span export.
//! 3. **Construct infrastructure**: the OpenAI-compatible reasoning provider
//!    and one HTTP search source per configured label, injected into
//!    [`nodes::PipelineExecutor`].
//! 4. **Run**: start one session through [`nodes::SessionManager`], stream its
//!    events to stdout as JSON lines and exit non-zero unless an article was
//!    produced.

mod config;
mod output;
mod telemetry;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use llm::OpenAiCompatibleProvider;
use nodes::{EventChannel, PipelineExecutor, SessionManager};
use pipeline::{SearchSource, SessionStatus, TemporalReference, Timestamp};
use tracing::{error, info, warn};

use crate::config::CliConfig;
use crate::output::JsonLinesListener;

#[derive(Debug, Parser)]
#[command(name = "newsroom", version, about = "Research, verify and write news articles")]
struct Cli {
    /// Configuration file. Defaults to ./newsroom.toml when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Produce one article about a topic.
    Generate(GenerateArgs),
    /// Print the effective configuration as TOML.
    ShowConfig,
}

#[derive(Debug, clap::Args)]
struct GenerateArgs {
    /// Subject of the article.
    #[arg(long)]
    topic: String,

    /// Date treated as "today" (YYYY-MM-DD). Defaults to the current UTC date.
    #[arg(long, value_parser = parse_reference)]
    date: Option<TemporalReference>,

    /// Research/verify passes before giving up.
    #[arg(long)]
    max_iterations: Option<u32>,

    /// Also write the final article as Markdown to this file.
    #[arg(long)]
    output: Option<PathBuf>,
}

fn parse_reference(raw: &str) -> Result<TemporalReference, String> {
    TemporalReference::parse(raw).ok_or_else(|| format!("'{raw}' is not a YYYY-MM-DD date"))
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("newsroom error: {err:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = CliConfig::load(cli.config.as_deref())?;

    match cli.command {
        Command::ShowConfig => {
            let mut shown = config.clone();
            if shown.llm.api_key.is_some() {
                shown.llm.api_key = Some("***".into());
            }
            print!("{}", toml::to_string_pretty(&shown).context("failed to render configuration")?);
            Ok(())
        }
        Command::Generate(args) => {
            let _telemetry = telemetry::init(&config.telemetry)?;
            generate(config, args).await
        }
    }
}

async fn generate(config: CliConfig, args: GenerateArgs) -> anyhow::Result<()> {
    let reasoning = OpenAiCompatibleProvider::new(config.llm.clone()).context("failed to create reasoning provider")?;
    let sources: Vec<Arc<dyn SearchSource>> = search::build_sources(&config.search)
        .context("failed to create search sources")?
        .into_iter()
        .map(|source| Arc::new(source) as Arc<dyn SearchSource>)
        .collect();
    info!(
        model = %config.llm.model,
        sources = sources.len(),
        "Newsroom starting"
    );

    let max_iterations = args.max_iterations.unwrap_or(config.pipeline.max_iterations);
    let executor = PipelineExecutor::new(
        Arc::new(reasoning),
        sources,
        Arc::new(EventChannel::new()),
        config.pipeline,
    )?;
    let manager = Arc::new(SessionManager::new(Arc::new(executor)));

    let reference = args
        .date
        .unwrap_or_else(|| TemporalReference::from_timestamp(Timestamp::now()));
    let session_id = manager.start_session(&args.topic, reference, max_iterations)?;
    manager.subscribe(session_id, Arc::new(JsonLinesListener::new(std::io::stdout())))?;

    let interrupt = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!(%session_id, "Interrupted; cancelling session");
                if let Err(err) = manager.cancel(session_id) {
                    warn!(%session_id, error = %err, "Cancellation not delivered");
                }
            }
        })
    };
    let session = manager.wait(session_id).await;
    interrupt.abort();
    let session = session?;

    match (session.status(), session.article()) {
        (SessionStatus::Succeeded, Some(article)) => {
            if let Some(path) = &args.output {
                std::fs::write(path, article.to_markdown())
                    .with_context(|| format!("failed to write article to {}", path.display()))?;
                info!(path = %path.display(), "Article written");
            }
            Ok(())
        }
        _ => {
            let reason = session
                .failure()
                .map(ToString::to_string)
                .unwrap_or_else(|| "session ended without an article".into());
            error!(%session_id, %reason, "Session failed");
            bail!("{reason}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_generate_arguments() {
        let cli = Cli::try_parse_from([
            "newsroom",
            "generate",
            "--topic",
            "Peru World Cup playoff",
            "--date",
            "2026-01-04",
            "--max-iterations",
            "2",
        ])
        .unwrap();
        let Command::Generate(args) = cli.command else {
            panic!("expected generate");
        };
        assert_eq!(args.topic, "Peru World Cup playoff");
        assert_eq!(args.date, TemporalReference::parse("2026-01-04"));
        assert_eq!(args.max_iterations, Some(2));
    }

    #[test]
    fn test_bad_date_is_rejected() {
        assert!(Cli::try_parse_from(["newsroom", "generate", "--topic", "x", "--date", "04/01/2026"]).is_err());
    }
}
