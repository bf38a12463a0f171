//! assay command-line interface.
//!
//! `assay chat` runs the interactive turn loop; slash commands inside the
//! session handle document ingestion and snapshot save/restore. The CLI
//! owns wiring only: config, providers, store, orchestrator. All engine
//! behavior lives in the library crates.

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use assay_config::AppConfig;
use assay_core::event::EventBus;
use assay_engine::Orchestrator;
use assay_facts::{SessionState, StateSnapshot};
use assay_ingest::DeclaredFormat;
use assay_knowledge::KnowledgeIndex;
use assay_providers::{AnthropicProvider, VoyageEmbedder};
use assay_retrieval::{
    BackoffPolicy, EmbeddingClient, EmbeddingOptions, RetrievalOptions, SqliteStore, VectorIndex,
};

#[derive(Parser)]
#[command(name = "assay", version, about = "Conversational analysis engine")]
struct Cli {
    /// Path to config.toml. Defaults apply when absent.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start an interactive analysis session.
    Chat {
        /// Restore a previously saved session snapshot.
        #[arg(long)]
        resume: Option<PathBuf>,
    },
    /// Print the guidance catalog keys.
    Guidance,
}

fn load_config(path: &Option<PathBuf>) -> anyhow::Result<AppConfig> {
    match path {
        Some(p) => AppConfig::load(p).with_context(|| format!("loading config {}", p.display())),
        None => AppConfig::from_env().context("building config from environment"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "assay=info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Command::Guidance => {
            let knowledge = KnowledgeIndex::builtin();
            println!("Probes:");
            for key in knowledge.keys(assay_knowledge::GuidanceKind::Probe) {
                println!("  {key}");
            }
            println!("Patterns:");
            for key in knowledge.keys(assay_knowledge::GuidanceKind::Pattern) {
                println!("  {key}");
            }
            Ok(())
        }
        Command::Chat { resume } => chat(config, resume).await,
    }
}

async fn chat(config: AppConfig, resume: Option<PathBuf>) -> anyhow::Result<()> {
    let Some(api_key) = config.provider.api_key.clone() else {
        bail!("no generation API key configured; set ASSAY_API_KEY or provider.api_key");
    };

    let provider = Arc::new(
        AnthropicProvider::with_timeout(
            api_key,
            std::time::Duration::from_secs(config.provider.request_timeout_secs),
        )
        .map_err(|e| anyhow::anyhow!("provider init: {e}"))?,
    );

    // Retrieval is optional: without an embedding key the engine runs on
    // always-on context alone.
    let index = match config.embedding.api_key.clone() {
        Some(key) => {
            let embedder =
                Arc::new(VoyageEmbedder::new(key).map_err(|e| anyhow::anyhow!("embedder init: {e}"))?);
            let store = Arc::new(
                SqliteStore::new(&format!("sqlite://{}", config.storage.vector_db_path))
                    .await
                    .map_err(|e| anyhow::anyhow!("vector store init: {e}"))?,
            );
            let client = EmbeddingClient::new(
                embedder,
                EmbeddingOptions {
                    model: config.embedding.model.clone(),
                    dimensions: config.embedding.dimensions,
                    batch_size: config.embedding.batch_size,
                    max_in_flight: config.embedding.max_in_flight,
                    backoff: BackoffPolicy {
                        base_delay: std::time::Duration::from_secs(config.embedding.backoff_base_secs),
                        max_delay: std::time::Duration::from_secs(config.embedding.backoff_max_secs),
                        max_attempts: config.embedding.backoff_max_attempts,
                    },
                },
            );
            Some(Arc::new(VectorIndex::new(
                store,
                client,
                RetrievalOptions {
                    document_results: config.retrieval.document_results,
                    conversation_results: config.retrieval.conversation_results,
                    always_on_window: config.retrieval.always_on_window,
                },
            )))
        }
        None => {
            info!("no embedding API key; retrieval disabled");
            None
        }
    };

    let orchestrator = Orchestrator::new(
        provider,
        Arc::new(KnowledgeIndex::builtin()),
        index,
        &config,
        Arc::new(EventBus::default()),
    );

    let mut session = match resume {
        Some(path) => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("reading snapshot {}", path.display()))?;
            let snapshot: StateSnapshot = serde_json::from_str(&text).context("parsing snapshot")?;
            let session = SessionState::restore(snapshot);
            println!("(resumed at turn {})", session.turn_count);
            session
        }
        None => {
            let mut session = SessionState::new();
            let priming = orchestrator.run_priming_turn(&mut session);
            println!("assay: {priming}\n");
            session
        }
    };

    println!("Commands: /ingest <file> [summary], /save <file>, /quit\n");

    let stdin = std::io::stdin();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break; // EOF
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(rest) = line.strip_prefix('/') {
            let mut parts = rest.splitn(3, ' ');
            match parts.next().unwrap_or_default() {
                "quit" | "exit" => break,
                "save" => {
                    let Some(path) = parts.next() else {
                        println!("usage: /save <file>");
                        continue;
                    };
                    let snapshot = session.snapshot();
                    std::fs::write(path, serde_json::to_string_pretty(&snapshot)?)?;
                    println!("(saved to {path})");
                }
                "ingest" => {
                    let Some(path) = parts.next() else {
                        println!("usage: /ingest <file> [summary]");
                        continue;
                    };
                    let summary = parts.next().unwrap_or("uploaded document");
                    match ingest_file(&orchestrator, &mut session, path, summary).await {
                        Ok(count) => println!("(ingested {path}: {count} chunks)"),
                        Err(e) => println!("(ingestion failed: {e}; the file is untouched)"),
                    }
                }
                other => println!("unknown command: /{other}"),
            }
            continue;
        }

        let response = orchestrator.run_turn(&mut session, line).await;
        println!("\nassay: {response}\n");
    }

    Ok(())
}

async fn ingest_file(
    orchestrator: &Orchestrator,
    session: &mut SessionState,
    path: &str,
    summary: &str,
) -> anyhow::Result<usize> {
    let path_buf = PathBuf::from(path);
    let extension = path_buf.extension().and_then(|e| e.to_str()).unwrap_or_default();
    let format = DeclaredFormat::from_extension(extension)
        .ok_or_else(|| anyhow::anyhow!("unrecognized file extension: .{extension}"))?;

    let bytes = std::fs::read(&path_buf).with_context(|| format!("reading {path}"))?;
    let source_id = path_buf
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(path)
        .to_string();

    let count = orchestrator
        .ingest_document(session, &source_id, &bytes, format, summary)
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    Ok(count)
}
