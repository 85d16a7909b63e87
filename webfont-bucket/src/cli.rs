///
/// This module implements the CLI interface for webfont-bucket: command parsing,
/// reading the S3 event, wiring the configured backends into the core pipeline and
/// printing the handler response.
///
/// All pipeline logic lives in the [`webfont-bucket-core`] crate.
///
/// ## How To Use
/// - `webfont-bucket handle --config config.yaml --event event.json` runs one event.
///   Without `--event` the event JSON is read from stdin, so the binary can sit
///   behind any runtime that pipes notifications into a process.
/// - `webfont-bucket decode --event event.json` prints what a run would do, without I/O.
///
/// [`webfont-bucket-core`]: ../../webfont-bucket-core/
use crate::load_config::{load_config, CliConfig, StoreConfig};
use crate::s3::HttpObjectStore;
use anyhow::{Context, Result};
use aws_lambda_events::event::s3::S3Event;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;
use webfont_bucket_core::contract::ObjectStore;
use webfont_bucket_core::fs_store::FsObjectStore;
use webfont_bucket_core::pipeline::{Pipeline, RunOutcome};
use webfont_bucket_core::synthesize::CommandSynthesizer;
use webfont_bucket_core::trigger::{decide, Decision, TriggerRecord};

/// CLI for webfont-bucket: turn a bucket folder of SVG icons into a published icon font.
#[derive(Parser)]
#[clap(
    name = "webfont-bucket",
    version,
    about = "Generate and publish an icon font whenever an SVG icon is uploaded to a bucket"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Handle one S3 "object created" notification
    Handle {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        /// Path to the S3 event JSON; read from stdin when omitted
        #[clap(long)]
        event: Option<PathBuf>,
    },
    /// Show how an S3 notification would be handled, without touching any storage
    Decode {
        /// Path to the S3 event JSON; read from stdin when omitted
        #[clap(long)]
        event: Option<PathBuf>,
        /// Extension of source icon files
        #[clap(long, default_value = "svg")]
        extension: String,
    },
}

/// What the invoking runtime gets back: a status code and a JSON body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HandlerResponse {
    pub status_code: u16,
    pub body: String,
}

impl HandlerResponse {
    fn new(status_code: u16, body: serde_json::Value) -> Self {
        Self {
            status_code,
            body: body.to_string(),
        }
    }
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Handle { config, event } => {
            let config = load_config(&config)?;
            let event = read_event(event.as_deref()).await?;
            tracing::info!(command = "handle", "Handling event");
            handle(config, &event).await
        }
        Commands::Decode { event, extension } => {
            let event = read_event(event.as_deref()).await?;
            let decision = match TriggerRecord::from_event(&event) {
                Ok(record) => decide(&record, &extension),
                Err(reason) => Decision::Skip(reason),
            };
            let body = match decision {
                Decision::Process(context) => {
                    tracing::info!(
                        command = "decode",
                        collection = %context.collection_name,
                        "Event would be processed"
                    );
                    serde_json::json!({ "process": context })
                }
                Decision::Skip(reason) => {
                    let message = reason.to_string();
                    tracing::info!(command = "decode", reason = %message, "Event would be skipped");
                    serde_json::json!({ "skip": reason, "message": message })
                }
            };
            println!("{}", serde_json::to_string_pretty(&body)?);
            Ok(())
        }
    }
}

async fn read_event(path: Option<&Path>) -> Result<S3Event> {
    let raw = match path {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read event file {path:?}"))?,
        None => {
            let mut raw = String::new();
            tokio::io::stdin()
                .read_to_string(&mut raw)
                .await
                .context("Failed to read event from stdin")?;
            raw
        }
    };
    serde_json::from_str(&raw).context("Failed to parse S3 event JSON")
}

async fn handle(config: CliConfig, event: &S3Event) -> Result<()> {
    let synthesizer =
        CommandSynthesizer::new(&config.synthesizer.program, config.synthesizer.args.clone());
    match &config.store {
        StoreConfig::Filesystem { root } => {
            let store = FsObjectStore::new(root);
            run_pipeline(Pipeline::new(config.pipeline, store, synthesizer), event).await
        }
        StoreConfig::S3 { endpoint } => {
            let store = HttpObjectStore::new_from_env(endpoint.as_deref())
                .map_err(|e| anyhow::anyhow!("Failed to construct object store: {e}"))?;
            run_pipeline(Pipeline::new(config.pipeline, store, synthesizer), event).await
        }
    }
}

async fn run_pipeline<S: ObjectStore>(
    pipeline: Pipeline<S, CommandSynthesizer>,
    event: &S3Event,
) -> Result<()> {
    match pipeline.run(event).await {
        Ok(outcome) => {
            let message = outcome.message();
            let body = match &outcome {
                RunOutcome::Skipped(reason) => serde_json::json!({
                    "message": message,
                    "skipped": reason,
                }),
                RunOutcome::Completed(report) => serde_json::json!({
                    "message": message,
                    "report": report,
                }),
            };
            tracing::info!(command = "handle", %message, "Event handled");
            println!("{}", serde_json::to_string(&HandlerResponse::new(200, body))?);
            Ok(())
        }
        Err(e) => {
            let body = serde_json::json!({
                "message": "An error occurred while generating the webfont",
                "error": e.to_string(),
                "phase": e.phase(),
            });
            tracing::error!(command = "handle", error = %e, "Handling event failed");
            println!("{}", serde_json::to_string(&HandlerResponse::new(500, body))?);
            Err(anyhow::Error::new(e))
        }
    }
}
