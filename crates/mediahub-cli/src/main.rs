//! MediaHub CLI: ingest, derive and manage media from the command line.
//!
//! Configuration comes from `MEDIAHUB_*` environment variables (and `.env`). Without
//! `MEDIAHUB_DATABASE_URL` records live in memory for the duration of the command.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use mediahub_cli::{parse_data_pairs, print_asset_table, MediaHub};
use mediahub_core::{AppError, MediaHubConfig};
use mediahub_db::{connect, run_migrations};
use mediahub_infra::{init_telemetry, shutdown_telemetry, ErrorResponse, TelemetryConfig};
use mediahub_processing::{IngestOptions, MediaSource};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "mediahub", about = "MediaHub media library CLI")]
struct Cli {
    /// Log as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply database migrations
    Migrate,
    /// Ingest media into a collection
    Ingest {
        /// Local files to ingest
        #[arg(long, num_args = 1.., conflicts_with_all = ["key", "url", "base64_file"])]
        path: Vec<PathBuf>,
        /// Object key on `--source-disk`
        #[arg(long, requires = "source_disk", conflicts_with_all = ["url", "base64_file"])]
        key: Option<String>,
        /// Disk holding `--key`
        #[arg(long, requires = "key")]
        source_disk: Option<String>,
        /// HTTP(S) URL to download
        #[arg(long, conflicts_with = "base64_file")]
        url: Option<String>,
        /// File containing a base64 image payload (data URLs accepted)
        #[arg(long)]
        base64_file: Option<PathBuf>,
        #[arg(long, default_value = "default")]
        collection: String,
        /// File name for a base64 payload
        #[arg(long, requires = "base64_file")]
        name: Option<String>,
        /// Disk for the original
        #[arg(long)]
        disk: Option<String>,
        /// Disk for conversions
        #[arg(long)]
        conversions_disk: Option<String>,
        /// Remove local source files afterwards, whatever the outcome
        #[arg(long)]
        delete_source: bool,
        /// Return without waiting for derivation
        #[arg(long)]
        no_wait: bool,
    },
    /// Optimize an asset's original and render missing conversions
    Derive { id: Uuid },
    /// Print an asset record
    Show { id: Uuid },
    /// Print where an asset's original (or a conversion) is stored
    Path {
        id: Uuid,
        #[arg(long)]
        conversion: Option<String>,
    },
    /// Merge custom fields into an asset (key=value, values parsed as JSON when valid)
    SetData {
        id: Uuid,
        #[arg(required = true)]
        pairs: Vec<String>,
    },
    /// Move an asset to another collection
    Move { id: Uuid, collection: String },
    /// Delete an asset with all its files
    Delete { id: Uuid },
    /// List the assets of a collection
    List {
        collection: String,
        /// Output format: json or table (default: table)
        #[arg(long, default_value = "table")]
        format: String,
    },
}

#[derive(Serialize)]
struct IngestedItem {
    #[serde(flatten)]
    asset: mediahub_core::Asset,
    was_existing: bool,
}

#[derive(Serialize)]
struct FailedItem {
    index: usize,
    #[serde(flatten)]
    error: ErrorResponse,
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize output")?;
    println!("{}", out);
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let telemetry = TelemetryConfig {
        json: cli.json_logs,
        ..Default::default()
    };
    if let Err(e) = init_telemetry(&telemetry) {
        eprintln!("Failed to initialize tracing: {}", e);
    }

    let result = run(cli.command).await;
    shutdown_telemetry().await;

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match err.downcast_ref::<AppError>() {
                Some(app_error) => {
                    tracing::debug!(details = %app_error.detailed_message(), "Command failed");
                    let report = ErrorResponse::from(app_error);
                    match serde_json::to_string_pretty(&report) {
                        Ok(json) => eprintln!("{}", json),
                        Err(_) => eprintln!("Error: {}", app_error),
                    }
                }
                None => eprintln!("Error: {:#}", err),
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands) -> anyhow::Result<()> {
    let config = MediaHubConfig::from_env()?;
    config.validate()?;

    if let Commands::Migrate = command {
        let Some(url) = config.database_url.as_deref() else {
            bail!("MEDIAHUB_DATABASE_URL must be set to run migrations");
        };
        let pool = connect(url, config.db_max_connections).await?;
        run_migrations(&pool).await?;
        return Ok(());
    }

    let hub = MediaHub::build(config).await?;

    match command {
        Commands::Migrate => {}
        Commands::Ingest {
            path,
            key,
            source_disk,
            url,
            base64_file,
            collection,
            name,
            disk,
            conversions_disk,
            delete_source,
            no_wait,
        } => {
            let sources: Vec<MediaSource> = if !path.is_empty() {
                path.into_iter().map(MediaSource::LocalPath).collect()
            } else if let (Some(disk), Some(key)) = (source_disk, key) {
                vec![MediaSource::Disk { disk, key }]
            } else if let Some(url) = url {
                vec![MediaSource::Url(url)]
            } else if let Some(file) = base64_file {
                let data = tokio::fs::read_to_string(&file)
                    .await
                    .with_context(|| format!("Failed to read {}", file.display()))?;
                vec![MediaSource::Base64 {
                    data,
                    file_name: name,
                }]
            } else {
                bail!("One of --path, --key, --url or --base64-file is required");
            };

            let options = IngestOptions {
                disk,
                conversions_disk,
                delete_source,
            };
            let outcome = hub
                .pipeline
                .ingest_batch(sources, &collection, &options)
                .await;

            if !no_wait {
                hub.queue.wait_idle().await;
            }

            // Reload so the output reflects derivation results.
            let mut ingested = Vec::with_capacity(outcome.ingested.len());
            for item in outcome.ingested {
                let asset = match hub.store.find_by_id(item.asset.id).await? {
                    Some(asset) => asset,
                    None => item.asset,
                };
                ingested.push(IngestedItem {
                    asset,
                    was_existing: item.was_existing,
                });
            }
            let failures: Vec<FailedItem> = outcome
                .failures
                .iter()
                .map(|f| FailedItem {
                    index: f.index,
                    error: ErrorResponse::from(&f.error),
                })
                .collect();
            let failed = failures.len();

            print_json(&serde_json::json!({ "ingested": ingested, "failures": failures }))?;
            if failed > 0 {
                bail!("{} source(s) failed to ingest", failed);
            }
        }
        Commands::Derive { id } => {
            let report = hub.engine.derive(id).await?;
            print_json(&report)?;
        }
        Commands::Show { id } => {
            let asset = hub.store.get(id).await?;
            print_json(&asset)?;
        }
        Commands::Path { id, conversion } => {
            let asset = hub.store.get(id).await?;
            let location = match conversion {
                Some(name) => hub.store.conversion_location(&asset, &name).ok_or_else(|| {
                    AppError::NotFound(format!("Conversion {} not generated for {}", name, id))
                })?,
                None => hub.store.original_location(&asset),
            };
            print_json(&location)?;
        }
        Commands::SetData { id, pairs } => {
            let data = parse_data_pairs(&pairs)?;
            let asset = hub.store.update_data(id, data).await?;
            print_json(&asset)?;
        }
        Commands::Move { id, collection } => {
            let asset = hub.store.move_to_collection(id, &collection).await?;
            print_json(&asset)?;
        }
        Commands::Delete { id } => {
            if !hub.store.delete_with_files(id).await? {
                return Err(AppError::NotFound(format!("Asset {} not found", id)).into());
            }
            print_json(&serde_json::json!({ "deleted": id }))?;
        }
        Commands::List { collection, format } => {
            let assets = hub.store.list_by_collection(&collection).await?;
            match format.as_str() {
                "json" => print_json(&assets)?,
                "table" => print_asset_table(&collection, &assets),
                other => bail!("Unknown format '{}', expected json or table", other),
            }
        }
    }

    hub.queue.shutdown().await;
    Ok(())
}
