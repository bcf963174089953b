mod cli;
mod display;

use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, anyhow};
use clap::Parser;
use formscout_core::{AppConfig, DetectionResult, Message, PageInstanceId, PageSnapshot, fields};
use formscout_detect::Engine;
use formscout_host::{MemorySource, PageAgent};
use formscout_sync::{ConnectionState, HttpTransport};
use tracing::info;

use crate::cli::{Cli, Commands};

const POLL_INTERVAL: Duration = Duration::from_millis(250);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();
    let cli = Cli::parse();
    info!("formscout v{}", env!("CARGO_PKG_VERSION"));

    let config = match &cli.config {
        Some(path) => AppConfig::from_path(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => AppConfig::default(),
    };

    match cli.command {
        Commands::Detect {
            snapshot,
            json,
            rules,
        } => {
            let result = detect_once(&config, &snapshot)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                display::print_result_card(&result, rules);
            }
        }
        Commands::Export {
            snapshot,
            out,
            print,
        } => {
            let result = detect_once(&config, &snapshot)?;
            let batch = fields::classifications_to_batch(&result)
                .context("building field classification batch")?;

            let file =
                File::create(&out).with_context(|| format!("creating {}", out.display()))?;
            let mut writer = arrow::ipc::writer::FileWriter::try_new(file, &batch.schema())?;
            writer.write(&batch)?;
            writer.finish()?;
            eprintln!("  Wrote {} rows to {}", batch.num_rows(), out.display());

            if print {
                println!("{}", arrow::util::pretty::pretty_format_batches(&[batch])?);
            }
        }
        Commands::Push {
            snapshot,
            endpoint,
            timeout_secs,
        } => {
            let delivered = push(config, &snapshot, endpoint, timeout_secs).await?;
            display::print_result_card(&delivered, false);
        }
    }

    Ok(())
}

fn read_snapshot(path: &Path) -> anyhow::Result<PageSnapshot> {
    let raw =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    PageSnapshot::from_json(&raw).with_context(|| format!("parsing {}", path.display()))
}

fn detect_once(config: &AppConfig, path: &Path) -> anyhow::Result<DetectionResult> {
    let snapshot = read_snapshot(path)?;
    let engine = Engine::new(config.detection.clone()).context("compiling detection rules")?;
    Ok(engine.detect(&snapshot, PageInstanceId(1), 1))
}

/// Run a page agent against the snapshot until its settled result has been
/// delivered to the consumer. Gives up early on a fatal failure or when the
/// channel stops retrying.
async fn push(
    config: AppConfig,
    path: &Path,
    endpoint: String,
    timeout_secs: u64,
) -> anyhow::Result<DetectionResult> {
    let snapshot = read_snapshot(path)?;
    let engine =
        Arc::new(Engine::new(config.detection.clone()).context("compiling detection rules")?);
    let transport = Arc::new(HttpTransport::new(endpoint.clone()));
    let (agent, handle) = PageAgent::new(
        engine,
        Arc::new(MemorySource::new(snapshot)),
        transport,
        config,
    );
    let page = agent.current_page();
    let task = tokio::spawn(agent.run());

    let deadline = tokio::time::Instant::now() + Duration::from_secs(timeout_secs);
    let outcome = loop {
        if tokio::time::Instant::now() >= deadline {
            break Err(anyhow!("no result delivered within {timeout_secs}s"));
        }
        tokio::time::sleep(POLL_INTERVAL).await;

        let status = handle.status();
        if let Some(fatal) = status.fatal {
            break Err(anyhow!("{} ({})", fatal.message, fatal.context));
        }
        if status.connection.state == ConnectionState::Failed {
            let reason = status
                .connection
                .last_error
                .map_or_else(|| "unknown error".to_string(), |e| e.to_string());
            break Err(anyhow!(
                "gave up after {} connection attempts: {reason}",
                status.connection.retry_count
            ));
        }
        let reply = handle
            .request(
                Message::GetDetectionResult {
                    page_instance_id: page,
                },
                POLL_INTERVAL,
            )
            .await?;
        if let Message::CachedResult {
            cached: Some(cached),
        } = reply
        {
            break Ok(cached.result);
        }
    };

    handle.shutdown();
    task.await.context("page agent panicked")?;

    let result = outcome.with_context(|| format!("pushing to {endpoint}"))?;
    info!(page = %page, generation = result.generation, "result delivered");
    Ok(result)
}
