//! CiteIndex Worker
//!
//! Runs the batch phases against the configured database:
//! 1. Partition phase: classify second-order citers of each focal patent
//! 2. Index phase: compute the requested CD indices, scoring abstract
//!    similarity through the configured provider
//!
//! Every page is committed on its own, so the process can be stopped at any
//! time and rerun to pick up where it left off.

mod cli;

use crate::cli::{Command, Invocation};
use anyhow::Context;
use citeindex_common::{
    config::{AppConfig, ObservabilityConfig},
    db::{DbPool, Repository},
    metrics::{register_metrics, SIMILARITY_BUCKETS},
    similarity::create_scorer,
    store::EntityStore,
    VERSION,
};
use citeindex_engine::{BatchOrchestrator, BatchParams, RunReport};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;
    init_tracing(&config.observability);

    info!("Starting CiteIndex Worker v{}", VERSION);

    let args: Vec<String> = std::env::args().skip(1).collect();
    let invocation = cli::parse_args(&args)?;
    config.validate()?;

    if config.observability.metrics_port != 0 {
        install_metrics(config.observability.metrics_port)?;
    }

    // Initialize database connection
    let db = DbPool::new(&config.database).await?;
    db.ping().await?;
    if config.database.ensure_schema {
        db.ensure_schema().await?;
    }
    let store = Arc::new(Repository::new(db));

    tokio::select! {
        result = execute(&config, store, &invocation) => {
            match result {
                Ok(reports) => {
                    for report in &reports {
                        info!(report = %serde_json::to_string(report)?, "Run report");
                    }
                }
                Err(e) => {
                    error!(error = %e, "Run aborted");
                    return Err(e);
                }
            }
        }
        _ = shutdown_signal() => {
            warn!("Shutdown requested, in-flight page abandoned");
        }
    }

    info!("CiteIndex worker shutting down");
    Ok(())
}

async fn execute(
    config: &AppConfig,
    store: Arc<Repository>,
    invocation: &Invocation,
) -> anyhow::Result<Vec<RunReport>> {
    let batch_size = invocation.batch_size.unwrap_or(config.batch.batch_size);

    if invocation.command == Command::Missing {
        list_missing(store.as_ref(), invocation.limit.unwrap_or(batch_size)).await?;
        return Ok(Vec::new());
    }

    let scorer = create_scorer(&config.similarity)?;
    info!(provider = %scorer.provider_name(), "Similarity scorer initialized");

    let orchestrator = BatchOrchestrator::new(
        store,
        scorer,
        config.batch.clone(),
        config.similarity.concurrency,
    )?;

    let reports = match &invocation.command {
        Command::Partition => vec![orchestrator.run_partitions(batch_size).await?],
        Command::Index(names) => {
            let params = BatchParams::parse(batch_size, names)?;
            vec![orchestrator.run_indices(&params).await?]
        }
        Command::All(names) => {
            let params = BatchParams::parse(batch_size, names)?;
            orchestrator.run(&params).await?
        }
        Command::Missing => Vec::new(),
    };
    Ok(reports)
}

/// Print referenced ids absent from the patent table, one per line
async fn list_missing(store: &Repository, limit: u64) -> anyhow::Result<()> {
    let mut cursor: Option<String> = None;
    let mut total = 0usize;

    loop {
        let page = store.missing_citations(cursor.as_deref(), limit).await?;
        let Some(last) = page.last().cloned() else {
            break;
        };
        total += page.len();
        for id in &page {
            println!("{}", id);
        }
        cursor = Some(last);
    }

    info!(total, "Missing citations listed");
    Ok(())
}

fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    if config.json_logging {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}

fn install_metrics(port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(
            Matcher::Suffix("similarity_duration_seconds".to_string()),
            SIMILARITY_BUCKETS,
        )?
        .install()
        .context("Failed to install Prometheus exporter")?;

    register_metrics();
    info!(%addr, "Metrics exporter listening");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
