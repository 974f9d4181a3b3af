mod batch;
mod metrics;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use postplex_core::{
    create_audit_system, load_config, validate_config, AuditEvent, AuditStore, Config,
    DefaultSourceStore, FfmpegAnalyzer, FfmpegEncoder, FsArtifactStore, JobQueue, LogFormat,
    MediaEncoder, MemoryJobQueue, ParameterGenerator, ProcessedVideoStore, QualityVerifier,
    SqliteAuditStore, SqliteVideoStore, TransformCompiler, TransformExecutor,
    UniquifyOrchestrator, UniquifyPipeline,
};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Buffer size for audit event channel
const AUDIT_BUFFER_SIZE: usize = 1000;

/// How often the worker refreshes gauges and logs its status.
const STATUS_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        eprintln!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_logging(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}

async fn run() -> Result<()> {
    // Determine config path
    let config_path = std::env::var("POSTPLEX_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    init_logging(config.logging.format);
    info!("Loaded configuration from {:?}", config_path);

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;
    info!("Database path: {:?}", config.database.path);
    info!("Staging dir: {:?}", config.staging.dir);

    // Batch files to submit once the worker is up
    let batches = std::env::args()
        .skip(1)
        .map(PathBuf::from)
        .map(|path| batch::read_batch(&path))
        .collect::<Result<Vec<_>>>()?;

    // Compute config hash for audit
    let config_json = serde_json::to_string(&config).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    let config_hash_short = &config_hash[..16];

    // Create SQLite audit store
    let audit_store: Arc<dyn AuditStore> = Arc::new(
        SqliteAuditStore::new(&config.database.path).context("Failed to create audit store")?,
    );
    info!("Audit store initialized");

    // Create SQLite processed video store
    let video_store: Arc<dyn ProcessedVideoStore> = Arc::new(
        SqliteVideoStore::new(&config.database.path)
            .context("Failed to create processed video store")?,
    );
    info!("Processed video store initialized");

    // Create audit system
    let (audit_handle, audit_writer) =
        create_audit_system(Arc::clone(&audit_store), AUDIT_BUFFER_SIZE);

    // Spawn audit writer task
    let writer_handle = tokio::spawn(audit_writer.run());

    audit_handle
        .emit(AuditEvent::ServiceStarted {
            version: VERSION.to_string(),
            config_hash: config_hash_short.to_string(),
        })
        .await;

    let orchestrator = Arc::new(build_orchestrator(
        &config,
        video_store,
        audit_handle.clone(),
    )
    .await?);

    let recovered = orchestrator
        .recover()
        .await
        .context("Failed to re-enqueue unfinished work")?;
    info!(recovered, "Recovered unfinished processed videos");

    for request in batches.into_iter().flatten() {
        let campaign_id = request.campaign_id.clone();
        match orchestrator.submit(request).await {
            Ok(result) => info!(
                campaign_id = %result.campaign_id,
                videos = result.videos.len(),
                estimated_time = %result.estimated_time.display,
                estimated_storage = %result.estimated_storage.display,
                "Submitted batch"
            ),
            Err(e) => error!(campaign_id = %campaign_id, "Failed to submit batch: {}", e),
        }
    }

    orchestrator.start().await;
    info!(
        concurrency = config.worker.concurrency,
        "Worker pool started"
    );

    let reporter = spawn_status_reporter(Arc::clone(&orchestrator));

    shutdown_signal().await;

    info!("Stopping worker pool...");
    reporter.abort();
    orchestrator.stop().await;
    info!("Worker pool stopped");

    metrics::collect_dynamic_metrics(&orchestrator.status().await);
    debug!("Final metrics:\n{}", metrics::encode_metrics());

    audit_handle
        .emit(AuditEvent::ServiceStopped {
            reason: "graceful_shutdown".to_string(),
        })
        .await;

    // The orchestrator holds an AuditHandle clone; both must go before the
    // writer's channel closes.
    drop(orchestrator);
    drop(audit_handle);

    let _ = writer_handle.await;
    info!("Audit writer stopped");

    Ok(())
}

async fn build_orchestrator(
    config: &Config,
    video_store: Arc<dyn ProcessedVideoStore>,
    audit_handle: postplex_core::AuditHandle,
) -> Result<UniquifyOrchestrator> {
    let catalog = config
        .preset_catalog()
        .context("Failed to build preset catalog")?;
    info!(presets = ?catalog.names(), "Preset catalog loaded");

    let encoder = Arc::new(FfmpegEncoder::new(config.encoder.clone()));
    if let Err(e) = encoder.validate().await {
        warn!("Encoder validation failed, jobs will fail until ffmpeg is available: {}", e);
    }

    let sources = Arc::new(
        DefaultSourceStore::new(
            config.source.root.clone(),
            Duration::from_secs(config.source.request_timeout_secs),
        )
        .context("Failed to create source store")?,
    );
    let artifacts = Arc::new(FsArtifactStore::new(
        config.artifacts.root.clone(),
        config.artifacts.public_base_url.clone(),
    ));

    let pipeline = UniquifyPipeline {
        generator: Arc::new(ParameterGenerator::new(catalog)),
        compiler: TransformCompiler::new(config.encoder.sample_rate_hz),
        executor: Arc::new(TransformExecutor::new(
            config.staging.dir.clone(),
            sources,
            encoder,
            artifacts,
        )),
        verifier: Arc::new(QualityVerifier::new(Arc::new(FfmpegAnalyzer::new(
            &config.encoder,
        )))),
    };

    let queue: Arc<dyn JobQueue> = Arc::new(MemoryJobQueue::new());

    Ok(UniquifyOrchestrator::new(
        config.worker.clone(),
        config.retry.clone(),
        pipeline,
        video_store,
        queue,
        Some(audit_handle),
    ))
}

fn spawn_status_reporter(orchestrator: Arc<UniquifyOrchestrator>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(STATUS_INTERVAL);
        interval.tick().await;
        loop {
            interval.tick().await;
            let status = orchestrator.status().await;
            metrics::collect_dynamic_metrics(&status);
            info!(
                active = status.active_jobs,
                queued = status.queued_jobs,
                delayed = status.delayed_jobs,
                "Worker status"
            );
        }
    })
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
