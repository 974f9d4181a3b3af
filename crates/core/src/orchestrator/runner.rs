//! Uniquify orchestrator implementation.
//!
//! Submissions become processed video records plus queued jobs. A bounded
//! pool of worker tasks pulls jobs and drives each record through
//! `processing -> completed | failed`, retrying transient failures through
//! the queue. Remediation replaces a record's settings, bumps its revision
//! and re-enqueues it; deliveries for an older revision are dropped.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::audit::{AuditEvent, AuditHandle};
use crate::executor::TransformExecutor;
use crate::metrics;
use crate::preset::{
    estimate_processed_storage, estimate_processing_time, ModificationSettings,
    ParameterGenerator, Remediator, DEFAULT_OUTPUT_SIZE_MB, DEFAULT_PRESET,
    DEFAULT_VIDEO_DURATION_SECS,
};
use crate::quality::{DefectType, QualityVerifier};
use crate::queue::{Delivery, JobHandle, JobQueue, NackOutcome, QueueError, UniquifyJob};
use crate::storage::StorageKey;
use crate::transform::{validate_settings, TransformCompiler};
use crate::video::{
    NewProcessedVideo, ProcessedVideo, ProcessedVideoStore, ProcessingStatus, StoreError,
    VideoFilter, VideoUpdate,
};

use super::config::{OrchestratorConfig, RetryConfig};
use super::types::{
    BatchStatus, CurrentVideo, FailedVideo, FlaggedVideo, OrchestratorError, OrchestratorStatus,
    Remedy, ReprocessOptions, SubmitRequest, SubmitResult, MAX_VERSIONS_PER_VIDEO,
};

/// Page size used when walking a whole campaign.
const LIST_PAGE_SIZE: u32 = 500;

/// The processing components a worker runs for every job.
pub struct UniquifyPipeline {
    pub generator: Arc<ParameterGenerator>,
    pub compiler: TransformCompiler,
    pub executor: Arc<TransformExecutor>,
    pub verifier: Arc<QualityVerifier>,
}

/// How a delivery ended when it did not fail.
enum JobOutcome {
    Completed,
    /// The record moved on (remediated, cancelled or deleted) since enqueue.
    Stale,
}

struct Inner {
    config: OrchestratorConfig,
    retry: RetryConfig,
    pipeline: UniquifyPipeline,
    remediator: Remediator,
    store: Arc<dyn ProcessedVideoStore>,
    queue: Arc<dyn JobQueue>,
    audit: Option<AuditHandle>,
    active_jobs: AtomicUsize,
}

/// Drives processed videos from submission to a published, verified output.
pub struct UniquifyOrchestrator {
    inner: Arc<Inner>,
    running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl UniquifyOrchestrator {
    pub fn new(
        config: OrchestratorConfig,
        retry: RetryConfig,
        pipeline: UniquifyPipeline,
        store: Arc<dyn ProcessedVideoStore>,
        queue: Arc<dyn JobQueue>,
        audit: Option<AuditHandle>,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let remediator = Remediator::new(pipeline.generator.catalog());

        Self {
            inner: Arc::new(Inner {
                config,
                retry,
                pipeline,
                remediator,
                store,
                queue,
                audit,
                active_jobs: AtomicUsize::new(0),
            }),
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
            workers: Mutex::new(Vec::new()),
        }
    }

    /// Spawns the worker pool.
    pub async fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Orchestrator already running");
            return;
        }

        let concurrency = self.inner.config.concurrency.max(1);
        info!(concurrency, "Starting uniquify orchestrator");

        let mut workers = self.workers.lock().await;
        for worker_id in 0..concurrency {
            workers.push(self.spawn_worker(worker_id));
        }
    }

    /// Signals the workers and waits for in-progress jobs to finish.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            warn!("Orchestrator not running");
            return;
        }

        info!("Stopping uniquify orchestrator");
        let _ = self.shutdown_tx.send(());

        let workers: Vec<_> = self.workers.lock().await.drain(..).collect();
        for handle in workers {
            if let Err(e) = handle.await {
                error!("Worker task ended abnormally: {}", e);
            }
        }
        info!("Uniquify orchestrator stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    pub async fn status(&self) -> OrchestratorStatus {
        let stats = self.inner.queue.stats().await;
        OrchestratorStatus {
            running: self.is_running(),
            workers: self.workers.lock().await.len(),
            active_jobs: self.inner.active_jobs.load(Ordering::Relaxed),
            queued_jobs: stats.waiting,
            delayed_jobs: stats.delayed,
        }
    }

    fn spawn_worker(&self, worker_id: usize) -> JoinHandle<()> {
        let inner = Arc::clone(&self.inner);
        let running = Arc::clone(&self.running);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let poll = Duration::from_millis(inner.config.poll_interval_ms);

        tokio::spawn(async move {
            debug!(worker_id, "Worker started");
            loop {
                if !running.load(Ordering::Relaxed) {
                    break;
                }
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        debug!(worker_id, "Worker received shutdown signal");
                        break;
                    }
                    result = inner.queue.dequeue(poll) => match result {
                        Ok(Some(delivery)) => inner.handle_delivery(delivery).await,
                        Ok(None) => {}
                        Err(e) => {
                            warn!(worker_id, "Dequeue failed: {}", e);
                            tokio::time::sleep(poll).await;
                        }
                    }
                }
            }
            debug!(worker_id, "Worker stopped");
        })
    }

    /// Processes a single queued job on the calling task, if one is ready
    /// within `timeout`. Returns whether a job was handled.
    pub async fn run_once(&self, timeout: Duration) -> Result<bool, OrchestratorError> {
        match self.inner.queue.dequeue(timeout).await? {
            Some(delivery) => {
                self.inner.handle_delivery(delivery).await;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Re-enqueues every unfinished record. Call once on startup, before
    /// [`UniquifyOrchestrator::start`], to rebuild an in-process queue.
    ///
    /// Records left in `processing` by a crash are marked failed first.
    pub async fn recover(&self) -> Result<usize, OrchestratorError> {
        let mut unfinished = Vec::new();
        for status in [
            ProcessingStatus::Processing,
            ProcessingStatus::Pending,
            ProcessingStatus::Reprocessing,
            ProcessingStatus::Failed,
        ] {
            unfinished.extend(
                self.inner
                    .list_all(VideoFilter::new().with_status(status))?
                    .into_iter()
                    .filter(|v| !v.terminal),
            );
        }

        let mut recovered = 0;
        for video in unfinished {
            let video = if video.status == ProcessingStatus::Processing {
                self.inner.store.update(
                    &video.id,
                    VideoUpdate::Failed {
                        message: "interrupted before completion".to_string(),
                        terminal: false,
                    },
                )?
            } else {
                video
            };
            self.inner.enqueue(&video).await?;
            recovered += 1;
        }

        if recovered > 0 {
            info!(recovered, "Re-enqueued unfinished processed videos");
        }
        Ok(recovered)
    }

    /// Creates `versions_per_video` processed videos for every source and
    /// enqueues one job each.
    pub async fn submit(&self, request: SubmitRequest) -> Result<SubmitResult, OrchestratorError> {
        validate_request(&request)?;

        let preset = request
            .preset
            .clone()
            .unwrap_or_else(|| DEFAULT_PRESET.to_string());
        let platform = request
            .target_platform
            .unwrap_or(self.inner.config.default_platform);

        let versions = request.versions_per_video as usize;
        let mut draws = Vec::with_capacity(request.sources.len());
        for _ in &request.sources {
            draws.push(self.inner.pipeline.generator.generate_many(&preset, versions)?);
        }

        let mut videos = Vec::with_capacity(request.sources.len() * versions);
        for (source, settings) in request.sources.iter().zip(draws) {
            // Resubmitting a source continues its version numbering.
            let existing = self.inner.store.count(
                &VideoFilter::new()
                    .with_campaign(&request.campaign_id)
                    .with_source(&source.id),
            )? as u32;

            for (i, settings) in settings.into_iter().enumerate() {
                let video = self.inner.store.create(NewProcessedVideo {
                    campaign_id: request.campaign_id.clone(),
                    user_id: request.user_id.clone(),
                    source_video_id: source.id.clone(),
                    source_location: source.location.clone(),
                    source_duration_secs: source.duration_secs,
                    version_number: existing + i as u32 + 1,
                    preset: Some(preset.clone()),
                    settings,
                    target_platform: platform,
                })?;
                let handle = self.inner.enqueue(&video).await?;
                videos.push(ProcessedVideo {
                    job_id: Some(handle.0),
                    ..video
                });
            }
        }

        metrics::VIDEOS_SUBMITTED
            .with_label_values(&[preset.as_str()])
            .inc_by(videos.len() as u64);

        let source_count = request.sources.len() as u32;
        let known: Vec<f64> = request.sources.iter().filter_map(|s| s.duration_secs).collect();
        let average_duration = if known.is_empty() {
            DEFAULT_VIDEO_DURATION_SECS
        } else {
            known.iter().sum::<f64>() / known.len() as f64
        };

        info!(
            campaign_id = %request.campaign_id,
            preset = %preset,
            platform = %platform,
            videos = videos.len(),
            "Batch submitted"
        );
        self.inner
            .emit(AuditEvent::BatchSubmitted {
                campaign_id: request.campaign_id.clone(),
                user_id: request.user_id.clone(),
                preset: preset.clone(),
                target_platform: platform.to_string(),
                source_count,
                versions_per_video: request.versions_per_video,
                videos_created: videos.len() as u32,
            })
            .await;

        Ok(SubmitResult {
            campaign_id: request.campaign_id,
            preset,
            target_platform: platform,
            estimated_storage: estimate_processed_storage(
                source_count,
                request.versions_per_video,
                DEFAULT_OUTPUT_SIZE_MB,
            ),
            estimated_time: estimate_processing_time(
                source_count,
                request.versions_per_video,
                average_duration,
            ),
            videos,
        })
    }

    /// Applies the targeted correction for `issue_type` and re-enqueues.
    pub async fn quick_fix(
        &self,
        processed_video_id: &str,
        issue_type: &str,
    ) -> Result<ProcessedVideo, OrchestratorError> {
        let defect: DefectType = issue_type.parse()?;
        let video = self.inner.remediable(processed_video_id)?;

        let settings = self.inner.remediator.adjust(&video.settings, defect);
        let preset = video.preset.clone();
        let video = self.inner.remediate(video, settings, preset).await?;

        metrics::REMEDIATIONS_TOTAL.with_label_values(&["quick_fix"]).inc();
        info!(
            processed_video_id,
            defect = %defect,
            revision = video.revision,
            "Quick fix applied"
        );
        self.inner
            .emit(AuditEvent::QuickFixApplied {
                processed_video_id: video.id.clone(),
                campaign_id: video.campaign_id.clone(),
                defect: defect.to_string(),
                revision: video.revision,
            })
            .await;
        Ok(video)
    }

    /// Replaces the settings with explicit ones or a fresh draw and re-enqueues.
    pub async fn reprocess(
        &self,
        processed_video_id: &str,
        options: ReprocessOptions,
    ) -> Result<ProcessedVideo, OrchestratorError> {
        let video = self.inner.remediable(processed_video_id)?;

        let (settings, preset) = match options.settings {
            Some(settings) => {
                validate_settings(&settings)?;
                (settings, None)
            }
            None => {
                let preset = options
                    .preset
                    .unwrap_or_else(|| DEFAULT_PRESET.to_string());
                let settings = self.inner.pipeline.generator.generate(&preset)?;
                (settings, Some(preset))
            }
        };

        let video = self.inner.remediate(video, settings, preset).await?;

        metrics::REMEDIATIONS_TOTAL.with_label_values(&["reprocess"]).inc();
        info!(
            processed_video_id,
            preset = ?video.preset,
            revision = video.revision,
            "Reprocess requested"
        );
        self.inner
            .emit(AuditEvent::ReprocessRequested {
                processed_video_id: video.id.clone(),
                campaign_id: video.campaign_id.clone(),
                preset: video.preset.clone(),
                revision: video.revision,
            })
            .await;
        Ok(video)
    }

    /// Withdraws a queued job that no worker has started.
    ///
    /// Returns `false` when there was nothing to withdraw (the job already
    /// started, finished, or was never queued).
    pub async fn cancel(&self, processed_video_id: &str) -> Result<bool, OrchestratorError> {
        let video = self.inner.get(processed_video_id)?;
        if !video.status.can_cancel() {
            return Ok(false);
        }
        let Some(job_id) = video.job_id.clone() else {
            return Ok(false);
        };

        match self.inner.queue.cancel(&JobHandle(job_id.clone())).await {
            Ok(true) => {}
            Ok(false) | Err(QueueError::NotFound { .. }) => return Ok(false),
            Err(e) => return Err(e.into()),
        }

        match self.inner.store.update(processed_video_id, VideoUpdate::Cancelled) {
            Ok(_) => {}
            // Picked up between the status read and the queue removal.
            Err(StoreError::InvalidTransition { .. }) => return Ok(false),
            Err(e) => return Err(e.into()),
        }

        info!(processed_video_id, job_id = %job_id, "Queued job cancelled");
        self.inner
            .emit(AuditEvent::JobCancelled {
                processed_video_id: video.id,
                campaign_id: video.campaign_id,
                job_id,
            })
            .await;
        Ok(true)
    }

    /// Aggregate progress for a campaign.
    pub fn batch_status(&self, campaign_id: &str) -> Result<BatchStatus, OrchestratorError> {
        let counts = self.inner.store.status_counts(campaign_id)?;
        let total = counts.total();

        let current = self
            .inner
            .store
            .list(
                &VideoFilter::new()
                    .with_campaign(campaign_id)
                    .with_status(ProcessingStatus::Processing)
                    .with_limit(1),
            )?
            .into_iter()
            .next()
            .map(|v| CurrentVideo {
                id: v.id,
                source_video_id: v.source_video_id,
                version_number: v.version_number,
            });

        let failures = self
            .inner
            .list_all(
                VideoFilter::new()
                    .with_campaign(campaign_id)
                    .with_status(ProcessingStatus::Failed),
            )?
            .into_iter()
            .map(|v| FailedVideo {
                id: v.id,
                source_video_id: v.source_video_id,
                version_number: v.version_number,
                error_message: v.error_message,
                terminal: v.terminal,
            })
            .collect();

        Ok(BatchStatus {
            campaign_id: campaign_id.to_string(),
            percent_complete: BatchStatus::percent(counts.completed, total),
            counts,
            total,
            current,
            failures,
        })
    }

    /// Completed units carrying quality flags, each with its quick fixes.
    pub fn flagged(&self, campaign_id: &str) -> Result<Vec<FlaggedVideo>, OrchestratorError> {
        let videos = self
            .inner
            .list_all(VideoFilter::new().with_campaign(campaign_id).flagged())?;

        Ok(videos
            .into_iter()
            .map(|video| {
                let mut seen = HashSet::new();
                let remedies = video
                    .quality_flags
                    .iter()
                    .filter(|flag| seen.insert(flag.defect))
                    .map(|flag| Remedy {
                        defect: flag.defect,
                        recommendation: flag.recommendation.clone(),
                        adjusted_settings: self.inner.remediator.adjust(&video.settings, flag.defect),
                    })
                    .collect();
                FlaggedVideo { video, remedies }
            })
            .collect())
    }

    /// Every unit of a campaign, ordered by source and version.
    pub fn results(&self, campaign_id: &str) -> Result<Vec<ProcessedVideo>, OrchestratorError> {
        self.inner.list_all(VideoFilter::new().with_campaign(campaign_id))
    }

    pub fn get(&self, processed_video_id: &str) -> Result<ProcessedVideo, OrchestratorError> {
        self.inner.get(processed_video_id)
    }
}

impl Inner {
    async fn emit(&self, event: AuditEvent) {
        if let Some(ref audit) = self.audit {
            audit.emit(event).await;
        }
    }

    fn get(&self, id: &str) -> Result<ProcessedVideo, OrchestratorError> {
        self.store
            .get(id)?
            .ok_or_else(|| OrchestratorError::NotFound(id.to_string()))
    }

    fn remediable(&self, id: &str) -> Result<ProcessedVideo, OrchestratorError> {
        let video = self.get(id)?;
        if !video.status.can_remediate() {
            return Err(OrchestratorError::InvalidState {
                id: video.id,
                status: video.status,
            });
        }
        Ok(video)
    }

    fn list_all(&self, filter: VideoFilter) -> Result<Vec<ProcessedVideo>, OrchestratorError> {
        let mut all = Vec::new();
        let mut offset = 0;
        loop {
            let page = self.store.list(
                &filter
                    .clone()
                    .with_limit(LIST_PAGE_SIZE)
                    .with_offset(offset),
            )?;
            let len = page.len() as u32;
            all.extend(page);
            if len < LIST_PAGE_SIZE {
                return Ok(all);
            }
            offset += len;
        }
    }

    async fn enqueue(&self, video: &ProcessedVideo) -> Result<JobHandle, OrchestratorError> {
        let job = UniquifyJob {
            processed_video_id: video.id.clone(),
            source_video_id: video.source_video_id.clone(),
            source_location: video.source_location.clone(),
            settings: video.settings,
            target_platform: video.target_platform,
            revision: video.revision,
        };
        let handle = self.queue.enqueue(job, self.retry.enqueue_options()).await?;
        self.store.set_job_id(&video.id, handle.as_str())?;
        debug!(
            processed_video_id = %video.id,
            job_id = %handle.as_str(),
            revision = video.revision,
            "Job enqueued"
        );
        Ok(handle)
    }

    /// Persists new settings as `reprocessing` and queues the new revision.
    async fn remediate(
        &self,
        video: ProcessedVideo,
        settings: ModificationSettings,
        preset: Option<String>,
    ) -> Result<ProcessedVideo, OrchestratorError> {
        let previous_job = video.job_id.clone();
        let updated = self
            .store
            .update(&video.id, VideoUpdate::Reprocessing { settings, preset })?;

        // A failed unit may still have a delayed retry queued.
        if let Some(job_id) = previous_job {
            match self.queue.cancel(&JobHandle(job_id)).await {
                Ok(_) | Err(QueueError::NotFound { .. }) => {}
                Err(e) => warn!(processed_video_id = %video.id, "Failed to withdraw previous job: {}", e),
            }
        }

        let handle = self.enqueue(&updated).await?;
        Ok(ProcessedVideo {
            job_id: Some(handle.0),
            ..updated
        })
    }

    async fn handle_delivery(&self, delivery: Delivery) {
        let started = Instant::now();
        self.active_jobs.fetch_add(1, Ordering::Relaxed);
        metrics::JOBS_IN_FLIGHT.inc();

        let result = self.process(&delivery).await;
        let label = match result {
            Ok(JobOutcome::Completed) => {
                self.ack(&delivery).await;
                "completed"
            }
            Ok(JobOutcome::Stale) => {
                self.ack(&delivery).await;
                "stale"
            }
            Err(e) => self.fail(&delivery, e).await,
        };

        metrics::JOBS_TOTAL.with_label_values(&[label]).inc();
        metrics::JOB_DURATION
            .with_label_values(&[label])
            .observe(started.elapsed().as_secs_f64());
        metrics::JOBS_IN_FLIGHT.dec();
        self.active_jobs.fetch_sub(1, Ordering::Relaxed);
    }

    async fn ack(&self, delivery: &Delivery) {
        if let Err(e) = self.queue.ack(&delivery.handle).await {
            warn!(job_id = %delivery.handle.as_str(), "Failed to ack job: {}", e);
        }
    }

    async fn process(&self, delivery: &Delivery) -> Result<JobOutcome, OrchestratorError> {
        let job = &delivery.job;
        let id = job.processed_video_id.as_str();

        // Revision check and status change happen under one store lock, so a
        // remediation racing this pickup either wins outright or waits for it.
        let video = match self
            .store
            .update_at_revision(id, job.revision, VideoUpdate::Processing)
        {
            Ok(video) => video,
            Err(StoreError::NotFound(_)) => {
                warn!(processed_video_id = id, "Processed video no longer exists, dropping job");
                return Ok(JobOutcome::Stale);
            }
            Err(StoreError::RevisionMismatch { current, .. }) => {
                info!(
                    processed_video_id = id,
                    job_revision = job.revision,
                    current_revision = current,
                    "Skipping stale job"
                );
                self.emit(AuditEvent::StaleJobSkipped {
                    processed_video_id: id.to_string(),
                    job_revision: job.revision,
                    current_revision: current,
                })
                .await;
                return Ok(JobOutcome::Stale);
            }
            Err(StoreError::InvalidTransition { from, .. }) => {
                info!(processed_video_id = id, status = %from, "Job no longer applicable, dropping");
                return Ok(JobOutcome::Stale);
            }
            Err(e) => return Err(e.into()),
        };

        info!(
            processed_video_id = id,
            platform = %job.target_platform,
            attempt = delivery.attempt,
            "Processing started"
        );
        self.emit(AuditEvent::ProcessingStarted {
            processed_video_id: video.id.clone(),
            campaign_id: video.campaign_id.clone(),
            target_platform: job.target_platform.to_string(),
            attempt: delivery.attempt,
            max_attempts: delivery.max_attempts,
            revision: job.revision,
        })
        .await;

        let started = Instant::now();
        let graph = self
            .pipeline
            .compiler
            .compile(&job.settings, job.target_platform)?;

        let artifact = self
            .pipeline
            .executor
            .execute(id, &job.source_location, &graph)
            .await?;
        metrics::ENCODE_DURATION
            .with_label_values(&[job.target_platform.as_str()])
            .observe(artifact.encode_duration_ms as f64 / 1000.0);

        let source_duration = video
            .source_duration_secs
            .unwrap_or(artifact.source_info.duration_secs);
        let report = self.pipeline.verifier.verify(&artifact, source_duration).await;

        let key = StorageKey::processed(&video.user_id, &video.campaign_id, &video.id, Utc::now());
        let published = self.pipeline.executor.publish(artifact, &key).await?;
        metrics::ARTIFACT_BYTES.inc_by(published.size_bytes);

        let flags = report.into_flags();
        let flag_names: Vec<String> = flags.iter().map(|f| f.defect.to_string()).collect();
        match self.store.update_at_revision(
            id,
            job.revision,
            VideoUpdate::Completed {
                output_location: published.location.clone(),
                output_size_bytes: published.size_bytes,
                quality_flags: flags,
            },
        ) {
            Ok(_) => {}
            Err(StoreError::RevisionMismatch { current, .. }) => {
                warn!(
                    processed_video_id = id,
                    job_revision = job.revision,
                    current_revision = current,
                    location = %published.location,
                    "Remediated while encoding, discarding output"
                );
                return Ok(JobOutcome::Stale);
            }
            Err(e) => return Err(e.into()),
        }

        info!(
            processed_video_id = id,
            platform = %job.target_platform,
            location = %published.location,
            flags = ?flag_names,
            "Processing completed"
        );
        self.emit(AuditEvent::ProcessingCompleted {
            processed_video_id: video.id,
            campaign_id: video.campaign_id,
            target_platform: job.target_platform.to_string(),
            attempt: delivery.attempt,
            output_location: published.location,
            output_size_bytes: published.size_bytes,
            quality_flags: flag_names,
            duration_ms: started.elapsed().as_millis() as u64,
        })
        .await;

        Ok(JobOutcome::Completed)
    }

    /// Records the failure and hands the job back to the queue. Returns the
    /// metrics label for the outcome.
    async fn fail(&self, delivery: &Delivery, err: OrchestratorError) -> &'static str {
        let job = &delivery.job;
        let id = job.processed_video_id.as_str();
        let retryable = err.is_retryable();
        let terminal = !retryable || delivery.is_last_attempt();
        let message = err.to_string();

        match self.store.update_at_revision(
            id,
            job.revision,
            VideoUpdate::Failed {
                message: message.clone(),
                terminal,
            },
        ) {
            Ok(_) => {}
            Err(StoreError::RevisionMismatch { current, .. }) => {
                // A newer revision owns the record; this attempt is moot.
                info!(
                    processed_video_id = id,
                    job_revision = job.revision,
                    current_revision = current,
                    "Superseded job failed, dropping: {}",
                    message
                );
                self.ack(delivery).await;
                return "stale";
            }
            Err(e) => warn!(processed_video_id = id, "Failed to record failure: {}", e),
        }

        match self.queue.nack(&delivery.handle, retryable).await {
            Ok(NackOutcome::Retrying { next_attempt, delay }) => {
                metrics::RETRY_ATTEMPTS.with_label_values(&[err.label()]).inc();
                warn!(
                    processed_video_id = id,
                    platform = %job.target_platform,
                    attempt = delivery.attempt,
                    next_attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Processing failed, retrying: {}",
                    message
                );
            }
            Ok(NackOutcome::Exhausted) => {
                error!(
                    processed_video_id = id,
                    platform = %job.target_platform,
                    attempt = delivery.attempt,
                    retryable,
                    "Processing failed: {}",
                    message
                );
            }
            Err(e) => warn!(processed_video_id = id, "Failed to nack job: {}", e),
        }

        let campaign_id = self
            .store
            .get(id)
            .ok()
            .flatten()
            .map(|v| v.campaign_id)
            .unwrap_or_default();
        self.emit(AuditEvent::ProcessingFailed {
            processed_video_id: id.to_string(),
            campaign_id,
            target_platform: job.target_platform.to_string(),
            attempt: delivery.attempt,
            error: message,
            terminal,
        })
        .await;

        if terminal {
            "failed"
        } else {
            "retrying"
        }
    }
}

fn validate_request(request: &SubmitRequest) -> Result<(), OrchestratorError> {
    if request.user_id.trim().is_empty() || request.campaign_id.trim().is_empty() {
        return Err(OrchestratorError::InvalidRequest(
            "user_id and campaign_id are required".to_string(),
        ));
    }
    if request.sources.is_empty() {
        return Err(OrchestratorError::InvalidRequest(
            "at least one source video is required".to_string(),
        ));
    }
    if !(1..=MAX_VERSIONS_PER_VIDEO).contains(&request.versions_per_video) {
        return Err(OrchestratorError::InvalidRequest(format!(
            "versions_per_video must be within 1..={}, got {}",
            MAX_VERSIONS_PER_VIDEO, request.versions_per_video
        )));
    }
    let mut ids = HashSet::new();
    for source in &request.sources {
        if source.id.trim().is_empty() || source.location.trim().is_empty() {
            return Err(OrchestratorError::InvalidRequest(
                "every source needs an id and a location".to_string(),
            ));
        }
        if !ids.insert(source.id.as_str()) {
            return Err(OrchestratorError::InvalidRequest(format!(
                "duplicate source video '{}'",
                source.id
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::SourceVideo;

    fn request(versions: u32) -> SubmitRequest {
        SubmitRequest {
            user_id: "user-1".to_string(),
            campaign_id: "camp-1".to_string(),
            sources: vec![SourceVideo {
                id: "src-1".to_string(),
                location: "sources/a.mp4".to_string(),
                duration_secs: Some(30.0),
            }],
            preset: None,
            versions_per_video: versions,
            target_platform: None,
        }
    }

    #[test]
    fn test_validate_request_versions() {
        assert!(validate_request(&request(1)).is_ok());
        assert!(validate_request(&request(10)).is_ok());
        assert!(matches!(
            validate_request(&request(0)),
            Err(OrchestratorError::InvalidRequest(_))
        ));
        assert!(matches!(
            validate_request(&request(11)),
            Err(OrchestratorError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_validate_request_sources() {
        let mut req = request(2);
        req.sources.clear();
        assert!(validate_request(&req).is_err());

        let mut req = request(2);
        req.sources.push(req.sources[0].clone());
        assert!(validate_request(&req).is_err());

        let mut req = request(2);
        req.campaign_id = " ".to_string();
        assert!(validate_request(&req).is_err());
    }
}
