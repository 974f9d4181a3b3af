//! Uniquify lifecycle integration tests.
//!
//! These tests drive processed videos through the orchestrator:
//! pending -> processing -> completed | failed

use std::time::Duration;

use postplex_core::{
    executor::ExecutorError,
    orchestrator::{OrchestratorConfig, OrchestratorError, ReprocessOptions, RetryConfig},
    preset::ModificationSettings,
    queue::{EnqueueOptions, JobHandle, JobQueue, UniquifyJob},
    testing::{fixtures, MockEncoder, TestHarness},
    transform::TargetPlatform,
    video::{ProcessedVideoStore, ProcessingStatus, VideoFilter},
};

#[tokio::test]
async fn test_submit_creates_one_record_per_version() {
    let harness = TestHarness::new(RetryConfig::immediate(3)).await;
    harness.add_source("src-1").await;
    harness.add_source("src-2").await;

    let result = harness
        .orchestrator
        .submit(fixtures::submit_request("camp-1", &["src-1", "src-2"], 3))
        .await
        .unwrap();

    assert_eq!(result.preset, "smart");
    assert_eq!(result.target_platform, TargetPlatform::Tiktok);
    assert_eq!(result.videos.len(), 6);
    assert!(result.videos.iter().all(|v| v.status == ProcessingStatus::Pending));
    assert!(result.videos.iter().all(|v| v.job_id.is_some()));

    let versions: Vec<u32> = result
        .videos
        .iter()
        .filter(|v| v.source_video_id == "src-1")
        .map(|v| v.version_number)
        .collect();
    assert_eq!(versions, vec![1, 2, 3]);

    // Every version gets its own draw.
    let first = &result.videos[0].settings;
    assert!(result.videos[1..3].iter().any(|v| &v.settings != first));

    assert_eq!(result.estimated_storage.total_mb, 6.0 * 5.0);
    assert_eq!(harness.orchestrator.status().await.queued_jobs, 6);
    assert_eq!(harness.audit_events("batch_submitted").await.len(), 1);
}

#[tokio::test]
async fn test_submit_rejects_invalid_requests() {
    let harness = TestHarness::new(RetryConfig::immediate(3)).await;

    let mut request = fixtures::submit_request("camp-1", &["src-1"], 2);
    request.preset = Some("turbo".to_string());
    assert!(matches!(
        harness.orchestrator.submit(request).await,
        Err(OrchestratorError::InvalidPreset { .. })
    ));

    let request = fixtures::submit_request("camp-1", &["src-1"], 11);
    assert!(matches!(
        harness.orchestrator.submit(request).await,
        Err(OrchestratorError::InvalidRequest(_))
    ));

    let request = fixtures::submit_request("camp-1", &[], 1);
    assert!(matches!(
        harness.orchestrator.submit(request).await,
        Err(OrchestratorError::InvalidRequest(_))
    ));

    assert_eq!(harness.orchestrator.results("camp-1").unwrap().len(), 0);
    assert_eq!(harness.orchestrator.status().await.queued_jobs, 0);
}

#[tokio::test]
async fn test_batch_completes_and_publishes() {
    let harness = TestHarness::new(RetryConfig::immediate(3)).await;
    harness.add_source("src-1").await;

    harness
        .orchestrator
        .submit(fixtures::submit_request("camp-1", &["src-1"], 2))
        .await
        .unwrap();
    assert_eq!(harness.drain().await, 2);

    let results = harness.orchestrator.results("camp-1").unwrap();
    assert_eq!(results.len(), 2);
    for video in &results {
        assert_eq!(video.status, ProcessingStatus::Completed);
        assert!(video.quality_verified);
        assert!(video.quality_flags.is_empty());
        let location = video.output_location.as_deref().unwrap();
        assert!(location.starts_with("mock://processed/user-1/camp-1/"));
        assert!(location.ends_with(&format!("-{}.mp4", video.id)));
        assert!(harness.artifacts.get(location).await.is_some());
    }

    assert_eq!(harness.encoder.encode_count().await, 2);
    assert_eq!(harness.staged_dirs(), 0);

    let status = harness.orchestrator.batch_status("camp-1").unwrap();
    assert_eq!(status.counts.completed, 2);
    assert_eq!(status.percent_complete, 100);
    assert!(status.current.is_none());
    assert!(status.failures.is_empty());

    let completed = harness.audit_events("processing_completed").await;
    assert_eq!(completed.len(), 2);
}

#[tokio::test]
async fn test_safe_preset_batch_completes_without_rotation_or_noise() {
    let harness = TestHarness::new(RetryConfig::immediate(3)).await;
    harness.add_source("src-1").await;

    let mut request = fixtures::submit_request("camp-safe", &["src-1"], 3);
    request.preset = Some("safe".to_string());
    let result = harness.orchestrator.submit(request).await.unwrap();
    assert_eq!(result.preset, "safe");
    assert_eq!(result.videos.len(), 3);

    assert_eq!(harness.drain().await, 3);

    let results = harness.orchestrator.results("camp-safe").unwrap();
    assert_eq!(results.len(), 3);
    for video in &results {
        assert_eq!(video.status, ProcessingStatus::Completed);
        assert_eq!(video.preset.as_deref(), Some("safe"));
        assert_eq!(video.settings.rotation, 0.0);
        assert_eq!(video.settings.noise, 0.0);
        assert!(!video.settings.flipped);
    }

    for encode in harness.encoder.recorded_encodes().await {
        let stages = encode.job.graph.stage_names();
        assert!(!stages.contains(&"rotate"));
        assert!(!stages.contains(&"noise"));
    }
    assert_eq!(
        harness.orchestrator.batch_status("camp-safe").unwrap().percent_complete,
        100
    );
}

#[tokio::test]
async fn test_encode_keeps_source_resolution_and_audio_sync_at_48khz() {
    let harness = TestHarness::new(RetryConfig::immediate(3)).await;
    let mut info = MockEncoder::default_info();
    info.audio_sample_rate = Some(48_000);
    harness.encoder.set_media_info(info).await;
    harness.add_source("src-1").await;

    let result = harness
        .orchestrator
        .submit(fixtures::submit_request("camp-1", &["src-1"], 1))
        .await
        .unwrap();
    let id = result.videos[0].id.clone();
    harness.drain().await;

    harness
        .orchestrator
        .reprocess(&id, ReprocessOptions::with_settings(fixtures::settings()))
        .await
        .unwrap();
    assert_eq!(harness.drain().await, 1);

    let encodes = harness.encoder.recorded_encodes().await;
    let graph = &encodes.last().unwrap().job.graph;

    // Crop 1% then scale back to exactly the probed 1080x1920 frame.
    let vf = graph.video_filter().unwrap();
    assert!(vf.contains("crop=iw*0.98:ih*0.98,scale=1080:1920"), "{}", vf);

    // The 48 kHz input is brought to the working rate before the relabel.
    let af = graph.audio_filter().unwrap();
    assert!(
        af.starts_with("aresample=44100,asetrate=44100*1.01,aresample=44100,atempo="),
        "{}",
        af
    );
}

#[tokio::test]
async fn test_resubmission_continues_version_numbers() {
    let harness = TestHarness::new(RetryConfig::immediate(3)).await;
    harness.add_source("src-1").await;

    harness
        .orchestrator
        .submit(fixtures::submit_request("camp-1", &["src-1"], 2))
        .await
        .unwrap();
    let second = harness
        .orchestrator
        .submit(fixtures::submit_request("camp-1", &["src-1"], 2))
        .await
        .unwrap();

    let versions: Vec<u32> = second.videos.iter().map(|v| v.version_number).collect();
    assert_eq!(versions, vec![3, 4]);
}

#[tokio::test]
async fn test_transient_failure_is_retried() {
    let harness = TestHarness::new(RetryConfig::immediate(3)).await;
    harness.add_source("src-1").await;
    harness.sources.fail_next(1).await;

    let result = harness
        .orchestrator
        .submit(fixtures::submit_request("camp-1", &["src-1"], 1))
        .await
        .unwrap();
    let id = result.videos[0].id.clone();

    // First attempt fails at the source download.
    assert!(harness
        .orchestrator
        .run_once(Duration::from_millis(50))
        .await
        .unwrap());
    let video = harness.orchestrator.get(&id).unwrap();
    assert_eq!(video.status, ProcessingStatus::Failed);
    assert!(!video.terminal);
    assert_eq!(video.retry_count, 1);
    assert!(video.error_message.unwrap().contains("Source unavailable"));

    harness.drain().await;
    let video = harness.orchestrator.get(&id).unwrap();
    assert_eq!(video.status, ProcessingStatus::Completed);
    assert_eq!(harness.encoder.encode_count().await, 1);

    let failed = harness.audit_events("processing_failed").await;
    assert_eq!(failed.len(), 1);
}

#[tokio::test]
async fn test_retries_exhaust_to_terminal_failure() {
    let harness = TestHarness::new(RetryConfig::immediate(3)).await;
    harness.add_source("src-1").await;
    harness.encoder.set_always_fail(Some("codec exploded")).await;

    let result = harness
        .orchestrator
        .submit(fixtures::submit_request("camp-1", &["src-1"], 1))
        .await
        .unwrap();
    assert_eq!(harness.drain().await, 3);

    let video = harness.orchestrator.get(&result.videos[0].id).unwrap();
    assert_eq!(video.status, ProcessingStatus::Failed);
    assert!(video.terminal);
    assert_eq!(video.retry_count, 3);
    assert!(video.output_location.is_none());
    assert_eq!(harness.encoder.encode_count().await, 3);
    assert_eq!(harness.staged_dirs(), 0);

    let status = harness.orchestrator.batch_status("camp-1").unwrap();
    assert_eq!(status.failures.len(), 1);
    assert!(status.failures[0].terminal);
    assert_eq!(status.percent_complete, 0);
}

#[tokio::test]
async fn test_invalid_settings_fail_without_retry() {
    let harness = TestHarness::new(RetryConfig::immediate(3)).await;
    harness.add_source("src-1").await;

    let result = harness
        .orchestrator
        .submit(fixtures::submit_request("camp-1", &["src-1"], 1))
        .await
        .unwrap();
    let video = &result.videos[0];

    // Swap the queued job for one carrying out-of-domain settings.
    let original = JobHandle(video.job_id.clone().unwrap());
    assert!(harness.queue.cancel(&original).await.unwrap());
    harness
        .queue
        .enqueue(
            UniquifyJob {
                processed_video_id: video.id.clone(),
                source_video_id: video.source_video_id.clone(),
                source_location: video.source_location.clone(),
                settings: ModificationSettings {
                    speed: 3.0,
                    ..fixtures::settings()
                },
                target_platform: video.target_platform,
                revision: video.revision,
            },
            EnqueueOptions {
                attempts: 3,
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(harness.drain().await, 1);

    let video = harness.orchestrator.get(&video.id).unwrap();
    assert_eq!(video.status, ProcessingStatus::Failed);
    assert!(video.terminal);
    assert_eq!(video.retry_count, 1);
    assert!(video.error_message.unwrap().contains("speed"));
    assert_eq!(harness.encoder.encode_count().await, 0);
}

#[tokio::test]
async fn test_partial_batch_failure_reports_progress() {
    let harness = TestHarness::new(RetryConfig::immediate(2)).await;
    // src-2 is never registered, so every fetch of it fails.
    harness.add_source("src-1").await;

    harness
        .orchestrator
        .submit(fixtures::submit_request("camp-1", &["src-1", "src-2"], 1))
        .await
        .unwrap();
    harness.drain().await;

    let status = harness.orchestrator.batch_status("camp-1").unwrap();
    assert_eq!(status.total, 2);
    assert_eq!(status.counts.completed, 1);
    assert_eq!(status.counts.failed, 1);
    assert_eq!(status.percent_complete, 50);
    assert_eq!(status.failures[0].source_video_id, "src-2");
    assert!(status.failures[0].terminal);
}

#[tokio::test]
async fn test_encode_failure_then_success_cleans_staging() {
    let harness = TestHarness::new(RetryConfig::immediate(2)).await;
    harness.add_source("src-1").await;
    harness
        .encoder
        .push_error(ExecutorError::encode_failed("killed", None))
        .await;

    let result = harness
        .orchestrator
        .submit(fixtures::submit_request("camp-1", &["src-1"], 1))
        .await
        .unwrap();

    harness
        .orchestrator
        .run_once(Duration::from_millis(50))
        .await
        .unwrap();
    assert_eq!(harness.staged_dirs(), 0);
    assert!(harness.artifacts.stored().await.is_empty());

    harness.drain().await;
    let video = harness.orchestrator.get(&result.videos[0].id).unwrap();
    assert_eq!(video.status, ProcessingStatus::Completed);

    let recorded = harness.encoder.recorded_encodes().await;
    assert_eq!(recorded.len(), 2);
    assert!(!recorded[0].success);
    assert!(recorded[1].success);
    assert_ne!(recorded[0].job.input_path, recorded[1].job.input_path);
    assert_eq!(harness.staged_dirs(), 0);
}

#[tokio::test]
async fn test_worker_pool_processes_in_background() {
    let config = OrchestratorConfig::default()
        .with_concurrency(2)
        .with_poll_interval_ms(20);
    let harness = TestHarness::with_config(config, RetryConfig::immediate(3)).await;
    harness.add_source("src-1").await;
    harness.add_source("src-2").await;

    assert!(!harness.orchestrator.is_running());
    harness.orchestrator.start().await;
    let status = harness.orchestrator.status().await;
    assert!(status.running);
    assert_eq!(status.workers, 2);

    harness
        .orchestrator
        .submit(fixtures::submit_request("camp-1", &["src-1", "src-2"], 2))
        .await
        .unwrap();

    let mut completed = 0;
    for _ in 0..100 {
        completed = harness
            .store
            .count(
                &VideoFilter::new()
                    .with_campaign("camp-1")
                    .with_status(ProcessingStatus::Completed),
            )
            .unwrap();
        if completed == 4 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(completed, 4);

    harness.orchestrator.stop().await;
    let status = harness.orchestrator.status().await;
    assert!(!status.running);
    assert_eq!(status.workers, 0);
    assert_eq!(status.active_jobs, 0);
}

#[tokio::test]
async fn test_recover_requeues_unfinished_records() {
    let harness = TestHarness::new(RetryConfig::immediate(3)).await;
    harness.add_source("src-1").await;

    let result = harness
        .orchestrator
        .submit(fixtures::submit_request("camp-1", &["src-1"], 3))
        .await
        .unwrap();

    // Simulate a restart: the queue is lost and one record was mid-encode.
    for video in &result.videos {
        let handle = JobHandle(video.job_id.clone().unwrap());
        assert!(harness.queue.cancel(&handle).await.unwrap());
    }
    harness
        .store
        .update(&result.videos[0].id, postplex_core::video::VideoUpdate::Processing)
        .unwrap();
    assert_eq!(harness.drain().await, 0);

    assert_eq!(harness.orchestrator.recover().await.unwrap(), 3);
    assert_eq!(harness.drain().await, 3);

    let results = harness.orchestrator.results("camp-1").unwrap();
    assert!(results.iter().all(|v| v.status == ProcessingStatus::Completed));

    // Nothing left to recover.
    assert_eq!(harness.orchestrator.recover().await.unwrap(), 0);
}
