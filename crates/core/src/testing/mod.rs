//! Testing utilities and mock implementations for end-to-end tests.
//!
//! The mocks stand in for ffmpeg, remote storage and the media analyzer so
//! the whole pipeline can run without external tools.
//!
//! # Example
//!
//! ```rust,ignore
//! use postplex_core::testing::{fixtures, TestHarness};
//!
//! let harness = TestHarness::new(RetryConfig::immediate(3)).await;
//! harness.add_source("src-1").await;
//!
//! let result = harness.orchestrator.submit(fixtures::submit_request("camp", &["src-1"], 2)).await?;
//! harness.drain().await;
//! ```

mod mock_analyzer;
mod mock_encoder;
mod mock_storage;

pub use mock_analyzer::{MockAnalyzer, MockSignals};
pub use mock_encoder::{MockEncoder, RecordedEncode};
pub use mock_storage::{MockArtifactStore, MockSourceStore, StoredArtifact};

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use crate::audit::{create_audit_system, AuditFilter, AuditRecord, AuditStore, SqliteAuditStore};
use crate::executor::TransformExecutor;
use crate::orchestrator::{OrchestratorConfig, RetryConfig, UniquifyOrchestrator, UniquifyPipeline};
use crate::preset::{ParameterGenerator, PresetCatalog};
use crate::quality::QualityVerifier;
use crate::queue::MemoryJobQueue;
use crate::transform::{TransformCompiler, DEFAULT_SAMPLE_RATE};
use crate::video::SqliteVideoStore;

/// A fully wired orchestrator over mocks, an in-memory database and a
/// temporary staging directory.
pub struct TestHarness {
    pub orchestrator: UniquifyOrchestrator,
    pub store: Arc<SqliteVideoStore>,
    pub queue: Arc<MemoryJobQueue>,
    pub encoder: Arc<MockEncoder>,
    pub sources: Arc<MockSourceStore>,
    pub artifacts: Arc<MockArtifactStore>,
    pub analyzer: Arc<MockAnalyzer>,
    pub audit_store: Arc<SqliteAuditStore>,
    pub staging: TempDir,
}

impl TestHarness {
    /// Builds the harness with a seeded generator. Must run inside a tokio
    /// runtime; the audit writer is spawned onto it.
    pub async fn new(retry: RetryConfig) -> Self {
        Self::with_config(OrchestratorConfig::default(), retry).await
    }

    pub async fn with_config(config: OrchestratorConfig, retry: RetryConfig) -> Self {
        let staging = tempfile::tempdir().expect("create staging dir");
        let store = Arc::new(SqliteVideoStore::in_memory().expect("open video store"));
        let queue = Arc::new(MemoryJobQueue::new());
        let encoder = Arc::new(MockEncoder::new());
        let sources = Arc::new(MockSourceStore::new());
        let artifacts = Arc::new(MockArtifactStore::new());
        let analyzer = Arc::new(MockAnalyzer::new());
        let audit_store = Arc::new(SqliteAuditStore::in_memory().expect("open audit store"));

        let (audit, writer) = create_audit_system(audit_store.clone(), 256);
        tokio::spawn(writer.run());

        let pipeline = UniquifyPipeline {
            generator: Arc::new(ParameterGenerator::seeded(PresetCatalog::builtin(), 7)),
            compiler: TransformCompiler::new(DEFAULT_SAMPLE_RATE),
            executor: Arc::new(TransformExecutor::new(
                staging.path().to_path_buf(),
                sources.clone(),
                encoder.clone(),
                artifacts.clone(),
            )),
            verifier: Arc::new(QualityVerifier::new(analyzer.clone())),
        };

        let orchestrator = UniquifyOrchestrator::new(
            config,
            retry,
            pipeline,
            store.clone(),
            queue.clone(),
            Some(audit),
        );

        Self {
            orchestrator,
            store,
            queue,
            encoder,
            sources,
            artifacts,
            analyzer,
            audit_store,
            staging,
        }
    }

    /// Registers a small source clip at `sources/<id>.mp4`.
    pub async fn add_source(&self, id: &str) -> String {
        let location = fixtures::source_location(id);
        self.sources
            .insert(location.clone(), format!("source-bytes-{}", id).into_bytes())
            .await;
        location
    }

    /// Runs queued jobs on the calling task until the queue has nothing
    /// ready. Returns the number of jobs handled.
    pub async fn drain(&self) -> usize {
        let mut handled = 0;
        while let Ok(true) = self.orchestrator.run_once(Duration::from_millis(20)).await {
            handled += 1;
        }
        handled
    }

    /// Audit records of one type, oldest first, once the writer caught up.
    pub async fn audit_events(&self, event_type: &str) -> Vec<AuditRecord> {
        // The writer drains its channel asynchronously.
        tokio::time::sleep(Duration::from_millis(50)).await;
        let mut records = self
            .audit_store
            .query(&AuditFilter::new().with_event_type(event_type).with_limit(1000))
            .unwrap_or_default();
        records.reverse();
        records
    }

    /// Staging subdirectories still present.
    pub fn staged_dirs(&self) -> usize {
        std::fs::read_dir(self.staging.path())
            .map(|entries| entries.count())
            .unwrap_or(0)
    }
}

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::orchestrator::{SourceVideo, SubmitRequest};
    use crate::preset::ModificationSettings;

    pub fn source_location(id: &str) -> String {
        format!("sources/{}.mp4", id)
    }

    pub fn source(id: &str) -> SourceVideo {
        SourceVideo {
            id: id.to_string(),
            location: source_location(id),
            duration_secs: Some(30.0),
        }
    }

    /// A submission for `source_ids` with the default preset and platform.
    pub fn submit_request(campaign_id: &str, source_ids: &[&str], versions: u32) -> SubmitRequest {
        SubmitRequest {
            user_id: "user-1".to_string(),
            campaign_id: campaign_id.to_string(),
            sources: source_ids.iter().map(|id| source(id)).collect(),
            preset: None,
            versions_per_video: versions,
            target_platform: None,
        }
    }

    /// Settings inside every builtin preset's envelope.
    pub fn settings() -> ModificationSettings {
        ModificationSettings {
            speed: 1.0,
            brightness: 2.0,
            saturation: 3.0,
            crop: 1.0,
            audio_pitch: 1.0,
            flipped: false,
            rotation: 0.0,
            noise: 0.0,
        }
    }
}
