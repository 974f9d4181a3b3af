pub mod audit;
pub mod config;
pub mod executor;
pub mod metrics;
pub mod orchestrator;
pub mod preset;
pub mod quality;
pub mod queue;
pub mod storage;
pub mod testing;
pub mod transform;
pub mod video;

pub use audit::{
    create_audit_system, AuditEvent, AuditFilter, AuditHandle, AuditRecord, AuditStore,
    AuditWriter, SqliteAuditStore,
};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, LogFormat,
};
pub use executor::{EncoderConfig, FfmpegEncoder, MediaEncoder, TransformExecutor};
pub use orchestrator::{
    OrchestratorConfig, OrchestratorError, RetryConfig, UniquifyOrchestrator, UniquifyPipeline,
};
pub use preset::{ModificationSettings, ParameterGenerator, PresetCatalog, Remediator};
pub use quality::{DefectType, FfmpegAnalyzer, QualityFlag, QualityVerifier};
pub use queue::{JobQueue, MemoryJobQueue};
pub use storage::{ArtifactStore, DefaultSourceStore, FsArtifactStore, SourceStore};
pub use transform::{FilterGraph, TargetPlatform, TransformCompiler};
pub use video::{ProcessedVideo, ProcessedVideoStore, ProcessingStatus, SqliteVideoStore};
