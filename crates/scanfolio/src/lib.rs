pub mod analysis;
pub mod config;
pub mod dedup;
pub mod error;
pub mod grouping;
pub mod hooks;
pub mod intake;
pub mod logging;
pub mod model;
pub mod queue;
pub mod sanitize;
pub mod secrets;
pub mod session;
pub mod store;

pub use analysis::{
    AnalysisRequest, AnalysisResponse, AnalysisService, HttpAnalysisService,
    OfflineAnalysisService, SafetyVerdict, TokenUsage,
};
pub use config::{load_config, load_config_from_str, Config};
pub use dedup::DuplicateCheck;
pub use error::{
    ConfigError, IntakeError, QueueStoreError, Result, ScanfolioError, StoreError,
};
pub use grouping::{group, DocumentGroup, GroupingEngine};
pub use hooks::{CommitHooks, ResultObserver};
pub use intake::{IntakeBatch, IntakeNormalizer, NormalizedPage, PageIntake, SourceFile};
pub use logging::init_tracing;
pub use model::{
    AnalysisPayload, DuplicateRef, Feedback, PageResult, ProcessingMode,
    CONFIRMED_DUPLICATE_CATEGORY, ERROR_CATEGORY,
};
pub use queue::{
    JsonQueueStore, MemoryQueueStore, QueueEvent, QueueEventKind, QueueItem, QueueState,
    QueueStatus, QueueStore, RunOutcome, Scheduler,
};
pub use secrets::{resolve_secret, resolve_secret_optional, SecretError};
pub use session::Session;
pub use store::{ResultStore, Snapshot, WriteMode};
