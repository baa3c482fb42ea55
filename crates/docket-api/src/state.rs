//! Shared handler state and its assembly from configuration

use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

use docket_core::audit::{AuditTrail, AuditTrailConfig};
use docket_core::completion::openai::OpenAiCompletionService;
use docket_core::completion::{CompletionClient, CompletionService};
use docket_core::metrics::MetricsRegistry;
use docket_core::rate_limit::{RateLimitConfig, RateLimiter};
use docket_core::repository::{CaseRepository, MemoryRepository};
use docket_core::{ConfigError, RulingOrchestrator, StorageError};
use docket_storage::SledRepository;

use crate::config::ServiceConfig;

/// Errors raised while assembling the service
#[derive(Error, Debug)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to open storage: {0}")]
    Storage(#[from] StorageError),

    #[error("Failed to register metrics: {0}")]
    Metrics(#[from] prometheus::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Sled,
    Memory,
}

impl StorageBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageBackend::Sled => "sled",
            StorageBackend::Memory => "memory",
        }
    }
}

/// State shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub repository: Arc<dyn CaseRepository>,
    pub orchestrator: Arc<RulingOrchestrator>,
    pub audit: Arc<AuditTrail>,
    pub metrics: Arc<MetricsRegistry>,
    pub storage_backend: StorageBackend,
    pub completion_model: String,
    pub cors_origin: String,
    pub start_time: Instant,
}

/// Everything `AppState::assemble` wires together
pub struct StateParts {
    pub repository: Arc<dyn CaseRepository>,
    pub storage_backend: StorageBackend,
    pub completion: Arc<dyn CompletionService>,
    pub rate_limit: RateLimitConfig,
    pub audit: AuditTrailConfig,
    pub cors_origin: String,
}

impl AppState {
    /// Wire the pipeline around the given collaborators. Spawns the audit
    /// writer, so it must run inside a tokio runtime.
    pub fn assemble(parts: StateParts) -> Result<Self, StartupError> {
        let metrics = Arc::new(MetricsRegistry::new()?);
        let limiter = Arc::new(RateLimiter::new(parts.rate_limit)?);

        let client = CompletionClient::new(parts.completion).with_metrics(metrics.docket());
        let completion_model = client.model().to_string();

        let audit = Arc::new(
            AuditTrail::spawn(Arc::clone(&parts.repository), parts.audit)
                .with_metrics(metrics.docket()),
        );

        let orchestrator = RulingOrchestrator::new(
            Arc::clone(&parts.repository),
            limiter,
            client,
            audit.clone(),
        )
        .with_metrics(metrics.docket());

        Ok(Self {
            repository: parts.repository,
            orchestrator: Arc::new(orchestrator),
            audit,
            metrics,
            storage_backend: parts.storage_backend,
            completion_model,
            cors_origin: parts.cors_origin,
            start_time: Instant::now(),
        })
    }

    /// Build the production state: sled when a data directory is configured,
    /// memory otherwise, and the OpenAI-compatible completion service.
    pub fn from_config(config: &ServiceConfig) -> Result<Self, StartupError> {
        config.validate()?;

        let (repository, storage_backend) = match &config.data_dir {
            Some(dir) => {
                let sled: Arc<dyn CaseRepository> = Arc::new(SledRepository::open(dir)?);
                (sled, StorageBackend::Sled)
            }
            None => {
                tracing::warn!("No data directory configured, records will not survive a restart");
                let memory: Arc<dyn CaseRepository> = Arc::new(MemoryRepository::new());
                (memory, StorageBackend::Memory)
            }
        };

        let completion = Arc::new(OpenAiCompletionService::new(config.openai())?);

        Self::assemble(StateParts {
            repository,
            storage_backend,
            completion,
            rate_limit: config.rate_limit(),
            audit: config.audit(),
            cors_origin: config.cors_origin.clone(),
        })
    }
}
