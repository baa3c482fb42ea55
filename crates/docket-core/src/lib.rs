//! Docket core
//!
//! Turns free-text case narratives into structured rulings (and optional bias
//! assessments) produced by an external LLM completion service.
//!
//! ## Architecture
//!
//! Leaves first:
//!
//! 1. **Rate limiting** (`rate_limit`): per-user token bucket guarding the
//!    expensive completion calls.
//!
//! 2. **Prompts** (`prompts`): pure builders for the ruling and bias instruction
//!    pairs.
//!
//! 3. **Response validation** (`response`): strict parsing of the model's JSON
//!    output, plus the derived plain-language explanation.
//!
//! 4. **Completion** (`completion/`): the completion service boundary, an
//!    OpenAI-compatible HTTP implementation and the typed ruling/bias client.
//!
//! 5. **Orchestration** (`orchestrator`): admission, ruling generation,
//!    idempotent upserts, audit emission and the optional bias pass.
//!
//! Persistence (`repository/`) and the audit trail (`audit`) are collaborators
//! consumed through traits so the API server can plug in durable storage.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use docket_core::{
//!     audit::AuditTrail,
//!     completion::{openai::{OpenAiCompletionService, OpenAiConfig}, CompletionClient},
//!     rate_limit::{RateLimitConfig, RateLimiter},
//!     repository::{CaseRepository, MemoryRepository},
//!     RuleOptions, RulingOrchestrator,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let repository: Arc<dyn CaseRepository> = Arc::new(MemoryRepository::new());
//!     let service = OpenAiCompletionService::new(OpenAiConfig::new("sk-...", "gpt-4o-mini"))?;
//!     let orchestrator = RulingOrchestrator::new(
//!         Arc::clone(&repository),
//!         Arc::new(RateLimiter::new(RateLimitConfig::default())?),
//!         CompletionClient::new(Arc::new(service)),
//!         Arc::new(AuditTrail::spawn(Arc::clone(&repository), Default::default())),
//!     );
//!
//!     let outcome = orchestrator.rule_case(1, 1, RuleOptions { bias_check: true }).await?;
//!     println!("{}", outcome.ruling.verdict);
//!     Ok(())
//! }
//! ```

pub mod audit;
pub mod completion;
pub mod error;
pub mod metrics;
pub mod model;
pub mod orchestrator;
pub mod prompts;
pub mod rate_limit;
pub mod repository;
pub mod response;

pub use error::{CompletionError, ConfigError, Result, RulingError, StorageError, StorageResult};
pub use model::{
    AuditEntry, AuditRecord, BiasCheck, BiasFields, Case, CaseDetail, CaseId, NewCase, Ruling,
    RulingFields, RulingId, User, UserId, Verdict,
};
pub use orchestrator::{RuleOptions, RulingOrchestrator, RulingOutcome};
pub use response::plain_explanation;
