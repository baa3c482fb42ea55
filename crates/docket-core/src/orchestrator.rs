//! Ruling orchestration
//!
//! One `rule_case` call runs the whole pipeline for a case:
//!
//! 1. resolve the case, scoped to the caller
//! 2. admit the call through the rate limiter (before any upstream call)
//! 3. generate the ruling and upsert it onto the case
//! 4. audit `ruling_generated`
//! 5. optionally run the bias audit, upsert it and audit `bias_checked`
//!
//! A failed ruling call writes nothing. A failed bias call after the ruling
//! was stored returns the error and leaves the new ruling in place.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use crate::audit::{AuditSink, ACTION_BIAS_CHECKED, ACTION_RULING_GENERATED};
use crate::completion::{CompletionClient, RulingResult};
use crate::error::{Result, RulingError};
use crate::metrics::DocketMetrics;
use crate::model::{BiasCheck, Case, CaseId, Ruling, UserId};
use crate::rate_limit::RateLimiter;
use crate::repository::CaseRepository;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleOptions {
    /// Run the bias audit after the ruling
    #[serde(default)]
    pub bias_check: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RulingOutcome {
    pub ruling: Ruling,
    pub bias_check: Option<BiasCheck>,
}

enum BiasStep {
    Skipped,
    Checked(BiasCheck),
    Failed(RulingError),
}

pub struct RulingOrchestrator {
    repository: Arc<dyn CaseRepository>,
    limiter: Arc<RateLimiter>,
    client: CompletionClient,
    audit: Arc<dyn AuditSink>,
    metrics: Option<Arc<DocketMetrics>>,
}

impl RulingOrchestrator {
    pub fn new(
        repository: Arc<dyn CaseRepository>,
        limiter: Arc<RateLimiter>,
        client: CompletionClient,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            repository,
            limiter,
            client,
            audit,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<DocketMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Generate (or regenerate) the ruling for `case_id` on behalf of `user_id`
    pub async fn rule_case(
        &self,
        user_id: UserId,
        case_id: CaseId,
        options: RuleOptions,
    ) -> Result<RulingOutcome> {
        let case = self
            .repository
            .find_owned_case(case_id, user_id)
            .await?
            .ok_or(RulingError::NotFound(case_id))?;

        if !self.limiter.try_consume(user_id) {
            tracing::info!(user_id = user_id, case_id = case_id, "Ruling request rate limited");
            if let Some(metrics) = &self.metrics {
                metrics.record_rate_limited();
            }
            return Err(RulingError::RateLimited(user_id));
        }

        let extra = vec![("case_id".to_string(), case.id.to_string())];
        let result = self.client.generate_ruling(&case, &extra).await?;

        let ruling = self.repository.upsert_ruling(case.id, result.fields()).await?;
        tracing::info!(
            user_id = user_id,
            case_id = case.id,
            ruling_id = ruling.id,
            verdict = %ruling.verdict,
            tokens_in = ruling.tokens_in,
            tokens_out = ruling.tokens_out,
            "Ruling stored"
        );
        if let Some(metrics) = &self.metrics {
            metrics.record_ruling(ruling.verdict);
        }
        self.audit.record(
            user_id,
            ACTION_RULING_GENERATED,
            json!({
                "case_id": case.id,
                "ruling_id": ruling.id,
                "verdict": ruling.verdict,
            }),
        );

        let step = if options.bias_check {
            self.bias_check(user_id, &case, &ruling, &result).await
        } else {
            BiasStep::Skipped
        };

        match step {
            BiasStep::Skipped => Ok(RulingOutcome {
                ruling,
                bias_check: None,
            }),
            BiasStep::Checked(check) => Ok(RulingOutcome {
                ruling,
                bias_check: Some(check),
            }),
            BiasStep::Failed(err) => {
                tracing::warn!(
                    case_id = case.id,
                    ruling_id = ruling.id,
                    error = %err,
                    "Bias check failed; stored ruling kept"
                );
                Err(err)
            }
        }
    }

    async fn bias_check(
        &self,
        user_id: UserId,
        case: &Case,
        ruling: &Ruling,
        result: &RulingResult,
    ) -> BiasStep {
        let bias = match self.client.run_bias_check(&result.raw.to_string()).await {
            Ok(bias) => bias,
            Err(e) => return BiasStep::Failed(e.into()),
        };

        let check = match self
            .repository
            .upsert_bias_check(ruling.id, bias.fields())
            .await
        {
            Ok(check) => check,
            Err(e) => return BiasStep::Failed(e.into()),
        };

        tracing::info!(
            case_id = case.id,
            ruling_id = ruling.id,
            bias_score = check.bias_score,
            "Bias check stored"
        );
        if let Some(metrics) = &self.metrics {
            metrics.record_bias_check();
        }
        self.audit.record(
            user_id,
            ACTION_BIAS_CHECKED,
            json!({
                "case_id": case.id,
                "ruling_id": ruling.id,
                "bias_score": check.bias_score,
            }),
        );

        BiasStep::Checked(check)
    }
}
