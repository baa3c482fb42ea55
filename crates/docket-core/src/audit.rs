//! Fire-and-forget audit trail
//!
//! Callers hand records to an `AuditSink` and move on. `AuditTrail` queues
//! them on a bounded channel and a background task appends them to the
//! repository. A full queue or a failed append is logged and counted; it never
//! surfaces to the caller.

use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

use crate::metrics::DocketMetrics;
use crate::model::{AuditRecord, UserId};
use crate::repository::CaseRepository;

pub const ACTION_CASE_CREATE: &str = "case_create";
pub const ACTION_RULING_GENERATED: &str = "ruling_generated";
pub const ACTION_BIAS_CHECKED: &str = "bias_checked";
pub const ACTION_USER_CREATE: &str = "user_create";

pub trait AuditSink: Send + Sync {
    fn record(&self, user_id: UserId, action: &str, metadata: Value);
}

#[derive(Debug, Clone)]
pub struct AuditTrailConfig {
    /// Records buffered before new ones are dropped
    pub queue_size: usize,
}

impl Default for AuditTrailConfig {
    fn default() -> Self {
        Self { queue_size: 1024 }
    }
}

enum AuditMessage {
    Record(AuditRecord),
    Flush(oneshot::Sender<()>),
}

/// Queue-backed `AuditSink` writing to a `CaseRepository`
pub struct AuditTrail {
    sender: mpsc::Sender<AuditMessage>,
    metrics: Option<Arc<DocketMetrics>>,
}

impl AuditTrail {
    /// Start the writer task. Must be called inside a tokio runtime.
    pub fn spawn(repository: Arc<dyn CaseRepository>, config: AuditTrailConfig) -> Self {
        let (sender, mut receiver) = mpsc::channel::<AuditMessage>(config.queue_size.max(1));

        tokio::spawn(async move {
            while let Some(message) = receiver.recv().await {
                match message {
                    AuditMessage::Record(record) => {
                        let action = record.action.clone();
                        let user_id = record.user_id;
                        match repository.append_audit(record).await {
                            Ok(entry) => tracing::debug!(
                                entry_id = entry.id,
                                user_id = user_id,
                                action = %action,
                                "Audit entry written"
                            ),
                            Err(e) => tracing::warn!(
                                user_id = user_id,
                                action = %action,
                                error = %e,
                                "Failed to write audit entry"
                            ),
                        }
                    }
                    AuditMessage::Flush(done) => {
                        let _ = done.send(());
                    }
                }
            }
            tracing::debug!("Audit trail writer stopped");
        });

        Self {
            sender,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<DocketMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Wait until every record queued before this call has been handled
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.sender.send(AuditMessage::Flush(done)).await.is_ok() {
            let _ = wait.await;
        }
    }
}

impl AuditSink for AuditTrail {
    fn record(&self, user_id: UserId, action: &str, metadata: Value) {
        let record = AuditRecord {
            user_id,
            action: action.to_string(),
            metadata,
        };
        if let Err(e) = self.sender.try_send(AuditMessage::Record(record)) {
            let reason = match e {
                mpsc::error::TrySendError::Full(_) => "queue full",
                mpsc::error::TrySendError::Closed(_) => "writer stopped",
            };
            tracing::warn!(user_id = user_id, action = action, reason = reason, "Dropped audit record");
            if let Some(metrics) = &self.metrics {
                metrics.record_audit_dropped();
            }
        }
    }
}
