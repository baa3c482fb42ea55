//! Persistence boundary for users, cases, rulings, bias checks and audit entries
//!
//! Rulings are keyed by case and bias checks by ruling, so the upserts are the
//! only way to write them and there is never more than one of each.

mod memory;

pub use memory::MemoryRepository;

use async_trait::async_trait;

use crate::error::StorageResult;
use crate::model::{
    AuditEntry, AuditRecord, BiasCheck, BiasFields, Case, CaseDetail, CaseId, NewCase, Ruling,
    RulingFields, RulingId, User, UserId,
};

/// Audit entries returned by `list_audit` unless the caller asks otherwise
pub const DEFAULT_AUDIT_PAGE: usize = 50;

#[async_trait]
pub trait CaseRepository: Send + Sync {
    /// Create a user. Fails with `Conflict` when the username is taken.
    async fn create_user(&self, username: &str) -> StorageResult<User>;

    async fn find_user(&self, user_id: UserId) -> StorageResult<Option<User>>;

    async fn create_case(&self, owner_id: UserId, case: NewCase) -> StorageResult<Case>;

    /// The owner's cases, newest first
    async fn list_cases(&self, owner_id: UserId) -> StorageResult<Vec<Case>>;

    async fn find_case(&self, case_id: CaseId) -> StorageResult<Option<Case>>;

    async fn find_ruling(&self, case_id: CaseId) -> StorageResult<Option<Ruling>>;

    async fn find_bias_check(&self, ruling_id: RulingId) -> StorageResult<Option<BiasCheck>>;

    /// Insert the case's ruling, or overwrite it in place keeping its id.
    /// Fails with `NotFound` when the case does not exist.
    async fn upsert_ruling(&self, case_id: CaseId, fields: RulingFields) -> StorageResult<Ruling>;

    /// Insert or overwrite the ruling's bias check.
    /// Fails with `NotFound` when the ruling does not exist.
    async fn upsert_bias_check(
        &self,
        ruling_id: RulingId,
        fields: BiasFields,
    ) -> StorageResult<BiasCheck>;

    async fn append_audit(&self, record: AuditRecord) -> StorageResult<AuditEntry>;

    /// The user's most recent `limit` audit entries, newest first
    async fn list_audit(&self, user_id: UserId, limit: usize) -> StorageResult<Vec<AuditEntry>>;

    /// The case if it exists and belongs to `owner_id`. A foreign case reads
    /// the same as a missing one.
    async fn find_owned_case(
        &self,
        case_id: CaseId,
        owner_id: UserId,
    ) -> StorageResult<Option<Case>> {
        Ok(self
            .find_case(case_id)
            .await?
            .filter(|case| case.is_owned_by(owner_id)))
    }

    /// The owner's case with its ruling and bias check
    async fn case_detail(
        &self,
        case_id: CaseId,
        owner_id: UserId,
    ) -> StorageResult<Option<CaseDetail>> {
        let Some(case) = self.find_owned_case(case_id, owner_id).await? else {
            return Ok(None);
        };
        let ruling = self.find_ruling(case_id).await?;
        let bias_check = match &ruling {
            Some(ruling) => self.find_bias_check(ruling.id).await?,
            None => None,
        };
        Ok(Some(CaseDetail {
            case,
            ruling,
            bias_check,
        }))
    }
}
