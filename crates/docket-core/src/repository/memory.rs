//! In-memory repository, used for tests and storage-less deployments

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::CaseRepository;
use crate::error::{StorageError, StorageResult};
use crate::model::{
    AuditEntry, AuditRecord, BiasCheck, BiasFields, Case, CaseId, NewCase, Ruling, RulingFields,
    RulingId, User, UserId,
};

#[derive(Default)]
struct State {
    next_id: i64,
    users: HashMap<UserId, User>,
    cases: HashMap<CaseId, Case>,
    rulings: HashMap<CaseId, Ruling>,
    bias_checks: HashMap<RulingId, BiasCheck>,
    audit: Vec<AuditEntry>,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Default)]
pub struct MemoryRepository {
    state: RwLock<State>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn ruling_count(&self) -> usize {
        self.state.read().await.rulings.len()
    }

    pub async fn bias_check_count(&self) -> usize {
        self.state.read().await.bias_checks.len()
    }
}

#[async_trait]
impl CaseRepository for MemoryRepository {
    async fn create_user(&self, username: &str) -> StorageResult<User> {
        let mut state = self.state.write().await;
        if state.users.values().any(|user| user.username == username) {
            return Err(StorageError::Conflict(format!(
                "username '{}' is already taken",
                username
            )));
        }
        let user = User {
            id: state.next_id(),
            username: username.to_string(),
            created_at: Utc::now(),
        };
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user(&self, user_id: UserId) -> StorageResult<Option<User>> {
        Ok(self.state.read().await.users.get(&user_id).cloned())
    }

    async fn create_case(&self, owner_id: UserId, case: NewCase) -> StorageResult<Case> {
        let mut state = self.state.write().await;
        let case = Case {
            id: state.next_id(),
            owner_id,
            title: case.title,
            narrative: case.narrative,
            locale: case.locale,
            created_at: Utc::now(),
        };
        state.cases.insert(case.id, case.clone());
        Ok(case)
    }

    async fn list_cases(&self, owner_id: UserId) -> StorageResult<Vec<Case>> {
        let state = self.state.read().await;
        let mut cases: Vec<Case> = state
            .cases
            .values()
            .filter(|case| case.is_owned_by(owner_id))
            .cloned()
            .collect();
        cases.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(cases)
    }

    async fn find_case(&self, case_id: CaseId) -> StorageResult<Option<Case>> {
        Ok(self.state.read().await.cases.get(&case_id).cloned())
    }

    async fn find_ruling(&self, case_id: CaseId) -> StorageResult<Option<Ruling>> {
        Ok(self.state.read().await.rulings.get(&case_id).cloned())
    }

    async fn find_bias_check(&self, ruling_id: RulingId) -> StorageResult<Option<BiasCheck>> {
        Ok(self.state.read().await.bias_checks.get(&ruling_id).cloned())
    }

    async fn upsert_ruling(&self, case_id: CaseId, fields: RulingFields) -> StorageResult<Ruling> {
        let mut state = self.state.write().await;
        if !state.cases.contains_key(&case_id) {
            return Err(StorageError::NotFound(format!("case {}", case_id)));
        }

        let now = Utc::now();
        if let Some(ruling) = state.rulings.get_mut(&case_id) {
            ruling.overwrite(fields, now);
            return Ok(ruling.clone());
        }

        let ruling = Ruling::create(state.next_id(), case_id, fields, now);
        state.rulings.insert(case_id, ruling.clone());
        Ok(ruling)
    }

    async fn upsert_bias_check(
        &self,
        ruling_id: RulingId,
        fields: BiasFields,
    ) -> StorageResult<BiasCheck> {
        let mut state = self.state.write().await;
        if !state.rulings.values().any(|ruling| ruling.id == ruling_id) {
            return Err(StorageError::NotFound(format!("ruling {}", ruling_id)));
        }

        let now = Utc::now();
        if let Some(check) = state.bias_checks.get_mut(&ruling_id) {
            check.overwrite(fields, now);
            return Ok(check.clone());
        }

        let check = BiasCheck::create(state.next_id(), ruling_id, fields, now);
        state.bias_checks.insert(ruling_id, check.clone());
        Ok(check)
    }

    async fn append_audit(&self, record: AuditRecord) -> StorageResult<AuditEntry> {
        let mut state = self.state.write().await;
        let entry = AuditEntry {
            id: state.next_id(),
            user_id: record.user_id,
            action: record.action,
            metadata: record.metadata,
            created_at: Utc::now(),
        };
        state.audit.push(entry.clone());
        Ok(entry)
    }

    async fn list_audit(&self, user_id: UserId, limit: usize) -> StorageResult<Vec<AuditEntry>> {
        let state = self.state.read().await;
        Ok(state
            .audit
            .iter()
            .rev()
            .filter(|entry| entry.user_id == user_id)
            .take(limit)
            .cloned()
            .collect())
    }
}
