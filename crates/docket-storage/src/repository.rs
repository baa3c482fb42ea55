use async_trait::async_trait;
use chrono::Utc;
use sled::transaction::{ConflictableTransactionError, TransactionError, Transactional};
use sled::{Db, Tree};
use std::path::Path;

use docket_core::repository::CaseRepository;
use docket_core::{
    AuditEntry, AuditRecord, BiasCheck, BiasFields, Case, CaseId, NewCase, Ruling, RulingFields,
    RulingId, StorageError, StorageResult, User, UserId,
};

use crate::keys::{backend, decode, decode_child, encode, id_key, pair_key};

/// sled-backed `CaseRepository`
pub struct SledRepository {
    db: Db,
    users: Tree,
    usernames: Tree,
    cases: Tree,
    cases_by_owner: Tree,
    rulings: Tree,
    ruling_index: Tree,
    bias_checks: Tree,
    audit: Tree,
}

impl SledRepository {
    /// Open (or create) a database directory
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        let db = sled::open(path).map_err(backend)?;
        tracing::info!(path = %path.display(), recovered = db.was_recovered(), "Opened sled repository");
        Self::from_db(db)
    }

    /// A database removed when dropped
    pub fn temporary() -> StorageResult<Self> {
        let db = sled::Config::new().temporary(true).open().map_err(backend)?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> StorageResult<Self> {
        let tree = |name: &str| db.open_tree(name).map_err(backend);
        Ok(Self {
            users: tree("users")?,
            usernames: tree("usernames")?,
            cases: tree("cases")?,
            cases_by_owner: tree("cases_by_owner")?,
            rulings: tree("rulings")?,
            ruling_index: tree("ruling_index")?,
            bias_checks: tree("bias_checks")?,
            audit: tree("audit")?,
            db,
        })
    }

    /// Flush dirty pages to disk
    pub async fn flush(&self) -> StorageResult<()> {
        self.db.flush_async().await.map_err(backend)?;
        Ok(())
    }

    // Ids start at 1; sled's generator starts at 0.
    fn next_id(&self) -> StorageResult<i64> {
        let id = self.db.generate_id().map_err(backend)?;
        Ok(id as i64 + 1)
    }

    fn get<T: serde::de::DeserializeOwned>(tree: &Tree, key: &[u8]) -> StorageResult<Option<T>> {
        match tree.get(key).map_err(backend)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }
}

fn abort(err: StorageError) -> ConflictableTransactionError<StorageError> {
    ConflictableTransactionError::Abort(err)
}

fn transaction_error(err: TransactionError<StorageError>) -> StorageError {
    match err {
        TransactionError::Abort(err) => err,
        TransactionError::Storage(err) => backend(err),
    }
}

#[async_trait]
impl CaseRepository for SledRepository {
    async fn create_user(&self, username: &str) -> StorageResult<User> {
        let user = User {
            id: self.next_id()?,
            username: username.to_string(),
            created_at: Utc::now(),
        };

        let claimed = self
            .usernames
            .compare_and_swap(
                username.as_bytes(),
                None::<&[u8]>,
                Some(&id_key(user.id)[..]),
            )
            .map_err(backend)?;
        if claimed.is_err() {
            return Err(StorageError::Conflict(format!(
                "username '{}' is already taken",
                username
            )));
        }

        self.users
            .insert(id_key(user.id), encode(&user)?)
            .map_err(backend)?;
        tracing::debug!(user_id = user.id, "User created");
        Ok(user)
    }

    async fn find_user(&self, user_id: UserId) -> StorageResult<Option<User>> {
        Self::get(&self.users, &id_key(user_id))
    }

    async fn create_case(&self, owner_id: UserId, case: NewCase) -> StorageResult<Case> {
        let case = Case {
            id: self.next_id()?,
            owner_id,
            title: case.title,
            narrative: case.narrative,
            locale: case.locale,
            created_at: Utc::now(),
        };
        let value = encode(&case)?;

        (&self.cases, &self.cases_by_owner)
            .transaction(|(cases, by_owner)| {
                cases.insert(&id_key(case.id)[..], value.clone())?;
                by_owner.insert(&pair_key(owner_id, case.id)[..], &b""[..])?;
                Ok::<_, ConflictableTransactionError<StorageError>>(())
            })
            .map_err(transaction_error)?;

        tracing::debug!(case_id = case.id, owner_id = owner_id, "Case created");
        Ok(case)
    }

    async fn list_cases(&self, owner_id: UserId) -> StorageResult<Vec<Case>> {
        let mut cases = Vec::new();
        for item in self.cases_by_owner.scan_prefix(id_key(owner_id)).rev() {
            let (key, _) = item.map_err(backend)?;
            let case_id = decode_child(&key)?;
            match Self::get::<Case>(&self.cases, &id_key(case_id))? {
                Some(case) => cases.push(case),
                None => tracing::warn!(case_id = case_id, "Owner index points at a missing case"),
            }
        }
        Ok(cases)
    }

    async fn find_case(&self, case_id: CaseId) -> StorageResult<Option<Case>> {
        Self::get(&self.cases, &id_key(case_id))
    }

    async fn find_ruling(&self, case_id: CaseId) -> StorageResult<Option<Ruling>> {
        Self::get(&self.rulings, &id_key(case_id))
    }

    async fn find_bias_check(&self, ruling_id: RulingId) -> StorageResult<Option<BiasCheck>> {
        Self::get(&self.bias_checks, &id_key(ruling_id))
    }

    async fn upsert_ruling(&self, case_id: CaseId, fields: RulingFields) -> StorageResult<Ruling> {
        if !self.cases.contains_key(id_key(case_id)).map_err(backend)? {
            return Err(StorageError::NotFound(format!("case {}", case_id)));
        }

        // Reserved up front; unused when an existing ruling is overwritten.
        let fresh_id = self.next_id()?;
        let now = Utc::now();
        let case_key = id_key(case_id);

        (&self.rulings, &self.ruling_index)
            .transaction(|(rulings, index)| {
                let ruling = match rulings.get(&case_key[..])? {
                    Some(bytes) => {
                        let mut ruling: Ruling = decode(&bytes).map_err(abort)?;
                        ruling.overwrite(fields.clone(), now);
                        ruling
                    }
                    None => {
                        let ruling = Ruling::create(fresh_id, case_id, fields.clone(), now);
                        index.insert(&id_key(ruling.id)[..], &case_key[..])?;
                        ruling
                    }
                };
                rulings.insert(&case_key[..], encode(&ruling).map_err(abort)?)?;
                Ok(ruling)
            })
            .map_err(transaction_error)
    }

    async fn upsert_bias_check(
        &self,
        ruling_id: RulingId,
        fields: BiasFields,
    ) -> StorageResult<BiasCheck> {
        let fresh_id = self.next_id()?;
        let now = Utc::now();
        let ruling_key = id_key(ruling_id);

        (&self.ruling_index, &self.bias_checks)
            .transaction(|(index, checks)| {
                if index.get(&ruling_key[..])?.is_none() {
                    return Err(abort(StorageError::NotFound(format!("ruling {}", ruling_id))));
                }
                let check = match checks.get(&ruling_key[..])? {
                    Some(bytes) => {
                        let mut check: BiasCheck = decode(&bytes).map_err(abort)?;
                        check.overwrite(fields.clone(), now);
                        check
                    }
                    None => BiasCheck::create(fresh_id, ruling_id, fields.clone(), now),
                };
                checks.insert(&ruling_key[..], encode(&check).map_err(abort)?)?;
                Ok(check)
            })
            .map_err(transaction_error)
    }

    async fn append_audit(&self, record: AuditRecord) -> StorageResult<AuditEntry> {
        let entry = AuditEntry {
            id: self.next_id()?,
            user_id: record.user_id,
            action: record.action,
            metadata: record.metadata,
            created_at: Utc::now(),
        };
        self.audit
            .insert(pair_key(entry.user_id, entry.id), encode(&entry)?)
            .map_err(backend)?;
        Ok(entry)
    }

    async fn list_audit(&self, user_id: UserId, limit: usize) -> StorageResult<Vec<AuditEntry>> {
        self.audit
            .scan_prefix(id_key(user_id))
            .rev()
            .take(limit)
            .map(|item| {
                let (_, value) = item.map_err(backend)?;
                decode(&value)
            })
            .collect()
    }
}
