use serde_json::json;
use tempfile::TempDir;

use docket_core::repository::CaseRepository;
use docket_core::{AuditRecord, BiasFields, NewCase, RulingFields, StorageError, Verdict};
use docket_storage::SledRepository;

fn new_case(title: &str) -> NewCase {
    NewCase {
        title: title.to_string(),
        narrative: "My neighbor's tree fell onto my fence during a storm.".to_string(),
        locale: "Ohio".to_string(),
    }
}

fn ruling_fields(verdict: Verdict, rationale: &str) -> RulingFields {
    RulingFields {
        verdict,
        rationale: rationale.to_string(),
        citations: vec!["Ohio Rev. Code 901.51".to_string()],
        risk_flags: vec![],
        model_name: "gpt-4o-mini".to_string(),
        tokens_in: 150,
        tokens_out: 60,
    }
}

#[tokio::test]
async fn test_username_uniqueness() {
    let repo = SledRepository::temporary().unwrap();
    let alice = repo.create_user("alice").await.unwrap();
    assert_eq!(repo.find_user(alice.id).await.unwrap().unwrap().username, "alice");

    let err = repo.create_user("alice").await.unwrap_err();
    assert!(matches!(err, StorageError::Conflict(_)));
    assert!(repo.create_user("bob").await.is_ok());
}

#[tokio::test]
async fn test_cases_scoped_to_owner_newest_first() {
    let repo = SledRepository::temporary().unwrap();
    let a1 = repo.create_case(1, new_case("fence")).await.unwrap();
    let b1 = repo.create_case(2, new_case("other owner")).await.unwrap();
    let a2 = repo.create_case(1, new_case("hedge")).await.unwrap();

    let owned: Vec<_> = repo.list_cases(1).await.unwrap().into_iter().map(|c| c.id).collect();
    assert_eq!(owned, vec![a2.id, a1.id]);

    assert!(repo.find_owned_case(b1.id, 1).await.unwrap().is_none());
    assert!(repo.find_owned_case(b1.id, 2).await.unwrap().is_some());
}

#[tokio::test]
async fn test_ruling_and_bias_upserts_overwrite() {
    let repo = SledRepository::temporary().unwrap();
    let case = repo.create_case(1, new_case("fence")).await.unwrap();

    let first = repo
        .upsert_ruling(case.id, ruling_fields(Verdict::Settlement, "Split the cost."))
        .await
        .unwrap();
    let second = repo
        .upsert_ruling(case.id, ruling_fields(Verdict::Dismissed, "Act of nature."))
        .await
        .unwrap();
    assert_eq!(first.id, second.id);
    assert_eq!(second.created_at, first.created_at);

    let stored = repo.find_ruling(case.id).await.unwrap().unwrap();
    assert_eq!(stored.verdict, Verdict::Dismissed);
    assert_eq!(stored.rationale, "Act of nature.");

    let check = repo
        .upsert_bias_check(
            stored.id,
            BiasFields {
                bias_score: 0.3,
                notes: vec!["Favors the property owner".to_string()],
            },
        )
        .await
        .unwrap();
    let replaced = repo
        .upsert_bias_check(
            stored.id,
            BiasFields {
                bias_score: 0.1,
                notes: vec![],
            },
        )
        .await
        .unwrap();
    assert_eq!(check.id, replaced.id);

    let detail = repo.case_detail(case.id, 1).await.unwrap().unwrap();
    assert_eq!(detail.bias_check.unwrap().bias_score, 0.1);
}

#[tokio::test]
async fn test_upserts_require_parent() {
    let repo = SledRepository::temporary().unwrap();
    let err = repo
        .upsert_ruling(404, ruling_fields(Verdict::Other, "x"))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::NotFound(_)));

    let err = repo
        .upsert_bias_check(
            404,
            BiasFields {
                bias_score: 0.5,
                notes: vec![],
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::NotFound(_)));
}

#[tokio::test]
async fn test_audit_newest_first_per_user() {
    let repo = SledRepository::temporary().unwrap();
    for i in 0..60 {
        repo.append_audit(AuditRecord {
            user_id: 7,
            action: "case_create".to_string(),
            metadata: json!({ "seq": i }),
        })
        .await
        .unwrap();
    }
    repo.append_audit(AuditRecord {
        user_id: 8,
        action: "ruling_generated".to_string(),
        metadata: json!({}),
    })
    .await
    .unwrap();

    let entries = repo.list_audit(7, 50).await.unwrap();
    assert_eq!(entries.len(), 50);
    assert_eq!(entries[0].metadata["seq"], 59);
    assert_eq!(entries[49].metadata["seq"], 10);
    assert!(entries.iter().all(|e| e.user_id == 7));
}

#[tokio::test]
async fn test_data_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("docket.db");

    let (user_id, case_id) = {
        let repo = SledRepository::open(&path).unwrap();
        let user = repo.create_user("carol").await.unwrap();
        let case = repo.create_case(user.id, new_case("fence")).await.unwrap();
        repo.upsert_ruling(case.id, ruling_fields(Verdict::Upheld, "Kept."))
            .await
            .unwrap();
        repo.flush().await.unwrap();
        (user.id, case.id)
    };

    let repo = SledRepository::open(&path).unwrap();
    assert_eq!(repo.find_user(user_id).await.unwrap().unwrap().username, "carol");
    let detail = repo.case_detail(case_id, user_id).await.unwrap().unwrap();
    assert_eq!(detail.ruling.unwrap().verdict, Verdict::Upheld);
    assert!(matches!(
        repo.create_user("carol").await.unwrap_err(),
        StorageError::Conflict(_)
    ));
}
