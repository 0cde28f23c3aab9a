use super::*;
use shared::{
    domain::{AddressDetails, Millis, PaymentEntry, PaymentId, PersonalDetails},
    ledger,
};

fn user(id: &str, username: &str, role: UserRole) -> User {
    User {
        id: UserId::from(id),
        username: username.into(),
        name: username.to_uppercase(),
        role,
        is_active: true,
    }
}

fn batch(id: &str, max_seats: u32, created_at: Millis) -> Batch {
    Batch {
        id: BatchId::from(id),
        name: format!("Batch {id}"),
        max_seats,
        created_at,
    }
}

fn candidate(id: &str, batch_id: &str, created_at: Millis) -> Candidate {
    Candidate {
        id: CandidateId::from(id),
        batch_id: BatchId::from(batch_id),
        executive_id: UserId::from("user-exec"),
        status: AdmissionStatus::Confirmed,
        payment_status: PaymentStatus::AdvancePaid,
        notes: String::new(),
        personal_details: PersonalDetails {
            full_name: "Ravi Kumar".into(),
            ..Default::default()
        },
        contact_details: Default::default(),
        address_details: AddressDetails {
            state: "Bihar".into(),
            city: "Patna".into(),
            ..Default::default()
        },
        travel_details: Default::default(),
        documents: Default::default(),
        payment_history: Vec::new(),
        created_at,
        updated_at: created_at,
    }
}

fn payment(id: &str, amount: i64) -> PaymentEntry {
    PaymentEntry {
        id: PaymentId::from(id),
        amount,
        utr: format!("UTR{id}"),
        screenshot: String::new(),
        date: 1,
        executive_id: UserId::from("user-exec"),
        executive_name: "Exec".into(),
    }
}

#[tokio::test]
async fn health_check_succeeds_for_live_pool() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.health_check().await.expect("health check");
    assert!(storage.schema_ready().await.expect("schema"));
}

#[tokio::test]
async fn creates_database_file_when_missing() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let db_path = temp_root.path().join("nested").join("crm.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    let storage = Storage::new(&database_url).await.expect("db");
    drop(storage);

    assert!(
        db_path.exists(),
        "database file should exist: {}",
        db_path.display()
    );
}

#[tokio::test]
async fn user_credentials_round_trip_without_exposing_hash() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let admin = user("user-1", "admin", UserRole::SuperAdmin);
    storage.upsert_user(&admin, "hash-1").await.expect("insert");

    let creds = storage
        .find_credentials("admin")
        .await
        .expect("lookup")
        .expect("exists");
    assert_eq!(creds.user, admin);
    assert_eq!(creds.password_hash, "hash-1");
    assert!(storage.find_credentials("nobody").await.expect("lookup").is_none());
    assert_eq!(storage.list_users().await.expect("users"), vec![admin]);
}

#[tokio::test]
async fn profile_update_keeps_password_hash() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let mut exec = user("user-2", "asha", UserRole::Executive);
    storage.upsert_user(&exec, "hash-2").await.expect("insert");

    exec.name = "Asha Verma".into();
    exec.is_active = false;
    assert!(storage.update_user_profile(&exec).await.expect("update"));

    let creds = storage
        .find_credentials("asha")
        .await
        .expect("lookup")
        .expect("exists");
    assert_eq!(creds.user.name, "Asha Verma");
    assert!(!creds.user.is_active);
    assert_eq!(creds.password_hash, "hash-2");

    let ghost = user("user-404", "ghost", UserRole::ViewOnly);
    assert!(!storage.update_user_profile(&ghost).await.expect("update"));
}

#[tokio::test]
async fn username_taken_ignores_the_same_user() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage
        .upsert_user(&user("user-1", "asha", UserRole::Executive), "h")
        .await
        .expect("insert");
    assert!(!storage
        .username_taken("asha", &UserId::from("user-1"))
        .await
        .expect("check"));
    assert!(storage
        .username_taken("asha", &UserId::from("user-2"))
        .await
        .expect("check"));
}

#[tokio::test]
async fn deletes_users() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let id = UserId::from("user-1");
    storage
        .upsert_user(&user("user-1", "asha", UserRole::Executive), "h")
        .await
        .expect("insert");
    assert!(storage.delete_user(&id).await.expect("delete"));
    assert!(!storage.delete_user(&id).await.expect("delete again"));
    assert_eq!(storage.count_users().await.expect("count"), 0);
}

#[tokio::test]
async fn batch_upsert_replaces_existing_row() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.upsert_batch(&batch("b1", 60, 10)).await.expect("insert");
    let mut edited = batch("b1", 45, 10);
    edited.name = "Renamed".into();
    storage.upsert_batch(&edited).await.expect("update");

    let batches = storage.list_batches().await.expect("list");
    assert_eq!(batches, vec![edited.clone()]);
    assert_eq!(
        storage.get_batch(&edited.id).await.expect("get"),
        Some(edited.clone())
    );
    assert!(storage.delete_batch(&edited.id).await.expect("delete"));
    assert!(storage.list_batches().await.expect("list").is_empty());
}

#[tokio::test]
async fn saving_candidate_twice_overwrites() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let mut c = candidate("ADM-1", "b1", 100);
    storage.upsert_candidate(&c).await.expect("insert");

    c.status = AdmissionStatus::Deferred;
    c.notes = "call back".into();
    c.created_at = 999;
    c.executive_id = UserId::from("user-other");
    c.updated_at = 200;
    storage.upsert_candidate(&c).await.expect("update");

    let all = storage.list_candidates().await.expect("list");
    assert_eq!(all.len(), 1);
    let stored = &all[0];
    assert_eq!(stored.status, AdmissionStatus::Deferred);
    assert_eq!(stored.notes, "call back");
    assert_eq!(stored.updated_at, 200);
    // ownership and creation time are fixed at first insert
    assert_eq!(stored.created_at, 100);
    assert_eq!(stored.executive_id, UserId::from("user-exec"));
    assert_eq!(stored.address_details.city, "Patna");
}

#[tokio::test]
async fn lists_candidates_newest_first() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.upsert_candidate(&candidate("ADM-old", "b1", 1)).await.expect("old");
    storage.upsert_candidate(&candidate("ADM-new", "b1", 2)).await.expect("new");
    let ids: Vec<String> = storage
        .list_candidates()
        .await
        .expect("list")
        .into_iter()
        .map(|c| c.id.0)
        .collect();
    assert_eq!(ids, vec!["ADM-new", "ADM-old"]);
}

fn append(
    existing: Option<Candidate>,
    entry: PaymentEntry,
    now: Millis,
) -> std::result::Result<Candidate, &'static str> {
    let mut candidate = existing.ok_or("missing")?;
    candidate.payment_history.push(entry);
    ledger::apply_reconciliation(&mut candidate, 100_000);
    candidate.updated_at = now;
    Ok(candidate)
}

#[tokio::test]
async fn write_candidate_appends_and_reconciles() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let id = CandidateId::from("ADM-1");
    storage.upsert_candidate(&candidate("ADM-1", "b1", 1)).await.expect("insert");

    let after_first = storage
        .write_candidate(&id, |c| append(c, payment("p1", 60_000), 10))
        .await
        .expect("write")
        .expect("exists");
    assert_eq!(after_first.payment_status, PaymentStatus::AdvancePaid);

    let after_second = storage
        .write_candidate(&id, |c| append(c, payment("p2", 40_000), 20))
        .await
        .expect("write")
        .expect("exists");
    assert_eq!(after_second.payment_status, PaymentStatus::FullyPaid);

    let stored = storage.get_candidate(&id).await.expect("get").expect("exists");
    assert_eq!(stored.payment_history.len(), 2);
    assert_eq!(stored.payment_status, PaymentStatus::FullyPaid);
    assert_eq!(stored.updated_at, 20);
}

#[tokio::test]
async fn rejected_write_leaves_row_untouched() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let id = CandidateId::from("ADM-1");
    storage.upsert_candidate(&candidate("ADM-1", "b1", 1)).await.expect("insert");

    let outcome = storage
        .write_candidate(&id, |_| Err::<Candidate, _>("rejected"))
        .await
        .expect("write");
    assert_eq!(outcome.err(), Some("rejected"));

    let missing = storage
        .write_candidate(&CandidateId::from("ADM-x"), |c| append(c, payment("p3", 1), 30))
        .await
        .expect("write");
    assert_eq!(missing.err(), Some("missing"));

    // the pool is usable again after a rollback
    let stored = storage.get_candidate(&id).await.expect("get").expect("exists");
    assert!(stored.payment_history.is_empty());
    assert!(storage.get_candidate(&CandidateId::from("ADM-x")).await.expect("get").is_none());
}

#[tokio::test]
async fn audit_logs_are_newest_first_and_limited() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    for i in 0..5 {
        storage
            .insert_audit_log(&AuditLog {
                id: AuditLogId(format!("audit-{i}")),
                timestamp: i,
                action: "save_batch".into(),
                user_id: UserId::from("user-1"),
                user_name: "Admin".into(),
                details: format!("batch b{i}"),
            })
            .await
            .expect("insert");
    }
    let logs = storage.list_audit_logs(3).await.expect("list");
    let ids: Vec<&str> = logs.iter().map(|l| l.id.as_str()).collect();
    assert_eq!(ids, vec!["audit-4", "audit-3", "audit-2"]);
}
