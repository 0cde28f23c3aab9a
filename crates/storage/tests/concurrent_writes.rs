use shared::{
    domain::{AdmissionStatus, BatchId, Candidate, CandidateId, PaymentEntry, PaymentId, PaymentStatus, UserId},
    ledger,
};
use storage::Storage;

fn candidate(id: &str) -> Candidate {
    Candidate {
        id: CandidateId::from(id),
        batch_id: BatchId::from("batch-1"),
        executive_id: UserId::from("user-exec"),
        status: AdmissionStatus::Confirmed,
        payment_status: PaymentStatus::AdvancePaid,
        notes: String::new(),
        personal_details: Default::default(),
        contact_details: Default::default(),
        address_details: Default::default(),
        travel_details: Default::default(),
        documents: Default::default(),
        payment_history: Vec::new(),
        created_at: 1,
        updated_at: 1,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_appends_on_file_database_all_land() {
    let temp = tempfile::tempdir().expect("tempdir");
    let url = format!(
        "sqlite://{}",
        temp.path().join("crm.db").to_string_lossy().replace('\\', "/")
    );
    let storage = Storage::new(&url).await.expect("db");
    let id = CandidateId::from("ADM-1");
    storage.upsert_candidate(&candidate("ADM-1")).await.expect("insert");

    let mut tasks = Vec::new();
    for n in 0..8 {
        let storage = storage.clone();
        let id = id.clone();
        tasks.push(tokio::spawn(async move {
            storage
                .write_candidate(&id, move |existing| {
                    let mut c = existing.ok_or("missing")?;
                    c.payment_history.push(PaymentEntry {
                        id: PaymentId(format!("pay-{n}")),
                        amount: 12_500,
                        utr: format!("UTR{n}"),
                        screenshot: String::new(),
                        date: n,
                        executive_id: UserId::from("user-exec"),
                        executive_name: "Exec".into(),
                    });
                    ledger::apply_reconciliation(&mut c, 100_000);
                    Ok::<_, &'static str>(c)
                })
                .await
        }));
    }
    for task in tasks {
        task.await.expect("join").expect("write").expect("exists");
    }

    let stored = storage.get_candidate(&id).await.expect("get").expect("exists");
    assert_eq!(stored.payment_history.len(), 8);
    assert_eq!(ledger::total_paid(&stored.payment_history), 100_000);
    assert_eq!(stored.payment_status, PaymentStatus::FullyPaid);
}
