use shared::domain::{
    AdmissionStatus, BatchId, Candidate, CandidateId, Gender, Medium, PaymentStatus,
    PersonalDetails, TravelDetails, TravelMode, UserId,
};
use storage::Storage;

#[tokio::test]
async fn nested_detail_blobs_survive_storage() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let candidate = Candidate {
        id: CandidateId::from("ADM-2024-4821"),
        batch_id: BatchId::from("batch-1"),
        executive_id: UserId::from("user-exec"),
        status: AdmissionStatus::Confirmed,
        payment_status: PaymentStatus::AdvancePaid,
        notes: "needs hostel".into(),
        personal_details: PersonalDetails {
            full_name: "Sana Fatima".into(),
            email: "sana@example.com".into(),
            gender: Gender::Female,
            qualification: "B.A.".into(),
            medium: Medium::Urdu,
            ..Default::default()
        },
        contact_details: Default::default(),
        address_details: Default::default(),
        travel_details: TravelDetails {
            mode: TravelMode::Train,
            arrival_date: "2024-06-01".into(),
            arrival_time: "09:30".into(),
            pickup_required: true,
        },
        documents: Default::default(),
        payment_history: Vec::new(),
        created_at: 1,
        updated_at: 1,
    };
    storage.upsert_candidate(&candidate).await.expect("insert");

    let raw: String = sqlx::query_scalar("SELECT travel_details FROM candidates WHERE id = ?")
        .bind("ADM-2024-4821")
        .fetch_one(storage.pool())
        .await
        .expect("raw");
    let json: serde_json::Value = serde_json::from_str(&raw).expect("json");
    assert_eq!(json["mode"], "Train");
    assert_eq!(json["pickupRequired"], true);

    let loaded = storage
        .get_candidate(&candidate.id)
        .await
        .expect("get")
        .expect("exists");
    assert_eq!(loaded, candidate);
}
