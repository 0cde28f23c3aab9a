use shared::{
    domain::{now_millis, Candidate, CandidateId, Millis, PaymentEntry, PaymentId, User, UserId, UserRole},
    error::{ApiError, ErrorCode},
    ledger,
    protocol::CandidateView,
    query::{select_candidates, visible_to, CandidateQuery},
};
use tracing::info;

use crate::{audit, internal, ApiContext};

pub fn view(candidate: Candidate, total_fee: i64) -> CandidateView {
    let payment_summary = ledger::summarize(&candidate, total_fee);
    CandidateView {
        candidate,
        payment_summary,
    }
}

pub async fn list_candidates(
    ctx: &ApiContext,
    actor: Option<&User>,
    query: &CandidateQuery,
) -> Result<Vec<CandidateView>, ApiError> {
    let candidates = ctx.storage.list_candidates().await.map_err(internal)?;
    Ok(select_candidates(actor, candidates, query)
        .into_iter()
        .map(|c| view(c, ctx.settings.total_fees))
        .collect())
}

pub async fn get_candidate(
    ctx: &ApiContext,
    actor: Option<&User>,
    candidate_id: &CandidateId,
) -> Result<CandidateView, ApiError> {
    let candidate = load_owned(ctx, actor, candidate_id).await?;
    Ok(view(candidate, ctx.settings.total_fees))
}

pub async fn save_candidate(
    ctx: &ApiContext,
    actor: Option<&User>,
    mut candidate: Candidate,
) -> Result<CandidateView, ApiError> {
    validate_details(&candidate)?;
    if candidate.id.is_blank() {
        candidate.id = CandidateId::generate();
    }

    ctx.storage
        .get_batch(&candidate.batch_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::not_found(format!("batch {} not found", candidate.batch_id)))?;

    let now = now_millis();
    let total_fee = ctx.settings.total_fees;
    let candidate_id = candidate.id.clone();
    let mut created = false;
    let candidate = ctx
        .storage
        .write_candidate(&candidate_id, |existing| {
            created = existing.is_none();
            merge_for_save(actor, existing, candidate, now, total_fee)
        })
        .await
        .map_err(internal)??;

    let verb = if created { "created" } else { "updated" };
    audit::record(
        ctx,
        actor,
        "save_candidate",
        format!("{verb} candidate {} ({})", candidate.id, candidate.personal_details.full_name),
    )
    .await?;
    info!(candidate_id = %candidate.id, verb, "candidate saved");

    Ok(view(candidate, total_fee))
}

/// Applies a submitted candidate on top of the stored row. Entries past the
/// stored prefix are new payments and get stamped like `record_payment` does.
fn merge_for_save(
    actor: Option<&User>,
    existing: Option<Candidate>,
    mut candidate: Candidate,
    now: Millis,
    total_fee: i64,
) -> Result<Candidate, ApiError> {
    let known_entries = match existing {
        Some(existing) => {
            ensure_owner(actor, &existing)?;
            ledger::check_append_only(&existing.payment_history, &candidate.payment_history)
                .map_err(ApiError::validation)?;
            candidate.executive_id = existing.executive_id;
            candidate.created_at = existing.created_at;
            existing.payment_history.len()
        }
        None => {
            if let Some(actor) = actor.filter(|a| a.role == UserRole::Executive) {
                candidate.executive_id = actor.id.clone();
            }
            if candidate.executive_id.is_blank() {
                match actor {
                    Some(actor) => candidate.executive_id = actor.id.clone(),
                    None => return Err(ApiError::validation("executiveId is required")),
                }
            }
            if candidate.created_at <= 0 {
                candidate.created_at = now;
            }
            0
        }
    };

    let (executive_id, executive_name) = recorder(actor);
    for entry in &mut candidate.payment_history[known_entries..] {
        validate_payment(entry.amount, &entry.utr)?;
        entry.id = PaymentId::generate();
        entry.utr = entry.utr.trim().to_string();
        entry.date = now;
        entry.executive_id = executive_id.clone();
        entry.executive_name = executive_name.clone();
    }
    ledger::check_ledger_total(&candidate.payment_history).map_err(ApiError::validation)?;

    candidate.updated_at = now;
    ledger::apply_reconciliation(&mut candidate, total_fee);
    Ok(candidate)
}

pub async fn record_payment(
    ctx: &ApiContext,
    actor: Option<&User>,
    candidate_id: &CandidateId,
    amount: i64,
    utr: &str,
    screenshot: String,
) -> Result<CandidateView, ApiError> {
    validate_payment(amount, utr)?;

    let (executive_id, executive_name) = recorder(actor);
    let now = now_millis();
    let total_fee = ctx.settings.total_fees;
    let entry = PaymentEntry {
        id: PaymentId::generate(),
        amount,
        utr: utr.trim().to_string(),
        screenshot,
        date: now,
        executive_id,
        executive_name,
    };

    let candidate = ctx
        .storage
        .write_candidate(candidate_id, |existing| {
            let mut candidate =
                existing.ok_or_else(|| ApiError::not_found(format!("candidate {candidate_id} not found")))?;
            if !visible_to(actor, &candidate) {
                return Err(ApiError::forbidden("candidate belongs to another executive"));
            }
            candidate.payment_history.push(entry);
            ledger::check_ledger_total(&candidate.payment_history).map_err(ApiError::validation)?;
            ledger::apply_reconciliation(&mut candidate, total_fee);
            candidate.updated_at = now;
            Ok(candidate)
        })
        .await
        .map_err(internal)??;

    audit::record(
        ctx,
        actor,
        "record_payment",
        format!("recorded {amount} (UTR {}) for candidate {candidate_id}", utr.trim()),
    )
    .await?;

    Ok(view(candidate, total_fee))
}

fn recorder(actor: Option<&User>) -> (UserId, String) {
    match actor {
        Some(user) => (user.id.clone(), user.name.clone()),
        None => (UserId::from("system"), "System".to_string()),
    }
}

async fn load_owned(
    ctx: &ApiContext,
    actor: Option<&User>,
    candidate_id: &CandidateId,
) -> Result<Candidate, ApiError> {
    let candidate = ctx
        .storage
        .get_candidate(candidate_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::not_found(format!("candidate {candidate_id} not found")))?;
    if !visible_to(actor, &candidate) {
        return Err(ApiError::forbidden("candidate belongs to another executive"));
    }
    Ok(candidate)
}

fn ensure_owner(actor: Option<&User>, existing: &Candidate) -> Result<(), ApiError> {
    match actor {
        Some(user) if user.role == UserRole::Executive && existing.executive_id != user.id => {
            Err(ApiError::forbidden("candidate belongs to another executive"))
        }
        _ => Ok(()),
    }
}

fn validate_details(candidate: &Candidate) -> Result<(), ApiError> {
    if candidate.personal_details.full_name.trim().is_empty() || candidate.batch_id.is_blank() {
        return Err(ApiError::validation("Full Name and Batch Selection are required"));
    }
    let address = &candidate.address_details;
    if address.state.trim().is_empty() || address.city.trim().is_empty() {
        return Err(ApiError::validation("State and District selection are mandatory"));
    }
    Ok(())
}

fn validate_payment(amount: i64, utr: &str) -> Result<(), ApiError> {
    if amount <= 0 {
        return Err(ApiError::new(ErrorCode::Validation, "payment amount must be positive"));
    }
    if utr.trim().is_empty() {
        return Err(ApiError::new(ErrorCode::Validation, "payment UTR is required"));
    }
    Ok(())
}
