use shared::{
    domain::{now_millis, Batch, BatchId, User},
    error::{ApiError, ErrorCode},
    ledger::{self, BatchOccupancy},
};
use tracing::info;

use crate::{audit, internal, ApiContext};

pub async fn list_batches(ctx: &ApiContext) -> Result<Vec<Batch>, ApiError> {
    ctx.storage.list_batches().await.map_err(internal)
}

pub async fn batch_occupancy(ctx: &ApiContext) -> Result<Vec<BatchOccupancy>, ApiError> {
    let batches = ctx.storage.list_batches().await.map_err(internal)?;
    let candidates = ctx.storage.list_candidates().await.map_err(internal)?;
    Ok(batches
        .iter()
        .map(|batch| ledger::occupancy(batch, &candidates))
        .collect())
}

pub async fn save_batch(ctx: &ApiContext, actor: Option<&User>, mut batch: Batch) -> Result<Batch, ApiError> {
    if batch.name.trim().is_empty() {
        return Err(ApiError::validation("batch name is required"));
    }
    if batch.max_seats == 0 {
        return Err(ApiError::validation("maxSeats must be positive"));
    }
    if batch.id.is_blank() {
        batch.id = BatchId::generate();
    }
    if batch.created_at <= 0 {
        batch.created_at = now_millis();
    }
    batch.name = batch.name.trim().to_string();

    ctx.storage.upsert_batch(&batch).await.map_err(internal)?;
    audit::record(
        ctx,
        actor,
        "save_batch",
        format!("saved batch {} ({}, {} seats)", batch.id, batch.name, batch.max_seats),
    )
    .await?;
    info!(batch_id = %batch.id, "batch saved");
    Ok(batch)
}

/// Occupied batches cannot be deleted; cancelled admissions do not count.
pub async fn delete_batch(ctx: &ApiContext, actor: Option<&User>, batch_id: &BatchId) -> Result<(), ApiError> {
    let candidates = ctx.storage.list_candidates().await.map_err(internal)?;
    let filled = ledger::filled_seats(batch_id, &candidates);
    if filled > 0 {
        return Err(ApiError::new(
            ErrorCode::Conflict,
            format!(
                "Cannot delete a batch that has active admissions ({filled}). Please move or cancel candidates first."
            ),
        ));
    }

    let deleted = ctx.storage.delete_batch(batch_id).await.map_err(internal)?;
    if !deleted {
        return Err(ApiError::not_found(format!("batch {batch_id} not found")));
    }
    audit::record(ctx, actor, "delete_batch", format!("deleted batch {batch_id}")).await?;
    Ok(())
}
