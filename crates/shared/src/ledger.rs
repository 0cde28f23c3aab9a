//! Payment reconciliation and seat occupancy.
//!
//! These are the only derived values in the system. Every write path and
//! every read view goes through this module so the formulas exist once.

use serde::{Deserialize, Serialize};

use crate::domain::{Batch, BatchId, Candidate, PaymentEntry, PaymentStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSummary {
    pub total_fee: i64,
    pub total_paid: i64,
    pub balance: i64,
    pub payment_status: PaymentStatus,
}

/// Largest cumulative amount one candidate's ledger may hold.
pub const MAX_LEDGER_TOTAL: i64 = 1_000_000_000_000;

/// Saturates instead of overflowing on corrupt or hostile histories.
pub fn total_paid(history: &[PaymentEntry]) -> i64 {
    history
        .iter()
        .fold(0i64, |sum, entry| sum.saturating_add(entry.amount))
}

/// Exact ledger total, or an error once it leaves `0..=MAX_LEDGER_TOTAL`.
pub fn check_ledger_total(history: &[PaymentEntry]) -> Result<i64, String> {
    let mut sum = 0i64;
    for entry in history {
        sum = sum
            .checked_add(entry.amount)
            .filter(|total| (0..=MAX_LEDGER_TOTAL).contains(total))
            .ok_or_else(|| format!("payment history total exceeds {MAX_LEDGER_TOTAL}"))?;
    }
    Ok(sum)
}

/// Status implied by the ledger alone, ignoring manual overrides.
pub fn status_for_total(total_paid: i64, total_fee: i64) -> PaymentStatus {
    if total_paid >= total_fee {
        PaymentStatus::FullyPaid
    } else {
        PaymentStatus::AdvancePaid
    }
}

/// DEFERRED and CANCELLED are kept as set; anything else follows the ledger.
pub fn reconcile(current: PaymentStatus, history: &[PaymentEntry], total_fee: i64) -> PaymentStatus {
    if current.is_manual_override() {
        return current;
    }
    status_for_total(total_paid(history), total_fee)
}

pub fn summarize(candidate: &Candidate, total_fee: i64) -> PaymentSummary {
    let paid = total_paid(&candidate.payment_history);
    PaymentSummary {
        total_fee,
        total_paid: paid,
        balance: total_fee.saturating_sub(paid),
        payment_status: reconcile(candidate.payment_status, &candidate.payment_history, total_fee),
    }
}

/// Rewrites `payment_status` in place. Returns true when it changed.
pub fn apply_reconciliation(candidate: &mut Candidate, total_fee: i64) -> bool {
    let next = reconcile(candidate.payment_status, &candidate.payment_history, total_fee);
    let changed = next != candidate.payment_status;
    candidate.payment_status = next;
    changed
}

/// Fails when `incoming` drops, edits or reorders an entry already in `stored`.
pub fn check_append_only(stored: &[PaymentEntry], incoming: &[PaymentEntry]) -> Result<(), String> {
    if incoming.len() < stored.len() {
        return Err(format!(
            "payment history cannot shrink: {} stored entries, {} submitted",
            stored.len(),
            incoming.len()
        ));
    }
    for (position, (old, new)) in stored.iter().zip(incoming).enumerate() {
        if old != new {
            return Err(format!(
                "payment entry {} at position {position} cannot be modified",
                old.id
            ));
        }
    }
    Ok(())
}

pub fn filled_seats(batch_id: &BatchId, candidates: &[Candidate]) -> u32 {
    let count = candidates
        .iter()
        .filter(|candidate| &candidate.batch_id == batch_id && !candidate.is_cancelled())
        .count();
    u32::try_from(count).unwrap_or(u32::MAX)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOccupancy {
    pub batch: Batch,
    pub filled_seats: u32,
    pub available_seats: u32,
    pub occupancy_percent: f64,
}

impl BatchOccupancy {
    pub fn is_overbooked(&self) -> bool {
        self.filled_seats > self.batch.max_seats
    }
}

pub fn occupancy(batch: &Batch, candidates: &[Candidate]) -> BatchOccupancy {
    let filled = filled_seats(&batch.id, candidates);
    let percent = if batch.max_seats == 0 {
        0.0
    } else {
        f64::from(filled) * 100.0 / f64::from(batch.max_seats)
    };
    BatchOccupancy {
        batch: batch.clone(),
        filled_seats: filled,
        available_seats: batch.max_seats.saturating_sub(filled),
        occupancy_percent: percent,
    }
}

#[cfg(test)]
#[path = "tests/ledger_tests.rs"]
mod tests;
