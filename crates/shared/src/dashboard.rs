use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    domain::{AdmissionStatus, Batch, BatchId, Candidate, Millis, PaymentStatus, User, UserId, UserRole},
    ledger::total_paid,
    query::visible_to,
};

const DAY_MILLIS: i64 = 24 * 60 * 60 * 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeRange {
    Today,
    Week,
    #[default]
    Month,
    Custom,
    All,
}

/// Inclusive `createdAt` bounds. Open ends are unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeWindow {
    pub start: Option<Millis>,
    pub end: Option<Millis>,
}

impl TimeWindow {
    pub fn resolve(
        range: TimeRange,
        custom_start: Option<&str>,
        custom_end: Option<&str>,
        now: Millis,
    ) -> Result<Self, String> {
        let window = match range {
            TimeRange::All => Self::default(),
            TimeRange::Today => Self {
                start: Some(start_of_utc_day(now)?),
                end: None,
            },
            TimeRange::Week => Self {
                start: Some(now - 7 * DAY_MILLIS),
                end: None,
            },
            TimeRange::Month => Self {
                start: Some(now - 30 * DAY_MILLIS),
                end: None,
            },
            TimeRange::Custom => {
                let start = custom_start.map(str::trim).filter(|s| !s.is_empty());
                let end = custom_end.map(str::trim).filter(|s| !s.is_empty());
                match (start, end) {
                    (Some(start), Some(end)) => {
                        let start = parse_day(start)?;
                        let end = parse_day(end)?;
                        if end < start {
                            return Err("custom range end is before start".into());
                        }
                        Self {
                            start: Some(day_start_millis(start)?),
                            end: Some(day_end_millis(end)?),
                        }
                    }
                    _ => Self::default(),
                }
            }
        };
        Ok(window)
    }

    pub fn contains(&self, timestamp: Millis) -> bool {
        self.start.map_or(true, |start| timestamp >= start)
            && self.end.map_or(true, |end| timestamp <= end)
    }
}

fn parse_day(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| format!("invalid date '{raw}', expected YYYY-MM-DD"))
}

fn day_start_millis(day: NaiveDate) -> Result<Millis, String> {
    day.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp_millis())
        .ok_or_else(|| format!("invalid day {day}"))
}

fn day_end_millis(day: NaiveDate) -> Result<Millis, String> {
    day.and_hms_milli_opt(23, 59, 59, 999)
        .map(|dt| dt.and_utc().timestamp_millis())
        .ok_or_else(|| format!("invalid day {day}"))
}

fn start_of_utc_day(now: Millis) -> Result<Millis, String> {
    let now = DateTime::<Utc>::from_timestamp_millis(now).ok_or("timestamp out of range")?;
    day_start_millis(now.date_naive())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_admissions: u64,
    pub advance_paid: u64,
    pub fully_paid: u64,
    pub total_revenue: i64,
    pub pending_balance: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchCount {
    pub batch_id: BatchId,
    pub name: String,
    pub count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusMix {
    pub confirmed: u64,
    pub deferred: u64,
    pub cancelled: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutivePerformance {
    pub id: UserId,
    pub name: String,
    pub admissions: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardReport {
    pub window: TimeWindow,
    pub stats: DashboardStats,
    pub batch_distribution: Vec<BatchCount>,
    pub status_mix: StatusMix,
    pub executive_performance: Vec<ExecutivePerformance>,
}

pub fn build_report(
    viewer: Option<&User>,
    candidates: &[Candidate],
    batches: &[Batch],
    users: &[User],
    window: TimeWindow,
    total_fee: i64,
) -> DashboardReport {
    let in_scope: Vec<&Candidate> = candidates
        .iter()
        .filter(|c| visible_to(viewer, c) && window.contains(c.created_at))
        .collect();

    let count = |pred: fn(&Candidate) -> bool| count_where(&in_scope, pred);

    let total_revenue = in_scope
        .iter()
        .fold(0i64, |sum, c| sum.saturating_add(total_paid(&c.payment_history)));
    let billable = i64::try_from(count(|c| !c.is_cancelled())).unwrap_or(i64::MAX);

    let stats = DashboardStats {
        total_admissions: count(|c| c.status == AdmissionStatus::Confirmed),
        advance_paid: count(|c| c.payment_status == PaymentStatus::AdvancePaid),
        fully_paid: count(|c| c.payment_status == PaymentStatus::FullyPaid),
        total_revenue,
        pending_balance: billable.saturating_mul(total_fee).saturating_sub(total_revenue),
    };

    let batch_distribution = batches
        .iter()
        .map(|batch| BatchCount {
            batch_id: batch.id.clone(),
            name: batch.name.clone(),
            count: count_where(&in_scope, |c| c.batch_id == batch.id),
        })
        .collect();

    let status_mix = StatusMix {
        confirmed: count(|c| c.status == AdmissionStatus::Confirmed),
        deferred: count(|c| c.status == AdmissionStatus::Deferred),
        cancelled: count(|c| c.status == AdmissionStatus::Cancelled),
    };

    let mut executive_performance: Vec<ExecutivePerformance> = users
        .iter()
        .filter(|u| u.role == UserRole::Executive)
        .map(|exec| ExecutivePerformance {
            id: exec.id.clone(),
            name: exec.name.clone(),
            admissions: count_where(&in_scope, |c| c.executive_id == exec.id),
        })
        .collect();
    executive_performance.sort_by(|a, b| b.admissions.cmp(&a.admissions).then_with(|| a.name.cmp(&b.name)));

    DashboardReport {
        window,
        stats,
        batch_distribution,
        status_mix,
        executive_performance,
    }
}

fn count_where(candidates: &[&Candidate], pred: impl Fn(&Candidate) -> bool) -> u64 {
    candidates.iter().filter(|&&c| pred(c)).count() as u64
}

#[cfg(test)]
#[path = "tests/dashboard_tests.rs"]
mod tests;
