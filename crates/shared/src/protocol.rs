use serde::{Deserialize, Serialize};

use crate::{
    dashboard::TimeRange,
    domain::{AdmissionStatus, Batch, BatchId, Candidate, CandidateId, User, UserId},
    ledger::PaymentSummary,
    query::CandidateQuery,
};

/// Body of `POST /api-v1`: `{"action": "...", ...fields}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ActionRequest {
    Login {
        username: String,
        password: String,
    },
    GetCandidates {
        #[serde(default)]
        search: Option<String>,
        #[serde(default)]
        batch_id: Option<BatchId>,
        #[serde(default)]
        status: Option<AdmissionStatus>,
    },
    GetCandidate {
        id: CandidateId,
    },
    SaveCandidate {
        candidate: Candidate,
    },
    RecordPayment {
        candidate_id: CandidateId,
        amount: i64,
        utr: String,
        #[serde(default)]
        screenshot: String,
    },
    GetBatches,
    GetBatchOccupancy,
    SaveBatch {
        batch: Batch,
    },
    DeleteBatch {
        id: BatchId,
    },
    GetUsers,
    SaveUser {
        user: User,
        #[serde(default)]
        password: Option<String>,
    },
    DeleteUser {
        id: UserId,
    },
    GetAuditLogs {
        #[serde(default)]
        limit: Option<u32>,
    },
    GetDashboard {
        #[serde(default)]
        range: TimeRange,
        #[serde(default)]
        start: Option<String>,
        #[serde(default)]
        end: Option<String>,
    },
}

pub const KNOWN_ACTIONS: &[&str] = &[
    "login",
    "get_candidates",
    "get_candidate",
    "save_candidate",
    "record_payment",
    "get_batches",
    "get_batch_occupancy",
    "save_batch",
    "delete_batch",
    "get_users",
    "save_user",
    "delete_user",
    "get_audit_logs",
    "get_dashboard",
];

impl ActionRequest {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Login { .. } => "login",
            Self::GetCandidates { .. } => "get_candidates",
            Self::GetCandidate { .. } => "get_candidate",
            Self::SaveCandidate { .. } => "save_candidate",
            Self::RecordPayment { .. } => "record_payment",
            Self::GetBatches => "get_batches",
            Self::GetBatchOccupancy => "get_batch_occupancy",
            Self::SaveBatch { .. } => "save_batch",
            Self::DeleteBatch { .. } => "delete_batch",
            Self::GetUsers => "get_users",
            Self::SaveUser { .. } => "save_user",
            Self::DeleteUser { .. } => "delete_user",
            Self::GetAuditLogs { .. } => "get_audit_logs",
            Self::GetDashboard { .. } => "get_dashboard",
        }
    }

    pub fn candidate_query(&self) -> Option<CandidateQuery> {
        match self {
            Self::GetCandidates {
                search,
                batch_id,
                status,
            } => Some(CandidateQuery {
                search: search.clone(),
                batch_id: batch_id.clone(),
                status: *status,
            }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ack {
    pub status: String,
}

impl Ack {
    pub fn success() -> Self {
        Self {
            status: "success".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub status: String,
    pub user: User,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// A stored candidate plus its ledger totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateView {
    #[serde(flatten)]
    pub candidate: Candidate,
    pub payment_summary: PaymentSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateSaved {
    pub status: String,
    pub candidate: CandidateView,
}

impl CandidateSaved {
    pub fn new(candidate: CandidateView) -> Self {
        Self {
            status: "success".into(),
            candidate,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiStatus {
    pub status: String,
    pub database: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_unit_and_struct_actions() {
        let req: ActionRequest = serde_json::from_str(r#"{"action":"get_batches"}"#).expect("json");
        assert!(matches!(req, ActionRequest::GetBatches));

        let req: ActionRequest =
            serde_json::from_str(r#"{"action":"delete_batch","id":"batch-1"}"#).expect("json");
        assert_eq!(req.name(), "delete_batch");
    }

    #[test]
    fn camel_case_fields_inside_actions() {
        let req: ActionRequest = serde_json::from_str(
            r#"{"action":"record_payment","candidateId":"ADM-1","amount":5000,"utr":"U1"}"#,
        )
        .expect("json");
        match req {
            ActionRequest::RecordPayment {
                candidate_id,
                amount,
                screenshot,
                ..
            } => {
                assert_eq!(candidate_id.as_str(), "ADM-1");
                assert_eq!(amount, 5000);
                assert!(screenshot.is_empty());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn candidate_filters_are_optional() {
        let req: ActionRequest =
            serde_json::from_str(r#"{"action":"get_candidates","status":"DEFERRED"}"#).expect("json");
        let query = req.candidate_query().expect("query");
        assert_eq!(query.status, Some(AdmissionStatus::Deferred));
        assert!(query.search.is_none());
    }

    #[test]
    fn every_action_name_is_known() {
        let req = ActionRequest::GetDashboard {
            range: TimeRange::Week,
            start: None,
            end: None,
        };
        assert!(KNOWN_ACTIONS.contains(&req.name()));
        let json = serde_json::to_value(&req).expect("json");
        assert_eq!(json["action"], "get_dashboard");
        assert_eq!(json["range"], "week");
    }
}
