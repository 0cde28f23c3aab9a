use serde::{Deserialize, Serialize};

use crate::domain::{AdmissionStatus, BatchId, Candidate, User};

/// Filters accepted by the candidate list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CandidateQuery {
    pub search: Option<String>,
    pub batch_id: Option<BatchId>,
    pub status: Option<AdmissionStatus>,
}

impl CandidateQuery {
    pub fn matches(&self, candidate: &Candidate) -> bool {
        if let Some(term) = self.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            let term = term.to_lowercase();
            let name = candidate.personal_details.full_name.to_lowercase();
            if !name.contains(&term) && !candidate.id.as_str().to_lowercase().contains(&term) {
                return false;
            }
        }
        if let Some(batch_id) = &self.batch_id {
            if !batch_id.is_blank() && &candidate.batch_id != batch_id {
                return false;
            }
        }
        if let Some(status) = self.status {
            if candidate.status != status {
                return false;
            }
        }
        true
    }
}

/// `None` means an unauthenticated call with session checks disabled.
pub fn visible_to(viewer: Option<&User>, candidate: &Candidate) -> bool {
    match viewer {
        None => true,
        Some(user) => user.role.sees_all_candidates() || candidate.executive_id == user.id,
    }
}

/// Applies viewer scope and filters, newest first.
pub fn select_candidates(
    viewer: Option<&User>,
    candidates: Vec<Candidate>,
    query: &CandidateQuery,
) -> Vec<Candidate> {
    let mut selected: Vec<Candidate> = candidates
        .into_iter()
        .filter(|candidate| visible_to(viewer, candidate) && query.matches(candidate))
        .collect();
    selected.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    selected
}
