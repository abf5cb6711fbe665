//! Audit trail views over the request history table.

use crate::errors::RegulationResult;
use crate::models::{AuditEntry, Request};
use crate::regulation::RegulationDesk;

/// One audit entry with the request it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditView {
    pub request_id: String,
    pub patient_name: String,
    pub entry: AuditEntry,
}

impl RegulationDesk {
    /// Every request's history merged, newest first.
    pub fn audit_trail(&self, limit: Option<usize>) -> Vec<AuditView> {
        let mut trail: Vec<AuditView> = self
            .store
            .audit_log()
            .iter()
            .map(|record| AuditView {
                request_id: record.parent_id.clone(),
                patient_name: self
                    .store
                    .get::<Request>(&record.parent_id)
                    .map(|r| r.patient_name.clone())
                    .unwrap_or_default(),
                entry: record.entry.clone(),
            })
            .collect();

        // Stable sort keeps append order reversed for equal timestamps.
        trail.reverse();
        trail.sort_by(|a, b| b.entry.timestamp.cmp(&a.entry.timestamp));
        if let Some(limit) = limit {
            trail.truncate(limit);
        }
        trail
    }

    /// History of one request in the order it was written.
    pub fn request_history(&self, request_id: &str) -> RegulationResult<Vec<AuditEntry>> {
        self.store.fetch::<Request>(request_id)?;
        Ok(self
            .store
            .history(request_id)
            .into_iter()
            .cloned()
            .collect())
    }
}
