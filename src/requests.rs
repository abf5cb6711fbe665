//! Request intake, CFM evaluation, refusal and queue views.

use crate::errors::RegulationResult;
use crate::models::{
    non_blank, require_len, AuditAction, AuditEntry, ExitReason, NewRequest, Request,
    RequestStatus,
};
use crate::priority::{classify, AnswerSheet, CfmPriority, Classification};
use crate::regulation::RegulationDesk;
use crate::store::{Subscription, WriteBatch};
use chrono::Local;
use log::info;

const DISCARD_NOTE: &str = "Removed during queue review";
const EDIT_REASON: &str = "Clinical / SISREG details updated";

/// How the waiting list is sorted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueueSort {
    #[default]
    Priority,
    /// Oldest request first.
    Time,
}

/// Free-text and priority filter over the waiting list.
#[derive(Debug, Clone, Default)]
pub struct QueueFilter {
    /// Matched case-insensitively against patient name and CNS.
    pub search: Option<String>,
    pub priority: Option<CfmPriority>,
    pub sort: QueueSort,
}

impl QueueFilter {
    fn matches(&self, request: &Request) -> bool {
        let matches_search = match self.search.as_deref().map(str::trim) {
            Some(term) if !term.is_empty() => {
                let term = term.to_lowercase();
                request.patient_name.to_lowercase().contains(&term)
                    || request.cns.to_lowercase().contains(&term)
            }
            _ => true,
        };
        let matches_priority = self
            .priority
            .map(|p| request.cfm_priority == Some(p))
            .unwrap_or(true);
        matches_search && matches_priority
    }
}

fn newest_first(a: &Request, b: &Request) -> std::cmp::Ordering {
    b.created_at.cmp(&a.created_at)
}

fn by_rank_then_age(a: &Request, b: &Request) -> std::cmp::Ordering {
    a.priority_rank()
        .cmp(&b.priority_rank())
        .then(a.created_at.cmp(&b.created_at))
}

impl RegulationDesk {
    /// Register a new request; it enters `pending_review`.
    pub fn submit_request(&mut self, form: NewRequest) -> RegulationResult<String> {
        let request = Request::new(form)?;
        let kind = request.kind.name().to_string();

        let mut batch = WriteBatch::new();
        let id = batch.set(request);
        batch.append_audit(
            &id,
            AuditEntry::new(AuditAction::Created, &self.settings.nir_label),
        );
        self.store.commit(batch)?;

        info!("Request {} ({}) submitted for review", id, kind);
        Ok(id)
    }

    /// Classify a request from the checklist and place it in the bed queue.
    ///
    /// Re-evaluating a request that already has a priority records a revision.
    pub fn evaluate_request(
        &mut self,
        request_id: &str,
        sheet: &AnswerSheet,
    ) -> RegulationResult<Classification> {
        let mut request = self.store.fetch::<Request>(request_id)?;
        request.ensure_open("evaluate")?;

        let answers = sheet.complete()?;
        let classification = classify(&answers, self.settings.rule_set);
        let previous = request.cfm_priority;
        let action = if previous.is_some() {
            AuditAction::RevisedPriority
        } else {
            AuditAction::Evaluated
        };

        request.status = RequestStatus::WaitingBed;
        request.cfm_priority = Some(classification.priority);
        request.cfm_answers = Some(answers);
        request.evaluated_at = Some(Local::now());

        let entry = AuditEntry::new(action, &self.settings.regulator_label)
            .with_priorities(previous, Some(classification.priority))
            .with_reason(classification.justification);

        let mut batch = WriteBatch::new();
        batch.update(request).append_audit(request_id, entry);
        self.store.commit(batch)?;

        info!(
            "Request {} {} as {}",
            request_id,
            action.name(),
            classification.priority
        );
        Ok(classification)
    }

    /// Refuse a request at the internal regulation office.
    pub fn refuse_request(&mut self, request_id: &str, reason: &str) -> RegulationResult<()> {
        require_len("refusal reason", reason, self.settings.min_refusal_len)?;
        let mut request = self.store.fetch::<Request>(request_id)?;
        request.ensure_open("refuse")?;

        request.status = RequestStatus::RefusedNir;
        request.refusal_reason = Some(reason.trim().to_string());

        let entry = AuditEntry::new(AuditAction::Refused, &self.settings.nir_label)
            .with_reason(reason.trim());
        let mut batch = WriteBatch::new();
        batch.update(request).append_audit(request_id, entry);
        self.store.commit(batch)?;

        info!("Request {} refused", request_id);
        Ok(())
    }

    /// Take a request out of the queue (death, transfer, discharge, error).
    pub fn discard_request(&mut self, request_id: &str, reason: ExitReason) -> RegulationResult<()> {
        let mut request = self.store.fetch::<Request>(request_id)?;
        request.ensure_open("discard")?;

        request.status = RequestStatus::Canceled;
        request.exit_reason = Some(reason);
        request.exit_note = Some(DISCARD_NOTE.to_string());

        let entry = AuditEntry::new(AuditAction::Discarded, &self.settings.regulator_label)
            .with_reason(reason.name());
        let mut batch = WriteBatch::new();
        batch.update(request).append_audit(request_id, entry);
        self.store.commit(batch)?;

        info!("Request {} discarded ({})", request_id, reason.name());
        Ok(())
    }

    /// Update the SISREG id and clinical details of a request.
    pub fn edit_details(
        &mut self,
        request_id: &str,
        sisreg_id: Option<String>,
        clinical_details: Option<String>,
    ) -> RegulationResult<()> {
        let mut request = self.store.fetch::<Request>(request_id)?;
        request.sisreg_id = non_blank(sisreg_id);
        request.clinical_details = non_blank(clinical_details);

        let entry = AuditEntry::new(AuditAction::EditedDetails, &self.settings.regulator_label)
            .with_reason(EDIT_REASON);
        let mut batch = WriteBatch::new();
        batch.update(request).append_audit(request_id, entry);
        self.store.commit(batch)
    }

    /// Requests awaiting evaluation, newest first.
    pub fn pending_requests(&self) -> Vec<Request> {
        self.store.query::<Request, _, _>(
            |r: &Request| r.status == RequestStatus::PendingReview,
            newest_first,
        )
    }

    /// The waiting list after applying a filter.
    pub fn filter_queue(&self, filter: &QueueFilter) -> Vec<Request> {
        let mut queue: Vec<Request> = self
            .waiting_queue()
            .into_iter()
            .filter(|r| filter.matches(r))
            .collect();
        if filter.sort == QueueSort::Time {
            queue.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        }
        queue
    }

    /// Requests with priority 1 or 2 among the waiting list shown by `filter`.
    pub fn urgent_count(&self, filter: &QueueFilter) -> usize {
        self.filter_queue(filter)
            .iter()
            .filter(|r| r.cfm_priority.map(CfmPriority::is_urgent).unwrap_or(false))
            .count()
    }

    pub fn watch_pending_requests(&mut self) -> Subscription<Request> {
        self.store.subscribe::<Request, _, _>(
            |r: &Request| r.status == RequestStatus::PendingReview,
            newest_first,
        )
    }

    pub fn watch_waiting_requests(&mut self) -> Subscription<Request> {
        self.store.subscribe::<Request, _, _>(
            |r: &Request| r.status == RequestStatus::WaitingBed,
            by_rank_then_age,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::RegulationError;
    use crate::models::{EmergencySector, RequestKind};
    use chrono::Duration;

    fn form(name: &str, cns: &str) -> NewRequest {
        NewRequest {
            patient_name: name.to_string(),
            cns: cns.to_string(),
            kind: RequestKind::Inpatient {
                sector: "Clínica Médica".to_string(),
                bed: "12B".to_string(),
                requesting_physician: "Dr. Costa".to_string(),
                clinical_reason: "Respiratory failure".to_string(),
                request_date: "2026-10-16".to_string(),
                request_time: "09:15".to_string(),
            },
            sisreg_id: None,
            clinical_details: None,
        }
    }

    fn sheet(support: bool, recovery: bool, limitation: bool) -> AnswerSheet {
        AnswerSheet {
            needs_life_support: Some(support),
            high_recovery_probability: Some(recovery),
            has_therapeutic_limitation: Some(limitation),
            ..AnswerSheet::default()
        }
    }

    #[test]
    fn test_submit_starts_pending_with_audit() {
        let mut desk = RegulationDesk::in_memory();
        let id = desk.submit_request(form("Maria Silva", "700100")).unwrap();

        let request = desk.store.fetch::<Request>(&id).unwrap();
        assert_eq!(request.status, RequestStatus::PendingReview);
        assert_eq!(request.cfm_priority, None);

        let history = desk.store.history(&id);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].action, AuditAction::Created);
    }

    #[test]
    fn test_invalid_request_is_not_stored() {
        let mut desk = RegulationDesk::in_memory();
        let mut bad = form("Ana", "1");
        bad.kind = RequestKind::Emergency {
            sector: EmergencySector::Cedug,
            requesting_physician: "".to_string(),
            clinical_reason: "Trauma".to_string(),
            request_date: "2026-10-16".to_string(),
            request_time: "02:00".to_string(),
        };

        assert!(desk.submit_request(bad).is_err());
        assert_eq!(desk.store.count::<Request>(), 0);
    }

    #[test]
    fn test_evaluation_then_revision() {
        let mut desk = RegulationDesk::in_memory();
        let id = desk.submit_request(form("João", "700200")).unwrap();

        let first = desk.evaluate_request(&id, &sheet(true, true, false)).unwrap();
        assert_eq!(first.priority, CfmPriority::P1);

        let request = desk.store.fetch::<Request>(&id).unwrap();
        assert_eq!(request.status, RequestStatus::WaitingBed);
        assert_eq!(request.cfm_priority, Some(CfmPriority::P1));
        assert!(request.evaluated_at.is_some());

        let revised = desk.evaluate_request(&id, &sheet(true, true, true)).unwrap();
        assert_eq!(revised.priority, CfmPriority::P3);

        let history = desk.store.history(&id);
        let last = history.last().unwrap();
        assert_eq!(last.action, AuditAction::RevisedPriority);
        assert_eq!(last.previous_priority, Some(CfmPriority::P1));
        assert_eq!(last.new_priority, Some(CfmPriority::P3));
    }

    #[test]
    fn test_incomplete_sheet_is_rejected() {
        let mut desk = RegulationDesk::in_memory();
        let id = desk.submit_request(form("Francisco", "700300")).unwrap();
        let incomplete = AnswerSheet {
            needs_life_support: Some(true),
            ..AnswerSheet::default()
        };

        assert!(matches!(
            desk.evaluate_request(&id, &incomplete),
            Err(RegulationError::MissingAnswer(_))
        ));
        assert_eq!(
            desk.store.fetch::<Request>(&id).unwrap().status,
            RequestStatus::PendingReview
        );
    }

    #[test]
    fn test_refusal_needs_reason_and_open_request() {
        let mut desk = RegulationDesk::in_memory();
        let id = desk.submit_request(form("Tereza", "700400")).unwrap();

        assert!(matches!(
            desk.refuse_request(&id, "too short"),
            Err(RegulationError::Validation { .. })
        ));
        desk.refuse_request(&id, "Stable patient, ward bed is adequate")
            .unwrap();

        let request = desk.store.fetch::<Request>(&id).unwrap();
        assert_eq!(request.status, RequestStatus::RefusedNir);
        assert_eq!(
            desk.store.history(&id).last().unwrap().actor,
            desk.settings.nir_label
        );
        assert!(matches!(
            desk.evaluate_request(&id, &sheet(true, true, false)),
            Err(RegulationError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_discard_records_exit_reason() {
        let mut desk = RegulationDesk::in_memory();
        let id = desk.submit_request(form("Pedro", "700500")).unwrap();
        desk.evaluate_request(&id, &sheet(false, true, false)).unwrap();
        desk.discard_request(&id, ExitReason::Transfer).unwrap();

        let request = desk.store.fetch::<Request>(&id).unwrap();
        assert_eq!(request.status, RequestStatus::Canceled);
        assert_eq!(request.exit_reason, Some(ExitReason::Transfer));
        assert!(desk.waiting_queue().is_empty());
        assert!(desk.discard_request(&id, ExitReason::Error).is_err());
    }

    #[test]
    fn test_edit_details() {
        let mut desk = RegulationDesk::in_memory();
        let id = desk.submit_request(form("Lúcia", "700600")).unwrap();
        desk.edit_details(&id, Some(" 123456 ".to_string()), Some(String::new()))
            .unwrap();

        let request = desk.store.fetch::<Request>(&id).unwrap();
        assert_eq!(request.sisreg_id.as_deref(), Some("123456"));
        assert_eq!(request.clinical_details, None);
        assert_eq!(
            desk.store.history(&id).last().unwrap().action,
            AuditAction::EditedDetails
        );
    }

    #[test]
    fn test_pending_list_newest_first() {
        let mut desk = RegulationDesk::in_memory();
        let older = desk.submit_request(form("Older", "1")).unwrap();
        let newer = desk.submit_request(form("Newer", "2")).unwrap();

        let mut request = desk.store.fetch::<Request>(&older).unwrap();
        request.created_at = request.created_at - Duration::minutes(30);
        desk.store.update(request).unwrap();

        let ids: Vec<String> = desk.pending_requests().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![newer, older]);
    }

    #[test]
    fn test_queue_filter_and_urgent_count() {
        let mut desk = RegulationDesk::in_memory();
        let maria = desk.submit_request(form("Maria Santos", "700111")).unwrap();
        let jose = desk.submit_request(form("José Maria", "700222")).unwrap();
        let ana = desk.submit_request(form("Ana Lima", "700333")).unwrap();
        desk.evaluate_request(&maria, &sheet(false, false, true)).unwrap();
        desk.evaluate_request(&jose, &sheet(true, true, false)).unwrap();
        desk.evaluate_request(&ana, &sheet(false, true, false)).unwrap();

        let by_name = desk.filter_queue(&QueueFilter {
            search: Some("MARIA".to_string()),
            ..QueueFilter::default()
        });
        let ids: Vec<&str> = by_name.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec![jose.as_str(), maria.as_str()]);

        let by_cns = desk.filter_queue(&QueueFilter {
            search: Some("333".to_string()),
            ..QueueFilter::default()
        });
        assert_eq!(by_cns.len(), 1);
        assert_eq!(by_cns[0].id, ana);

        let p4 = desk.filter_queue(&QueueFilter {
            priority: Some(CfmPriority::P4),
            ..QueueFilter::default()
        });
        assert_eq!(p4.len(), 1);
        assert_eq!(p4[0].id, maria);

        assert_eq!(desk.urgent_count(&QueueFilter::default()), 2);
        let marias = QueueFilter {
            search: Some("maria".to_string()),
            ..QueueFilter::default()
        };
        assert_eq!(desk.urgent_count(&marias), 1);

        let by_time = desk.filter_queue(&QueueFilter {
            sort: QueueSort::Time,
            ..QueueFilter::default()
        });
        assert_eq!(by_time.len(), 3);
        assert!(by_time
            .windows(2)
            .all(|pair| pair[0].created_at <= pair[1].created_at));
    }

    #[test]
    fn test_watch_waiting_requests() {
        let mut desk = RegulationDesk::in_memory();
        let feed = desk.watch_waiting_requests();
        assert_eq!(feed.try_next().unwrap().len(), 0);

        let id = desk.submit_request(form("Rita", "700900")).unwrap();
        assert_eq!(feed.latest().unwrap().len(), 0);

        desk.evaluate_request(&id, &sheet(true, false, false)).unwrap();
        let waiting = feed.latest().unwrap();
        assert_eq!(waiting.len(), 1);
        assert_eq!(waiting[0].cfm_priority, Some(CfmPriority::P3));
    }

    #[test]
    fn test_watch_pending_requests() {
        let mut desk = RegulationDesk::in_memory();
        let feed = desk.watch_pending_requests();
        assert!(feed.try_next().unwrap().is_empty());

        let id = desk.submit_request(form("Rita", "700900")).unwrap();
        let pending = feed.latest().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, id);

        desk.evaluate_request(&id, &sheet(true, false, false)).unwrap();
        assert!(feed.latest().unwrap().is_empty());
    }

    #[test]
    fn test_closed_requests_reject_further_actions() {
        let mut desk = RegulationDesk::in_memory();
        let refused = desk.submit_request(form("Rita", "700900")).unwrap();
        desk.refuse_request(&refused, "Transferred to another hospital")
            .unwrap();

        assert!(matches!(
            desk.evaluate_request(&refused, &sheet(true, true, false)),
            Err(RegulationError::InvalidState { .. })
        ));
        assert!(matches!(
            desk.discard_request(&refused, ExitReason::Death),
            Err(RegulationError::InvalidState { .. })
        ));
    }
}
