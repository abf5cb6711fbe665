//! Data models for the bed regulation desk.
//!
//! This module defines the documents kept by the store:
//! - Unit: a ward/ICU grouping owning beds
//! - Bed: a physical bed and its current status
//! - Request: a patient's ICU bed request, discriminated by request type
//! - DischargeAssessment: a discharge evaluation against the CFM checklist
//!
//! and the history entries appended to requests and assessments.

use crate::errors::{RegulationError, RegulationResult};
use crate::priority::{CfmAnswers, CfmPriority};
use chrono::{DateTime, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reject empty (or whitespace-only) values for a required field.
pub(crate) fn require(field: &'static str, value: &str) -> RegulationResult<()> {
    require_len(field, value, 1)
}

/// Reject values shorter than `min` characters once trimmed.
pub(crate) fn require_len(field: &'static str, value: &str, min: usize) -> RegulationResult<()> {
    let len = value.trim().chars().count();
    if len < min {
        let message = if min <= 1 {
            "cannot be empty".to_string()
        } else {
            format!("must have at least {} characters", min)
        };
        return Err(RegulationError::validation(field, message));
    }
    Ok(())
}

/// A ward or ICU grouping of beds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Unit {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub created_at: DateTime<Local>,
}

impl Unit {
    /// Create a new unit; `min_name_len` comes from the desk settings.
    pub fn new(name: &str, description: &str, min_name_len: usize) -> RegulationResult<Self> {
        require_len("unit name", name, min_name_len)?;

        Ok(Unit {
            id: String::new(),
            name: name.trim().to_string(),
            description: description.trim().to_string(),
            created_at: Local::now(),
        })
    }
}

/// Operational status of a bed. Any status may follow any other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BedStatus {
    #[default]
    Closed,
    Clean,
    Maintenance,
    DischargeConfirmed,
    DischargeUnconfirmed,
    Occupied,
}

impl BedStatus {
    pub const ALL: [BedStatus; 6] = [
        BedStatus::Closed,
        BedStatus::Clean,
        BedStatus::Maintenance,
        BedStatus::DischargeConfirmed,
        BedStatus::DischargeUnconfirmed,
        BedStatus::Occupied,
    ];

    /// Statuses a bed can be reported as when it becomes available again.
    pub const REPORTABLE: [BedStatus; 4] = [
        BedStatus::Clean,
        BedStatus::DischargeConfirmed,
        BedStatus::DischargeUnconfirmed,
        BedStatus::Maintenance,
    ];

    pub fn from_string(value: &str) -> RegulationResult<Self> {
        match value.to_lowercase().trim() {
            "closed" => Ok(BedStatus::Closed),
            "clean" => Ok(BedStatus::Clean),
            "maintenance" => Ok(BedStatus::Maintenance),
            "discharge_confirmed" => Ok(BedStatus::DischargeConfirmed),
            "discharge_unconfirmed" => Ok(BedStatus::DischargeUnconfirmed),
            "occupied" => Ok(BedStatus::Occupied),
            _ => Err(RegulationError::validation(
                "bed status",
                format!("'{}' is not a bed status", value),
            )),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            BedStatus::Closed => "closed",
            BedStatus::Clean => "clean",
            BedStatus::Maintenance => "maintenance",
            BedStatus::DischargeConfirmed => "discharge_confirmed",
            BedStatus::DischargeUnconfirmed => "discharge_unconfirmed",
            BedStatus::Occupied => "occupied",
        }
    }

    /// A patient can be placed in the bed right away.
    pub fn is_assignable(&self) -> bool {
        matches!(self, BedStatus::Clean | BedStatus::DischargeConfirmed)
    }

    /// The bed is free or about to be.
    pub fn is_available(&self) -> bool {
        self.is_assignable() || *self == BedStatus::DischargeUnconfirmed
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, BedStatus::Closed | BedStatus::Maintenance)
    }
}

impl fmt::Display for BedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A physical bed belonging to exactly one unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bed {
    pub id: String,
    pub unit_id: String,
    pub unit_name: String,
    pub bed_number: u32,
    pub status: BedStatus,
    pub current_patient_id: Option<String>,
    pub updated_at: DateTime<Local>,
}

impl Bed {
    pub fn new(unit: &Unit, bed_number: u32) -> RegulationResult<Self> {
        if bed_number == 0 {
            return Err(RegulationError::validation(
                "bed number",
                "must be at least 1",
            ));
        }

        Ok(Bed {
            id: String::new(),
            unit_id: unit.id.clone(),
            unit_name: unit.name.clone(),
            bed_number,
            status: BedStatus::Closed,
            current_patient_id: None,
            updated_at: Local::now(),
        })
    }

    pub fn label(&self) -> String {
        format!("{} #{:02}", self.unit_name, self.bed_number)
    }
}

/// Lifecycle status of a bed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    #[default]
    PendingReview,
    WaitingBed,
    Regulated,
    Admitted,
    RefusedNir,
    Canceled,
}

impl RequestStatus {
    pub fn name(&self) -> &str {
        match self {
            RequestStatus::PendingReview => "pending_review",
            RequestStatus::WaitingBed => "waiting_bed",
            RequestStatus::Regulated => "regulated",
            RequestStatus::Admitted => "admitted",
            RequestStatus::RefusedNir => "refused_nir",
            RequestStatus::Canceled => "canceled",
        }
    }

    /// Still under review or waiting in the queue.
    pub fn is_open(&self) -> bool {
        matches!(self, RequestStatus::PendingReview | RequestStatus::WaitingBed)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Why a request left the queue without a bed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    Death,
    Transfer,
    Discharge,
    Error,
}

impl ExitReason {
    pub fn from_string(value: &str) -> RegulationResult<Self> {
        match value.to_lowercase().trim() {
            "death" => Ok(ExitReason::Death),
            "transfer" => Ok(ExitReason::Transfer),
            "discharge" => Ok(ExitReason::Discharge),
            "error" => Ok(ExitReason::Error),
            _ => Err(RegulationError::validation(
                "exit reason",
                format!(
                    "'{}' is not valid. Must be one of: death, transfer, discharge, error",
                    value
                ),
            )),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ExitReason::Death => "death",
            ExitReason::Transfer => "transfer",
            ExitReason::Discharge => "discharge",
            ExitReason::Error => "error",
        }
    }
}

/// Sectors an emergency request can originate from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EmergencySector {
    #[serde(rename = "CEDUG")]
    Cedug,
    #[serde(rename = "Centro Cirúrgico")]
    SurgicalCenter,
}

impl EmergencySector {
    pub fn name(&self) -> &str {
        match self {
            EmergencySector::Cedug => "CEDUG",
            EmergencySector::SurgicalCenter => "Centro Cirúrgico",
        }
    }
}

/// Fields specific to each request type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "requestType", rename_all = "snake_case")]
pub enum RequestKind {
    #[serde(rename_all = "camelCase")]
    Surgical {
        surgery_date: String,
        surgeon_name: String,
        surgery_type: String,
    },
    #[serde(rename_all = "camelCase")]
    Inpatient {
        sector: String,
        bed: String,
        requesting_physician: String,
        clinical_reason: String,
        request_date: String,
        request_time: String,
    },
    #[serde(rename_all = "camelCase")]
    Emergency {
        sector: EmergencySector,
        requesting_physician: String,
        clinical_reason: String,
        request_date: String,
        request_time: String,
    },
}

impl RequestKind {
    pub fn name(&self) -> &str {
        match self {
            RequestKind::Surgical { .. } => "surgical",
            RequestKind::Inpatient { .. } => "inpatient",
            RequestKind::Emergency { .. } => "emergency",
        }
    }

    fn validate(&self) -> RegulationResult<()> {
        match self {
            RequestKind::Surgical {
                surgery_date,
                surgeon_name,
                surgery_type,
            } => {
                require("surgery date", surgery_date)?;
                require("surgeon name", surgeon_name)?;
                require("surgery type", surgery_type)
            }
            RequestKind::Inpatient {
                sector,
                bed,
                requesting_physician,
                clinical_reason,
                request_date,
                request_time,
            } => {
                require("sector", sector)?;
                require("bed", bed)?;
                require("requesting physician", requesting_physician)?;
                require("clinical reason", clinical_reason)?;
                require("request date", request_date)?;
                require("request time", request_time)
            }
            RequestKind::Emergency {
                requesting_physician,
                clinical_reason,
                request_date,
                request_time,
                ..
            } => {
                require("requesting physician", requesting_physician)?;
                require("clinical reason", clinical_reason)?;
                require("request date", request_date)?;
                require("request time", request_time)
            }
        }
    }
}

/// Intake form for a new request.
#[derive(Debug, Clone)]
pub struct NewRequest {
    pub patient_name: String,
    pub cns: String,
    pub kind: RequestKind,
    pub sisreg_id: Option<String>,
    pub clinical_details: Option<String>,
}

/// A patient's ICU bed request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    pub id: String,
    pub patient_name: String,
    /// National health card (CNS) number.
    pub cns: String,
    #[serde(flatten)]
    pub kind: RequestKind,
    pub status: RequestStatus,
    pub created_at: DateTime<Local>,
    #[serde(default)]
    pub refusal_reason: Option<String>,
    #[serde(default)]
    pub cfm_priority: Option<CfmPriority>,
    #[serde(default)]
    pub cfm_answers: Option<CfmAnswers>,
    #[serde(default)]
    pub evaluated_at: Option<DateTime<Local>>,
    #[serde(default)]
    pub exit_reason: Option<ExitReason>,
    #[serde(default)]
    pub exit_note: Option<String>,
    #[serde(default)]
    pub sisreg_id: Option<String>,
    #[serde(default)]
    pub clinical_details: Option<String>,
    #[serde(default)]
    pub assigned_bed_id: Option<String>,
    #[serde(default)]
    pub assigned_unit_id: Option<String>,
    #[serde(default)]
    pub regulation_justification: Option<String>,
}

impl Request {
    /// Create a new request with validation. It starts in `pending_review`.
    pub fn new(form: NewRequest) -> RegulationResult<Self> {
        require("patient name", &form.patient_name)?;
        require("CNS", &form.cns)?;
        form.kind.validate()?;

        Ok(Request {
            id: String::new(),
            patient_name: form.patient_name.trim().to_string(),
            cns: form.cns.trim().to_string(),
            kind: form.kind,
            status: RequestStatus::PendingReview,
            created_at: Local::now(),
            refusal_reason: None,
            cfm_priority: None,
            cfm_answers: None,
            evaluated_at: None,
            exit_reason: None,
            exit_note: None,
            sisreg_id: non_blank(form.sisreg_id),
            clinical_details: non_blank(form.clinical_details),
            assigned_bed_id: None,
            assigned_unit_id: None,
            regulation_justification: None,
        })
    }

    /// Numeric rank used for queue ordering; unevaluated requests rank last.
    pub fn priority_rank(&self) -> u8 {
        self.cfm_priority.map(CfmPriority::level).unwrap_or(99)
    }

    pub(crate) fn ensure_status(
        &self,
        allowed: &[RequestStatus],
        operation: &'static str,
    ) -> RegulationResult<()> {
        if allowed.contains(&self.status) {
            return Ok(());
        }
        Err(self.invalid_state(operation))
    }

    /// Only requests still under review or in the queue may change course.
    pub(crate) fn ensure_open(&self, operation: &'static str) -> RegulationResult<()> {
        if self.status.is_open() {
            return Ok(());
        }
        Err(self.invalid_state(operation))
    }

    fn invalid_state(&self, operation: &'static str) -> RegulationError {
        RegulationError::InvalidState {
            entity: "request",
            id: self.id.clone(),
            status: self.status.to_string(),
            operation,
        }
    }
}

pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Actions recorded in a request's audit history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Created,
    Evaluated,
    RevisedPriority,
    Refused,
    Discarded,
    EditedDetails,
    Regulated,
    Admitted,
    RegulationCancelled,
}

impl AuditAction {
    pub fn name(&self) -> &str {
        match self {
            AuditAction::Created => "created",
            AuditAction::Evaluated => "evaluated",
            AuditAction::RevisedPriority => "revised_priority",
            AuditAction::Refused => "refused",
            AuditAction::Discarded => "discarded",
            AuditAction::EditedDetails => "edited_details",
            AuditAction::Regulated => "regulated",
            AuditAction::Admitted => "admitted",
            AuditAction::RegulationCancelled => "regulation_cancelled",
        }
    }
}

/// One entry of a request's append-only audit history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub action: AuditAction,
    pub timestamp: DateTime<Local>,
    pub actor: String,
    #[serde(default)]
    pub previous_priority: Option<CfmPriority>,
    #[serde(default)]
    pub new_priority: Option<CfmPriority>,
    #[serde(default)]
    pub reason: Option<String>,
}

impl AuditEntry {
    pub fn new(action: AuditAction, actor: &str) -> Self {
        AuditEntry {
            action,
            timestamp: Local::now(),
            actor: actor.to_string(),
            previous_priority: None,
            new_priority: None,
            reason: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_priorities(
        mut self,
        previous: Option<CfmPriority>,
        new: Option<CfmPriority>,
    ) -> Self {
        self.previous_priority = previous;
        self.new_priority = new;
        self
    }
}

/// The five-criterion discharge checklist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DischargeCriteria {
    pub hemodynamic_stability: bool,
    pub respiratory_stability: bool,
    pub cause_controlled: bool,
    pub neurological_stability: bool,
    pub no_organ_dysfunction: bool,
}

impl DischargeCriteria {
    pub fn all_met(&self) -> bool {
        self.hemodynamic_stability
            && self.respiratory_stability
            && self.cause_controlled
            && self.neurological_stability
            && self.no_organ_dysfunction
    }
}

/// Status of a discharge assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DischargeStatus {
    Candidate,
    NotCandidate,
    Discharged,
    ClinicalMismatch,
    AdministrativeBarrier,
}

impl DischargeStatus {
    pub fn name(&self) -> &str {
        match self {
            DischargeStatus::Candidate => "candidate",
            DischargeStatus::NotCandidate => "not_candidate",
            DischargeStatus::Discharged => "discharged",
            DischargeStatus::ClinicalMismatch => "clinical_mismatch",
            DischargeStatus::AdministrativeBarrier => "administrative_barrier",
        }
    }

    /// Shown on the active discharge list.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            DischargeStatus::Candidate | DischargeStatus::AdministrativeBarrier
        )
    }
}

impl fmt::Display for DischargeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Intake form for a discharge assessment.
#[derive(Debug, Clone)]
pub struct NewAssessment {
    pub patient_name: String,
    pub unit_id: String,
    pub bed_id: String,
    pub admission_date: NaiveDate,
    pub criteria: DischargeCriteria,
}

/// A discharge evaluation of a patient occupying a bed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DischargeAssessment {
    pub id: String,
    pub patient_name: String,
    pub unit_id: String,
    pub unit_name: String,
    pub bed_id: String,
    pub bed_number: u32,
    pub admission_date: NaiveDate,
    pub created_at: DateTime<Local>,
    pub criteria: DischargeCriteria,
    pub status: DischargeStatus,
}

impl DischargeAssessment {
    /// Build an assessment for a bed; the status is derived from the checklist.
    pub fn new(form: NewAssessment, bed: &Bed) -> RegulationResult<Self> {
        require("patient name", &form.patient_name)?;
        if form.admission_date > Local::now().date_naive() {
            return Err(RegulationError::validation(
                "admission date",
                "cannot be in the future",
            ));
        }

        let status = if form.criteria.all_met() {
            DischargeStatus::Candidate
        } else {
            DischargeStatus::NotCandidate
        };

        Ok(DischargeAssessment {
            id: String::new(),
            patient_name: form.patient_name.trim().to_string(),
            unit_id: bed.unit_id.clone(),
            unit_name: bed.unit_name.clone(),
            bed_id: bed.id.clone(),
            bed_number: bed.bed_number,
            admission_date: form.admission_date,
            created_at: Local::now(),
            criteria: form.criteria,
            status,
        })
    }

    pub(crate) fn ensure_active(&self, operation: &'static str) -> RegulationResult<()> {
        if self.status.is_active() {
            return Ok(());
        }
        Err(RegulationError::InvalidState {
            entity: "discharge assessment",
            id: self.id.clone(),
            status: self.status.to_string(),
            operation,
        })
    }
}

/// Decisions available when reviewing an active discharge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    /// Discharge validated, waiting for a ward bed.
    AdministrativeBarrier,
    /// Discharge contraindicated by clinical instability.
    ClinicalMismatch,
    /// Record the observation without changing the status.
    KeepUnderAnalysis,
}

impl ReviewDecision {
    pub fn name(&self) -> &str {
        match self {
            ReviewDecision::AdministrativeBarrier => "administrative_barrier",
            ReviewDecision::ClinicalMismatch => "clinical_mismatch",
            ReviewDecision::KeepUnderAnalysis => "keep_under_analysis",
        }
    }

    pub fn resulting_status(&self) -> Option<DischargeStatus> {
        match self {
            ReviewDecision::AdministrativeBarrier => Some(DischargeStatus::AdministrativeBarrier),
            ReviewDecision::ClinicalMismatch => Some(DischargeStatus::ClinicalMismatch),
            ReviewDecision::KeepUnderAnalysis => None,
        }
    }
}

/// One entry of a discharge assessment's review history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewEntry {
    pub timestamp: DateTime<Local>,
    pub actor: String,
    pub observation: String,
    pub decision: ReviewDecision,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn surgical() -> RequestKind {
        RequestKind::Surgical {
            surgery_date: "2026-10-20".to_string(),
            surgeon_name: "Dr. Lima".to_string(),
            surgery_type: "Gastrectomy".to_string(),
        }
    }

    #[test]
    fn test_request_validation() {
        let form = NewRequest {
            patient_name: "  ".to_string(),
            cns: "700000000000001".to_string(),
            kind: surgical(),
            sisreg_id: None,
            clinical_details: None,
        };
        assert!(matches!(
            Request::new(form),
            Err(RegulationError::Validation { field: "patient name", .. })
        ));

        let form = NewRequest {
            patient_name: "Maria Santos".to_string(),
            cns: "700000000000001".to_string(),
            kind: RequestKind::Emergency {
                sector: EmergencySector::Cedug,
                requesting_physician: "Dr. Souza".to_string(),
                clinical_reason: String::new(),
                request_date: "2026-10-16".to_string(),
                request_time: "08:00".to_string(),
            },
            sisreg_id: Some("   ".to_string()),
            clinical_details: None,
        };
        assert!(matches!(
            Request::new(form),
            Err(RegulationError::Validation { field: "clinical reason", .. })
        ));
    }

    #[test]
    fn test_new_request_defaults() {
        let request = Request::new(NewRequest {
            patient_name: " João Oliveira ".to_string(),
            cns: "700000000000002".to_string(),
            kind: surgical(),
            sisreg_id: Some(" ".to_string()),
            clinical_details: Some("Post-op monitoring".to_string()),
        })
        .unwrap();

        assert_eq!(request.patient_name, "João Oliveira");
        assert_eq!(request.status, RequestStatus::PendingReview);
        assert_eq!(request.priority_rank(), 99);
        assert_eq!(request.sisreg_id, None);
        assert_eq!(request.clinical_details.as_deref(), Some("Post-op monitoring"));
    }

    #[test]
    fn test_request_document_shape() {
        let request = Request::new(NewRequest {
            patient_name: "Ana".to_string(),
            cns: "1".to_string(),
            kind: RequestKind::Emergency {
                sector: EmergencySector::SurgicalCenter,
                requesting_physician: "Dr. Reis".to_string(),
                clinical_reason: "Septic shock".to_string(),
                request_date: "2026-10-16".to_string(),
                request_time: "10:30".to_string(),
            },
            sisreg_id: None,
            clinical_details: None,
        })
        .unwrap();

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["requestType"], "emergency");
        assert_eq!(value["sector"], "Centro Cirúrgico");
        assert_eq!(value["status"], "pending_review");
        assert_eq!(value["patientName"], "Ana");

        let back: Request = serde_json::from_value(value).unwrap();
        assert_eq!(back, request);
    }

    #[test]
    fn test_bed_status_groups() {
        assert!(BedStatus::Clean.is_assignable());
        assert!(BedStatus::DischargeConfirmed.is_assignable());
        assert!(!BedStatus::DischargeUnconfirmed.is_assignable());
        assert!(BedStatus::DischargeUnconfirmed.is_available());
        assert!(BedStatus::Maintenance.is_blocked());
        assert_eq!(
            BedStatus::from_string("DISCHARGE_CONFIRMED").unwrap(),
            BedStatus::DischargeConfirmed
        );
        assert!(BedStatus::from_string("dirty").is_err());
    }

    #[test]
    fn test_unit_and_bed_validation() {
        assert!(Unit::new("A", "", 2).is_err());
        let unit = Unit::new(" UTI Adulto ", "", 2).unwrap();
        assert_eq!(unit.name, "UTI Adulto");
        assert!(Bed::new(&unit, 0).is_err());
        let bed = Bed::new(&unit, 3).unwrap();
        assert_eq!(bed.status, BedStatus::Closed);
        assert_eq!(bed.label(), "UTI Adulto #03");
    }

    #[test]
    fn test_assessment_status_from_checklist() {
        let unit = Unit::new("UTI 1", "", 2).unwrap();
        let bed = Bed::new(&unit, 1).unwrap();
        let all = DischargeCriteria {
            hemodynamic_stability: true,
            respiratory_stability: true,
            cause_controlled: true,
            neurological_stability: true,
            no_organ_dysfunction: true,
        };
        let form = |criteria| NewAssessment {
            patient_name: "Tereza".to_string(),
            unit_id: unit.id.clone(),
            bed_id: bed.id.clone(),
            admission_date: Local::now().date_naive() - Duration::days(4),
            criteria,
        };

        let candidate = DischargeAssessment::new(form(all), &bed).unwrap();
        assert_eq!(candidate.status, DischargeStatus::Candidate);

        let partial = DischargeCriteria {
            cause_controlled: false,
            ..all
        };
        let rejected = DischargeAssessment::new(form(partial), &bed).unwrap();
        assert_eq!(rejected.status, DischargeStatus::NotCandidate);

        let mut future = form(all);
        future.admission_date = Local::now().date_naive() + Duration::days(1);
        assert!(DischargeAssessment::new(future, &bed).is_err());
    }

    #[test]
    fn test_review_decisions() {
        assert_eq!(ReviewDecision::KeepUnderAnalysis.resulting_status(), None);
        assert_eq!(
            ReviewDecision::ClinicalMismatch.resulting_status(),
            Some(DischargeStatus::ClinicalMismatch)
        );
        assert!(DischargeStatus::AdministrativeBarrier.is_active());
        assert!(!DischargeStatus::NotCandidate.is_active());
    }
}
