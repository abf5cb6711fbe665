//! Discharge workflow: checklist assessment, review and confirmation.

use crate::errors::{RegulationError, RegulationResult};
use crate::models::{
    require_len, Bed, BedStatus, DischargeAssessment, DischargeStatus, NewAssessment,
    ReviewDecision, ReviewEntry, Unit,
};
use crate::regulation::RegulationDesk;
use crate::store::{Subscription, WriteBatch};
use chrono::Local;
use log::{info, warn};

/// Counters shown on the discharge panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DischargeStats {
    /// Every assessment ever recorded.
    pub eligible: usize,
    pub discharged: usize,
    pub barrier: usize,
}

impl DischargeStats {
    pub fn from_assessments<'a>(
        assessments: impl IntoIterator<Item = &'a DischargeAssessment>,
    ) -> Self {
        assessments
            .into_iter()
            .fold(DischargeStats::default(), |mut stats, a| {
                stats.eligible += 1;
                match a.status {
                    DischargeStatus::Discharged => stats.discharged += 1,
                    DischargeStatus::AdministrativeBarrier => stats.barrier += 1,
                    _ => {}
                }
                stats
            })
    }
}

fn oldest_first(a: &DischargeAssessment, b: &DischargeAssessment) -> std::cmp::Ordering {
    a.created_at.cmp(&b.created_at)
}

impl RegulationDesk {
    /// Record a discharge assessment for the patient in an occupied bed.
    ///
    /// The assessment becomes a candidate only when all five criteria hold;
    /// otherwise it is kept as a `not_candidate` record.
    pub fn assess_discharge(&mut self, form: NewAssessment) -> RegulationResult<String> {
        self.store.fetch::<Unit>(&form.unit_id)?;
        let bed = self.store.fetch::<Bed>(&form.bed_id)?;
        if bed.unit_id != form.unit_id {
            return Err(RegulationError::validation(
                "bed",
                format!("bed {} does not belong to the selected unit", bed.label()),
            ));
        }
        if bed.status != BedStatus::Occupied {
            return Err(RegulationError::InvalidState {
                entity: "bed",
                id: bed.id,
                status: bed.status.to_string(),
                operation: "assess discharge from",
            });
        }

        let assessment = DischargeAssessment::new(form, &bed)?;
        let status = assessment.status;
        if status == DischargeStatus::NotCandidate {
            warn!(
                "Discharge criteria not met for bed {}; kept as history only",
                bed.label()
            );
        }

        let id = self.store.insert(assessment)?;
        info!("Discharge assessment {} recorded as {}", id, status);
        Ok(id)
    }

    /// Candidates and administrative barriers, oldest first.
    pub fn active_discharges(&self) -> Vec<DischargeAssessment> {
        self.store.query::<DischargeAssessment, _, _>(
            |a: &DischargeAssessment| a.status.is_active(),
            oldest_first,
        )
    }

    pub fn watch_active_discharges(&mut self) -> Subscription<DischargeAssessment> {
        self.store.subscribe::<DischargeAssessment, _, _>(
            |a: &DischargeAssessment| a.status.is_active(),
            oldest_first,
        )
    }

    /// Review an active discharge. Keeping it under analysis only records
    /// the observation.
    pub fn review_discharge(
        &mut self,
        assessment_id: &str,
        decision: ReviewDecision,
        observation: &str,
    ) -> RegulationResult<()> {
        require_len("observation", observation, self.settings.min_observation_len)?;
        let mut assessment = self.store.fetch::<DischargeAssessment>(assessment_id)?;
        assessment.ensure_active("review")?;

        let entry = ReviewEntry {
            timestamp: Local::now(),
            actor: self.settings.regulator_label.clone(),
            observation: observation.trim().to_string(),
            decision,
        };

        let mut batch = WriteBatch::new();
        if let Some(status) = decision.resulting_status() {
            assessment.status = status;
            batch.update(assessment);
        }
        batch.append_review(assessment_id, entry);
        self.store.commit(batch)?;

        info!("Discharge {} reviewed: {}", assessment_id, decision.name());
        Ok(())
    }

    /// Confirm the discharge: the assessment closes and the bed is freed.
    pub fn confirm_discharge(&mut self, assessment_id: &str) -> RegulationResult<()> {
        let mut assessment = self.store.fetch::<DischargeAssessment>(assessment_id)?;
        assessment.ensure_active("confirm")?;
        let mut bed = self.store.fetch::<Bed>(&assessment.bed_id)?;

        assessment.status = DischargeStatus::Discharged;
        bed.status = BedStatus::Clean;
        bed.current_patient_id = None;
        bed.updated_at = Local::now();

        let label = bed.label();
        let mut batch = WriteBatch::new();
        batch.update(assessment).update(bed);
        self.store.commit(batch)?;

        info!("Discharge {} confirmed, bed {} is clean", assessment_id, label);
        Ok(())
    }

    pub fn discharge_stats(&self) -> DischargeStats {
        DischargeStats::from_assessments(self.store.all::<DischargeAssessment>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DischargeCriteria, NewRequest, RequestKind};
    use crate::priority::AnswerSheet;
    use chrono::{Duration, NaiveDate};

    const ALL_MET: DischargeCriteria = DischargeCriteria {
        hemodynamic_stability: true,
        respiratory_stability: true,
        cause_controlled: true,
        neurological_stability: true,
        no_organ_dysfunction: true,
    };

    fn admitted_yesterday() -> NaiveDate {
        Local::now().date_naive() - Duration::days(1)
    }

    /// A desk with one occupied bed; returns (desk, unit id, bed id).
    fn desk_with_patient() -> (RegulationDesk, String, String) {
        let mut desk = RegulationDesk::in_memory();
        let unit_id = desk.add_unit("UTI Adulto", "").unwrap();
        desk.bulk_create_beds(&unit_id, 1, 2).unwrap();
        let bed_id = desk.beds_for_unit(&unit_id)[0].id.clone();
        desk.update_bed_status(&bed_id, BedStatus::Clean).unwrap();

        let request = desk
            .submit_request(NewRequest {
                patient_name: "Francisco Almeida".to_string(),
                cns: "700000000000005".to_string(),
                kind: RequestKind::Surgical {
                    surgery_date: "2026-10-14".to_string(),
                    surgeon_name: "Dr. Prado".to_string(),
                    surgery_type: "Hepatectomy".to_string(),
                },
                sisreg_id: None,
                clinical_details: None,
            })
            .unwrap();
        desk.evaluate_request(
            &request,
            &AnswerSheet {
                needs_life_support: Some(true),
                high_recovery_probability: Some(true),
                has_therapeutic_limitation: Some(false),
                ..AnswerSheet::default()
            },
        )
        .unwrap();
        desk.assign_patient_to_bed(&request, &bed_id, None).unwrap();
        (desk, unit_id, bed_id)
    }

    fn form(unit_id: &str, bed_id: &str, criteria: DischargeCriteria) -> NewAssessment {
        NewAssessment {
            patient_name: "Francisco Almeida".to_string(),
            unit_id: unit_id.to_string(),
            bed_id: bed_id.to_string(),
            admission_date: admitted_yesterday(),
            criteria,
        }
    }

    #[test]
    fn test_assessment_requires_occupied_bed_in_unit() {
        let (mut desk, unit_id, _) = desk_with_patient();
        let free_bed = desk.beds_for_unit(&unit_id)[1].id.clone();
        assert!(matches!(
            desk.assess_discharge(form(&unit_id, &free_bed, ALL_MET)),
            Err(RegulationError::InvalidState { .. })
        ));

        let other_unit = desk.add_unit("Coronariana", "").unwrap();
        let bed_id = desk.beds_for_unit(&unit_id)[0].id.clone();
        assert!(matches!(
            desk.assess_discharge(form(&other_unit, &bed_id, ALL_MET)),
            Err(RegulationError::Validation { field: "bed", .. })
        ));
    }

    #[test]
    fn test_candidate_and_not_candidate() {
        let (mut desk, unit_id, bed_id) = desk_with_patient();
        let candidate = desk.assess_discharge(form(&unit_id, &bed_id, ALL_MET)).unwrap();

        let unstable = DischargeCriteria {
            respiratory_stability: false,
            ..ALL_MET
        };
        let rejected = desk.assess_discharge(form(&unit_id, &bed_id, unstable)).unwrap();

        let active: Vec<String> = desk.active_discharges().into_iter().map(|a| a.id).collect();
        assert_eq!(active, vec![candidate]);

        let stored = desk.store.fetch::<DischargeAssessment>(&rejected).unwrap();
        assert_eq!(stored.status, DischargeStatus::NotCandidate);
        assert_eq!(stored.unit_name, "UTI Adulto");
        assert_eq!(stored.bed_number, 1);
    }

    #[test]
    fn test_review_decisions() {
        let (mut desk, unit_id, bed_id) = desk_with_patient();
        let id = desk.assess_discharge(form(&unit_id, &bed_id, ALL_MET)).unwrap();

        assert!(desk
            .review_discharge(&id, ReviewDecision::AdministrativeBarrier, "ok")
            .is_err());

        desk.review_discharge(&id, ReviewDecision::KeepUnderAnalysis, "Awaiting lab results")
            .unwrap();
        assert_eq!(
            desk.store.fetch::<DischargeAssessment>(&id).unwrap().status,
            DischargeStatus::Candidate
        );

        desk.review_discharge(&id, ReviewDecision::AdministrativeBarrier, "No ward bed available")
            .unwrap();
        assert_eq!(desk.discharge_stats().barrier, 1);

        desk.review_discharge(&id, ReviewDecision::ClinicalMismatch, "New fever spike")
            .unwrap();
        assert!(desk.active_discharges().is_empty());
        assert!(desk
            .review_discharge(&id, ReviewDecision::KeepUnderAnalysis, "Too late now")
            .is_err());

        let reviews = desk.store.reviews(&id);
        let decisions: Vec<ReviewDecision> = reviews.iter().map(|r| r.decision).collect();
        assert_eq!(
            decisions,
            vec![
                ReviewDecision::KeepUnderAnalysis,
                ReviewDecision::AdministrativeBarrier,
                ReviewDecision::ClinicalMismatch,
            ]
        );
    }

    #[test]
    fn test_confirm_discharge_frees_bed() {
        let (mut desk, unit_id, bed_id) = desk_with_patient();
        let id = desk.assess_discharge(form(&unit_id, &bed_id, ALL_MET)).unwrap();
        let feed = desk.watch_active_discharges();
        assert_eq!(feed.try_next().unwrap().len(), 1);

        desk.confirm_discharge(&id).unwrap();

        let bed = desk.store.fetch::<Bed>(&bed_id).unwrap();
        assert_eq!(bed.status, BedStatus::Clean);
        assert_eq!(bed.current_patient_id, None);
        assert_eq!(feed.latest().unwrap().len(), 0);
        assert!(desk.confirm_discharge(&id).is_err());

        let stats = desk.discharge_stats();
        assert_eq!(
            stats,
            DischargeStats {
                eligible: 1,
                discharged: 1,
                barrier: 0
            }
        );
    }
}
