//! Bed regulation: placing waiting patients into physical beds.
//!
//! This module provides the RegulationDesk struct, which owns the document
//! store and the desk settings. The other service modules (structure,
//! requests, discharge, analytics, audit) add their operations to it.

use crate::config::{Config, Settings};
use crate::errors::{RegulationError, RegulationResult};
use crate::models::{AuditAction, AuditEntry, Bed, BedStatus, Request, RequestStatus, Unit};
use crate::store::{DocumentStore, WriteBatch};
use chrono::{DateTime, Local};
use log::{info, warn};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

const STANDARD_REGULATION: &str = "Standard regulation";
const CANCELLATION_REASON: &str = "Regulation cancelled";

/// A waiting request as ordered in the bed queue.
///
/// Better (numerically lower) priority comes first; for equal priorities,
/// older requests come first. Unevaluated requests rank last.
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub request: Request,
}

impl QueueEntry {
    fn key(&self) -> (u8, DateTime<Local>) {
        (self.request.priority_rank(), self.request.created_at)
    }
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.request.id == other.request.id
    }
}

impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    /// Max-heap order: the entry that should be served next is the greatest.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .key()
            .cmp(&self.key())
            .then_with(|| other.request.id.cmp(&self.request.id))
    }
}

/// A bed on the board, with the occupying patient when known.
#[derive(Debug, Clone)]
pub struct BoardBed {
    pub bed: Bed,
    pub patient_name: Option<String>,
}

/// One unit of the bed board.
#[derive(Debug, Clone)]
pub struct UnitBoard {
    pub unit: Unit,
    pub beds: Vec<BoardBed>,
}

impl UnitBoard {
    pub fn count(&self, status: BedStatus) -> usize {
        self.beds.iter().filter(|b| b.bed.status == status).count()
    }
}

/// The regulation desk: every operation of the dashboard runs through it.
pub struct RegulationDesk {
    pub store: DocumentStore,
    pub settings: Settings,
}

impl RegulationDesk {
    pub fn new(store: DocumentStore, settings: Settings) -> Self {
        RegulationDesk { store, settings }
    }

    /// A desk with default settings and no persistence.
    pub fn in_memory() -> Self {
        RegulationDesk::new(DocumentStore::in_memory(), Settings::default())
    }

    /// Open the configured data file (or an in-memory store).
    pub fn from_config(config: &Config) -> RegulationResult<Self> {
        let store = match &config.data_file {
            Some(path) => DocumentStore::open(path)?,
            None => DocumentStore::in_memory(),
        };
        Ok(RegulationDesk::new(store, config.settings()))
    }

    /// Waiting requests in the order they should be served.
    pub fn waiting_queue(&self) -> Vec<Request> {
        let mut heap = self.waiting_heap();
        let mut ordered = Vec::with_capacity(heap.len());
        while let Some(entry) = heap.pop() {
            ordered.push(entry.request);
        }
        ordered
    }

    /// The request that should receive the next bed.
    pub fn next_in_line(&self) -> Option<Request> {
        self.waiting_heap().pop().map(|entry| entry.request)
    }

    fn waiting_heap(&self) -> BinaryHeap<QueueEntry> {
        self.store
            .all::<Request>()
            .filter(|r| r.status == RequestStatus::WaitingBed)
            .map(|r| QueueEntry { request: r.clone() })
            .collect()
    }

    /// Best (lowest) priority rank currently waiting for a bed.
    fn top_waiting_rank(&self) -> Option<u8> {
        self.store
            .all::<Request>()
            .filter(|r| r.status == RequestStatus::WaitingBed)
            .map(Request::priority_rank)
            .min()
    }

    /// Whether placing this request now would skip a better-ranked patient.
    pub fn requires_justification(&self, request_id: &str) -> RegulationResult<bool> {
        let request = self.store.fetch::<Request>(request_id)?;
        Ok(self
            .top_waiting_rank()
            .map(|top| request.priority_rank() > top)
            .unwrap_or(false))
    }

    /// Assign a waiting patient to an assignable bed.
    ///
    /// The request and the bed are updated in one batch. Skipping a
    /// better-ranked waiting patient needs a written justification.
    pub fn assign_patient_to_bed(
        &mut self,
        request_id: &str,
        bed_id: &str,
        justification: Option<&str>,
    ) -> RegulationResult<()> {
        let mut request = self.store.fetch::<Request>(request_id)?;
        request.ensure_status(&[RequestStatus::WaitingBed], "regulate")?;

        let mut bed = self.store.fetch::<Bed>(bed_id)?;
        if !bed.status.is_assignable() {
            return Err(RegulationError::BedUnavailable {
                bed_id: bed.id,
                status: bed.status.to_string(),
            });
        }

        let justification = justification
            .map(str::trim)
            .filter(|text| !text.is_empty());

        let selected = request.priority_rank();
        if let Some(top) = self.top_waiting_rank() {
            let long_enough = justification
                .map(|text| text.chars().count() >= self.settings.min_justification_len)
                .unwrap_or(false);
            if selected > top && !long_enough {
                warn!(
                    "Refused out-of-order regulation of request {} (priority {} while {} waits)",
                    request.id, selected, top
                );
                return Err(RegulationError::JustificationRequired { selected, top });
            }
        }

        request.status = RequestStatus::Regulated;
        request.assigned_bed_id = Some(bed.id.clone());
        request.assigned_unit_id = Some(bed.unit_id.clone());
        request.regulation_justification = justification.map(str::to_string);

        bed.status = BedStatus::Occupied;
        bed.current_patient_id = Some(request.id.clone());
        bed.updated_at = Local::now();

        let entry = AuditEntry::new(AuditAction::Regulated, &self.settings.regulator_label)
            .with_reason(justification.unwrap_or(STANDARD_REGULATION));

        let label = bed.label();
        let mut batch = WriteBatch::new();
        batch.update(request).update(bed).append_audit(request_id, entry);
        self.store.commit(batch)?;

        info!("Request {} regulated to bed {}", request_id, label);
        Ok(())
    }

    /// Record the physical admission of a regulated patient.
    pub fn confirm_admission(&mut self, request_id: &str) -> RegulationResult<()> {
        let mut request = self.store.fetch::<Request>(request_id)?;
        request.ensure_status(&[RequestStatus::Regulated], "admit")?;
        request.status = RequestStatus::Admitted;

        let entry = AuditEntry::new(AuditAction::Admitted, &self.settings.nursing_label);
        let mut batch = WriteBatch::new();
        batch.update(request).append_audit(request_id, entry);
        self.store.commit(batch)?;

        info!("Request {} admitted", request_id);
        Ok(())
    }

    /// Undo a regulation: the patient goes back to the queue.
    ///
    /// The bed is freed only while it still holds this patient; a bed that was
    /// released and given to someone else in the meantime is left alone.
    pub fn cancel_regulation(&mut self, request_id: &str) -> RegulationResult<()> {
        let mut request = self.store.fetch::<Request>(request_id)?;
        request.ensure_status(&[RequestStatus::Regulated], "cancel regulation of")?;

        let bed_id = request.assigned_bed_id.take().ok_or_else(|| {
            RegulationError::Conflict(format!("request {} has no assigned bed", request_id))
        })?;
        let held = self
            .store
            .get::<Bed>(&bed_id)
            .filter(|bed| bed.current_patient_id.as_deref() == Some(request_id))
            .cloned();

        request.status = RequestStatus::WaitingBed;
        request.assigned_unit_id = None;

        let entry = AuditEntry::new(AuditAction::RegulationCancelled, &self.settings.regulator_label)
            .with_reason(CANCELLATION_REASON);

        let mut batch = WriteBatch::new();
        batch.update(request).append_audit(request_id, entry);
        let released = held.is_some();
        if let Some(mut bed) = held {
            bed.status = BedStatus::Clean;
            bed.current_patient_id = None;
            bed.updated_at = Local::now();
            batch.update(bed);
        }
        self.store.commit(batch)?;

        if released {
            info!("Regulation of request {} cancelled, bed {} is clean", request_id, bed_id);
        } else {
            warn!(
                "Regulation of request {} cancelled; bed {} no longer held it and was left unchanged",
                request_id, bed_id
            );
        }
        Ok(())
    }

    /// All units with their beds, each bed paired with its patient's name.
    pub fn bed_board(&self) -> Vec<UnitBoard> {
        self.list_units()
            .into_iter()
            .map(|unit| {
                let beds = self
                    .beds_for_unit(&unit.id)
                    .into_iter()
                    .map(|bed| {
                        let patient_name = bed
                            .current_patient_id
                            .as_deref()
                            .and_then(|id| self.store.get::<Request>(id))
                            .map(|r| r.patient_name.clone());
                        BoardBed { bed, patient_name }
                    })
                    .collect();
                UnitBoard { unit, beds }
            })
            .collect()
    }

    /// Beds a waiting patient can be placed in right now.
    pub fn assignable_beds(&self) -> Vec<Bed> {
        self.list_beds()
            .into_iter()
            .filter(|b| b.status.is_assignable())
            .collect()
    }
}
