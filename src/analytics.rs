//! Dashboard indicators computed from the current store contents.

use crate::models::{AuditAction, Bed, BedStatus, Request, RequestStatus};
use crate::priority::CfmPriority;
use crate::regulation::RegulationDesk;
use chrono::Local;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DashboardStats {
    pub by_status: BTreeMap<String, usize>,
    pub regulated_today: usize,
    pub refused_today: usize,
    /// Waiting requests per priority, index 0 being P1.
    pub waiting_by_priority: [usize; 5],
    /// Mean hours between creation and the first regulation, if any.
    pub average_wait_hours: Option<f64>,
    pub total_beds: usize,
    pub available_beds: usize,
    pub occupied_beds: usize,
    /// Percentage of occupied beds; 0 when there are no beds.
    pub occupancy_rate: f64,
}

impl DashboardStats {
    pub fn count(&self, status: RequestStatus) -> usize {
        self.by_status.get(status.name()).copied().unwrap_or(0)
    }

    pub fn waiting(&self, priority: CfmPriority) -> usize {
        self.waiting_by_priority[usize::from(priority.level() - 1)]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitOccupancy {
    pub unit_name: String,
    pub total: usize,
    pub occupied: usize,
    pub available: usize,
    pub blocked: usize,
}

impl UnitOccupancy {
    fn tally(unit_name: String, beds: &[Bed]) -> Self {
        UnitOccupancy {
            unit_name,
            total: beds.len(),
            occupied: beds.iter().filter(|b| b.status == BedStatus::Occupied).count(),
            available: beds.iter().filter(|b| b.status.is_assignable()).count(),
            blocked: beds.iter().filter(|b| b.status.is_blocked()).count(),
        }
    }
}

impl RegulationDesk {
    pub fn dashboard(&self) -> DashboardStats {
        let mut stats = DashboardStats::default();

        for request in self.store.all::<Request>() {
            *stats
                .by_status
                .entry(request.status.name().to_string())
                .or_insert(0) += 1;
            if request.status == RequestStatus::WaitingBed {
                if let Some(priority) = request.cfm_priority {
                    stats.waiting_by_priority[usize::from(priority.level() - 1)] += 1;
                }
            }
        }

        let today = Local::now().date_naive();
        let mut first_regulation = HashMap::new();
        for record in self.store.audit_log() {
            let entry = &record.entry;
            let is_today = entry.timestamp.date_naive() == today;
            match entry.action {
                AuditAction::Regulated => {
                    if is_today {
                        stats.regulated_today += 1;
                    }
                    first_regulation
                        .entry(record.parent_id.as_str())
                        .or_insert(entry.timestamp);
                }
                AuditAction::Refused if is_today => stats.refused_today += 1,
                _ => {}
            }
        }

        let waits: Vec<f64> = first_regulation
            .iter()
            .filter_map(|(id, regulated_at)| {
                let request = self.store.get::<Request>(id)?;
                let minutes = (*regulated_at - request.created_at).num_minutes();
                Some(minutes as f64 / 60.0)
            })
            .collect();
        if !waits.is_empty() {
            stats.average_wait_hours = Some(waits.iter().sum::<f64>() / waits.len() as f64);
        }

        let beds: Vec<Bed> = self.store.all::<Bed>().cloned().collect();
        let totals = UnitOccupancy::tally(String::new(), &beds);
        stats.total_beds = totals.total;
        stats.available_beds = totals.available;
        stats.occupied_beds = totals.occupied;
        if totals.total > 0 {
            stats.occupancy_rate = totals.occupied as f64 / totals.total as f64 * 100.0;
        }
        stats
    }

    /// Occupancy per unit, in unit name order.
    pub fn unit_occupancy(&self) -> Vec<UnitOccupancy> {
        self.list_units()
            .into_iter()
            .map(|unit| {
                let beds = self.beds_for_unit(&unit.id);
                UnitOccupancy::tally(unit.name, &beds)
            })
            .collect()
    }
}
