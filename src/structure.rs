//! Units and beds administration.

use crate::errors::{RegulationError, RegulationResult};
use crate::models::{require_len, Bed, BedStatus, Unit};
use crate::regulation::RegulationDesk;
use crate::store::{Subscription, WriteBatch};
use chrono::Local;
use log::{info, warn};
use std::collections::HashSet;

fn by_unit_then_number(a: &Bed, b: &Bed) -> std::cmp::Ordering {
    a.unit_name
        .cmp(&b.unit_name)
        .then(a.bed_number.cmp(&b.bed_number))
}

impl RegulationDesk {
    pub fn add_unit(&mut self, name: &str, description: &str) -> RegulationResult<String> {
        let unit = Unit::new(name, description, self.settings.min_unit_name_len)?;
        let id = self.store.insert(unit)?;
        info!("Unit '{}' created", name.trim());
        Ok(id)
    }

    /// Rename or re-describe a unit. The denormalized name on its beds follows.
    pub fn update_unit(
        &mut self,
        unit_id: &str,
        name: &str,
        description: &str,
    ) -> RegulationResult<()> {
        require_len("unit name", name, self.settings.min_unit_name_len)?;
        let mut unit = self.store.fetch::<Unit>(unit_id)?;
        unit.name = name.trim().to_string();
        unit.description = description.trim().to_string();

        let mut batch = WriteBatch::new();
        for mut bed in self.beds_for_unit(unit_id) {
            bed.unit_name = unit.name.clone();
            batch.update(bed);
        }
        batch.update(unit);
        self.store.commit(batch)
    }

    /// Delete a unit that no longer owns any bed.
    pub fn delete_unit(&mut self, unit_id: &str) -> RegulationResult<()> {
        let unit = self.store.fetch::<Unit>(unit_id)?;
        let beds = self.beds_for_unit(unit_id).len();
        if beds > 0 {
            warn!("Refused to delete unit '{}' with {} bed(s)", unit.name, beds);
            return Err(RegulationError::Conflict(format!(
                "unit '{}' still has {} bed(s); delete them first",
                unit.name, beds
            )));
        }
        self.store.delete::<Unit>(unit_id)?;
        info!("Unit '{}' deleted", unit.name);
        Ok(())
    }

    /// Units ordered by name.
    pub fn list_units(&self) -> Vec<Unit> {
        self.store.query::<Unit, _, _>(|_: &Unit| true, |a, b| a.name.cmp(&b.name))
    }

    pub fn watch_units(&mut self) -> Subscription<Unit> {
        self.store.subscribe::<Unit, _, _>(|_: &Unit| true, |a, b| a.name.cmp(&b.name))
    }

    /// Create beds numbered `start..=end` in a unit, skipping numbers that
    /// already exist. Returns how many beds were created.
    pub fn bulk_create_beds(&mut self, unit_id: &str, start: u32, end: u32) -> RegulationResult<usize> {
        if start < 1 {
            return Err(RegulationError::validation(
                "start number",
                "must be at least 1",
            ));
        }
        if end < start {
            return Err(RegulationError::validation(
                "end number",
                "must be greater than or equal to the start number",
            ));
        }

        let unit = self.store.fetch::<Unit>(unit_id)?;
        let existing: HashSet<u32> = self
            .beds_for_unit(unit_id)
            .iter()
            .map(|b| b.bed_number)
            .collect();

        let mut batch = WriteBatch::new();
        for number in (start..=end).filter(|n| !existing.contains(n)) {
            batch.set(Bed::new(&unit, number)?);
        }

        let created = batch.len();
        self.store.commit(batch)?;
        info!(
            "Created {} bed(s) in unit '{}' for range {}-{}",
            created, unit.name, start, end
        );
        Ok(created)
    }

    /// Change a bed's number, keeping numbers unique within the unit.
    pub fn renumber_bed(&mut self, bed_id: &str, bed_number: u32) -> RegulationResult<()> {
        if bed_number < 1 {
            return Err(RegulationError::validation("bed number", "must be at least 1"));
        }
        let mut bed = self.store.fetch::<Bed>(bed_id)?;
        let taken = self
            .beds_for_unit(&bed.unit_id)
            .iter()
            .any(|b| b.id != bed.id && b.bed_number == bed_number);
        if taken {
            return Err(RegulationError::Conflict(format!(
                "bed number {} already exists in unit '{}'",
                bed_number, bed.unit_name
            )));
        }

        bed.bed_number = bed_number;
        bed.updated_at = Local::now();
        self.store.update(bed)
    }

    pub fn delete_bed(&mut self, bed_id: &str) -> RegulationResult<()> {
        let bed = self.store.fetch::<Bed>(bed_id)?;
        if bed.status == BedStatus::Occupied {
            return Err(RegulationError::InvalidState {
                entity: "bed",
                id: bed.id,
                status: bed.status.to_string(),
                operation: "delete",
            });
        }
        self.store.delete::<Bed>(bed_id)?;
        info!("Bed {} deleted", bed.label());
        Ok(())
    }

    /// Set any status on a bed. No transition rules apply; a bed leaving
    /// `occupied` drops its patient.
    pub fn update_bed_status(&mut self, bed_id: &str, status: BedStatus) -> RegulationResult<()> {
        let mut bed = self.store.fetch::<Bed>(bed_id)?;
        if status != BedStatus::Occupied {
            bed.current_patient_id = None;
        }
        bed.status = status;
        bed.updated_at = Local::now();
        self.store.update(bed)
    }

    /// Report that a currently unavailable bed is ready again (or broken).
    pub fn report_availability(&mut self, bed_id: &str, status: BedStatus) -> RegulationResult<()> {
        if !BedStatus::REPORTABLE.contains(&status) {
            return Err(RegulationError::validation(
                "bed status",
                format!("'{}' cannot be reported as availability", status),
            ));
        }
        let bed = self.store.fetch::<Bed>(bed_id)?;
        if bed.status.is_available() {
            return Err(RegulationError::InvalidState {
                entity: "bed",
                id: bed.id,
                status: bed.status.to_string(),
                operation: "report availability of",
            });
        }

        let label = bed.label();
        self.update_bed_status(bed_id, status)?;
        info!("Bed {} reported as {}", label, status);
        Ok(())
    }

    /// Beds that can receive an availability report.
    pub fn reportable_beds(&self, unit_id: Option<&str>) -> Vec<Bed> {
        self.list_beds()
            .into_iter()
            .filter(|b| unit_id.map(|u| b.unit_id == u).unwrap_or(true))
            .filter(|b| !b.status.is_available())
            .collect()
    }

    /// All beds ordered by unit name, then bed number.
    pub fn list_beds(&self) -> Vec<Bed> {
        self.store.query::<Bed, _, _>(|_: &Bed| true, by_unit_then_number)
    }

    pub fn beds_for_unit(&self, unit_id: &str) -> Vec<Bed> {
        self.store
            .query::<Bed, _, _>(|b: &Bed| b.unit_id == unit_id, by_unit_then_number)
    }

    pub fn watch_beds(&mut self) -> Subscription<Bed> {
        self.store.subscribe::<Bed, _, _>(|_: &Bed| true, by_unit_then_number)
    }
}
