//! Command-line interface for the ICU bed regulation desk.
//!
//! This binary provides an interactive menu for setting up units and beds,
//! taking in and classifying bed requests, placing patients into beds and
//! following discharges.

use chrono::{Duration, Local, NaiveDate};
use env_logger::Env;
use log::error;
use siguti::models::{
    Bed, BedStatus, DischargeCriteria, EmergencySector, ExitReason, NewAssessment, NewRequest,
    Request, RequestKind, RequestStatus, ReviewDecision,
};
use siguti::store::Subscription;
use siguti::{AnswerSheet, CfmPriority, Config, QueueFilter, RegulationDesk, RuleSet};
use std::io::{self, Write};

struct RegulationCLI {
    desk: RegulationDesk,
    bed_feed: Subscription<Bed>,
    running: bool,
}

impl RegulationCLI {
    fn new(mut desk: RegulationDesk) -> Self {
        let bed_feed = desk.watch_beds();
        // The first notification is the current board.
        bed_feed.latest();
        RegulationCLI {
            desk,
            bed_feed,
            running: true,
        }
    }

    fn print_header(&self) {
        println!("\n{}", "=".repeat(60));
        println!("       SIGUTI - ICU BED REGULATION");
        println!("{}", "=".repeat(60));
        if let Some(path) = self.desk.store.path() {
            println!("Data file: {}", path.display());
        }
    }

    fn print_menu(&self) {
        println!("\n--- Main Menu ---");
        println!(" 1. Add unit");
        println!(" 2. Generate beds");
        println!(" 3. Submit bed request");
        println!(" 4. Evaluate request (CFM checklist)");
        println!(" 5. Refuse request");
        println!(" 6. Discard request");
        println!(" 7. View bed board");
        println!(" 8. Report bed availability");
        println!(" 9. Assign patient to bed");
        println!("10. Confirm admission");
        println!("11. Cancel regulation");
        println!("12. Discharge assessment");
        println!("13. Review discharge");
        println!("14. Confirm discharge");
        println!("15. Dashboard");
        println!("16. Audit trail");
        println!("17. Run demo");
        println!("18. Exit");
        println!("{}", "-".repeat(20));
    }

    fn get_input(&mut self, prompt: &str, default: Option<&str>) -> String {
        if let Some(def) = default {
            print!("{} [{}]: ", prompt, def);
        } else {
            print!("{}: ", prompt);
        }
        if let Err(e) = io::stdout().flush() {
            error!("Cannot flush stdout: {}", e);
        }

        let mut input = String::new();
        match io::stdin().read_line(&mut input) {
            Ok(0) => self.running = false,
            Ok(_) => {}
            Err(e) => {
                error!("Cannot read input: {}", e);
                self.running = false;
            }
        }
        let input = input.trim();

        if input.is_empty() {
            default.unwrap_or("").to_string()
        } else {
            input.to_string()
        }
    }

    fn get_int_input(&mut self, prompt: &str, default: Option<i64>) -> i64 {
        loop {
            let default_str = default.map(|d| d.to_string());
            let input = self.get_input(prompt, default_str.as_deref());

            if let Ok(value) = input.parse::<i64>() {
                return value;
            }
            if !self.running {
                return default.unwrap_or(0);
            }
            println!("Please enter a valid number");
        }
    }

    fn get_yes_no(&mut self, prompt: &str, default: bool) -> bool {
        let def = if default { "y" } else { "n" };
        self.get_input(&format!("{} (y/n)", prompt), Some(def))
            .to_lowercase()
            .starts_with('y')
    }

    /// Yes, no, or left open with an empty answer.
    fn get_optional_yes_no(&mut self, prompt: &str) -> Option<bool> {
        let answer = self.get_input(&format!("{} (y/n, blank to skip)", prompt), None);
        match answer.to_lowercase().as_str() {
            "" => None,
            answer => Some(answer.starts_with('y')),
        }
    }

    /// Numbered pick from a list; `None` when the user goes back.
    fn choose<T>(&mut self, prompt: &str, items: Vec<T>, label: impl Fn(&T) -> String) -> Option<T> {
        if items.is_empty() {
            println!("\nNothing to choose from");
            return None;
        }
        for (i, item) in items.iter().enumerate() {
            println!("  {}. {}", i + 1, label(item));
        }
        let choice = self.get_int_input(&format!("{} (0 to go back)", prompt), Some(0));
        if choice < 1 || choice as usize > items.len() {
            return None;
        }
        items.into_iter().nth(choice as usize - 1)
    }

    fn check_board_updates(&mut self) {
        if let Some(beds) = self.bed_feed.latest() {
            let free = beds.iter().filter(|b| b.status.is_assignable()).count();
            println!("\n* Bed board updated: {} beds, {} ready for admission", beds.len(), free);
        }
    }

    fn add_unit(&mut self) {
        println!("\n--- Add Unit ---");
        let name = self.get_input("Unit name", None);
        let description = self.get_input("Description", Some(""));

        match self.desk.add_unit(&name, &description) {
            Ok(_) => println!("\nUnit '{}' created", name.trim()),
            Err(e) => println!("Error creating unit: {}", e),
        }
    }

    fn generate_beds(&mut self) {
        println!("\n--- Generate Beds ---");
        let units = self.desk.list_units();
        let unit = match self.choose("Select unit", units, |u| u.name.clone()) {
            Some(unit) => unit,
            None => return,
        };

        let start = self.get_int_input("First bed number", Some(1));
        let end = self.get_int_input("Last bed number", Some(10));
        let (start, end) = match (u32::try_from(start), u32::try_from(end)) {
            (Ok(start), Ok(end)) => (start, end),
            _ => {
                println!("Bed numbers must be positive");
                return;
            }
        };

        match self.desk.bulk_create_beds(&unit.id, start, end) {
            Ok(created) => {
                println!("\nCreated {} beds in {} (new beds start closed)", created, unit.name);
            }
            Err(e) => println!("Error creating beds: {}", e),
        }
    }

    fn read_request_kind(&mut self) -> Option<RequestKind> {
        println!("\nRequest types:");
        println!("  1. Surgical");
        println!("  2. Inpatient");
        println!("  3. Emergency");
        let choice = self.get_int_input("Select type", Some(1));

        let today = Local::now().format("%Y-%m-%d").to_string();
        let now = Local::now().format("%H:%M").to_string();
        let kind = match choice {
            1 => RequestKind::Surgical {
                surgery_date: self.get_input("Surgery date", Some(today.as_str())),
                surgeon_name: self.get_input("Surgeon", None),
                surgery_type: self.get_input("Surgery type", None),
            },
            2 => RequestKind::Inpatient {
                sector: self.get_input("Sector", None),
                bed: self.get_input("Bed", None),
                requesting_physician: self.get_input("Requesting physician", None),
                clinical_reason: self.get_input("Clinical reason", None),
                request_date: self.get_input("Request date", Some(today.as_str())),
                request_time: self.get_input("Request time", Some(now.as_str())),
            },
            3 => {
                let sector = if self.get_int_input("Sector (1. CEDUG, 2. Surgical center)", Some(1)) == 2 {
                    EmergencySector::SurgicalCenter
                } else {
                    EmergencySector::Cedug
                };
                RequestKind::Emergency {
                    sector,
                    requesting_physician: self.get_input("Requesting physician", None),
                    clinical_reason: self.get_input("Clinical reason", None),
                    request_date: self.get_input("Request date", Some(today.as_str())),
                    request_time: self.get_input("Request time", Some(now.as_str())),
                }
            }
            _ => {
                println!("Invalid request type");
                return None;
            }
        };
        Some(kind)
    }

    fn submit_request(&mut self) {
        println!("\n--- Submit Bed Request ---");
        let patient_name = self.get_input("Patient name", None);
        let cns = self.get_input("CNS", None);
        let kind = match self.read_request_kind() {
            Some(kind) => kind,
            None => return,
        };
        let sisreg_id = self.get_input("SISREG id", Some(""));
        let clinical_details = self.get_input("Clinical details", Some(""));

        let form = NewRequest {
            patient_name: patient_name.clone(),
            cns,
            kind,
            sisreg_id: Some(sisreg_id),
            clinical_details: Some(clinical_details),
        };
        match self.desk.submit_request(form) {
            Ok(_) => {
                println!("\nRequest submitted for {}", patient_name.trim());
                println!("Requests pending review: {}", self.desk.pending_requests().len());
            }
            Err(e) => println!("Error submitting request: {}", e),
        }
    }

    fn read_answer_sheet(&mut self) -> AnswerSheet {
        let is_palliative = self.get_yes_no("Palliative care / terminal phase?", false);
        if is_palliative {
            return AnswerSheet {
                is_palliative,
                ..AnswerSheet::default()
            };
        }

        let mut sheet = AnswerSheet {
            needs_life_support: Some(self.get_yes_no("Needs immediate life support?", false)),
            high_recovery_probability: Some(self.get_yes_no("High probability of recovery?", true)),
            has_therapeutic_limitation: Some(self.get_yes_no("Therapeutic limitation?", false)),
            ..AnswerSheet::default()
        };
        if self.desk.settings.rule_set == RuleSet::TerminalByCriteria {
            sheet.is_potentially_reversible = self.get_optional_yes_no("Potentially reversible?");
            sheet.is_organ_donor = self.get_optional_yes_no("Potential organ donor?");
        }
        sheet
    }

    fn evaluate_request(&mut self) {
        println!("\n--- Evaluate Request ---");
        let mut candidates = self.desk.pending_requests();
        candidates.extend(self.desk.waiting_queue());
        let request = match self.choose("Select request", candidates, request_label) {
            Some(request) => request,
            None => return,
        };

        let sheet = self.read_answer_sheet();
        match self.desk.evaluate_request(&request.id, &sheet) {
            Ok(classification) => {
                let info = classification.priority.info();
                println!("\n{} - {}", classification.priority, info.name);
                println!("  {}", info.description);
                println!("  Recommendation: {}", info.recommendation);
                println!("  Reason: {}", classification.justification);
            }
            Err(e) => println!("Error evaluating request: {}", e),
        }
    }

    fn open_requests(&self) -> Vec<Request> {
        let mut open = self.desk.pending_requests();
        open.extend(self.desk.waiting_queue());
        open
    }

    fn refuse_request(&mut self) {
        println!("\n--- Refuse Request ---");
        let request = match self.choose("Select request", self.open_requests(), request_label) {
            Some(request) => request,
            None => return,
        };
        let reason = self.get_input("Refusal reason", None);

        match self.desk.refuse_request(&request.id, &reason) {
            Ok(()) => println!("\nRequest for {} refused", request.patient_name),
            Err(e) => println!("Error refusing request: {}", e),
        }
    }

    fn discard_request(&mut self) {
        println!("\n--- Discard Request ---");
        let request = match self.choose("Select request", self.open_requests(), request_label) {
            Some(request) => request,
            None => return,
        };

        println!("\nExit reasons: death, transfer, discharge, error");
        let answer = self.get_input("Reason", Some("error"));
        let reason = match ExitReason::from_string(&answer) {
            Ok(reason) => reason,
            Err(e) => {
                println!("{}", e);
                return;
            }
        };

        match self.desk.discard_request(&request.id, reason) {
            Ok(()) => println!("\nRequest for {} removed from the queue", request.patient_name),
            Err(e) => println!("Error discarding request: {}", e),
        }
    }

    fn view_bed_board(&self) {
        let board = self.desk.bed_board();
        if board.is_empty() {
            println!("\nNo units registered (option 1)");
            return;
        }

        for unit in &board {
            println!(
                "\n{} - {} beds ({} occupied, {} ready)",
                unit.unit.name,
                unit.beds.len(),
                unit.count(BedStatus::Occupied),
                unit.beds.iter().filter(|b| b.bed.status.is_assignable()).count()
            );
            for entry in &unit.beds {
                match &entry.patient_name {
                    Some(name) => {
                        println!("  #{:02} {:22} {}", entry.bed.bed_number, entry.bed.status.name(), name)
                    }
                    None => println!("  #{:02} {}", entry.bed.bed_number, entry.bed.status),
                }
            }
        }

        let queue = self.desk.waiting_queue();
        if !queue.is_empty() {
            let urgent = self.desk.urgent_count(&QueueFilter::default());
            println!("\nWaiting for a bed ({}, {} urgent):", queue.len(), urgent);
            for request in &queue {
                println!("  {}", request_label(request));
            }
        }
    }

    fn report_availability(&mut self) {
        println!("\n--- Report Bed Availability ---");
        let beds = self.desk.reportable_beds(None);
        let bed = match self.choose("Select bed", beds, |b| format!("{} ({})", b.label(), b.status)) {
            Some(bed) => bed,
            None => return,
        };
        let status = match self.choose("New status", BedStatus::REPORTABLE.to_vec(), |s| s.to_string()) {
            Some(status) => status,
            None => return,
        };

        match self.desk.report_availability(&bed.id, status) {
            Ok(()) => println!("\nBed {} is now {}", bed.label(), status),
            Err(e) => println!("Error reporting availability: {}", e),
        }
    }

    fn assign_bed(&mut self) {
        println!("\n--- Assign Patient to Bed ---");
        let queue = self.desk.waiting_queue();
        let request = match self.choose("Select patient", queue, request_label) {
            Some(request) => request,
            None => return,
        };
        let beds = self.desk.assignable_beds();
        let bed = match self.choose("Select bed", beds, |b| format!("{} ({})", b.label(), b.status)) {
            Some(bed) => bed,
            None => return,
        };

        let justification = match self.desk.requires_justification(&request.id) {
            Ok(true) => {
                println!("\nA higher priority patient is waiting.");
                Some(self.get_input("Justification", None))
            }
            Ok(false) => None,
            Err(e) => {
                println!("Error: {}", e);
                return;
            }
        };

        match self
            .desk
            .assign_patient_to_bed(&request.id, &bed.id, justification.as_deref())
        {
            Ok(()) => println!("\n{} regulated to bed {}", request.patient_name, bed.label()),
            Err(e) => println!("Error assigning bed: {}", e),
        }
    }

    fn regulated_requests(&self) -> Vec<Request> {
        self.desk
            .bed_board()
            .into_iter()
            .flat_map(|unit| unit.beds)
            .filter_map(|entry| entry.bed.current_patient_id)
            .filter_map(|id| self.desk.store.get::<Request>(&id).cloned())
            .filter(|r| r.status == RequestStatus::Regulated)
            .collect()
    }

    fn confirm_admission(&mut self) {
        println!("\n--- Confirm Admission ---");
        let request = match self.choose("Select patient", self.regulated_requests(), request_label) {
            Some(request) => request,
            None => return,
        };
        match self.desk.confirm_admission(&request.id) {
            Ok(()) => println!("\n{} admitted", request.patient_name),
            Err(e) => println!("Error confirming admission: {}", e),
        }
    }

    fn cancel_regulation(&mut self) {
        println!("\n--- Cancel Regulation ---");
        let request = match self.choose("Select patient", self.regulated_requests(), request_label) {
            Some(request) => request,
            None => return,
        };
        match self.desk.cancel_regulation(&request.id) {
            Ok(()) => println!("\n{} is back in the queue", request.patient_name),
            Err(e) => println!("Error cancelling regulation: {}", e),
        }
    }

    fn assess_discharge(&mut self) {
        println!("\n--- Discharge Assessment ---");
        let occupied: Vec<(Bed, Option<String>)> = self
            .desk
            .bed_board()
            .into_iter()
            .flat_map(|unit| unit.beds)
            .filter(|entry| entry.bed.status == BedStatus::Occupied)
            .map(|entry| (entry.bed, entry.patient_name))
            .collect();
        let (bed, patient) = match self.choose("Select bed", occupied, |(b, p)| {
            format!("{} {}", b.label(), p.as_deref().unwrap_or(""))
        }) {
            Some(choice) => choice,
            None => return,
        };

        let patient_name = self.get_input("Patient name", patient.as_deref());
        let default_date = (Local::now() - Duration::days(1)).format("%Y-%m-%d").to_string();
        let date = self.get_input("Admission date (YYYY-MM-DD)", Some(default_date.as_str()));
        let admission_date = match NaiveDate::parse_from_str(&date, "%Y-%m-%d") {
            Ok(date) => date,
            Err(_) => {
                println!("Invalid date");
                return;
            }
        };

        let criteria = DischargeCriteria {
            hemodynamic_stability: self.get_yes_no("Hemodynamic stability?", true),
            respiratory_stability: self.get_yes_no("Respiratory stability?", true),
            cause_controlled: self.get_yes_no("Admission cause controlled?", true),
            neurological_stability: self.get_yes_no("Neurological stability?", true),
            no_organ_dysfunction: self.get_yes_no("No new organ dysfunction?", true),
        };
        let all_met = criteria.all_met();

        let form = NewAssessment {
            patient_name,
            unit_id: bed.unit_id.clone(),
            bed_id: bed.id.clone(),
            admission_date,
            criteria,
        };
        match self.desk.assess_discharge(form) {
            Ok(_) if all_met => println!("\nDischarge candidate recorded for bed {}", bed.label()),
            Ok(_) => println!("\nCriteria not met; assessment kept as history"),
            Err(e) => println!("Error recording assessment: {}", e),
        }
    }

    fn review_discharge(&mut self) {
        println!("\n--- Review Discharge ---");
        let active = self.desk.active_discharges();
        let assessment = match self.choose("Select discharge", active, |a| {
            format!("{} - {} #{:02} ({})", a.patient_name, a.unit_name, a.bed_number, a.status)
        }) {
            Some(assessment) => assessment,
            None => return,
        };

        let decisions = vec![
            ReviewDecision::AdministrativeBarrier,
            ReviewDecision::ClinicalMismatch,
            ReviewDecision::KeepUnderAnalysis,
        ];
        let decision = match self.choose("Decision", decisions, |d| d.name().to_string()) {
            Some(decision) => decision,
            None => return,
        };
        let observation = self.get_input("Observation", None);

        match self.desk.review_discharge(&assessment.id, decision, &observation) {
            Ok(()) => println!("\nReview recorded"),
            Err(e) => println!("Error reviewing discharge: {}", e),
        }
    }

    fn confirm_discharge(&mut self) {
        println!("\n--- Confirm Discharge ---");
        let active = self.desk.active_discharges();
        let assessment = match self.choose("Select discharge", active, |a| {
            format!("{} - {} #{:02}", a.patient_name, a.unit_name, a.bed_number)
        }) {
            Some(assessment) => assessment,
            None => return,
        };

        match self.desk.confirm_discharge(&assessment.id) {
            Ok(()) => println!("\n{} discharged, bed is clean", assessment.patient_name),
            Err(e) => println!("Error confirming discharge: {}", e),
        }
    }

    fn view_dashboard(&self) {
        let stats = self.desk.dashboard();
        println!("\n--- Dashboard ---");
        println!("Requests by status:");
        for (status, count) in &stats.by_status {
            println!("  {:22} {}", status, count);
        }
        println!("Waiting by priority:");
        for priority in CfmPriority::ALL {
            println!("  {}: {}", priority, stats.waiting(priority));
        }
        println!("Regulated today: {}", stats.regulated_today);
        println!("Refused today: {}", stats.refused_today);
        match stats.average_wait_hours {
            Some(hours) => println!("Average wait: {:.1} h", hours),
            None => println!("Average wait: -"),
        }
        println!(
            "Beds: {} total, {} available, {} occupied ({:.1}% occupancy)",
            stats.total_beds, stats.available_beds, stats.occupied_beds, stats.occupancy_rate
        );

        for unit in self.desk.unit_occupancy() {
            println!(
                "  {:20} {} total, {} occupied, {} available, {} blocked",
                unit.unit_name, unit.total, unit.occupied, unit.available, unit.blocked
            );
        }

        let discharges = self.desk.discharge_stats();
        println!(
            "Discharges: {} assessed, {} discharged, {} with administrative barrier",
            discharges.eligible, discharges.discharged, discharges.barrier
        );
    }

    fn view_audit_trail(&self) {
        let trail = self.desk.audit_trail(Some(20));
        if trail.is_empty() {
            println!("\nNo audit entries yet");
            return;
        }

        println!("\n--- Audit Trail (latest {}) ---", trail.len());
        for view in &trail {
            let entry = &view.entry;
            println!(
                "  {} {:18} {:22} {}",
                entry.timestamp.format("%Y-%m-%d %H:%M"),
                entry.action.name(),
                entry.actor,
                view.patient_name
            );
            if let Some(reason) = &entry.reason {
                println!("    {}", reason);
            }
        }
    }

    fn run_demo(&mut self) {
        println!("\n--- Running Demo (in-memory desk) ---");
        if let Err(e) = run_demo_flow() {
            println!("Demo failed: {}", e);
        }
    }

    fn run(&mut self) {
        self.print_header();

        while self.running {
            self.check_board_updates();
            self.print_menu();

            let choice = self.get_int_input("Enter choice", Some(7));
            if !self.running {
                break;
            }

            match choice {
                1 => self.add_unit(),
                2 => self.generate_beds(),
                3 => self.submit_request(),
                4 => self.evaluate_request(),
                5 => self.refuse_request(),
                6 => self.discard_request(),
                7 => self.view_bed_board(),
                8 => self.report_availability(),
                9 => self.assign_bed(),
                10 => self.confirm_admission(),
                11 => self.cancel_regulation(),
                12 => self.assess_discharge(),
                13 => self.review_discharge(),
                14 => self.confirm_discharge(),
                15 => self.view_dashboard(),
                16 => self.view_audit_trail(),
                17 => self.run_demo(),
                18 => self.running = false,
                _ => println!("Invalid choice"),
            }
        }
        println!("\nGoodbye!");
    }
}

fn request_label(request: &Request) -> String {
    let priority = request
        .cfm_priority
        .map(|p| p.to_string())
        .unwrap_or_else(|| "--".to_string());
    format!(
        "[{}] {:20} {:10} {}",
        priority,
        request.patient_name,
        request.kind.name(),
        request.created_at.format("%d/%m %H:%M")
    )
}

/// Walk through intake, classification and an out-of-order placement.
fn run_demo_flow() -> siguti::RegulationResult<()> {
    let mut desk = RegulationDesk::in_memory();
    let unit_id = desk.add_unit("UTI Demo", "Demonstration unit")?;
    desk.bulk_create_beds(&unit_id, 1, 3)?;
    let beds: Vec<Bed> = desk.beds_for_unit(&unit_id);
    for bed in &beds {
        desk.update_bed_status(&bed.id, BedStatus::Clean)?;
    }
    println!("Created unit with {} clean beds", beds.len());

    let patients = [
        ("Ana Souza", true, true, false),
        ("Bruno Lima", false, false, true),
        ("Carlos Melo", true, false, false),
    ];
    let mut ids = Vec::new();
    for (name, support, recovery, limitation) in patients {
        let id = desk.submit_request(NewRequest {
            patient_name: name.to_string(),
            cns: "700000000000000".to_string(),
            kind: RequestKind::Emergency {
                sector: EmergencySector::Cedug,
                requesting_physician: "Dr. Demo".to_string(),
                clinical_reason: "Demonstration".to_string(),
                request_date: Local::now().format("%Y-%m-%d").to_string(),
                request_time: Local::now().format("%H:%M").to_string(),
            },
            sisreg_id: None,
            clinical_details: None,
        })?;
        let classification = desk.evaluate_request(
            &id,
            &AnswerSheet {
                needs_life_support: Some(support),
                high_recovery_probability: Some(recovery),
                has_therapeutic_limitation: Some(limitation),
                ..AnswerSheet::default()
            },
        )?;
        println!("  {:12} -> {}", name, classification.priority);
        ids.push(id);
    }

    println!("\nQueue order:");
    for request in desk.waiting_queue() {
        println!("  {}", request_label(&request));
    }

    println!("\nPlacing Bruno Lima (P4) ahead of the queue without a justification...");
    match desk.assign_patient_to_bed(&ids[1], &beds[0].id, None) {
        Ok(()) => println!("  placed"),
        Err(e) => println!("  refused: {}", e),
    }

    desk.assign_patient_to_bed(&ids[0], &beds[0].id, None)?;
    desk.assign_patient_to_bed(
        &ids[1],
        &beds[1].id,
        Some("Isolation bed matches the patient's needs"),
    )?;
    println!("Ana Souza and Bruno Lima (with justification) regulated");

    let stats = desk.dashboard();
    println!(
        "\nOccupancy {:.1}%, {} still waiting",
        stats.occupancy_rate,
        desk.waiting_queue().len()
    );
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let desk = match Config::load().and_then(|config| RegulationDesk::from_config(&config)) {
        Ok(desk) => desk,
        Err(e) => {
            error!("Cannot start the regulation desk: {}", e);
            std::process::exit(1);
        }
    };

    let mut cli = RegulationCLI::new(desk);
    cli.run();
}
