use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::clinic::BackendKind;

/// One staff member's raw observed slots within a single clinic, as
/// produced by a back-end adapter's `extract` step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotObservation {
    pub staff_name: String,
    /// Strictly increasing minute-of-day timestamps, each in `[0, 1440)`.
    pub times: Vec<i32>,
}

impl SlotObservation {
    pub fn new(staff_name: impl Into<String>, mut times: Vec<i32>) -> Self {
        times.sort_unstable();
        Self { staff_name: staff_name.into(), times }
    }
}

/// The outcome of running the Slot Analyzer over one staff member's raw
/// timestamps under a given threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaffAnalysis {
    #[serde(rename = "doctor")]
    pub staff_name: String,
    pub blocks: u32,
    pub times: Vec<String>,
    pub threshold_minutes: u32,
    pub raw_slot_times: Vec<i32>,
    pub slot_interval: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClinicResult {
    pub clinic: String,
    pub system: BackendKind,
    pub result: bool,
    pub total_30min_blocks: u32,
    pub details: Vec<StaffAnalysis>,
}

impl ClinicResult {
    pub fn available(&self) -> bool {
        self.result
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub total_clinics: usize,
    pub clinics_with_availability: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunArtifact {
    pub check_date: NaiveDate,
    #[serde(skip)]
    pub run_date: NaiveDate,
    pub checked_at: DateTime<Utc>,
    pub results: Vec<ClinicResult>,
    pub summary: RunSummary,
}

impl RunArtifact {
    pub fn new(check_date: NaiveDate, run_date: NaiveDate, checked_at: DateTime<Utc>, results: Vec<ClinicResult>) -> Self {
        let clinics_with_availability = results.iter().filter(|r| r.available()).count();
        let summary = RunSummary { total_clinics: results.len(), clinics_with_availability };
        Self { check_date, run_date, checked_at, results, summary }
    }
}
