//! Joins raw per-staff slot observations with a clinic's staff ruleset,
//! applies per-category thresholds, and decides clinic availability.

use std::collections::HashMap;

use crate::analysis::slot_analyzer::analyze_staff;
use crate::domain::clinic::{BackendKind, Clinic, StaffRuleset};
use crate::domain::slot::{ClinicResult, SlotObservation};

/// Result Aggregator: pure with respect to its inputs (no I/O), so it can
/// be exercised directly against persisted `raw_slot_times` to reproduce
/// block counts under a different threshold.
pub struct ResultAggregator {
    pub global_minimum_blocks: u32,
    pub default_required_consecutive: u32,
}

impl ResultAggregator {
    pub fn new(global_minimum_blocks: u32, default_required_consecutive: u32) -> Self {
        Self { global_minimum_blocks, default_required_consecutive }
    }

    /// Aggregates one clinic's raw observations into a `ClinicResult`.
    /// `default_interval` is the back-end's native slot interval
    /// (5 minutes for the legacy table, 15 for the SPA grid) used as the
    /// starting point for interval auto-detection.
    pub fn aggregate(&self, clinic: &Clinic, ruleset: Option<&StaffRuleset>, observations: &[SlotObservation], default_interval: i32) -> ClinicResult {
        let empty_ruleset = StaffRuleset::default();
        let ruleset = ruleset.unwrap_or(&empty_ruleset);

        let mut details = Vec::new();
        for observation in observations {
            let staff_name = &observation.staff_name;
            if ruleset.is_disabled(staff_name) {
                continue;
            }
            let category = ruleset.classify(staff_name);
            let threshold = ruleset.threshold_for(category);
            let analysis = analyze_staff(staff_name, &observation.times, self.default_required_consecutive, default_interval, threshold);
            details.push(analysis);
        }
        // Deterministic ordering regardless of the HashMap's iteration order.
        details.sort_by(|a, b| a.staff_name.cmp(&b.staff_name));

        if !ruleset.web_booking.is_empty() {
            details.retain(|d| ruleset.web_booking.contains(&d.staff_name));
            let total_blocks: u32 = details.iter().map(|d| d.blocks).sum();
            let available = total_blocks >= self.global_minimum_blocks;
            return ClinicResult {
                clinic: clinic.name.clone(),
                system: clinic.backend,
                result: available,
                total_30min_blocks: total_blocks,
                details,
            };
        }

        // An absent or empty web_booking allow-list excludes the clinic
        // from the availability tally entirely.
        ClinicResult {
            clinic: clinic.name.clone(),
            system: clinic.backend,
            result: false,
            total_30min_blocks: 0,
            details: Vec::new(),
        }
    }

    /// Sorts clinics per the canonical configured ordering;
    /// clinics absent from `canonical_order` sort to the end, alphabetically.
    pub fn sort_canonical(&self, results: &mut [ClinicResult], canonical_order: &[String]) {
        let rank: HashMap<&str, usize> = canonical_order.iter().enumerate().map(|(i, name)| (name.as_str(), i)).collect();
        results.sort_by(|a, b| {
            let rank_a = rank.get(a.clinic.as_str());
            let rank_b = rank.get(b.clinic.as_str());
            match (rank_a, rank_b) {
                (Some(ra), Some(rb)) => ra.cmp(rb),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => a.clinic.cmp(&b.clinic),
            }
        });
    }
}

pub fn backend_default_interval(backend: BackendKind) -> i32 {
    match backend {
        BackendKind::Legacy => 5,
        BackendKind::Spa => 15,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::clinic::BackendKind;

    fn clinic(name: &str, backend: BackendKind) -> Clinic {
        Clinic { name: name.to_string(), backend, url: "https://example.invalid".to_string(), enabled: true, display_name: None }
    }

    #[test]
    fn missing_ruleset_classifies_everyone_unknown_with_default_threshold() {
        let aggregator = ResultAggregator::new(4, 6);
        let observations = vec![SlotObservation::new("Dr. Mystery", (0..12).map(|i| 540 + i * 5).collect())];

        let result = aggregator.aggregate(&clinic("Clinic-Unknown", BackendKind::Legacy), None, &observations, 5);

        // no web_booking configured → excluded from availability tally.
        assert!(!result.result);
        assert_eq!(result.total_30min_blocks, 0);
        assert!(result.details.is_empty());
    }

    #[test]
    fn total_blocks_equals_sum_of_detail_blocks() {
        let aggregator = ResultAggregator::new(2, 6);
        let mut ruleset = StaffRuleset::default();
        ruleset.web_booking.insert("Dr. A".to_string());
        ruleset.web_booking.insert("Dr. B".to_string());

        let observations = vec![
            SlotObservation::new("Dr. A", (0..12).map(|i| 540 + i * 5).collect()),
            SlotObservation::new("Dr. B", (0..6).map(|i| 540 + i * 5).collect()),
        ];

        let result = aggregator.aggregate(&clinic("Clinic-A", BackendKind::Legacy), Some(&ruleset), &observations, 5);

        let sum: u32 = result.details.iter().map(|d| d.blocks).sum();
        assert_eq!(result.total_30min_blocks, sum);
        assert_eq!(result.total_30min_blocks, 3);
        assert!(result.result);
    }

    #[test]
    fn web_booking_filter_excludes_non_listed_staff() {
        let aggregator = ResultAggregator::new(1, 6);
        let mut ruleset = StaffRuleset::default();
        ruleset.web_booking.insert("Dr. A".to_string());

        let observations = vec![
            SlotObservation::new("Dr. A", (0..6).map(|i| 540 + i * 5).collect()),
            SlotObservation::new("Dr. Excluded", (0..6).map(|i| 540 + i * 5).collect()),
        ];

        let result = aggregator.aggregate(&clinic("Clinic-A", BackendKind::Legacy), Some(&ruleset), &observations, 5);
        assert_eq!(result.details.len(), 1);
        assert_eq!(result.details[0].staff_name, "Dr. A");
    }

    #[test]
    fn sort_canonical_places_unlisted_clinics_after_alphabetically() {
        let aggregator = ResultAggregator::new(4, 6);
        let mut results = vec![
            ClinicResult { clinic: "Zebra".to_string(), system: BackendKind::Legacy, result: false, total_30min_blocks: 0, details: vec![] },
            ClinicResult { clinic: "B-Clinic".to_string(), system: BackendKind::Legacy, result: false, total_30min_blocks: 0, details: vec![] },
            ClinicResult { clinic: "A-Clinic".to_string(), system: BackendKind::Legacy, result: false, total_30min_blocks: 0, details: vec![] },
        ];
        let canonical = vec!["A-Clinic".to_string(), "B-Clinic".to_string()];
        aggregator.sort_canonical(&mut results, &canonical);
        let names: Vec<&str> = results.iter().map(|r| r.clinic.as_str()).collect();
        assert_eq!(names, vec!["A-Clinic", "B-Clinic", "Zebra"]);
    }
}
