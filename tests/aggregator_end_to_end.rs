//! Integration coverage for the Result Aggregator across a small
//! multi-clinic batch, exercising the documented end-to-end scenarios
//! and the `total_blocks == sum(details)` invariant.

use dent_slot_harvester::analysis::ResultAggregator;
use dent_slot_harvester::domain::clinic::{BackendKind, Clinic, StaffRuleset};
use dent_slot_harvester::domain::slot::SlotObservation;

fn clinic(name: &str, backend: BackendKind) -> Clinic {
    Clinic { name: name.to_string(), backend, url: "https://example.invalid".to_string(), enabled: true, display_name: None }
}

#[test]
fn clinic_a_scenario_from_spec_yields_zero_blocks_and_is_unavailable() {
    // Dr. X gets [555, 560] (a run of 2 against a
    // required run of 6), Dr. Y gets [570] alone — neither clears the
    // threshold, so the clinic is unavailable even with web booking on.
    let aggregator = ResultAggregator::new(4, 6);
    let mut ruleset = StaffRuleset::default();
    ruleset.web_booking.insert("Dr. X".to_string());
    ruleset.web_booking.insert("Dr. Y".to_string());

    let observations = vec![SlotObservation::new("Dr. X", vec![555, 560]), SlotObservation::new("Dr. Y", vec![570])];

    let result = aggregator.aggregate(&clinic("Clinic-A", BackendKind::Legacy), Some(&ruleset), &observations, 5);

    assert_eq!(result.total_30min_blocks, 0);
    assert!(!result.result);
    let dr_x = result.details.iter().find(|d| d.staff_name == "Dr. X").unwrap();
    assert_eq!(dr_x.blocks, 0);
    assert!(dr_x.times.is_empty());
    assert_eq!(dr_x.raw_slot_times, vec![555, 560]);
}

#[test]
fn clinic_b_twelve_five_minute_slots_from_nine_am_yields_two_blocks() {
    // 12 consecutive 5-minute slots from 9:00 for Dr. Z,
    // threshold 30 minutes => required_run 6. One 60-minute range, two
    // 30-minute blocks.
    let aggregator = ResultAggregator::new(2, 6);
    let mut ruleset = StaffRuleset::default();
    ruleset.web_booking.insert("Dr. Z".to_string());

    let observations = vec![SlotObservation::new("Dr. Z", (0..12).map(|i| 540 + i * 5).collect())];

    let result = aggregator.aggregate(&clinic("Clinic-Z", BackendKind::Legacy), Some(&ruleset), &observations, 5);

    assert_eq!(result.total_30min_blocks, 2);
    assert!(result.result);
    assert_eq!(result.details[0].times, vec!["9:00-9:30".to_string(), "9:30-10:00".to_string()]);
}

#[test]
fn total_blocks_always_equals_sum_of_detail_blocks_across_a_batch() {
    let aggregator = ResultAggregator::new(3, 2);
    let mut ruleset = StaffRuleset::default();
    ruleset.web_booking.insert("Chair 1".to_string());
    ruleset.web_booking.insert("Chair 2".to_string());

    let observations = vec![SlotObservation::new("Chair 1", vec![540, 555, 570]), SlotObservation::new("Chair 2", vec![540, 555])];

    let result = aggregator.aggregate(&clinic("Clinic-Spa", BackendKind::Spa), Some(&ruleset), &observations, 15);

    let sum: u32 = result.details.iter().map(|d| d.blocks).sum();
    assert_eq!(result.total_30min_blocks, sum);
    assert_eq!(result.result, result.total_30min_blocks >= 3);
}

#[test]
fn batch_sorts_into_canonical_order_with_unknown_clinics_alphabetically_last() {
    let aggregator = ResultAggregator::new(1, 6);
    let observations: Vec<SlotObservation> = Vec::new();

    let mut results = vec![
        aggregator.aggregate(&clinic("Zebra Dental", BackendKind::Legacy), None, &observations, 5),
        aggregator.aggregate(&clinic("Alpha Dental", BackendKind::Legacy), None, &observations, 5),
        aggregator.aggregate(&clinic("Canonical First", BackendKind::Legacy), None, &observations, 5),
    ];
    let canonical = vec!["Canonical First".to_string()];
    aggregator.sort_canonical(&mut results, &canonical);

    let names: Vec<&str> = results.iter().map(|r| r.clinic.as_str()).collect();
    assert_eq!(names, vec!["Canonical First", "Alpha Dental", "Zebra Dental"]);
}
