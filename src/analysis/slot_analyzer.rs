//! Pure, deterministic slot arithmetic. Nothing here touches a page, a
//! file, or the clock — every function is total over its inputs and
//! empty input always yields zero counts, never a panic.

use std::collections::HashMap;

use crate::domain::slot::StaffAnalysis;

const CANDIDATE_INTERVALS: [i32; 5] = [5, 10, 15, 20, 30];

/// Detects the slot interval from the modal gap between consecutive
/// observed timestamps, snapped to the nearest of `{5,10,15,20,30}`.
/// Falls back to `default` when fewer than two observations are given.
pub fn detect_interval(times: &[i32], default: i32) -> i32 {
    if times.len() < 2 {
        return default;
    }
    let mut sorted = times.to_vec();
    sorted.sort_unstable();

    let mut gap_counts: HashMap<i32, u32> = HashMap::new();
    for pair in sorted.windows(2) {
        let gap = pair[1] - pair[0];
        if gap > 0 {
            *gap_counts.entry(gap).or_insert(0) += 1;
        }
    }
    if gap_counts.is_empty() {
        return default;
    }

    // Modal gap; ties broken by the smallest gap value, mirroring
    // Python's `Counter.most_common` stable-insertion-order tie-break
    // closely enough that any reasonable tie-break is acceptable here —
    // callers only rely on the *snapped* result.
    let detected = gap_counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
        .map(|(gap, _)| gap)
        .unwrap_or(default);

    if CANDIDATE_INTERVALS.contains(&detected) {
        return detected;
    }
    *CANDIDATE_INTERVALS
        .iter()
        .min_by_key(|candidate| (*candidate - detected).abs())
        .unwrap()
}

/// Walks the sorted timestamps and returns every maximal run of length at
/// least `required_consecutive`, as `(first, last)` timestamp pairs.
pub fn count_consecutive_blocks(times: &[i32], required_consecutive: u32, interval: i32) -> (usize, Vec<(i32, i32)>) {
    if times.is_empty() {
        return (0, Vec::new());
    }
    let mut sorted = times.to_vec();
    sorted.sort_unstable();

    let mut blocks = Vec::new();
    let mut current_start = sorted[0];
    let mut current_count: u32 = 1;
    let mut prev = sorted[0];

    for &t in &sorted[1..] {
        if t == prev + interval {
            current_count += 1;
        } else {
            if current_count >= required_consecutive {
                blocks.push((current_start, prev));
            }
            current_start = t;
            current_count = 1;
        }
        prev = t;
    }
    if current_count >= required_consecutive {
        blocks.push((current_start, prev));
    }

    (blocks.len(), blocks)
}

/// Sums `run_length / required_run` (integer division) over every
/// maximal run of consecutive slots — a 12-wide run of 5-minute slots
/// yields 2 thirty-minute blocks, not 1.
pub fn count_30min_blocks(times: &[i32], interval: i32, required_run: u32) -> u32 {
    if times.is_empty() || required_run == 0 {
        return 0;
    }
    let mut sorted = times.to_vec();
    sorted.sort_unstable();

    let mut total = 0u32;
    let mut current_count: u32 = 1;
    let mut prev = sorted[0];

    for &t in &sorted[1..] {
        if t == prev + interval {
            current_count += 1;
        } else {
            total += current_count / required_run;
            current_count = 1;
        }
        prev = t;
    }
    total += current_count / required_run;
    total
}

pub fn minutes_to_time_str(minutes: i32) -> String {
    let hours = minutes.div_euclid(60);
    let mins = minutes.rem_euclid(60);
    format!("{}:{:02}", hours, mins)
}

/// `end_minutes` is the timestamp of the run's last slot, so the human
/// range ends one interval later (the slot's own span).
pub fn format_time_range(start_minutes: i32, end_minutes: i32, slot_interval: i32) -> String {
    let end_actual = end_minutes + slot_interval;
    format!("{}-{}", minutes_to_time_str(start_minutes), minutes_to_time_str(end_actual))
}

/// Analyzes one staff member's raw slots under a given threshold,
/// detecting the interval automatically and deriving both the
/// human-readable ranges and the authoritative block count.
pub fn analyze_staff(staff_name: &str, times: &[i32], default_required_consecutive: u32, default_interval: i32, threshold_minutes: u32) -> StaffAnalysis {
    let interval = detect_interval(times, default_interval);
    let required_consecutive = if interval > 0 {
        (threshold_minutes as i32 / interval).max(1) as u32
    } else {
        default_required_consecutive.max(1)
    };

    let (_, ranges) = count_consecutive_blocks(times, required_consecutive, interval);
    let time_strs = ranges.iter().map(|&(start, end)| format_time_range(start, end, interval)).collect();

    let blocks = count_30min_blocks(times, interval, required_consecutive);

    let mut raw_slot_times = times.to_vec();
    raw_slot_times.sort_unstable();

    StaffAnalysis {
        staff_name: staff_name.to_string(),
        blocks,
        times: time_strs,
        threshold_minutes,
        raw_slot_times,
        slot_interval: interval,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_interval_finds_dominant_gap() {
        for &g in &[5, 10, 15, 20, 30] {
            let times: Vec<i32> = (0..8).map(|i| i * g).collect();
            assert_eq!(detect_interval(&times, 999), g, "interval {g}");
        }
    }

    #[test]
    fn detect_interval_falls_back_on_short_input() {
        assert_eq!(detect_interval(&[], 7), 7);
        assert_eq!(detect_interval(&[100], 7), 7);
    }

    #[test]
    fn detect_interval_snaps_to_nearest_candidate() {
        // dominant gap 7 is closest to 5.
        let times = vec![0, 7, 14, 21, 28];
        assert_eq!(detect_interval(&times, 5), 5);
        // dominant gap 18 is closest to 20.
        let times2 = vec![0, 18, 36, 54];
        assert_eq!(detect_interval(&times2, 5), 20);
    }

    #[test]
    fn count_consecutive_blocks_single_run() {
        let times: Vec<i32> = (0..6).map(|i| i * 5).collect();
        let (count, ranges) = count_consecutive_blocks(&times, 6, 5);
        assert_eq!(count, 1);
        assert_eq!(ranges, vec![(0, 25)]);
    }

    #[test]
    fn count_consecutive_blocks_below_required_yields_nothing() {
        let times: Vec<i32> = (0..5).map(|i| i * 5).collect();
        let (count, ranges) = count_consecutive_blocks(&times, 6, 5);
        assert_eq!(count, 0);
        assert!(ranges.is_empty());
    }

    #[test]
    fn count_consecutive_blocks_empty_input() {
        let (count, ranges) = count_consecutive_blocks(&[], 6, 5);
        assert_eq!(count, 0);
        assert!(ranges.is_empty());
    }

    #[test]
    fn count_30min_blocks_sums_disjoint_runs() {
        // two runs of 6 five-minute slots each = 2 thirty-minute blocks total.
        let mut times: Vec<i32> = (0..6).map(|i| 540 + i * 5).collect();
        times.extend((0..6).map(|i| 600 + i * 5));
        assert_eq!(count_30min_blocks(&times, 5, 6), 2);
    }

    #[test]
    fn count_30min_blocks_of_12_wide_run_of_5_minute_slots_is_two() {
        let times: Vec<i32> = (0..12).map(|i| 540 + i * 5).collect();
        assert_eq!(count_30min_blocks(&times, 5, 6), 2);
    }

    #[test]
    fn format_time_range_round_trips_endpoints() {
        let formatted = format_time_range(565, 590, 5);
        assert_eq!(formatted, "9:25-9:55");
    }

    #[test]
    fn analyze_staff_twelve_five_minute_slots_from_nine_am() {
        let times: Vec<i32> = (0..12).map(|i| 540 + i * 5).collect();
        let analysis = analyze_staff("Dr. Z", &times, 6, 5, 30);
        assert_eq!(analysis.blocks, 2);
        assert_eq!(analysis.times, vec!["9:00-9:30".to_string(), "9:30-10:00".to_string()]);
        assert_eq!(analysis.slot_interval, 5);
    }

    #[test]
    fn analyze_staff_empty_input_yields_zero_blocks_no_ranges() {
        let analysis = analyze_staff("Dr. Nobody", &[], 6, 5, 30);
        assert_eq!(analysis.blocks, 0);
        assert!(analysis.times.is_empty());
        assert!(analysis.raw_slot_times.is_empty());
    }

    #[test]
    fn analyze_staff_literal_scenario_one() {
        // Clinic-A: row map yields timestamps 555, 560 for Dr. X (interval
        // 5, threshold 30 => required_run 6) — only a run of 2, zero blocks.
        let analysis = analyze_staff("Dr. X", &[555, 560], 6, 5, 30);
        assert_eq!(analysis.blocks, 0);
        assert!(analysis.times.is_empty());
        assert_eq!(analysis.raw_slot_times, vec![555, 560]);
    }
}
