//! Maps schedule-table row indices to wall-clock minutes, tolerating
//! lunch-row gaps in the source table. The state machine mirrors
//! `build_row_time_mapping` in the original scraper: rows are visited in
//! order, a "current hour" is tracked, and ambiguous bare-integer cells
//! are resolved by requiring strictly increasing output.

use std::collections::HashMap;

/// One row's first-cell text and whether the row contains any anchor
/// element (used to recognize interpolated slot rows whose first cell is
/// blank).
#[derive(Debug, Clone)]
pub struct RowDescriptor {
    pub first_cell_text: String,
    pub has_anchor: bool,
}

impl RowDescriptor {
    pub fn new(first_cell_text: impl Into<String>, has_anchor: bool) -> Self {
        Self { first_cell_text: first_cell_text.into(), has_anchor }
    }
}

fn parse_hmm(text: &str) -> Option<(i32, i32)> {
    let (h_str, m_str) = text.split_once(':')?;
    if h_str.is_empty() || m_str.len() != 2 {
        return None;
    }
    let h: i32 = h_str.parse().ok()?;
    let m: i32 = m_str.parse().ok()?;
    if (0..=23).contains(&h) && (0..60).contains(&m) {
        Some((h, m))
    } else {
        None
    }
}

/// Builds the `row_index -> minute-of-day` map following the five
/// parsing states below. The interval is used only to interpolate blank anchor rows.
pub fn build_row_time_map(rows: &[RowDescriptor], interval: i32) -> HashMap<usize, i32> {
    let mut row_map: HashMap<usize, i32> = HashMap::new();
    let mut current_hour: Option<i32> = None;

    for (row_idx, row) in rows.iter().enumerate() {
        let text = row.first_cell_text.trim();

        // State 1: "H:MM" or "HH:MM".
        if let Some((h, m)) = parse_hmm(text) {
            current_hour = Some(h);
            row_map.insert(row_idx, h * 60 + m);
            continue;
        }

        if let Ok(val) = text.parse::<i32>() {
            let prev_time = row_idx.checked_sub(1).and_then(|i| row_map.get(&i)).copied().unwrap_or(-1);

            match current_hour {
                // State 2: bare hour, no current hour known yet.
                None => {
                    if (0..=23).contains(&val) {
                        current_hour = Some(val);
                        row_map.insert(row_idx, val * 60);
                        continue;
                    }
                }
                // State 3: bare integer with a known current hour.
                Some(hour) => {
                    let candidate_as_minute = hour * 60 + val;
                    if (0..60).contains(&val) && candidate_as_minute > prev_time {
                        row_map.insert(row_idx, candidate_as_minute);
                        continue;
                    } else if (0..=23).contains(&val) && val > hour {
                        current_hour = Some(val);
                        row_map.insert(row_idx, val * 60);
                        continue;
                    } else if (0..=23).contains(&val) && val == hour {
                        let candidate_as_hour = val * 60;
                        if candidate_as_hour > prev_time {
                            current_hour = Some(val);
                            row_map.insert(row_idx, val * 60);
                            continue;
                        }
                    }
                }
            }
        }

        // State 4: blank text but an anchor present and an hour already
        // known — an interpolated slot row (e.g. a lunch-hour gap row
        // that the source still renders with booking links).
        if text.is_empty() && row.has_anchor && current_hour.is_some() {
            if let Some(&prev) = row_idx.checked_sub(1).and_then(|i| row_map.get(&i)) {
                row_map.insert(row_idx, prev + interval);
                continue;
            }
        }

        // State 5: row is not part of the grid — skip.
    }

    row_map
}

/// Looks up a row index, extrapolating from the nearest mapped row when
/// the index itself was never observed.
pub fn lookup_minute(row_map: &HashMap<usize, i32>, row_idx: usize, interval: i32) -> Option<i32> {
    if let Some(&minute) = row_map.get(&row_idx) {
        return Some(minute);
    }
    if row_map.is_empty() {
        return None;
    }
    let closest = *row_map.keys().min_by_key(|&&k| (k as i64 - row_idx as i64).abs())?;
    let delta = row_idx as i64 - closest as i64;
    Some(row_map[&closest] + (delta as i32) * interval)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(text: &str) -> RowDescriptor {
        RowDescriptor::new(text, false)
    }

    fn anchor_row() -> RowDescriptor {
        RowDescriptor::new("", true)
    }

    #[test]
    fn strictly_increasing_across_lunch_gap() {
        // 8:00, bare "30" (-> 8:30), lunch rows omitted entirely, then an
        // explicit "13:00" and a bare "5" (-> 13:05) resuming after lunch.
        let rows = vec![row("8:00"), row("30"), row("13:00"), row("5")];
        let map = build_row_time_map(&rows, 5);
        let mut values: Vec<i32> = map.values().copied().collect();
        values.sort_unstable();
        for pair in values.windows(2) {
            assert!(pair[1] > pair[0]);
        }
        assert_eq!(map[&0], 8 * 60);
        assert_eq!(map[&1], 8 * 60 + 30);
        assert_eq!(map[&2], 13 * 60);
        assert_eq!(map[&3], 13 * 60 + 5);
    }

    #[test]
    fn bare_hour_then_bare_minutes_then_anchor_interpolation() {
        let rows = vec![row("9"), row("5"), row("10"), anchor_row()];
        let map = build_row_time_map(&rows, 5);
        assert_eq!(map[&0], 9 * 60);
        assert_eq!(map[&1], 9 * 60 + 5);
        assert_eq!(map[&2], 9 * 60 + 10);
        assert_eq!(map[&3], 9 * 60 + 15);
    }

    #[test]
    fn empty_input_yields_empty_map() {
        assert!(build_row_time_map(&[], 5).is_empty());
    }

    #[test]
    fn lookup_extrapolates_from_nearest_known_row() {
        let rows = vec![row("9:00"), row("9:05"), row("9:10")];
        let map = build_row_time_map(&rows, 5);
        assert_eq!(lookup_minute(&map, 5, 5), Some(9 * 60 + 25));
    }

    #[test]
    fn lookup_returns_known_row_directly() {
        let rows = vec![row("9:00"), row("9:05")];
        let map = build_row_time_map(&rows, 5);
        assert_eq!(lookup_minute(&map, 1, 5), Some(9 * 60 + 5));
    }

    #[test]
    fn lookup_on_empty_map_returns_none() {
        let map: HashMap<usize, i32> = HashMap::new();
        assert_eq!(lookup_minute(&map, 0, 5), None);
    }
}
