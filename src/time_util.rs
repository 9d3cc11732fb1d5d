//! The operational wall clock is fixed to JST regardless of the host's
//! local timezone — every clinic's schedule grid is read on Japan time,
//! not wherever this process happens to run.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Asia::Tokyo;
use chrono_tz::Tz;

pub fn now_jst() -> DateTime<Tz> {
    Utc::now().with_timezone(&Tokyo)
}

/// `today+1` in JST — the date a run's schedule grid belongs to.
pub fn check_date(reference: DateTime<Tz>) -> NaiveDate {
    (reference + Duration::days(1)).date_naive()
}

pub fn run_date(reference: DateTime<Tz>) -> NaiveDate {
    reference.date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn check_date_is_one_day_after_run_date() {
        let reference = Tokyo.with_ymd_and_hms(2026, 7, 28, 3, 0, 0).unwrap();
        assert_eq!(check_date(reference), NaiveDate::from_ymd_opt(2026, 7, 29).unwrap());
        assert_eq!(run_date(reference), NaiveDate::from_ymd_opt(2026, 7, 28).unwrap());
    }

    #[test]
    fn check_date_crosses_month_boundary() {
        let reference = Tokyo.with_ymd_and_hms(2026, 7, 31, 23, 59, 0).unwrap();
        assert_eq!(check_date(reference), NaiveDate::from_ymd_opt(2026, 8, 1).unwrap());
    }
}
