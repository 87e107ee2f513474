//! Date-range expansion for prescription schedules.

use chrono::NaiveDate;

use super::PrescriptionError;

/// Longest schedule a single prescription may cover, in days.
pub const MAX_SCHEDULE_DAYS: i64 = 366;

/// Number of calendar days in `start..=end`, validated.
pub fn schedule_length(start: NaiveDate, end: NaiveDate) -> Result<i64, PrescriptionError> {
    if start > end {
        return Err(PrescriptionError::InvalidRange { start, end });
    }
    let days = (end - start).num_days() + 1;
    if days > MAX_SCHEDULE_DAYS {
        return Err(PrescriptionError::RangeTooLong {
            days,
            max: MAX_SCHEDULE_DAYS,
        });
    }
    Ok(days)
}

/// Every calendar day from `start` to `end`, both inclusive.
pub fn expand_days(start: NaiveDate, end: NaiveDate) -> Result<Vec<NaiveDate>, PrescriptionError> {
    let days = schedule_length(start, end)?;
    Ok(start.iter_days().take(days as usize).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn single_day_range() {
        assert_eq!(expand_days(d(2024, 3, 1), d(2024, 3, 1)).unwrap(), vec![d(2024, 3, 1)]);
    }

    #[test]
    fn crosses_month_and_leap_day() {
        let days = expand_days(d(2024, 2, 27), d(2024, 3, 2)).unwrap();
        assert_eq!(
            days,
            vec![d(2024, 2, 27), d(2024, 2, 28), d(2024, 2, 29), d(2024, 3, 1), d(2024, 3, 2)]
        );
    }

    #[test]
    fn reversed_range_is_rejected() {
        let err = expand_days(d(2024, 3, 2), d(2024, 3, 1)).unwrap_err();
        assert!(matches!(err, PrescriptionError::InvalidRange { .. }));
    }

    #[test]
    fn length_cap_is_inclusive() {
        // 2024 is a leap year: Jan 1 ..= Dec 31 is exactly 366 days
        assert_eq!(expand_days(d(2024, 1, 1), d(2024, 12, 31)).unwrap().len(), 366);
        let err = expand_days(d(2024, 1, 1), d(2025, 1, 1)).unwrap_err();
        assert!(matches!(err, PrescriptionError::RangeTooLong { days: 367, max: 366 }));
    }
}
