use chrono::{DateTime, Duration, Utc};

use crate::error::{AppError, AppResult};

fn validate_days(days: i64) -> AppResult<Duration> {
    if !(1..=3650).contains(&days) {
        return Err(AppError::BadRequest("Days must be between 1 and 3650".into()));
    }
    Ok(Duration::days(days))
}

/// New end of a subscription extended by `days`. Time left on a running
/// subscription is kept; a lapsed one restarts from `now`.
pub fn extended_end(current_end: DateTime<Utc>, now: DateTime<Utc>, days: i64) -> AppResult<DateTime<Utc>> {
    Ok(current_end.max(now) + validate_days(days)?)
}

/// Window of a new subscription: an explicit end wins, otherwise `days`
/// from the start.
pub fn initial_window(
    starts_at: Option<DateTime<Utc>>,
    ends_at: Option<DateTime<Utc>>,
    days: i64,
    now: DateTime<Utc>,
) -> AppResult<(DateTime<Utc>, DateTime<Utc>)> {
    let start = starts_at.unwrap_or(now);
    let end = match ends_at {
        Some(end) => end,
        None => start + validate_days(days)?,
    };
    if end <= start {
        return Err(AppError::BadRequest("Subscription must end after it starts".into()));
    }
    Ok((start, end))
}

/// Whole days until `ends_at`, negative once past.
pub fn days_remaining(ends_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (ends_at.date_naive() - now.date_naive()).num_days()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    #[test]
    fn running_subscription_keeps_its_remaining_time() {
        let end = extended_end(at(2025, 7, 10), at(2025, 7, 1), 30).unwrap();
        assert_eq!(end, at(2025, 8, 9));
    }

    #[test]
    fn lapsed_subscription_restarts_from_now() {
        let end = extended_end(at(2025, 1, 1), at(2025, 7, 1), 30).unwrap();
        assert_eq!(end, at(2025, 7, 31));
    }

    #[test]
    fn extension_length_is_bounded() {
        assert!(extended_end(at(2025, 1, 1), at(2025, 1, 1), 0).is_err());
        assert!(extended_end(at(2025, 1, 1), at(2025, 1, 1), -5).is_err());
        assert!(extended_end(at(2025, 1, 1), at(2025, 1, 1), 5000).is_err());
    }

    #[test]
    fn new_subscription_defaults_to_days_from_now() {
        let (start, end) = initial_window(None, None, 30, at(2025, 6, 1)).unwrap();
        assert_eq!(start, at(2025, 6, 1));
        assert_eq!(end, at(2025, 7, 1));
    }

    #[test]
    fn explicit_end_must_follow_start() {
        assert!(initial_window(Some(at(2025, 6, 1)), Some(at(2025, 5, 1)), 30, at(2025, 6, 1)).is_err());
        let (_, end) = initial_window(Some(at(2025, 6, 1)), Some(at(2026, 6, 1)), 30, at(2025, 6, 1)).unwrap();
        assert_eq!(end, at(2026, 6, 1));
    }

    #[test]
    fn remaining_days_count_calendar_days() {
        assert_eq!(days_remaining(at(2025, 6, 30), at(2025, 6, 1)), 29);
        assert_eq!(days_remaining(at(2025, 6, 1), at(2025, 6, 1)), 0);
        assert_eq!(days_remaining(at(2025, 5, 30), at(2025, 6, 1)), -2);
    }
}
