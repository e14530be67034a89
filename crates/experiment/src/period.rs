use chrono::{DateTime, Utc};

use flagplane_core::Violation;

/// Longest allowed experiment period: 30 days.
pub const MAX_PERIOD_SECONDS: i64 = 30 * 24 * 60 * 60;

/// Check that `stop_at` follows `start_at` by at most [`MAX_PERIOD_SECONDS`].
pub fn validate_period(start_at: DateTime<Utc>, stop_at: DateTime<Utc>) -> Result<(), Violation> {
    let period = stop_at.timestamp() - start_at.timestamp();
    if period <= 0 {
        return Err(Violation::InvalidPeriod);
    }
    if period > MAX_PERIOD_SECONDS {
        return Err(Violation::PeriodTooLong);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    use super::*;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn boundaries() {
        assert_eq!(validate_period(start(), start()), Err(Violation::InvalidPeriod));
        assert_eq!(
            validate_period(start(), start() - Duration::seconds(1)),
            Err(Violation::InvalidPeriod)
        );
        assert_eq!(validate_period(start(), start() + Duration::days(30)), Ok(()));
        assert_eq!(
            validate_period(start(), start() + Duration::days(30) + Duration::seconds(1)),
            Err(Violation::PeriodTooLong)
        );
    }

    proptest! {
        #[test]
        fn periods_within_bound_are_accepted(secs in 1i64..=MAX_PERIOD_SECONDS) {
            prop_assert_eq!(validate_period(start(), start() + Duration::seconds(secs)), Ok(()));
        }

        #[test]
        fn periods_beyond_bound_are_rejected(extra in 1i64..1_000_000) {
            let stop = start() + Duration::seconds(MAX_PERIOD_SECONDS + extra);
            prop_assert_eq!(validate_period(start(), stop), Err(Violation::PeriodTooLong));
        }
    }
}
