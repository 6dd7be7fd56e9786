//! Period-over-period growth figures

use chrono::{DateTime, Duration, Utc};
use rust_decimal::{Decimal, RoundingStrategy};

/// Percentage change from `previous` to `current`, two decimal places
///
/// From a zero baseline any increase counts as 100% and no change as 0%.
pub fn calculate_growth(current: Decimal, previous: Decimal) -> Decimal {
    if previous.is_zero() {
        return if current > Decimal::ZERO { Decimal::ONE_HUNDRED } else { Decimal::ZERO };
    }
    ((current - previous) / previous * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// `part` as a percentage of `whole`, two decimal places; 0 when `whole` is 0
pub fn percentage(part: Decimal, whole: Decimal) -> Decimal {
    if whole.is_zero() {
        return Decimal::ZERO;
    }
    (part / whole * Decimal::ONE_HUNDRED).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// A window ending now and the equally long window before it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComparisonWindows {
    pub current_start: DateTime<Utc>,
    pub previous_start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ComparisonWindows {
    pub fn trailing_days(now: DateTime<Utc>, days: i64) -> Self {
        let current_start = now - Duration::days(days);
        Self {
            current_start,
            previous_start: current_start - Duration::days(days),
            end: now,
        }
    }

    pub fn in_current(&self, at: DateTime<Utc>) -> bool {
        at >= self.current_start && at <= self.end
    }

    pub fn in_previous(&self, at: DateTime<Utc>) -> bool {
        at >= self.previous_start && at < self.current_start
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_growth_from_zero() {
        assert_eq!(calculate_growth(dec!(5), dec!(0)), dec!(100));
        assert_eq!(calculate_growth(dec!(0), dec!(0)), dec!(0));
    }

    #[test]
    fn test_growth_rounds_to_cents() {
        assert_eq!(calculate_growth(dec!(4), dec!(3)), dec!(33.33));
        assert_eq!(calculate_growth(dec!(1), dec!(3)), dec!(-66.67));
        assert_eq!(calculate_growth(dec!(150), dec!(100)), dec!(50));
    }

    #[test]
    fn test_windows_do_not_overlap() {
        let now = Utc::now();
        let w = ComparisonWindows::trailing_days(now, 30);
        let boundary = w.current_start;
        assert!(w.in_current(boundary));
        assert!(!w.in_previous(boundary));
        assert!(w.in_previous(boundary - Duration::seconds(1)));
        assert!(!w.in_previous(w.previous_start - Duration::seconds(1)));
    }
}
