//! Calendar-month series

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use core_kernel::calendar;

/// A month's figure; `month` is `YYYY-MM`, `label` is e.g. `May 2024`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyPoint {
    pub month: String,
    pub label: String,
    pub value: Decimal,
}

impl MonthlyPoint {
    /// The point for the month containing `date`
    pub fn for_month(date: NaiveDate, value: Decimal) -> Self {
        let start = calendar::month_start(date);
        Self {
            month: format!("{:04}-{:02}", start.year(), start.month()),
            label: start.format("%b %Y").to_string(),
            value,
        }
    }
}

/// Lays `totals` over the last `months` calendar months ending with the one
/// containing `today`, oldest first
///
/// Months without a total are zero; totals outside the window are ignored.
/// Each total is keyed by any date inside its month.
pub fn fill_months<I>(today: NaiveDate, months: u32, totals: I) -> Vec<MonthlyPoint>
where
    I: IntoIterator<Item = (NaiveDate, Decimal)>,
{
    let mut by_month: HashMap<NaiveDate, Decimal> = HashMap::new();
    for (date, value) in totals {
        *by_month.entry(calendar::month_start(date)).or_default() += value;
    }

    calendar::trailing_months(today, months)
        .into_iter()
        .map(|start| MonthlyPoint::for_month(start, by_month.get(&start).copied().unwrap_or_default()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_labels() {
        let today = NaiveDate::from_ymd_opt(2024, 5, 20).unwrap();
        let points = fill_months(today, 2, std::iter::empty());
        assert_eq!(points[0].month, "2024-04");
        assert_eq!(points[1].label, "May 2024");
        assert!(points.iter().all(|p| p.value == dec!(0)));
    }
}
