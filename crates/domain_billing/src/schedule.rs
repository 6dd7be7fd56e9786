//! Premium installment schedules

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::{calendar, Money, PolicyId, ScheduleId, TransactionId};

use crate::error::BillingError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleStatus {
    Pending,
    Paid,
    Overdue,
    Cancelled,
}

impl ScheduleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleStatus::Pending => "pending",
            ScheduleStatus::Paid => "paid",
            ScheduleStatus::Overdue => "overdue",
            ScheduleStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ScheduleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScheduleStatus {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ScheduleStatus::Pending),
            "paid" => Ok(ScheduleStatus::Paid),
            "overdue" => Ok(ScheduleStatus::Overdue),
            "cancelled" => Ok(ScheduleStatus::Cancelled),
            other => Err(BillingError::Validation(format!("Unknown schedule status: {}", other))),
        }
    }
}

/// One installment of a policy's premium
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentSchedule {
    pub id: ScheduleId,
    pub policy_id: PolicyId,
    pub transaction_id: Option<TransactionId>,
    /// 1-based
    pub installment_number: i32,
    pub amount: Money,
    pub due_date: NaiveDate,
    pub status: ScheduleStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub reminder_sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl PaymentSchedule {
    /// Still owed and past its due date on `today`
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        matches!(self.status, ScheduleStatus::Pending | ScheduleStatus::Overdue) && self.due_date < today
    }

    pub fn mark_paid(&mut self, transaction_id: TransactionId) -> Result<(), BillingError> {
        if !matches!(self.status, ScheduleStatus::Pending | ScheduleStatus::Overdue) {
            return Err(BillingError::InvalidOperation(format!(
                "Installment {} is {}",
                self.installment_number, self.status
            )));
        }
        self.status = ScheduleStatus::Paid;
        self.transaction_id = Some(transaction_id);
        self.paid_at = Some(Utc::now());
        Ok(())
    }

    pub fn cancel(&mut self) {
        if self.status != ScheduleStatus::Paid {
            self.status = ScheduleStatus::Cancelled;
        }
    }
}

/// Splits `premium` into `installments` parts due every `interval_months`
/// starting on `start_date`
///
/// Parts are exact to the cent and sum to the premium; leftover cents go on
/// the earliest installments. Due dates past the end of a short month clamp
/// to its last day.
pub fn generate_schedule(
    policy_id: PolicyId,
    premium: Money,
    installments: u32,
    interval_months: u32,
    start_date: NaiveDate,
) -> Result<Vec<PaymentSchedule>, BillingError> {
    if installments == 0 {
        return Err(BillingError::Validation("At least one installment is required".into()));
    }
    if premium.is_negative() {
        return Err(BillingError::Validation("Premium cannot be negative".into()));
    }
    let now = Utc::now();
    premium
        .allocate(installments)?
        .into_iter()
        .enumerate()
        .map(|(i, amount)| -> Result<PaymentSchedule, BillingError> {
            let due_date = calendar::add_months(start_date, i as u32 * interval_months)?;
            Ok(PaymentSchedule {
                id: ScheduleId::new_v7(),
                policy_id,
                transaction_id: None,
                installment_number: i as i32 + 1,
                amount,
                due_date,
                status: ScheduleStatus::Pending,
                paid_at: None,
                reminder_sent_at: None,
                created_at: now,
            })
        })
        .collect()
}

/// The earliest unpaid installment, which a completed payment settles
pub fn next_due(schedules: &[PaymentSchedule]) -> Option<&PaymentSchedule> {
    schedules
        .iter()
        .filter(|s| matches!(s.status, ScheduleStatus::Pending | ScheduleStatus::Overdue))
        .min_by_key(|s| (s.due_date, s.installment_number))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_monthly_schedule_clamps_to_month_end() {
        let schedule =
            generate_schedule(PolicyId::new(), Money::kes(dec!(12000)), 12, 1, date(2024, 1, 31)).unwrap();
        assert_eq!(schedule.len(), 12);
        assert_eq!(schedule[1].due_date, date(2024, 2, 29));
        assert_eq!(schedule[2].due_date, date(2024, 3, 31));
        assert!(schedule.iter().all(|s| s.amount == Money::kes(dec!(1000))));
    }

    #[test]
    fn test_remainder_goes_to_first_installments() {
        let schedule =
            generate_schedule(PolicyId::new(), Money::kes(dec!(100.00)), 3, 4, date(2024, 1, 1)).unwrap();
        assert_eq!(schedule[0].amount, Money::kes(dec!(33.34)));
        assert_eq!(schedule[1].amount, Money::kes(dec!(33.33)));
        assert_eq!(schedule[2].due_date, date(2024, 9, 1));
    }

    #[test]
    fn test_next_due_skips_paid() {
        let mut schedule =
            generate_schedule(PolicyId::new(), Money::kes(dec!(4000)), 4, 3, date(2024, 1, 1)).unwrap();
        schedule[0].mark_paid(TransactionId::new()).unwrap();
        assert_eq!(next_due(&schedule).map(|s| s.installment_number), Some(2));
    }
}
