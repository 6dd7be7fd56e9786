//! Claim counts and totals

use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::claim::{Claim, ClaimStatus};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClaimStatistics {
    pub total: i64,
    /// Keyed by status name, every status present
    pub by_status: BTreeMap<&'static str, i64>,
    pub total_claimed: Decimal,
    pub total_approved: Decimal,
}

impl ClaimStatistics {
    pub fn empty() -> Self {
        Self {
            by_status: ClaimStatus::ALL.iter().map(|s| (s.as_str(), 0)).collect(),
            ..Default::default()
        }
    }

    pub fn record(&mut self, status: ClaimStatus, count: i64) {
        self.total += count;
        *self.by_status.entry(status.as_str()).or_insert(0) += count;
    }

    pub fn tally<'a>(claims: impl IntoIterator<Item = &'a Claim>) -> Self {
        let mut stats = Self::empty();
        for claim in claims {
            stats.record(claim.status, 1);
            stats.total_claimed += claim.amount_claimed.amount();
            if let Some(approved) = claim.amount_approved {
                stats.total_approved += approved.amount();
            }
        }
        stats
    }

    pub fn count(&self, status: ClaimStatus) -> i64 {
        self.by_status.get(status.as_str()).copied().unwrap_or(0)
    }

    /// Approved or settled claims as a percentage of decided claims
    pub fn approval_rate(&self) -> Decimal {
        let approved = self.count(ClaimStatus::Approved) + self.count(ClaimStatus::Settled);
        let decided = approved + self.count(ClaimStatus::Rejected);
        if decided == 0 {
            return Decimal::ZERO;
        }
        (Decimal::from(approved) / Decimal::from(decided) * Decimal::ONE_HUNDRED).round_dp(2)
    }
}
