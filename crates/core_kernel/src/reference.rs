//! Human-facing reference numbers
//!
//! Policies, claims, transactions and refunds carry a readable number next
//! to their UUID, e.g. `POL-2024-004817`. Numbers are random within the
//! year; uniqueness is enforced by a unique index on each table.

use rand::Rng;
use std::fmt;

/// Kinds of reference number issued by the system
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    Policy,
    Claim,
    Transaction,
    Refund,
}

impl ReferenceKind {
    /// Prefix printed before the year
    pub fn prefix(&self) -> &'static str {
        match self {
            ReferenceKind::Policy => "POL",
            ReferenceKind::Claim => "CLM",
            ReferenceKind::Transaction => "TXN",
            ReferenceKind::Refund => "RFD",
        }
    }

    /// Number of random digits after the year
    pub fn digits(&self) -> u32 {
        match self {
            ReferenceKind::Transaction => 8,
            _ => 6,
        }
    }
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.prefix())
    }
}

/// Generates a reference number such as `CLM-2024-381204`
pub fn generate(kind: ReferenceKind, year: i32) -> String {
    let upper = 10_u64.pow(kind.digits());
    let n = rand::thread_rng().gen_range(0..upper);
    format!(
        "{}-{}-{:0width$}",
        kind.prefix(),
        year,
        n,
        width = kind.digits() as usize
    )
}

/// Checks that `value` has the shape of a reference of the given kind
pub fn is_valid(kind: ReferenceKind, value: &str) -> bool {
    let mut parts = value.splitn(3, '-');
    let (Some(prefix), Some(year), Some(number)) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };

    prefix == kind.prefix()
        && year.len() == 4
        && year.chars().all(|c| c.is_ascii_digit())
        && number.len() == kind.digits() as usize
        && number.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_policy_number_shape() {
        let number = generate(ReferenceKind::Policy, 2024);
        assert!(number.starts_with("POL-2024-"));
        assert_eq!(number.len(), "POL-2024-".len() + 6);
        assert!(is_valid(ReferenceKind::Policy, &number));
    }

    #[test]
    fn test_transaction_numbers_have_eight_digits() {
        let number = generate(ReferenceKind::Transaction, 2025);
        assert!(is_valid(ReferenceKind::Transaction, &number));
        assert!(!is_valid(ReferenceKind::Refund, &number));
    }

    #[test]
    fn test_is_valid_rejects_malformed() {
        assert!(!is_valid(ReferenceKind::Claim, "CLM-24-123456"));
        assert!(!is_valid(ReferenceKind::Claim, "CLM-2024-12345a"));
        assert!(!is_valid(ReferenceKind::Claim, "CLM2024123456"));
    }
}
