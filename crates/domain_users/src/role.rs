//! Roles and the privileges they carry

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::UserError;

/// The single role a user holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    Customer,
    Staff,
    Admin,
    Assessor,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Customer, Role::Staff, Role::Admin, Role::Assessor];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::Staff => "staff",
            Role::Admin => "admin",
            Role::Assessor => "assessor",
        }
    }

    /// Back-office privileges: admin and staff
    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Staff | Role::Admin)
    }

    /// May adjudicate claims: assessors plus back-office users
    pub fn can_assess_claims(&self) -> bool {
        matches!(self, Role::Assessor | Role::Staff | Role::Admin)
    }

    /// May change other users' roles
    pub fn can_manage_roles(&self) -> bool {
        matches!(self, Role::Admin)
    }

    /// Human-readable description shown in the admin role catalogue
    pub fn description(&self) -> &'static str {
        match self {
            Role::Customer => "Purchases policies, files claims and pays premiums",
            Role::Staff => "Back-office operations on policies, payments and claims",
            Role::Admin => "Full access including user and role management",
            Role::Assessor => "Reviews, approves and rejects claims",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UserError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Role::Customer),
            "staff" => Ok(Role::Staff),
            "admin" => Ok(Role::Admin),
            "assessor" => Ok(Role::Assessor),
            other => Err(UserError::UnknownRole(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_privileges() {
        assert!(Role::Admin.is_staff());
        assert!(Role::Staff.is_staff());
        assert!(!Role::Assessor.is_staff());
        assert!(Role::Assessor.can_assess_claims());
        assert!(!Role::Customer.can_assess_claims());
        assert!(Role::Admin.can_manage_roles());
        assert!(!Role::Staff.can_manage_roles());
    }

    #[test]
    fn test_round_trip_through_str() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("root".parse::<Role>().is_err());
    }
}
