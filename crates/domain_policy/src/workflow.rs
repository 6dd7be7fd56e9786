//! Policy processing workflow
//!
//! Every purchased policy gets one stage per [`StageName`]. Stages are
//! worked in order by back-office staff; payment and activation complete
//! them automatically.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use core_kernel::{PolicyId, UserId, WorkflowStageId};

use crate::error::PolicyError;

/// Stages in processing order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    QuoteGenerated,
    PaymentPending,
    PaymentReceived,
    Underwriting,
    DocumentVerification,
    Approval,
    PolicyIssuance,
    CertificateGeneration,
    Active,
}

impl StageName {
    pub const ORDERED: [StageName; 9] = [
        StageName::QuoteGenerated,
        StageName::PaymentPending,
        StageName::PaymentReceived,
        StageName::Underwriting,
        StageName::DocumentVerification,
        StageName::Approval,
        StageName::PolicyIssuance,
        StageName::CertificateGeneration,
        StageName::Active,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StageName::QuoteGenerated => "quote_generated",
            StageName::PaymentPending => "payment_pending",
            StageName::PaymentReceived => "payment_received",
            StageName::Underwriting => "underwriting",
            StageName::DocumentVerification => "document_verification",
            StageName::Approval => "approval",
            StageName::PolicyIssuance => "policy_issuance",
            StageName::CertificateGeneration => "certificate_generation",
            StageName::Active => "active",
        }
    }

    /// Zero-based position in the workflow
    pub fn position(&self) -> i16 {
        StageName::ORDERED
            .iter()
            .position(|s| s == self)
            .unwrap_or_default() as i16
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StageName {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StageName::ORDERED
            .into_iter()
            .find(|n| n.as_str() == s)
            .ok_or_else(|| PolicyError::validation(format!("Unknown workflow stage: {}", s)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Skipped,
    Failed,
}

impl StageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageStatus::Pending => "pending",
            StageStatus::InProgress => "in_progress",
            StageStatus::Completed => "completed",
            StageStatus::Skipped => "skipped",
            StageStatus::Failed => "failed",
        }
    }

    /// Completed and skipped stages are closed
    pub fn is_closed(&self) -> bool {
        matches!(self, StageStatus::Completed | StageStatus::Skipped)
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StageStatus {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(StageStatus::Pending),
            "in_progress" => Ok(StageStatus::InProgress),
            "completed" => Ok(StageStatus::Completed),
            "skipped" => Ok(StageStatus::Skipped),
            "failed" => Ok(StageStatus::Failed),
            other => Err(PolicyError::validation(format!("Unknown stage status: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowStage {
    pub id: WorkflowStageId,
    pub policy_id: PolicyId,
    pub stage_name: StageName,
    pub status: StageStatus,
    pub assigned_to: Option<UserId>,
    pub notes: String,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowStage {
    fn new(policy_id: PolicyId, stage_name: StageName, now: DateTime<Utc>) -> Self {
        Self {
            id: WorkflowStageId::new_v7(),
            policy_id,
            stage_name,
            status: StageStatus::Pending,
            assigned_to: None,
            notes: String::new(),
            metadata: Value::Object(Default::default()),
            created_at: now,
            started_at: None,
            completed_at: None,
            updated_at: now,
        }
    }

    /// Assigns a staff member; a pending stage starts
    pub fn assign_to(&mut self, user: UserId) {
        let now = Utc::now();
        self.assigned_to = Some(user);
        if self.status == StageStatus::Pending {
            self.status = StageStatus::InProgress;
            self.started_at = Some(now);
        }
        self.updated_at = now;
    }

    pub fn complete(&mut self, notes: Option<String>) -> Result<(), PolicyError> {
        if self.status.is_closed() {
            return Err(PolicyError::stage(format!("Stage {} is already {}", self.stage_name, self.status)));
        }
        let now = Utc::now();
        self.status = StageStatus::Completed;
        self.started_at.get_or_insert(now);
        self.completed_at = Some(now);
        if let Some(notes) = notes.filter(|n| !n.trim().is_empty()) {
            self.notes = notes;
        }
        self.updated_at = now;
        Ok(())
    }

    pub fn skip(&mut self, notes: Option<String>) -> Result<(), PolicyError> {
        if self.status.is_closed() {
            return Err(PolicyError::stage(format!("Stage {} is already {}", self.stage_name, self.status)));
        }
        self.status = StageStatus::Skipped;
        if let Some(notes) = notes {
            self.notes = notes;
        }
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Marks the stage failed; a reason is mandatory
    pub fn fail(&mut self, notes: &str) -> Result<(), PolicyError> {
        if notes.trim().is_empty() {
            return Err(PolicyError::validation("A reason is required to fail a stage"));
        }
        if self.status.is_closed() {
            return Err(PolicyError::stage(format!("Stage {} is already {}", self.stage_name, self.status)));
        }
        self.status = StageStatus::Failed;
        self.notes = notes.to_string();
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Stages created at purchase
///
/// The quote is already generated and payment is awaited; everything after
/// that is pending.
pub fn initial_stages(policy_id: PolicyId) -> Vec<WorkflowStage> {
    let now = Utc::now();
    StageName::ORDERED
        .into_iter()
        .map(|name| {
            let mut stage = WorkflowStage::new(policy_id, name, now);
            match name {
                StageName::QuoteGenerated => {
                    stage.status = StageStatus::Completed;
                    stage.started_at = Some(now);
                    stage.completed_at = Some(now);
                }
                StageName::PaymentPending => {
                    stage.status = StageStatus::InProgress;
                    stage.started_at = Some(now);
                }
                _ => {}
            }
            stage
        })
        .collect()
}

/// Stages that payment of the first premium closes
pub fn stages_closed_by_payment() -> &'static [StageName] {
    &[StageName::PaymentPending, StageName::PaymentReceived]
}

/// Stages that activation closes: everything up to and including `active`
pub fn stages_closed_by_activation() -> &'static [StageName] {
    &StageName::ORDERED
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_stages_are_ordered_with_first_two_started() {
        let stages = initial_stages(PolicyId::new());
        assert_eq!(stages.len(), 9);
        assert_eq!(stages[0].status, StageStatus::Completed);
        assert_eq!(stages[1].status, StageStatus::InProgress);
        assert!(stages[2..].iter().all(|s| s.status == StageStatus::Pending));
        let names: Vec<_> = stages.iter().map(|s| s.stage_name).collect();
        assert_eq!(names, StageName::ORDERED.to_vec());
    }

    #[test]
    fn test_assign_starts_pending_stage_only() {
        let mut stages = initial_stages(PolicyId::new());
        let user = UserId::new();

        stages[3].assign_to(user);
        assert_eq!(stages[3].status, StageStatus::InProgress);
        assert!(stages[3].started_at.is_some());

        stages[0].assign_to(user);
        assert_eq!(stages[0].status, StageStatus::Completed);
        assert_eq!(stages[0].assigned_to, Some(user));
    }

    #[test]
    fn test_fail_requires_notes() {
        let mut stage = initial_stages(PolicyId::new()).remove(3);
        assert!(stage.fail("  ").is_err());
        stage.fail("Missing logbook").unwrap();
        assert_eq!(stage.status, StageStatus::Failed);
    }

    #[test]
    fn test_completed_stage_cannot_be_completed_again() {
        let mut stage = initial_stages(PolicyId::new()).remove(0);
        assert!(stage.complete(None).is_err());
    }
}
