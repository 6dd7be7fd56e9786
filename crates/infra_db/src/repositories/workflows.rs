//! Policy workflow stages

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use core_kernel::{PolicyId, UserId, WorkflowStageId};
use domain_policy::{StageName, StageStatus, WorkflowStage};

use super::parse;
use crate::error::DatabaseError;

const COLUMNS: &str = "id, policy_id, stage_name, status, assigned_to, notes, metadata, \
    created_at, started_at, completed_at, updated_at";

#[derive(Debug, FromRow)]
struct StageRow {
    id: Uuid,
    policy_id: Uuid,
    stage_name: String,
    status: String,
    assigned_to: Option<Uuid>,
    notes: String,
    metadata: Value,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<StageRow> for WorkflowStage {
    type Error = DatabaseError;

    fn try_from(row: StageRow) -> Result<Self, Self::Error> {
        Ok(WorkflowStage {
            id: WorkflowStageId::from_uuid(row.id),
            policy_id: PolicyId::from_uuid(row.policy_id),
            stage_name: parse::<StageName>("workflow_stages.stage_name", &row.stage_name)?,
            status: parse::<StageStatus>("workflow_stages.status", &row.status)?,
            assigned_to: row.assigned_to.map(UserId::from_uuid),
            notes: row.notes,
            metadata: row.metadata,
            created_at: row.created_at,
            started_at: row.started_at,
            completed_at: row.completed_at,
            updated_at: row.updated_at,
        })
    }
}

pub(crate) async fn insert_all(conn: &mut PgConnection, stages: &[WorkflowStage]) -> Result<(), DatabaseError> {
    for stage in stages {
        sqlx::query(
            r#"
            INSERT INTO workflow_stages (
                id, policy_id, stage_name, position, status, assigned_to, notes, metadata,
                created_at, started_at, completed_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(stage.id.into_uuid())
        .bind(stage.policy_id.into_uuid())
        .bind(stage.stage_name.as_str())
        .bind(stage.stage_name.position())
        .bind(stage.status.as_str())
        .bind(stage.assigned_to.map(|u| u.into_uuid()))
        .bind(&stage.notes)
        .bind(&stage.metadata)
        .bind(stage.created_at)
        .bind(stage.started_at)
        .bind(stage.completed_at)
        .bind(stage.updated_at)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

/// Completes every still-open stage of `policy_id` named in `names`
pub(crate) async fn complete_open(
    conn: &mut PgConnection,
    policy_id: PolicyId,
    names: &[StageName],
) -> Result<u64, DatabaseError> {
    let names: Vec<&str> = names.iter().map(StageName::as_str).collect();
    let result = sqlx::query(
        r#"
        UPDATE workflow_stages
        SET status = 'completed',
            started_at = COALESCE(started_at, NOW()),
            completed_at = NOW(),
            updated_at = NOW()
        WHERE policy_id = $1
          AND stage_name = ANY($2)
          AND status IN ('pending', 'in_progress')
        "#,
    )
    .bind(policy_id.into_uuid())
    .bind(&names)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

#[derive(Debug, Clone)]
pub struct WorkflowRepository {
    pool: PgPool,
}

impl WorkflowRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Stages of a policy in workflow order
    pub async fn stages_for_policy(&self, policy_id: PolicyId) -> Result<Vec<WorkflowStage>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM workflow_stages WHERE policy_id = $1 ORDER BY position",
            COLUMNS
        );
        sqlx::query_as::<_, StageRow>(&sql)
            .bind(policy_id.into_uuid())
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(WorkflowStage::try_from)
            .collect()
    }

    pub async fn find(&self, id: WorkflowStageId) -> Result<WorkflowStage, DatabaseError> {
        let sql = format!("SELECT {} FROM workflow_stages WHERE id = $1", COLUMNS);
        sqlx::query_as::<_, StageRow>(&sql)
            .bind(id.into_uuid())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::not_found("WorkflowStage", id))?
            .try_into()
    }

    pub async fn save(&self, stage: &WorkflowStage) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            UPDATE workflow_stages
            SET status = $2, assigned_to = $3, notes = $4, metadata = $5,
                started_at = $6, completed_at = $7, updated_at = $8
            WHERE id = $1
            "#,
        )
        .bind(stage.id.into_uuid())
        .bind(stage.status.as_str())
        .bind(stage.assigned_to.map(|u| u.into_uuid()))
        .bind(&stage.notes)
        .bind(&stage.metadata)
        .bind(stage.started_at)
        .bind(stage.completed_at)
        .bind(stage.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
