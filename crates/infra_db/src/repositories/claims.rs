//! Claims repository
//!
//! Every status change is written together with its history row, so the
//! audit trail never drifts from the claim.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgConnection, PgPool, Postgres, QueryBuilder};
use tracing::info;
use uuid::Uuid;

use core_kernel::{ClaimDocumentId, ClaimId, PolicyId, SettlementId, UserId};
use domain_claims::{
    Claim, ClaimDocument, ClaimDocumentType, ClaimSettlement, ClaimStatistics, ClaimStatus,
    ClaimType, CoveredPolicy, SettlementMethod, StatusChange,
};
use domain_notifications::Notification;

use super::{kes, notifications, parse, Page};
use crate::error::DatabaseError;

const CLAIM_COLUMNS: &str = "c.id, c.claim_number, c.policy_id, c.user_id, c.claim_type, \
    c.description, c.incident_date, c.incident_location, c.amount_claimed, c.amount_approved, \
    c.status, c.assessor_id, c.assessor_notes, c.rejection_reason, c.filed_date, c.assigned_at, \
    c.assessment_date, c.settlement_date, c.updated_at";

const SETTLEMENT_COLUMNS: &str = "id, claim_id, amount, method, bank_name, account_number, \
    mpesa_phone, cheque_number, transaction_reference, notes, processed_by, settled_at";

#[derive(Debug, FromRow)]
struct ClaimRow {
    id: Uuid,
    claim_number: String,
    policy_id: Uuid,
    user_id: Uuid,
    claim_type: String,
    description: String,
    incident_date: NaiveDate,
    incident_location: String,
    amount_claimed: Decimal,
    amount_approved: Option<Decimal>,
    status: String,
    assessor_id: Option<Uuid>,
    assessor_notes: String,
    rejection_reason: Option<String>,
    filed_date: DateTime<Utc>,
    assigned_at: Option<DateTime<Utc>>,
    assessment_date: Option<DateTime<Utc>>,
    settlement_date: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ClaimRow> for Claim {
    type Error = DatabaseError;

    fn try_from(row: ClaimRow) -> Result<Self, Self::Error> {
        Ok(Claim {
            id: ClaimId::from_uuid(row.id),
            claim_number: row.claim_number,
            policy_id: PolicyId::from_uuid(row.policy_id),
            user_id: UserId::from_uuid(row.user_id),
            claim_type: parse::<ClaimType>("claims.claim_type", &row.claim_type)?,
            description: row.description,
            incident_date: row.incident_date,
            incident_location: row.incident_location,
            amount_claimed: kes(row.amount_claimed),
            amount_approved: row.amount_approved.map(kes),
            status: parse::<ClaimStatus>("claims.status", &row.status)?,
            assessor_id: row.assessor_id.map(UserId::from_uuid),
            assessor_notes: row.assessor_notes,
            rejection_reason: row.rejection_reason,
            filed_date: row.filed_date,
            assigned_at: row.assigned_at,
            assessment_date: row.assessment_date,
            settlement_date: row.settlement_date,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct HistoryRow {
    id: Uuid,
    claim_id: Uuid,
    from_status: Option<String>,
    to_status: String,
    notes: String,
    changed_by: Option<Uuid>,
    changed_at: DateTime<Utc>,
}

impl TryFrom<HistoryRow> for StatusChange {
    type Error = DatabaseError;

    fn try_from(row: HistoryRow) -> Result<Self, Self::Error> {
        Ok(StatusChange {
            id: row.id,
            claim_id: ClaimId::from_uuid(row.claim_id),
            from_status: row
                .from_status
                .as_deref()
                .map(|s| parse::<ClaimStatus>("claim_status_history.from_status", s))
                .transpose()?,
            to_status: parse::<ClaimStatus>("claim_status_history.to_status", &row.to_status)?,
            notes: row.notes,
            changed_by: row.changed_by.map(UserId::from_uuid),
            changed_at: row.changed_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct DocumentRow {
    id: Uuid,
    claim_id: Uuid,
    document_type: String,
    title: String,
    file_url: String,
    file_size: i64,
    mime_type: String,
    uploaded_by: Uuid,
    uploaded_at: DateTime<Utc>,
}

impl TryFrom<DocumentRow> for ClaimDocument {
    type Error = DatabaseError;

    fn try_from(row: DocumentRow) -> Result<Self, Self::Error> {
        Ok(ClaimDocument {
            id: ClaimDocumentId::from_uuid(row.id),
            claim_id: ClaimId::from_uuid(row.claim_id),
            document_type: parse::<ClaimDocumentType>("claim_documents.document_type", &row.document_type)?,
            title: row.title,
            file_url: row.file_url,
            file_size: row.file_size,
            mime_type: row.mime_type,
            uploaded_by: UserId::from_uuid(row.uploaded_by),
            uploaded_at: row.uploaded_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct SettlementRow {
    id: Uuid,
    claim_id: Uuid,
    amount: Decimal,
    method: String,
    bank_name: Option<String>,
    account_number: Option<String>,
    mpesa_phone: Option<String>,
    cheque_number: Option<String>,
    transaction_reference: Option<String>,
    notes: String,
    processed_by: Uuid,
    settled_at: DateTime<Utc>,
}

impl TryFrom<SettlementRow> for ClaimSettlement {
    type Error = DatabaseError;

    fn try_from(row: SettlementRow) -> Result<Self, Self::Error> {
        Ok(ClaimSettlement {
            id: SettlementId::from_uuid(row.id),
            claim_id: ClaimId::from_uuid(row.claim_id),
            amount: kes(row.amount),
            method: parse::<SettlementMethod>("claim_settlements.method", &row.method)?,
            bank_name: row.bank_name,
            account_number: row.account_number,
            mpesa_phone: row.mpesa_phone,
            cheque_number: row.cheque_number,
            transaction_reference: row.transaction_reference,
            notes: row.notes,
            processed_by: UserId::from_uuid(row.processed_by),
            settled_at: row.settled_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct CoverageRow {
    id: Uuid,
    user_id: Uuid,
    status: String,
    start_date: NaiveDate,
    end_date: NaiveDate,
    coverage_amount: Decimal,
}

/// Claim listing filters; `user` scopes to one claimant
#[derive(Debug, Clone, Default)]
pub struct ClaimFilter {
    pub user: Option<UserId>,
    pub status: Option<ClaimStatus>,
    pub claim_type: Option<ClaimType>,
    pub policy: Option<PolicyId>,
    pub assessor: Option<UserId>,
    /// Only claims still awaiting a decision
    pub pending_review: bool,
    /// Matched against claim number and description
    pub search: Option<String>,
}

async fn insert_history(conn: &mut PgConnection, change: &StatusChange) -> Result<(), DatabaseError> {
    sqlx::query(
        r#"
        INSERT INTO claim_status_history (
            id, claim_id, from_status, to_status, notes, changed_by, changed_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(change.id)
    .bind(change.claim_id.into_uuid())
    .bind(change.from_status.map(|s| s.as_str()))
    .bind(change.to_status.as_str())
    .bind(&change.notes)
    .bind(change.changed_by.map(|u| u.into_uuid()))
    .bind(change.changed_at)
    .execute(conn)
    .await?;
    Ok(())
}

async fn update_claim(conn: &mut PgConnection, c: &Claim) -> Result<(), DatabaseError> {
    let result = sqlx::query(
        r#"
        UPDATE claims
        SET description = $2, incident_location = $3, amount_claimed = $4, amount_approved = $5,
            status = $6, assessor_id = $7, assessor_notes = $8, rejection_reason = $9,
            assigned_at = $10, assessment_date = $11, settlement_date = $12, updated_at = $13
        WHERE id = $1
        "#,
    )
    .bind(c.id.into_uuid())
    .bind(&c.description)
    .bind(&c.incident_location)
    .bind(c.amount_claimed.amount())
    .bind(c.amount_approved.map(|m| m.amount()))
    .bind(c.status.as_str())
    .bind(c.assessor_id.map(|u| u.into_uuid()))
    .bind(&c.assessor_notes)
    .bind(&c.rejection_reason)
    .bind(c.assigned_at)
    .bind(c.assessment_date)
    .bind(c.settlement_date)
    .bind(c.updated_at)
    .execute(conn)
    .await?;
    if result.rows_affected() == 0 {
        return Err(DatabaseError::not_found("Claim", c.id));
    }
    Ok(())
}

/// Repository for claims, their history, documents and settlements
#[derive(Debug, Clone)]
pub struct ClaimsRepository {
    pool: PgPool,
}

impl ClaimsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The view of a policy a claim is validated against
    pub async fn covered_policy(&self, policy_id: PolicyId) -> Result<CoveredPolicy, DatabaseError> {
        let row = sqlx::query_as::<_, CoverageRow>(
            "SELECT id, user_id, status, start_date, end_date, coverage_amount FROM policies WHERE id = $1",
        )
        .bind(policy_id.into_uuid())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DatabaseError::not_found("Policy", policy_id))?;

        Ok(CoveredPolicy {
            id: PolicyId::from_uuid(row.id),
            holder: UserId::from_uuid(row.user_id),
            is_active: row.status == "active",
            start_date: row.start_date,
            end_date: row.end_date,
            coverage_amount: kes(row.coverage_amount),
        })
    }

    /// Files a new claim with its opening history row
    pub async fn create(
        &self,
        claim: &Claim,
        opening: &StatusChange,
        notification: &Notification,
    ) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO claims (
                id, claim_number, policy_id, user_id, claim_type, description, incident_date,
                incident_location, amount_claimed, amount_approved, status, assessor_id,
                assessor_notes, rejection_reason, filed_date, assigned_at, assessment_date,
                settlement_date, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                      $17, $18, $19)
            "#,
        )
        .bind(claim.id.into_uuid())
        .bind(&claim.claim_number)
        .bind(claim.policy_id.into_uuid())
        .bind(claim.user_id.into_uuid())
        .bind(claim.claim_type.as_str())
        .bind(&claim.description)
        .bind(claim.incident_date)
        .bind(&claim.incident_location)
        .bind(claim.amount_claimed.amount())
        .bind(claim.amount_approved.map(|m| m.amount()))
        .bind(claim.status.as_str())
        .bind(claim.assessor_id.map(|u| u.into_uuid()))
        .bind(&claim.assessor_notes)
        .bind(&claim.rejection_reason)
        .bind(claim.filed_date)
        .bind(claim.assigned_at)
        .bind(claim.assessment_date)
        .bind(claim.settlement_date)
        .bind(claim.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| match DatabaseError::from(e) {
            DatabaseError::DuplicateEntry(_) => DatabaseError::duplicate("Claim", "number", &claim.claim_number),
            other => other,
        })?;

        insert_history(&mut tx, opening).await?;
        notifications::insert(&mut tx, notification).await?;

        tx.commit().await?;
        info!(claim_number = %claim.claim_number, claim_type = %claim.claim_type, "Claim filed");
        Ok(())
    }

    pub async fn find(&self, id: ClaimId) -> Result<Claim, DatabaseError> {
        let sql = format!("SELECT {} FROM claims c WHERE c.id = $1", CLAIM_COLUMNS);
        sqlx::query_as::<_, ClaimRow>(&sql)
            .bind(id.into_uuid())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::not_found("Claim", id))?
            .try_into()
    }

    pub async fn list(&self, filter: &ClaimFilter, page: Page) -> Result<Vec<Claim>, DatabaseError> {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM claims c WHERE TRUE", CLAIM_COLUMNS));
        if let Some(user) = filter.user {
            qb.push(" AND c.user_id = ").push_bind(user.into_uuid());
        }
        if let Some(status) = filter.status {
            qb.push(" AND c.status = ").push_bind(status.as_str());
        }
        if let Some(claim_type) = filter.claim_type {
            qb.push(" AND c.claim_type = ").push_bind(claim_type.as_str());
        }
        if let Some(policy) = filter.policy {
            qb.push(" AND c.policy_id = ").push_bind(policy.into_uuid());
        }
        if let Some(assessor) = filter.assessor {
            qb.push(" AND c.assessor_id = ").push_bind(assessor.into_uuid());
        }
        if filter.pending_review {
            qb.push(" AND c.status IN ('submitted', 'under_review', 'documents_requested')");
        }
        if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = format!("%{}%", search);
            qb.push(" AND (c.claim_number ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR c.description ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        qb.push(" ORDER BY c.filed_date DESC LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset);

        qb.build_query_as::<ClaimRow>()
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Claim::try_from)
            .collect()
    }

    /// Saves the claim and, when its status moved, the matching history row
    pub async fn update(
        &self,
        claim: &Claim,
        change: Option<&StatusChange>,
        notification: Option<&Notification>,
    ) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await?;
        update_claim(&mut tx, claim).await?;
        if let Some(change) = change {
            insert_history(&mut tx, change).await?;
        }
        if let Some(notification) = notification {
            notifications::insert(&mut tx, notification).await?;
        }
        tx.commit().await?;
        if let Some(change) = change {
            info!(
                claim_number = %claim.claim_number,
                from = change.from_status.map(|s| s.as_str()).unwrap_or("-"),
                to = %change.to_status,
                "Claim status changed"
            );
        }
        Ok(())
    }

    /// History of a claim, oldest first
    pub async fn history(&self, claim_id: ClaimId) -> Result<Vec<StatusChange>, DatabaseError> {
        sqlx::query_as::<_, HistoryRow>(
            r#"
            SELECT id, claim_id, from_status, to_status, notes, changed_by, changed_at
            FROM claim_status_history
            WHERE claim_id = $1
            ORDER BY changed_at, id
            "#,
        )
        .bind(claim_id.into_uuid())
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(StatusChange::try_from)
        .collect()
    }

    pub async fn add_document(&self, doc: &ClaimDocument) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO claim_documents (
                id, claim_id, document_type, title, file_url, file_size, mime_type,
                uploaded_by, uploaded_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(doc.id.into_uuid())
        .bind(doc.claim_id.into_uuid())
        .bind(doc.document_type.as_str())
        .bind(&doc.title)
        .bind(&doc.file_url)
        .bind(doc.file_size)
        .bind(&doc.mime_type)
        .bind(doc.uploaded_by.into_uuid())
        .bind(doc.uploaded_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn documents(&self, claim_id: ClaimId) -> Result<Vec<ClaimDocument>, DatabaseError> {
        sqlx::query_as::<_, DocumentRow>(
            r#"
            SELECT id, claim_id, document_type, title, file_url, file_size, mime_type,
                   uploaded_by, uploaded_at
            FROM claim_documents
            WHERE claim_id = $1
            ORDER BY uploaded_at DESC
            "#,
        )
        .bind(claim_id.into_uuid())
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(ClaimDocument::try_from)
        .collect()
    }

    /// Records the payout, the settled claim and its history row together
    pub async fn settle(
        &self,
        claim: &Claim,
        settlement: &ClaimSettlement,
        change: &StatusChange,
        notification: &Notification,
    ) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO claim_settlements (
                id, claim_id, amount, method, bank_name, account_number, mpesa_phone,
                cheque_number, transaction_reference, notes, processed_by, settled_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(settlement.id.into_uuid())
        .bind(settlement.claim_id.into_uuid())
        .bind(settlement.amount.amount())
        .bind(settlement.method.as_str())
        .bind(&settlement.bank_name)
        .bind(&settlement.account_number)
        .bind(&settlement.mpesa_phone)
        .bind(&settlement.cheque_number)
        .bind(&settlement.transaction_reference)
        .bind(&settlement.notes)
        .bind(settlement.processed_by.into_uuid())
        .bind(settlement.settled_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| match DatabaseError::from(e) {
            DatabaseError::DuplicateEntry(_) => {
                DatabaseError::duplicate("ClaimSettlement", "claim", &claim.claim_number)
            }
            other => other,
        })?;

        update_claim(&mut tx, claim).await?;
        insert_history(&mut tx, change).await?;
        notifications::insert(&mut tx, notification).await?;

        tx.commit().await?;
        info!(
            claim_number = %claim.claim_number,
            amount = %settlement.amount.amount(),
            method = settlement.method.as_str(),
            "Claim settled"
        );
        Ok(())
    }

    pub async fn settlement(&self, claim_id: ClaimId) -> Result<Option<ClaimSettlement>, DatabaseError> {
        let sql = format!("SELECT {} FROM claim_settlements WHERE claim_id = $1", SETTLEMENT_COLUMNS);
        sqlx::query_as::<_, SettlementRow>(&sql)
            .bind(claim_id.into_uuid())
            .fetch_optional(&self.pool)
            .await?
            .map(ClaimSettlement::try_from)
            .transpose()
    }

    /// Counts by status with claimed and approved totals
    pub async fn statistics(&self, user: Option<UserId>) -> Result<ClaimStatistics, DatabaseError> {
        let rows: Vec<(String, i64, Decimal, Decimal)> = sqlx::query_as(
            r#"
            SELECT status, COUNT(*),
                   COALESCE(SUM(amount_claimed), 0),
                   COALESCE(SUM(amount_approved), 0)
            FROM claims
            WHERE ($1::uuid IS NULL OR user_id = $1)
            GROUP BY status
            "#,
        )
        .bind(user.map(|u| u.into_uuid()))
        .fetch_all(&self.pool)
        .await?;

        let mut stats = ClaimStatistics::empty();
        for (status, count, claimed, approved) in rows {
            stats.record(parse("claims.status", &status)?, count);
            stats.total_claimed += claimed;
            stats.total_approved += approved;
        }
        Ok(stats)
    }
}
