//! Customer document vault

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use core_kernel::{DocumentId, PolicyId, UserId};
use domain_documents::{Document, DocumentType};
use domain_notifications::Notification;

use super::{notifications, parse};
use crate::error::DatabaseError;

const COLUMNS: &str = "id, user_id, policy_id, doc_type, title, filename, s3_key, file_size, \
    mime_type, is_verified, verified_by, verified_at, uploaded_at, updated_at";

#[derive(Debug, FromRow)]
struct DocumentRow {
    id: Uuid,
    user_id: Uuid,
    policy_id: Option<Uuid>,
    doc_type: String,
    title: String,
    filename: String,
    s3_key: String,
    file_size: i64,
    mime_type: String,
    is_verified: bool,
    verified_by: Option<Uuid>,
    verified_at: Option<DateTime<Utc>>,
    uploaded_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<DocumentRow> for Document {
    type Error = DatabaseError;

    fn try_from(row: DocumentRow) -> Result<Self, Self::Error> {
        Ok(Document {
            id: DocumentId::from_uuid(row.id),
            user_id: UserId::from_uuid(row.user_id),
            policy_id: row.policy_id.map(PolicyId::from_uuid),
            doc_type: parse::<DocumentType>("documents.doc_type", &row.doc_type)?,
            title: row.title,
            filename: row.filename,
            s3_key: row.s3_key,
            file_size: row.file_size,
            mime_type: row.mime_type,
            is_verified: row.is_verified,
            verified_by: row.verified_by.map(UserId::from_uuid),
            verified_at: row.verified_at,
            uploaded_at: row.uploaded_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct DocumentFilter {
    pub user: Option<UserId>,
    pub policy: Option<PolicyId>,
    pub doc_type: Option<DocumentType>,
}

#[derive(Debug, Clone)]
pub struct DocumentRepository {
    pool: PgPool,
}

impl DocumentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, doc: &Document, notification: &Notification) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO documents (
                id, user_id, policy_id, doc_type, title, filename, s3_key, file_size, mime_type,
                is_verified, verified_by, verified_at, uploaded_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(doc.id.into_uuid())
        .bind(doc.user_id.into_uuid())
        .bind(doc.policy_id.map(|p| p.into_uuid()))
        .bind(doc.doc_type.as_str())
        .bind(&doc.title)
        .bind(&doc.filename)
        .bind(&doc.s3_key)
        .bind(doc.file_size)
        .bind(&doc.mime_type)
        .bind(doc.is_verified)
        .bind(doc.verified_by.map(|u| u.into_uuid()))
        .bind(doc.verified_at)
        .bind(doc.uploaded_at)
        .bind(doc.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| match DatabaseError::from(e) {
            DatabaseError::DuplicateEntry(_) => DatabaseError::duplicate("Document", "s3_key", &doc.s3_key),
            other => other,
        })?;
        notifications::insert(&mut tx, notification).await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn find(&self, id: DocumentId) -> Result<Document, DatabaseError> {
        let sql = format!("SELECT {} FROM documents WHERE id = $1", COLUMNS);
        sqlx::query_as::<_, DocumentRow>(&sql)
            .bind(id.into_uuid())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::not_found("Document", id))?
            .try_into()
    }

    /// Newest uploads first
    pub async fn list(&self, filter: &DocumentFilter) -> Result<Vec<Document>, DatabaseError> {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM documents WHERE TRUE", COLUMNS));
        if let Some(user) = filter.user {
            qb.push(" AND user_id = ").push_bind(user.into_uuid());
        }
        if let Some(policy) = filter.policy {
            qb.push(" AND policy_id = ").push_bind(policy.into_uuid());
        }
        if let Some(doc_type) = filter.doc_type {
            qb.push(" AND doc_type = ").push_bind(doc_type.as_str());
        }
        qb.push(" ORDER BY uploaded_at DESC");

        qb.build_query_as::<DocumentRow>()
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Document::try_from)
            .collect()
    }

    /// Saves the verification and notifies the owner
    pub async fn verify(&self, doc: &Document, notification: &Notification) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "UPDATE documents SET is_verified = $2, verified_by = $3, verified_at = $4, updated_at = $5 WHERE id = $1",
        )
        .bind(doc.id.into_uuid())
        .bind(doc.is_verified)
        .bind(doc.verified_by.map(|u| u.into_uuid()))
        .bind(doc.verified_at)
        .bind(doc.updated_at)
        .execute(&mut *tx)
        .await?;
        notifications::insert(&mut tx, notification).await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn delete(&self, id: DocumentId) -> Result<(), DatabaseError> {
        let result = sqlx::query("DELETE FROM documents WHERE id = $1")
            .bind(id.into_uuid())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("Document", id));
        }
        Ok(())
    }
}
