//! In-app notifications

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use core_kernel::{NotificationId, UserId};
use domain_notifications::{Notification, NotificationKind};

use super::{parse, Page};
use crate::error::DatabaseError;

const COLUMNS: &str =
    "id, user_id, notification_type, title, message, action_url, read, read_at, created_at";

#[derive(Debug, FromRow)]
struct NotificationRow {
    id: Uuid,
    user_id: Uuid,
    notification_type: String,
    title: String,
    message: String,
    action_url: String,
    read: bool,
    read_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<NotificationRow> for Notification {
    type Error = DatabaseError;

    fn try_from(row: NotificationRow) -> Result<Self, Self::Error> {
        Ok(Notification {
            id: NotificationId::from_uuid(row.id),
            user_id: UserId::from_uuid(row.user_id),
            notification_type: parse::<NotificationKind>(
                "notifications.notification_type",
                &row.notification_type,
            )?,
            title: row.title,
            message: row.message,
            action_url: row.action_url,
            read: row.read,
            read_at: row.read_at,
            created_at: row.created_at,
        })
    }
}

/// Inserts a notification on an open connection or transaction
pub(crate) async fn insert(conn: &mut PgConnection, n: &Notification) -> Result<(), DatabaseError> {
    sqlx::query(
        r#"
        INSERT INTO notifications (
            id, user_id, notification_type, title, message, action_url, read, read_at, created_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#,
    )
    .bind(n.id.into_uuid())
    .bind(n.user_id.into_uuid())
    .bind(n.notification_type.as_str())
    .bind(&n.title)
    .bind(&n.message)
    .bind(&n.action_url)
    .bind(n.read)
    .bind(n.read_at)
    .bind(n.created_at)
    .execute(conn)
    .await?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct NotificationRepository {
    pool: PgPool,
}

impl NotificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, notification: &Notification) -> Result<(), DatabaseError> {
        let mut conn = self.pool.acquire().await?;
        insert(&mut conn, notification).await
    }

    /// Newest first; `read` narrows to read or unread notifications
    pub async fn list(
        &self,
        user_id: UserId,
        read: Option<bool>,
        page: Page,
    ) -> Result<Vec<Notification>, DatabaseError> {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM notifications WHERE user_id = ", COLUMNS));
        qb.push_bind(user_id.into_uuid());
        if let Some(read) = read {
            qb.push(" AND read = ").push_bind(read);
        }
        qb.push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset);

        qb.build_query_as::<NotificationRow>()
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Notification::try_from)
            .collect()
    }

    /// A notification belonging to `user_id`; other users' notifications are not found
    pub async fn find_for_user(
        &self,
        id: NotificationId,
        user_id: UserId,
    ) -> Result<Notification, DatabaseError> {
        let sql = format!("SELECT {} FROM notifications WHERE id = $1 AND user_id = $2", COLUMNS);
        sqlx::query_as::<_, NotificationRow>(&sql)
            .bind(id.into_uuid())
            .bind(user_id.into_uuid())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::not_found("Notification", id))?
            .try_into()
    }

    pub async fn unread_count(&self, user_id: UserId) -> Result<i64, DatabaseError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND NOT read")
                .bind(user_id.into_uuid())
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    pub async fn mark_read(&self, notification: &Notification) -> Result<(), DatabaseError> {
        sqlx::query("UPDATE notifications SET read = $2, read_at = $3 WHERE id = $1")
            .bind(notification.id.into_uuid())
            .bind(notification.read)
            .bind(notification.read_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Returns how many notifications changed
    pub async fn mark_all_read(&self, user_id: UserId) -> Result<u64, DatabaseError> {
        let result = sqlx::query(
            "UPDATE notifications SET read = TRUE, read_at = NOW() WHERE user_id = $1 AND NOT read",
        )
        .bind(user_id.into_uuid())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete(&self, id: NotificationId, user_id: UserId) -> Result<(), DatabaseError> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = $1 AND user_id = $2")
            .bind(id.into_uuid())
            .bind(user_id.into_uuid())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("Notification", id));
        }
        Ok(())
    }
}
