//! User accounts, notification preferences and token bookkeeping

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use tracing::debug;
use uuid::Uuid;

use core_kernel::UserId;
use domain_users::{NotificationPreference, ResetToken, Role, User};

use super::{parse, Page};
use crate::error::DatabaseError;

const USER_COLUMNS: &str = "id, email, password_hash, first_name, last_name, phone_number, \
    id_number, kra_pin, role, is_active, created_at, updated_at, last_login";

const PREFERENCE_COLUMNS: &str = "user_id, email_policy_updates, email_payment_reminders, \
    email_claim_updates, email_marketing, sms_policy_updates, sms_payment_reminders, \
    sms_claim_updates, whatsapp_enabled, in_app_enabled, preferred_language, updated_at";

#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    password_hash: String,
    first_name: String,
    last_name: String,
    phone_number: Option<String>,
    id_number: Option<String>,
    kra_pin: Option<String>,
    role: String,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    last_login: Option<DateTime<Utc>>,
}

impl TryFrom<UserRow> for User {
    type Error = DatabaseError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: UserId::from_uuid(row.id),
            email: row.email,
            password_hash: row.password_hash,
            first_name: row.first_name,
            last_name: row.last_name,
            phone_number: row.phone_number,
            id_number: row.id_number,
            kra_pin: row.kra_pin,
            role: parse::<Role>("users.role", &row.role)?,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
            last_login: row.last_login,
        })
    }
}

#[derive(Debug, FromRow)]
struct PreferenceRow {
    user_id: Uuid,
    email_policy_updates: bool,
    email_payment_reminders: bool,
    email_claim_updates: bool,
    email_marketing: bool,
    sms_policy_updates: bool,
    sms_payment_reminders: bool,
    sms_claim_updates: bool,
    whatsapp_enabled: bool,
    in_app_enabled: bool,
    preferred_language: String,
    updated_at: DateTime<Utc>,
}

impl From<PreferenceRow> for NotificationPreference {
    fn from(row: PreferenceRow) -> Self {
        NotificationPreference {
            user_id: UserId::from_uuid(row.user_id),
            email_policy_updates: row.email_policy_updates,
            email_payment_reminders: row.email_payment_reminders,
            email_claim_updates: row.email_claim_updates,
            email_marketing: row.email_marketing,
            sms_policy_updates: row.sms_policy_updates,
            sms_payment_reminders: row.sms_payment_reminders,
            sms_claim_updates: row.sms_claim_updates,
            whatsapp_enabled: row.whatsapp_enabled,
            in_app_enabled: row.in_app_enabled,
            preferred_language: row.preferred_language,
            updated_at: row.updated_at,
        }
    }
}

/// Back-office user search
#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    /// Matched against e-mail, names and phone number
    pub search: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts a new account together with its default preferences
    pub async fn create(&self, user: &User) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO users (
                id, email, password_hash, first_name, last_name, phone_number,
                id_number, kra_pin, role, is_active, created_at, updated_at, last_login
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(user.id.into_uuid())
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.phone_number)
        .bind(&user.id_number)
        .bind(&user.kra_pin)
        .bind(user.role.as_str())
        .bind(user.is_active)
        .bind(user.created_at)
        .bind(user.updated_at)
        .bind(user.last_login)
        .execute(&mut *tx)
        .await
        .map_err(|e| match DatabaseError::from(e) {
            DatabaseError::DuplicateEntry(_) => DatabaseError::duplicate("User", "email", &user.email),
            other => other,
        })?;

        let defaults = NotificationPreference::defaults_for(user.id);
        upsert_preferences(&mut *tx, &defaults).await?;

        tx.commit().await?;
        debug!(user_id = %user.id, role = %user.role, "User created");
        Ok(())
    }

    pub async fn find_by_id(&self, id: UserId) -> Result<User, DatabaseError> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(id.into_uuid())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::not_found("User", id))?
            .try_into()
    }

    /// Case-insensitive lookup by login e-mail
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError> {
        let sql = format!("SELECT {} FROM users WHERE LOWER(email) = LOWER($1)", USER_COLUMNS);
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(email.trim())
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    pub async fn email_exists(&self, email: &str) -> Result<bool, DatabaseError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE LOWER(email) = LOWER($1))")
                .bind(email.trim())
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    /// Writes back every mutable column of the account
    pub async fn save(&self, user: &User) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $2, first_name = $3, last_name = $4, phone_number = $5,
                id_number = $6, kra_pin = $7, role = $8, is_active = $9,
                updated_at = $10, last_login = $11
            WHERE id = $1
            "#,
        )
        .bind(user.id.into_uuid())
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.phone_number)
        .bind(&user.id_number)
        .bind(&user.kra_pin)
        .bind(user.role.as_str())
        .bind(user.is_active)
        .bind(user.updated_at)
        .bind(user.last_login)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("User", user.id));
        }
        Ok(())
    }

    pub async fn list(&self, filter: &UserFilter, page: Page) -> Result<Vec<User>, DatabaseError> {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM users WHERE TRUE", USER_COLUMNS));

        if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = format!("%{}%", search);
            qb.push(" AND (email ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR first_name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR last_name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR phone_number ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        if let Some(role) = filter.role {
            qb.push(" AND role = ").push_bind(role.as_str());
        }
        if let Some(active) = filter.is_active {
            qb.push(" AND is_active = ").push_bind(active);
        }
        qb.push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset);

        qb.build_query_as::<UserRow>()
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(User::try_from)
            .collect()
    }

    /// Preferences for `user_id`, created with defaults on first access
    pub async fn preferences(&self, user_id: UserId) -> Result<NotificationPreference, DatabaseError> {
        sqlx::query(
            "INSERT INTO notification_preferences (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING",
        )
        .bind(user_id.into_uuid())
        .execute(&self.pool)
        .await?;

        let sql = format!(
            "SELECT {} FROM notification_preferences WHERE user_id = $1",
            PREFERENCE_COLUMNS
        );
        let row = sqlx::query_as::<_, PreferenceRow>(&sql)
            .bind(user_id.into_uuid())
            .fetch_one(&self.pool)
            .await?;
        Ok(row.into())
    }

    pub async fn save_preferences(&self, preferences: &NotificationPreference) -> Result<(), DatabaseError> {
        let mut conn = self.pool.acquire().await?;
        upsert_preferences(&mut *conn, preferences).await
    }

    /// Preferred language of a recipient, `en` when none is stored
    pub async fn preferred_language(&self, user_id: UserId) -> Result<String, DatabaseError> {
        let language: Option<String> = sqlx::query_scalar(
            "SELECT preferred_language FROM notification_preferences WHERE user_id = $1",
        )
        .bind(user_id.into_uuid())
        .fetch_optional(&self.pool)
        .await?;
        Ok(language.unwrap_or_else(|| "en".to_string()))
    }

    /// Blacklists a refresh token until it would have expired anyway
    pub async fn revoke_token(
        &self,
        jti: Uuid,
        user_id: UserId,
        expires_at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO revoked_tokens (jti, user_id, expires_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (jti) DO NOTHING
            "#,
        )
        .bind(jti)
        .bind(user_id.into_uuid())
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn is_token_revoked(&self, jti: Uuid) -> Result<bool, DatabaseError> {
        let revoked: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM revoked_tokens WHERE jti = $1)")
                .bind(jti)
                .fetch_one(&self.pool)
                .await?;
        Ok(revoked)
    }

    /// Stores the digest of a reset token; the plain token never touches the database
    pub async fn store_reset_token(&self, user_id: UserId, token: &ResetToken) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO password_reset_tokens (id, user_id, token_digest, expires_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(user_id.into_uuid())
        .bind(&token.digest)
        .bind(token.expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Consumes a reset token and sets the new password hash
    ///
    /// Returns the account whose password changed, or `None` when the digest
    /// is unknown, already used or expired.
    pub async fn reset_password(
        &self,
        digest: &str,
        password_hash: &str,
    ) -> Result<Option<UserId>, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let owner: Option<(Uuid, Uuid)> = sqlx::query_as(
            r#"
            SELECT id, user_id FROM password_reset_tokens
            WHERE token_digest = $1 AND used_at IS NULL AND expires_at > NOW()
            FOR UPDATE
            "#,
        )
        .bind(digest)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((token_id, user_id)) = owner else {
            return Ok(None);
        };

        sqlx::query("UPDATE password_reset_tokens SET used_at = NOW() WHERE id = $1")
            .bind(token_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1")
            .bind(user_id)
            .bind(password_hash)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some(UserId::from_uuid(user_id)))
    }
}

async fn upsert_preferences(
    conn: &mut sqlx::PgConnection,
    p: &NotificationPreference,
) -> Result<(), DatabaseError> {
    sqlx::query(
        r#"
        INSERT INTO notification_preferences (
            user_id, email_policy_updates, email_payment_reminders, email_claim_updates,
            email_marketing, sms_policy_updates, sms_payment_reminders, sms_claim_updates,
            whatsapp_enabled, in_app_enabled, preferred_language, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        ON CONFLICT (user_id) DO UPDATE SET
            email_policy_updates = EXCLUDED.email_policy_updates,
            email_payment_reminders = EXCLUDED.email_payment_reminders,
            email_claim_updates = EXCLUDED.email_claim_updates,
            email_marketing = EXCLUDED.email_marketing,
            sms_policy_updates = EXCLUDED.sms_policy_updates,
            sms_payment_reminders = EXCLUDED.sms_payment_reminders,
            sms_claim_updates = EXCLUDED.sms_claim_updates,
            whatsapp_enabled = EXCLUDED.whatsapp_enabled,
            in_app_enabled = EXCLUDED.in_app_enabled,
            preferred_language = EXCLUDED.preferred_language,
            updated_at = EXCLUDED.updated_at
        "#,
    )
    .bind(p.user_id.into_uuid())
    .bind(p.email_policy_updates)
    .bind(p.email_payment_reminders)
    .bind(p.email_claim_updates)
    .bind(p.email_marketing)
    .bind(p.sms_policy_updates)
    .bind(p.sms_payment_reminders)
    .bind(p.sms_claim_updates)
    .bind(p.whatsapp_enabled)
    .bind(p.in_app_enabled)
    .bind(&p.preferred_language)
    .bind(p.updated_at)
    .execute(conn)
    .await?;
    Ok(())
}
