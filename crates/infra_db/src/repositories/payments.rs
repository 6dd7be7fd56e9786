//! Transactions, installment schedules and refunds

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::{FromRow, PgConnection, PgPool, Postgres, QueryBuilder};
use tracing::{debug, info};
use uuid::Uuid;

use core_kernel::{PolicyId, RefundId, ScheduleId, TransactionId, UserId};
use domain_analytics::UserActivity;
use domain_billing::{
    PaymentMethod, PaymentSchedule, PaymentSummary, Refund, RefundReason, RefundStatus,
    ScheduleStatus, Transaction, TransactionStatus,
};
use domain_notifications::Notification;
use domain_policy::workflow;

use super::{analytics, kes, notifications, parse, workflows, Page};
use crate::error::DatabaseError;

const TXN_COLUMNS: &str = "t.id, t.transaction_number, t.user_id, t.policy_id, t.amount, \
    t.payment_method, t.status, t.description, t.phone_number, t.gateway_reference, \
    t.mpesa_receipt, t.paystack_reference, t.reference_number, t.metadata, t.failure_reason, \
    t.created_at, t.updated_at, t.processed_at, t.completed_at";

const SCHEDULE_COLUMNS: &str = "s.id, s.policy_id, s.transaction_id, s.installment_number, \
    s.amount, s.due_date, s.status, s.paid_at, s.reminder_sent_at, s.created_at";

const REFUND_COLUMNS: &str = "r.id, r.transaction_id, r.refund_number, r.amount, r.reason, \
    r.reason_description, r.status, r.processed_by, r.refund_reference, r.failure_reason, \
    r.created_at, r.processed_at";

#[derive(Debug, FromRow)]
struct TransactionRow {
    id: Uuid,
    transaction_number: String,
    user_id: Uuid,
    policy_id: Option<Uuid>,
    amount: Decimal,
    payment_method: String,
    status: String,
    description: String,
    phone_number: Option<String>,
    gateway_reference: Option<String>,
    mpesa_receipt: Option<String>,
    paystack_reference: Option<String>,
    reference_number: String,
    metadata: Value,
    failure_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    processed_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<TransactionRow> for Transaction {
    type Error = DatabaseError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        Ok(Transaction {
            id: TransactionId::from_uuid(row.id),
            transaction_number: row.transaction_number,
            user_id: UserId::from_uuid(row.user_id),
            policy_id: row.policy_id.map(PolicyId::from_uuid),
            amount: kes(row.amount),
            payment_method: parse::<PaymentMethod>("transactions.payment_method", &row.payment_method)?,
            status: parse::<TransactionStatus>("transactions.status", &row.status)?,
            description: row.description,
            phone_number: row.phone_number,
            gateway_reference: row.gateway_reference,
            mpesa_receipt: row.mpesa_receipt,
            paystack_reference: row.paystack_reference,
            reference_number: row.reference_number,
            metadata: row.metadata,
            failure_reason: row.failure_reason,
            created_at: row.created_at,
            updated_at: row.updated_at,
            processed_at: row.processed_at,
            completed_at: row.completed_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct ScheduleRow {
    id: Uuid,
    policy_id: Uuid,
    transaction_id: Option<Uuid>,
    installment_number: i32,
    amount: Decimal,
    due_date: NaiveDate,
    status: String,
    paid_at: Option<DateTime<Utc>>,
    reminder_sent_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<ScheduleRow> for PaymentSchedule {
    type Error = DatabaseError;

    fn try_from(row: ScheduleRow) -> Result<Self, Self::Error> {
        Ok(PaymentSchedule {
            id: ScheduleId::from_uuid(row.id),
            policy_id: PolicyId::from_uuid(row.policy_id),
            transaction_id: row.transaction_id.map(TransactionId::from_uuid),
            installment_number: row.installment_number,
            amount: kes(row.amount),
            due_date: row.due_date,
            status: parse::<ScheduleStatus>("payment_schedules.status", &row.status)?,
            paid_at: row.paid_at,
            reminder_sent_at: row.reminder_sent_at,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct RefundRow {
    id: Uuid,
    transaction_id: Uuid,
    refund_number: String,
    amount: Decimal,
    reason: String,
    reason_description: String,
    status: String,
    processed_by: Option<Uuid>,
    refund_reference: Option<String>,
    failure_reason: Option<String>,
    created_at: DateTime<Utc>,
    processed_at: Option<DateTime<Utc>>,
}

impl TryFrom<RefundRow> for Refund {
    type Error = DatabaseError;

    fn try_from(row: RefundRow) -> Result<Self, Self::Error> {
        Ok(Refund {
            id: RefundId::from_uuid(row.id),
            transaction_id: TransactionId::from_uuid(row.transaction_id),
            refund_number: row.refund_number,
            amount: kes(row.amount),
            reason: parse::<RefundReason>("refunds.reason", &row.reason)?,
            reason_description: row.reason_description,
            status: parse::<RefundStatus>("refunds.status", &row.status)?,
            processed_by: row.processed_by.map(UserId::from_uuid),
            refund_reference: row.refund_reference,
            failure_reason: row.failure_reason,
            created_at: row.created_at,
            processed_at: row.processed_at,
        })
    }
}

/// Transaction listing filters; `user` scopes to one payer
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub user: Option<UserId>,
    pub status: Option<TransactionStatus>,
    pub method: Option<PaymentMethod>,
    pub policy: Option<PolicyId>,
    /// Matched against transaction number and gateway references
    pub search: Option<String>,
}

/// Which installments a schedule listing returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleView {
    All,
    Pending,
    /// Unpaid and due before the given day
    OverdueOn(NaiveDate),
    /// Unpaid and due within the range, inclusive
    DueBetween(NaiveDate, NaiveDate),
}

/// Outcome of recording a successful payment
#[derive(Debug, Clone)]
pub struct CompletionOutcome {
    /// False when another request had already completed the transaction
    pub applied: bool,
    pub installment: Option<PaymentSchedule>,
}

pub(crate) async fn insert_schedules(
    conn: &mut PgConnection,
    schedules: &[PaymentSchedule],
) -> Result<(), DatabaseError> {
    for s in schedules {
        sqlx::query(
            r#"
            INSERT INTO payment_schedules (
                id, policy_id, transaction_id, installment_number, amount, due_date,
                status, paid_at, reminder_sent_at, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(s.id.into_uuid())
        .bind(s.policy_id.into_uuid())
        .bind(s.transaction_id.map(|t| t.into_uuid()))
        .bind(s.installment_number)
        .bind(s.amount.amount())
        .bind(s.due_date)
        .bind(s.status.as_str())
        .bind(s.paid_at)
        .bind(s.reminder_sent_at)
        .bind(s.created_at)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

async fn update_transaction(conn: &mut PgConnection, t: &Transaction) -> Result<(), DatabaseError> {
    let result = sqlx::query(
        r#"
        UPDATE transactions
        SET status = $2, gateway_reference = $3, mpesa_receipt = $4, paystack_reference = $5,
            metadata = $6, failure_reason = $7, updated_at = $8, processed_at = $9,
            completed_at = $10
        WHERE id = $1
        "#,
    )
    .bind(t.id.into_uuid())
    .bind(t.status.as_str())
    .bind(&t.gateway_reference)
    .bind(&t.mpesa_receipt)
    .bind(&t.paystack_reference)
    .bind(&t.metadata)
    .bind(&t.failure_reason)
    .bind(t.updated_at)
    .bind(t.processed_at)
    .bind(t.completed_at)
    .execute(conn)
    .await?;
    if result.rows_affected() == 0 {
        return Err(DatabaseError::not_found("Transaction", t.id));
    }
    Ok(())
}

async fn update_refund(conn: &mut PgConnection, r: &Refund) -> Result<(), DatabaseError> {
    sqlx::query(
        r#"
        UPDATE refunds
        SET status = $2, processed_by = $3, refund_reference = $4, failure_reason = $5,
            processed_at = $6
        WHERE id = $1
        "#,
    )
    .bind(r.id.into_uuid())
    .bind(r.status.as_str())
    .bind(r.processed_by.map(|u| u.into_uuid()))
    .bind(&r.refund_reference)
    .bind(&r.failure_reason)
    .bind(r.processed_at)
    .execute(conn)
    .await?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct PaymentRepository {
    pool: PgPool,
}

impl PaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // Transactions

    pub async fn create_transaction(&self, t: &Transaction) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO transactions (
                id, transaction_number, user_id, policy_id, amount, currency, payment_method,
                status, description, phone_number, gateway_reference, mpesa_receipt,
                paystack_reference, reference_number, metadata, failure_reason,
                created_at, updated_at, processed_at, completed_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                      $17, $18, $19, $20)
            "#,
        )
        .bind(t.id.into_uuid())
        .bind(&t.transaction_number)
        .bind(t.user_id.into_uuid())
        .bind(t.policy_id.map(|p| p.into_uuid()))
        .bind(t.amount.amount())
        .bind(t.amount.currency().code())
        .bind(t.payment_method.as_str())
        .bind(t.status.as_str())
        .bind(&t.description)
        .bind(&t.phone_number)
        .bind(&t.gateway_reference)
        .bind(&t.mpesa_receipt)
        .bind(&t.paystack_reference)
        .bind(&t.reference_number)
        .bind(&t.metadata)
        .bind(&t.failure_reason)
        .bind(t.created_at)
        .bind(t.updated_at)
        .bind(t.processed_at)
        .bind(t.completed_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DatabaseError::from(e) {
            DatabaseError::DuplicateEntry(_) => {
                DatabaseError::duplicate("Transaction", "number", &t.transaction_number)
            }
            other => other,
        })?;
        debug!(transaction = %t.transaction_number, method = %t.payment_method, "Transaction created");
        Ok(())
    }

    pub async fn find_transaction(&self, id: TransactionId) -> Result<Transaction, DatabaseError> {
        let sql = format!("SELECT {} FROM transactions t WHERE t.id = $1", TXN_COLUMNS);
        sqlx::query_as::<_, TransactionRow>(&sql)
            .bind(id.into_uuid())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::not_found("Transaction", id))?
            .try_into()
    }

    /// Looks up the transaction an M-Pesa CheckoutRequestID belongs to
    pub async fn find_by_gateway_reference(&self, reference: &str) -> Result<Option<Transaction>, DatabaseError> {
        let sql = format!("SELECT {} FROM transactions t WHERE t.gateway_reference = $1", TXN_COLUMNS);
        sqlx::query_as::<_, TransactionRow>(&sql)
            .bind(reference)
            .fetch_optional(&self.pool)
            .await?
            .map(Transaction::try_from)
            .transpose()
    }

    /// Looks up by transaction number, which doubles as the Paystack reference
    pub async fn find_by_reference(&self, reference: &str) -> Result<Option<Transaction>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM transactions t WHERE t.transaction_number = $1 OR t.paystack_reference = $1 LIMIT 1",
            TXN_COLUMNS
        );
        sqlx::query_as::<_, TransactionRow>(&sql)
            .bind(reference)
            .fetch_optional(&self.pool)
            .await?
            .map(Transaction::try_from)
            .transpose()
    }

    pub async fn list_transactions(
        &self,
        filter: &TransactionFilter,
        page: Page,
    ) -> Result<Vec<Transaction>, DatabaseError> {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM transactions t WHERE TRUE", TXN_COLUMNS));
        if let Some(user) = filter.user {
            qb.push(" AND t.user_id = ").push_bind(user.into_uuid());
        }
        if let Some(status) = filter.status {
            qb.push(" AND t.status = ").push_bind(status.as_str());
        }
        if let Some(method) = filter.method {
            qb.push(" AND t.payment_method = ").push_bind(method.as_str());
        }
        if let Some(policy) = filter.policy {
            qb.push(" AND t.policy_id = ").push_bind(policy.into_uuid());
        }
        if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = format!("%{}%", search);
            qb.push(" AND (t.transaction_number ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR t.mpesa_receipt ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR t.paystack_reference ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        qb.push(" ORDER BY t.created_at DESC LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset);

        qb.build_query_as::<TransactionRow>()
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Transaction::try_from)
            .collect()
    }

    /// Persists a status change that needs no dependent writes
    pub async fn save_transaction(&self, t: &Transaction) -> Result<(), DatabaseError> {
        let mut conn = self.pool.acquire().await?;
        update_transaction(&mut conn, t).await
    }

    /// Fails a transaction that is still waiting on its gateway
    ///
    /// Returns `false` when the stored row has left `pending`/`processing`
    /// in the meantime; a completion is never overwritten.
    pub async fn fail_transaction(&self, t: &Transaction) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE transactions
            SET status = $2, failure_reason = $3, updated_at = $4, processed_at = $5
            WHERE id = $1 AND status IN ('pending', 'processing')
            "#,
        )
        .bind(t.id.into_uuid())
        .bind(t.status.as_str())
        .bind(&t.failure_reason)
        .bind(t.updated_at)
        .bind(t.processed_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Records a successful payment and everything that follows from it
    ///
    /// The transaction row is locked first. A completed, refunded or
    /// cancelled row is left alone. Otherwise the earliest unpaid
    /// installment of the policy is marked paid, the payment workflow stages
    /// close, and the notification and activity rows are written in one
    /// database transaction.
    pub async fn complete_transaction(
        &self,
        t: &Transaction,
        notification: &Notification,
        activity: &UserActivity,
    ) -> Result<CompletionOutcome, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let current: String = sqlx::query_scalar("SELECT status FROM transactions WHERE id = $1 FOR UPDATE")
            .bind(t.id.into_uuid())
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DatabaseError::not_found("Transaction", t.id))?;
        let completable = [TransactionStatus::Pending, TransactionStatus::Processing, TransactionStatus::Failed];
        if !completable.iter().any(|s| s.as_str() == current) {
            tx.rollback().await?;
            return Ok(CompletionOutcome { applied: false, installment: None });
        }

        update_transaction(&mut tx, t).await?;

        let mut installment = None;
        if let Some(policy_id) = t.policy_id {
            let sql = format!(
                r#"
                SELECT {} FROM payment_schedules s
                WHERE s.policy_id = $1 AND s.status IN ('pending', 'overdue')
                ORDER BY s.due_date, s.installment_number
                LIMIT 1
                FOR UPDATE
                "#,
                SCHEDULE_COLUMNS
            );
            let next = sqlx::query_as::<_, ScheduleRow>(&sql)
                .bind(policy_id.into_uuid())
                .fetch_optional(&mut *tx)
                .await?
                .map(PaymentSchedule::try_from)
                .transpose()?;

            if let Some(mut schedule) = next {
                schedule
                    .mark_paid(t.id)
                    .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))?;
                sqlx::query(
                    "UPDATE payment_schedules SET status = $2, transaction_id = $3, paid_at = $4 WHERE id = $1",
                )
                .bind(schedule.id.into_uuid())
                .bind(schedule.status.as_str())
                .bind(t.id.into_uuid())
                .bind(schedule.paid_at)
                .execute(&mut *tx)
                .await?;
                installment = Some(schedule);
            }

            workflows::complete_open(&mut tx, policy_id, workflow::stages_closed_by_payment()).await?;
        }

        notifications::insert(&mut tx, notification).await?;
        analytics::insert_activity(&mut tx, activity).await?;

        tx.commit().await?;
        info!(
            transaction = %t.transaction_number,
            installment = installment.as_ref().map(|s| s.installment_number),
            "Payment completed"
        );
        Ok(CompletionOutcome { applied: true, installment })
    }

    /// All transactions and refunds in scope, folded into a summary
    pub async fn summary(&self, user: Option<UserId>) -> Result<PaymentSummary, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM transactions t WHERE ($1::uuid IS NULL OR t.user_id = $1)",
            TXN_COLUMNS
        );
        let transactions = sqlx::query_as::<_, TransactionRow>(&sql)
            .bind(user.map(|u| u.into_uuid()))
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Transaction::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        let refunds = self.list_refunds(user).await?;
        Ok(PaymentSummary::build(transactions.iter(), refunds.iter()))
    }

    // Schedules

    pub async fn schedules(&self, user: Option<UserId>, view: ScheduleView) -> Result<Vec<PaymentSchedule>, DatabaseError> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {} FROM payment_schedules s JOIN policies p ON p.id = s.policy_id WHERE TRUE",
            SCHEDULE_COLUMNS
        ));
        if let Some(user) = user {
            qb.push(" AND p.user_id = ").push_bind(user.into_uuid());
        }
        match view {
            ScheduleView::All => {}
            ScheduleView::Pending => {
                qb.push(" AND s.status = 'pending'");
            }
            ScheduleView::OverdueOn(today) => {
                qb.push(" AND s.status IN ('pending', 'overdue') AND s.due_date < ")
                    .push_bind(today);
            }
            ScheduleView::DueBetween(from, to) => {
                qb.push(" AND s.status IN ('pending', 'overdue') AND s.due_date BETWEEN ")
                    .push_bind(from)
                    .push(" AND ")
                    .push_bind(to);
            }
        }
        qb.push(" ORDER BY s.due_date, s.installment_number");

        qb.build_query_as::<ScheduleRow>()
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(PaymentSchedule::try_from)
            .collect()
    }

    pub async fn schedules_for_policy(&self, policy_id: PolicyId) -> Result<Vec<PaymentSchedule>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM payment_schedules s WHERE s.policy_id = $1 ORDER BY s.installment_number",
            SCHEDULE_COLUMNS
        );
        sqlx::query_as::<_, ScheduleRow>(&sql)
            .bind(policy_id.into_uuid())
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(PaymentSchedule::try_from)
            .collect()
    }

    // Refunds

    pub async fn create_refund(&self, r: &Refund) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO refunds (
                id, transaction_id, refund_number, amount, reason, reason_description,
                status, processed_by, refund_reference, failure_reason, created_at, processed_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(r.id.into_uuid())
        .bind(r.transaction_id.into_uuid())
        .bind(&r.refund_number)
        .bind(r.amount.amount())
        .bind(r.reason.as_str())
        .bind(&r.reason_description)
        .bind(r.status.as_str())
        .bind(r.processed_by.map(|u| u.into_uuid()))
        .bind(&r.refund_reference)
        .bind(&r.failure_reason)
        .bind(r.created_at)
        .bind(r.processed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn find_refund(&self, id: RefundId) -> Result<Refund, DatabaseError> {
        let sql = format!("SELECT {} FROM refunds r WHERE r.id = $1", REFUND_COLUMNS);
        sqlx::query_as::<_, RefundRow>(&sql)
            .bind(id.into_uuid())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::not_found("Refund", id))?
            .try_into()
    }

    /// Refunds whose payment belongs to `user`, or all refunds
    pub async fn list_refunds(&self, user: Option<UserId>) -> Result<Vec<Refund>, DatabaseError> {
        let sql = format!(
            r#"
            SELECT {} FROM refunds r
            JOIN transactions t ON t.id = r.transaction_id
            WHERE ($1::uuid IS NULL OR t.user_id = $1)
            ORDER BY r.created_at DESC
            "#,
            REFUND_COLUMNS
        );
        sqlx::query_as::<_, RefundRow>(&sql)
            .bind(user.map(|u| u.into_uuid()))
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Refund::try_from)
            .collect()
    }

    pub async fn refunds_for_transaction(&self, id: TransactionId) -> Result<Vec<Refund>, DatabaseError> {
        let sql = format!("SELECT {} FROM refunds r WHERE r.transaction_id = $1", REFUND_COLUMNS);
        sqlx::query_as::<_, RefundRow>(&sql)
            .bind(id.into_uuid())
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Refund::try_from)
            .collect()
    }

    /// Moves a refund from `pending` to `processing`
    ///
    /// Returns `false` when another request got there first.
    pub async fn start_refund(&self, refund: &Refund) -> Result<bool, DatabaseError> {
        let result = sqlx::query("UPDATE refunds SET status = $2 WHERE id = $1 AND status = 'pending'")
            .bind(refund.id.into_uuid())
            .bind(refund.status.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Persists a refund's status without dependent writes
    pub async fn save_refund(&self, refund: &Refund) -> Result<(), DatabaseError> {
        let mut conn = self.pool.acquire().await?;
        update_refund(&mut conn, refund).await
    }

    /// Saves a processed refund, and the refunded payment when it completed
    ///
    /// The refund row is locked and must still be in `from`; otherwise
    /// nothing is written and `false` comes back.
    pub async fn process_refund(
        &self,
        refund: &Refund,
        from: RefundStatus,
        refunded: Option<&Transaction>,
    ) -> Result<bool, DatabaseError> {
        let mut tx = self.pool.begin().await?;
        let current: String = sqlx::query_scalar("SELECT status FROM refunds WHERE id = $1 FOR UPDATE")
            .bind(refund.id.into_uuid())
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DatabaseError::not_found("Refund", refund.id))?;
        if current != from.as_str() {
            tx.rollback().await?;
            return Ok(false);
        }

        update_refund(&mut tx, refund).await?;
        if let Some(transaction) = refunded {
            update_transaction(&mut tx, transaction).await?;
        }
        tx.commit().await?;
        info!(refund = %refund.refund_number, status = %refund.status, "Refund processed");
        Ok(true)
    }
}
