//! PostgreSQL implementation of BillingLedger.
//!
//! Each operation is one transaction. Mutations that can change which
//! subscription is ACTIVE for a customer first lock the customer row
//! (`SELECT ... FOR UPDATE`), so concurrent checkouts, webhooks and plan
//! changes for one customer are serialized. Status updates are additionally
//! guarded by the expected predecessor status.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::domain::billing::{
    BillingError, BillingInterval, CurrencyCode, Invoice, InvoiceStatus, MarkFailedOutcome,
    MarkPaidOutcome, ReminderPolicy, ReminderRecord, Subscription, SubscriptionStatus,
};
use crate::domain::foundation::{
    CustomerId, DomainError, ErrorCode, InvoiceId, PlanId, SubscriptionId, Timestamp,
};
use crate::ports::{
    ActivationOutcome, ActiveSubscription, BillingLedger, DraftCreated, DraftPurpose, NewDraft,
    SweepReport,
};

/// PostgreSQL implementation of the BillingLedger port.
pub struct PostgresBillingLedger {
    pool: PgPool,
}

impl PostgresBillingLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const INVOICE_COLUMNS: &str = "id, customer_id, plan_id, currency, tax_amount, total_amount, \
     status, due_at, paid_at, provider_session_id, created_at, deleted_at";

const SUBSCRIPTION_COLUMNS: &str = "id, customer_id, invoice_id, plan_id, status, starts_at, \
     ends_at, renewed_at, renewed_subscription_id, upgraded_at, upgraded_to_plan, \
     downgraded_at, downgraded_to_plan, cancelled_at, created_at, deleted_at";

// ════════════════════════════════════════════════════════════════════════════════
// Row mapping
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, sqlx::FromRow)]
struct InvoiceRow {
    id: Uuid,
    customer_id: Uuid,
    plan_id: Uuid,
    currency: String,
    tax_amount: i64,
    total_amount: i64,
    status: String,
    due_at: DateTime<Utc>,
    paid_at: Option<DateTime<Utc>>,
    provider_session_id: String,
    created_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl TryFrom<InvoiceRow> for Invoice {
    type Error = DomainError;

    fn try_from(row: InvoiceRow) -> Result<Self, Self::Error> {
        let status: InvoiceStatus = row.status.parse().map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Invalid invoice row: {}", e))
        })?;
        let currency = CurrencyCode::new(&row.currency).map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Invalid invoice row: {}", e))
        })?;

        Ok(Invoice {
            id: InvoiceId::from_uuid(row.id),
            customer_id: CustomerId::from_uuid(row.customer_id),
            plan_id: PlanId::from_uuid(row.plan_id),
            currency,
            tax_amount: row.tax_amount,
            total_amount: row.total_amount,
            status,
            due_at: Timestamp::from_datetime(row.due_at),
            paid_at: row.paid_at.map(Timestamp::from_datetime),
            provider_session_id: row.provider_session_id,
            created_at: Timestamp::from_datetime(row.created_at),
            deleted_at: row.deleted_at.map(Timestamp::from_datetime),
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SubscriptionRow {
    id: Uuid,
    customer_id: Uuid,
    invoice_id: Uuid,
    plan_id: Uuid,
    status: String,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
    renewed_at: Option<DateTime<Utc>>,
    renewed_subscription_id: Option<Uuid>,
    upgraded_at: Option<DateTime<Utc>>,
    upgraded_to_plan: Option<Uuid>,
    downgraded_at: Option<DateTime<Utc>>,
    downgraded_to_plan: Option<Uuid>,
    cancelled_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl TryFrom<SubscriptionRow> for Subscription {
    type Error = DomainError;

    fn try_from(row: SubscriptionRow) -> Result<Self, Self::Error> {
        let status: SubscriptionStatus = row.status.parse().map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Invalid subscription row: {}", e),
            )
        })?;

        Ok(Subscription {
            id: SubscriptionId::from_uuid(row.id),
            customer_id: CustomerId::from_uuid(row.customer_id),
            invoice_id: InvoiceId::from_uuid(row.invoice_id),
            plan_id: PlanId::from_uuid(row.plan_id),
            status,
            starts_at: Timestamp::from_datetime(row.starts_at),
            ends_at: Timestamp::from_datetime(row.ends_at),
            renewed_at: row.renewed_at.map(Timestamp::from_datetime),
            renewed_subscription_id: row.renewed_subscription_id.map(SubscriptionId::from_uuid),
            upgraded_at: row.upgraded_at.map(Timestamp::from_datetime),
            upgraded_to_plan: row.upgraded_to_plan.map(PlanId::from_uuid),
            downgraded_at: row.downgraded_at.map(Timestamp::from_datetime),
            downgraded_to_plan: row.downgraded_to_plan.map(PlanId::from_uuid),
            cancelled_at: row.cancelled_at.map(Timestamp::from_datetime),
            created_at: Timestamp::from_datetime(row.created_at),
            deleted_at: row.deleted_at.map(Timestamp::from_datetime),
        })
    }
}

fn db_error(context: &'static str) -> impl Fn(sqlx::Error) -> BillingError {
    move |e| BillingError::infrastructure(format!("{}: {}", context, e))
}

fn ts(t: Option<Timestamp>) -> Option<DateTime<Utc>> {
    t.map(|t| *t.as_datetime())
}

/// Overdue unpaid invoices, plus already deleted ones still holding a live
/// non-active subscription.
const SELECT_STALE_INVOICES: &str = r#"
    SELECT i.id FROM invoices i
    WHERE (i.deleted_at IS NULL AND i.status <> 'PAID' AND i.due_at < $1)
       OR (i.deleted_at IS NOT NULL AND EXISTS (
              SELECT 1 FROM subscriptions s
              WHERE s.invoice_id = i.id AND s.deleted_at IS NULL AND s.status <> 'ACTIVE'))
    FOR UPDATE OF i
"#;

// ════════════════════════════════════════════════════════════════════════════════
// Statements shared inside transactions
// ════════════════════════════════════════════════════════════════════════════════

/// Locks the customer row. Returns false when the customer does not exist.
async fn lock_customer(
    conn: &mut PgConnection,
    customer_id: CustomerId,
) -> Result<bool, BillingError> {
    let row: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM customers WHERE id = $1 FOR UPDATE")
        .bind(customer_id.as_uuid())
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_error("Failed to lock customer"))?;
    Ok(row.is_some())
}

async fn invoice_for_update(
    conn: &mut PgConnection,
    invoice_id: InvoiceId,
) -> Result<Invoice, BillingError> {
    let sql = format!("SELECT {} FROM invoices WHERE id = $1 FOR UPDATE", INVOICE_COLUMNS);
    let row: Option<InvoiceRow> = sqlx::query_as(&sql)
        .bind(invoice_id.as_uuid())
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_error("Failed to load invoice"))?;
    match row {
        Some(row) => Ok(Invoice::try_from(row)?),
        None => Err(BillingError::invoice_not_found(invoice_id)),
    }
}

async fn invoice_by_id(
    conn: &mut PgConnection,
    invoice_id: InvoiceId,
) -> Result<Option<Invoice>, BillingError> {
    let sql = format!("SELECT {} FROM invoices WHERE id = $1", INVOICE_COLUMNS);
    let row: Option<InvoiceRow> = sqlx::query_as(&sql)
        .bind(invoice_id.as_uuid())
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_error("Failed to load invoice"))?;
    Ok(row.map(Invoice::try_from).transpose()?)
}

/// ACTIVE, not deleted, with `at` inside its window. Locked when `lock` is set.
async fn current_subscriptions(
    conn: &mut PgConnection,
    customer_id: CustomerId,
    at: Timestamp,
    lock: bool,
) -> Result<Vec<Subscription>, BillingError> {
    let sql = format!(
        "SELECT {} FROM subscriptions \
         WHERE customer_id = $1 AND status = 'ACTIVE' AND deleted_at IS NULL \
           AND starts_at <= $2 AND ends_at >= $2 \
         ORDER BY starts_at DESC{}",
        SUBSCRIPTION_COLUMNS,
        if lock { " FOR UPDATE" } else { "" }
    );
    let rows: Vec<SubscriptionRow> = sqlx::query_as(&sql)
        .bind(customer_id.as_uuid())
        .bind(at.as_datetime())
        .fetch_all(&mut *conn)
        .await
        .map_err(db_error("Failed to load current subscription"))?;
    rows.into_iter()
        .map(|r| Subscription::try_from(r).map_err(BillingError::from))
        .collect()
}

/// Other ACTIVE, not deleted subscriptions of the same customer whose window
/// shares an instant with `sub`'s, locked.
async fn overlapping_active(
    conn: &mut PgConnection,
    sub: &Subscription,
) -> Result<Vec<Subscription>, BillingError> {
    let sql = format!(
        "SELECT {} FROM subscriptions \
         WHERE customer_id = $1 AND id <> $2 AND status = 'ACTIVE' AND deleted_at IS NULL \
           AND starts_at <= $4 AND ends_at >= $3 \
         FOR UPDATE",
        SUBSCRIPTION_COLUMNS
    );
    let rows: Vec<SubscriptionRow> = sqlx::query_as(&sql)
        .bind(sub.customer_id.as_uuid())
        .bind(sub.id.as_uuid())
        .bind(sub.starts_at.as_datetime())
        .bind(sub.ends_at.as_datetime())
        .fetch_all(&mut *conn)
        .await
        .map_err(db_error("Failed to load overlapping subscriptions"))?;
    rows.into_iter()
        .map(|r| Subscription::try_from(r).map_err(BillingError::from))
        .collect()
}

/// The customer's current subscription, locked, under a held customer lock.
async fn current_for_update(
    conn: &mut PgConnection,
    customer_id: CustomerId,
    now: Timestamp,
) -> Result<Subscription, BillingError> {
    if !lock_customer(conn, customer_id).await? {
        return Err(BillingError::NoActiveSubscription(customer_id));
    }
    current_subscriptions(conn, customer_id, now, true)
        .await?
        .into_iter()
        .next()
        .ok_or(BillingError::NoActiveSubscription(customer_id))
}

/// Writes every mutable column of a subscription. With `expected` set, the
/// row is only updated while it still has that status.
async fn update_subscription(
    conn: &mut PgConnection,
    sub: &Subscription,
    expected: Option<SubscriptionStatus>,
) -> Result<(), BillingError> {
    let result = sqlx::query(
        r#"
        UPDATE subscriptions SET
            status = $2,
            starts_at = $3,
            ends_at = $4,
            renewed_at = $5,
            renewed_subscription_id = $6,
            upgraded_at = $7,
            upgraded_to_plan = $8,
            downgraded_at = $9,
            downgraded_to_plan = $10,
            cancelled_at = $11,
            deleted_at = $12
        WHERE id = $1 AND ($13::TEXT IS NULL OR status = $13)
        "#,
    )
    .bind(sub.id.as_uuid())
    .bind(sub.status.as_str())
    .bind(sub.starts_at.as_datetime())
    .bind(sub.ends_at.as_datetime())
    .bind(ts(sub.renewed_at))
    .bind(sub.renewed_subscription_id.map(|id| *id.as_uuid()))
    .bind(ts(sub.upgraded_at))
    .bind(sub.upgraded_to_plan.map(|id| *id.as_uuid()))
    .bind(ts(sub.downgraded_at))
    .bind(sub.downgraded_to_plan.map(|id| *id.as_uuid()))
    .bind(ts(sub.cancelled_at))
    .bind(ts(sub.deleted_at))
    .bind(expected.map(|s| s.as_str()))
    .execute(&mut *conn)
    .await
    .map_err(|e| {
        if let sqlx::Error::Database(db_err) = &e {
            if db_err.constraint() == Some("subscriptions_single_active") {
                return BillingError::invalid_state(
                    "another subscription is active",
                    format!("activate subscription {}", sub.id),
                );
            }
        }
        BillingError::infrastructure(format!("Failed to update subscription: {}", e))
    })?;

    if expected.is_some() && result.rows_affected() == 0 {
        return Err(BillingError::invalid_state(
            "status changed concurrently",
            format!("move subscription {} to {}", sub.id, sub.status.as_str()),
        ));
    }
    Ok(())
}

#[async_trait]
impl BillingLedger for PostgresBillingLedger {
    async fn create_draft(&self, draft: NewDraft) -> Result<DraftCreated, BillingError> {
        let mut tx = self.pool.begin().await.map_err(db_error("Failed to begin"))?;

        if draft.purpose == DraftPurpose::Upgrade {
            let mut current = current_for_update(&mut tx, draft.customer_id, draft.now).await?;
            current.record_upgrade_intent(draft.plan_id, draft.now);
            update_subscription(&mut tx, &current, None).await?;
        } else if !lock_customer(&mut tx, draft.customer_id).await? {
            return Err(BillingError::CustomerNotFound(draft.customer_id));
        }

        let invoice = Invoice::draft(
            draft.customer_id,
            draft.plan_id,
            draft.currency,
            &draft.charge,
            draft.provider_session_id,
            draft.due_at,
            draft.now,
        );
        let subscription = Subscription::inactive(
            draft.customer_id,
            invoice.id,
            draft.plan_id,
            draft.starts_at,
            draft.ends_at,
            draft.now,
        );

        sqlx::query(
            r#"
            INSERT INTO invoices (
                id, customer_id, plan_id, currency, tax_amount, total_amount,
                status, due_at, provider_session_id, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(invoice.id.as_uuid())
        .bind(invoice.customer_id.as_uuid())
        .bind(invoice.plan_id.as_uuid())
        .bind(invoice.currency.as_str())
        .bind(invoice.tax_amount)
        .bind(invoice.total_amount)
        .bind(invoice.status.as_str())
        .bind(invoice.due_at.as_datetime())
        .bind(&invoice.provider_session_id)
        .bind(invoice.created_at.as_datetime())
        .execute(&mut *tx)
        .await
        .map_err(db_error("Failed to insert invoice"))?;

        sqlx::query(
            r#"
            INSERT INTO subscriptions (
                id, customer_id, invoice_id, plan_id, status, starts_at, ends_at, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(subscription.id.as_uuid())
        .bind(subscription.customer_id.as_uuid())
        .bind(subscription.invoice_id.as_uuid())
        .bind(subscription.plan_id.as_uuid())
        .bind(subscription.status.as_str())
        .bind(subscription.starts_at.as_datetime())
        .bind(subscription.ends_at.as_datetime())
        .bind(subscription.created_at.as_datetime())
        .execute(&mut *tx)
        .await
        .map_err(db_error("Failed to insert subscription"))?;

        tx.commit().await.map_err(db_error("Failed to commit draft"))?;

        Ok(DraftCreated {
            invoice_id: invoice.id,
            subscription_id: subscription.id,
        })
    }

    async fn find_invoice(&self, id: InvoiceId) -> Result<Option<Invoice>, BillingError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(db_error("Failed to acquire connection"))?;
        invoice_by_id(&mut conn, id).await
    }

    async fn find_invoice_by_session(
        &self,
        session_id: &str,
    ) -> Result<Option<Invoice>, BillingError> {
        let sql = format!(
            "SELECT {} FROM invoices WHERE provider_session_id = $1",
            INVOICE_COLUMNS
        );
        let row: Option<InvoiceRow> = sqlx::query_as(&sql)
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("Failed to load invoice by session"))?;
        Ok(row.map(Invoice::try_from).transpose()?)
    }

    async fn mark_paid(
        &self,
        invoice_id: InvoiceId,
        now: Timestamp,
    ) -> Result<MarkPaidOutcome, BillingError> {
        let mut tx = self.pool.begin().await.map_err(db_error("Failed to begin"))?;
        let mut invoice = invoice_for_update(&mut tx, invoice_id).await?;
        let previous = invoice.status;

        let outcome = invoice.mark_paid(now)?;
        if outcome == MarkPaidOutcome::Paid {
            let result = sqlx::query(
                "UPDATE invoices SET status = 'PAID', paid_at = $2 \
                 WHERE id = $1 AND status = $3 AND deleted_at IS NULL",
            )
            .bind(invoice_id.as_uuid())
            .bind(now.as_datetime())
            .bind(previous.as_str())
            .execute(&mut *tx)
            .await
            .map_err(db_error("Failed to mark invoice paid"))?;
            if result.rows_affected() == 0 {
                return Err(BillingError::invalid_state(
                    "status changed concurrently",
                    format!("mark invoice {} paid", invoice_id),
                ));
            }
        }

        tx.commit().await.map_err(db_error("Failed to commit"))?;
        Ok(outcome)
    }

    async fn mark_failed(&self, invoice_id: InvoiceId) -> Result<MarkFailedOutcome, BillingError> {
        let mut tx = self.pool.begin().await.map_err(db_error("Failed to begin"))?;
        let mut invoice = invoice_for_update(&mut tx, invoice_id).await?;

        let outcome = invoice.mark_failed();
        if outcome == MarkFailedOutcome::MarkedUnpaid {
            sqlx::query("UPDATE invoices SET status = 'UNPAID' WHERE id = $1 AND status = 'DRAFT'")
                .bind(invoice_id.as_uuid())
                .execute(&mut *tx)
                .await
                .map_err(db_error("Failed to mark invoice unpaid"))?;
        }

        tx.commit().await.map_err(db_error("Failed to commit"))?;
        Ok(outcome)
    }

    async fn activate_or_renew(
        &self,
        invoice_id: InvoiceId,
        interval: BillingInterval,
        now: Timestamp,
    ) -> Result<ActivationOutcome, BillingError> {
        let mut tx = self.pool.begin().await.map_err(db_error("Failed to begin"))?;

        let invoice = invoice_for_update(&mut tx, invoice_id).await?;
        if invoice.status != InvoiceStatus::Paid {
            return Err(BillingError::invalid_state(
                invoice.status.as_str(),
                format!("activate subscription for invoice {}", invoice_id),
            ));
        }
        lock_customer(&mut tx, invoice.customer_id).await?;

        let sql = format!(
            "SELECT {} FROM subscriptions WHERE invoice_id = $1 FOR UPDATE",
            SUBSCRIPTION_COLUMNS
        );
        let row: Option<SubscriptionRow> = sqlx::query_as(&sql)
            .bind(invoice_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_error("Failed to load subscription"))?;
        let mut sub = match row {
            Some(row) => Subscription::try_from(row)?,
            None => {
                return Err(BillingError::invalid_state(
                    "no subscription",
                    format!("activate subscription for invoice {}", invoice_id),
                ))
            }
        };

        if sub.status != SubscriptionStatus::Inactive {
            return Ok(ActivationOutcome::AlreadyActive {
                subscription_id: sub.id,
            });
        }
        if sub.is_deleted() {
            return Err(BillingError::invalid_state(
                "deleted",
                format!("activate subscription {}", sub.id),
            ));
        }

        let first = sub.is_first_activation(&now);
        let previous = if first {
            None
        } else {
            current_subscriptions(&mut tx, sub.customer_id, now, true)
                .await?
                .into_iter()
                .next()
        };
        if first {
            sub.activate_from(now, interval)?;
        } else {
            sub.activate_scheduled()?;
        }

        // Clear the activated window before writing it, or the exclusion
        // constraint rejects the update
        let overlapping = overlapping_active(&mut tx, &sub).await?;
        let mut superseded = Vec::with_capacity(overlapping.len());
        for mut old in overlapping {
            old.supersede(now)?;
            update_subscription(&mut tx, &old, Some(SubscriptionStatus::Active)).await?;
            superseded.push(old.id);
        }
        update_subscription(&mut tx, &sub, Some(SubscriptionStatus::Inactive)).await?;

        let outcome = if first {
            ActivationOutcome::Activated {
                subscription_id: sub.id,
                superseded,
            }
        } else {
            let previous = match previous {
                Some(mut prev) => {
                    prev.link_renewal(sub.id, now);
                    update_subscription(&mut tx, &prev, None).await?;
                    Some(prev.id)
                }
                None => None,
            };
            ActivationOutcome::Renewed {
                subscription_id: sub.id,
                previous,
                superseded,
            }
        };

        tx.commit().await.map_err(db_error("Failed to commit activation"))?;
        Ok(outcome)
    }

    async fn record_downgrade(
        &self,
        customer_id: CustomerId,
        plan_id: PlanId,
        now: Timestamp,
    ) -> Result<Subscription, BillingError> {
        let mut tx = self.pool.begin().await.map_err(db_error("Failed to begin"))?;
        let mut sub = current_for_update(&mut tx, customer_id, now).await?;
        sub.record_downgrade(plan_id, now);
        update_subscription(&mut tx, &sub, None).await?;
        tx.commit().await.map_err(db_error("Failed to commit"))?;
        Ok(sub)
    }

    async fn cancel(
        &self,
        customer_id: CustomerId,
        now: Timestamp,
    ) -> Result<Subscription, BillingError> {
        let mut tx = self.pool.begin().await.map_err(db_error("Failed to begin"))?;
        let mut sub = current_for_update(&mut tx, customer_id, now).await?;
        if sub.cancel(now) {
            update_subscription(&mut tx, &sub, None).await?;
        }
        tx.commit().await.map_err(db_error("Failed to commit"))?;
        Ok(sub)
    }

    async fn sweep_expired(&self, now: Timestamp) -> Result<SweepReport, BillingError> {
        let mut tx = self.pool.begin().await.map_err(db_error("Failed to begin"))?;

        // Lock the stale invoices first. A concurrent mark_paid either commits
        // before this (and the row drops out on re-check) or waits until the
        // sweep commits and then sees the invoice deleted.
        let stale: Vec<Uuid> = sqlx::query_scalar(SELECT_STALE_INVOICES)
            .bind(now.as_datetime())
            .fetch_all(&mut *tx)
            .await
            .map_err(db_error("Failed to lock stale invoices"))?;
        if stale.is_empty() {
            return Ok(SweepReport::default());
        }

        let subscriptions = sqlx::query(
            "UPDATE subscriptions SET deleted_at = $1 \
             WHERE invoice_id = ANY($2) AND deleted_at IS NULL AND status <> 'ACTIVE'",
        )
        .bind(now.as_datetime())
        .bind(&stale)
        .execute(&mut *tx)
        .await
        .map_err(db_error("Failed to sweep subscriptions"))?
        .rows_affected();

        let invoices = sqlx::query(
            "UPDATE invoices SET deleted_at = $1 WHERE id = ANY($2) AND deleted_at IS NULL",
        )
        .bind(now.as_datetime())
        .bind(&stale)
        .execute(&mut *tx)
        .await
        .map_err(db_error("Failed to sweep invoices"))?
        .rows_affected();

        tx.commit().await.map_err(db_error("Failed to commit sweep"))?;
        Ok(SweepReport {
            subscriptions,
            invoices,
        })
    }

    async fn record_reminder(&self, reminder: ReminderRecord) -> Result<(), BillingError> {
        sqlx::query("INSERT INTO renewal_reminders (customer_id, created_at) VALUES ($1, $2)")
            .bind(reminder.customer_id.as_uuid())
            .bind(reminder.created_at.as_datetime())
            .execute(&self.pool)
            .await
            .map_err(db_error("Failed to record reminder"))?;
        Ok(())
    }

    async fn find_active_subscription(
        &self,
        customer_id: CustomerId,
        at: Timestamp,
    ) -> Result<Option<ActiveSubscription>, BillingError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(db_error("Failed to acquire connection"))?;
        let current = current_subscriptions(&mut conn, customer_id, at, false).await?;
        let Some(subscription) = current.into_iter().next() else {
            return Ok(None);
        };
        let invoice = invoice_by_id(&mut conn, subscription.invoice_id).await?;
        Ok(invoice.map(|invoice| ActiveSubscription {
            subscription,
            invoice,
        }))
    }

    async fn list_invoices(&self, customer_id: CustomerId) -> Result<Vec<Invoice>, BillingError> {
        let sql = format!(
            "SELECT {} FROM invoices WHERE customer_id = $1 ORDER BY created_at DESC",
            INVOICE_COLUMNS
        );
        let rows: Vec<InvoiceRow> = sqlx::query_as(&sql)
            .bind(customer_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("Failed to list invoices"))?;
        rows.into_iter()
            .map(|r| Invoice::try_from(r).map_err(BillingError::from))
            .collect()
    }

    async fn find_renewal_candidates(
        &self,
        now: Timestamp,
        policy: ReminderPolicy,
    ) -> Result<Vec<ActiveSubscription>, BillingError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(db_error("Failed to acquire connection"))?;

        let sql = format!(
            "SELECT {} FROM subscriptions s \
             WHERE s.status = 'ACTIVE' AND s.deleted_at IS NULL \
               AND s.starts_at <= $1 AND s.ends_at >= $1 AND s.ends_at <= $2 \
               AND s.cancelled_at IS NULL \
               AND s.renewed_at IS NULL AND s.renewed_subscription_id IS NULL \
               AND NOT EXISTS ( \
                   SELECT 1 FROM renewal_reminders r \
                   WHERE r.customer_id = s.customer_id AND r.created_at >= $3) \
             ORDER BY s.ends_at",
            SUBSCRIPTION_COLUMNS
                .split(", ")
                .map(|c| format!("s.{}", c.trim()))
                .collect::<Vec<_>>()
                .join(", ")
        );
        let rows: Vec<SubscriptionRow> = sqlx::query_as(&sql)
            .bind(now.as_datetime())
            .bind(policy.window_end(now).as_datetime())
            .bind(policy.cooldown_start(now).as_datetime())
            .fetch_all(&mut *conn)
            .await
            .map_err(db_error("Failed to load renewal candidates"))?;

        let mut candidates = Vec::with_capacity(rows.len());
        for row in rows {
            let subscription = Subscription::try_from(row)?;
            if let Some(invoice) = invoice_by_id(&mut conn, subscription.invoice_id).await? {
                candidates.push(ActiveSubscription {
                    subscription,
                    invoice,
                });
            }
        }
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        *Timestamp::now().as_datetime()
    }

    fn invoice_row(status: &str) -> InvoiceRow {
        InvoiceRow {
            id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            plan_id: Uuid::new_v4(),
            currency: "USD".to_string(),
            tax_amount: 100,
            total_amount: 1100,
            status: status.to_string(),
            due_at: now(),
            paid_at: None,
            provider_session_id: "cs_1".to_string(),
            created_at: now(),
            deleted_at: None,
        }
    }

    fn subscription_row(status: &str) -> SubscriptionRow {
        SubscriptionRow {
            id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            invoice_id: Uuid::new_v4(),
            plan_id: Uuid::new_v4(),
            status: status.to_string(),
            starts_at: now(),
            ends_at: now(),
            renewed_at: None,
            renewed_subscription_id: Some(Uuid::new_v4()),
            upgraded_at: None,
            upgraded_to_plan: None,
            downgraded_at: None,
            downgraded_to_plan: None,
            cancelled_at: None,
            created_at: now(),
            deleted_at: None,
        }
    }

    #[test]
    fn invoice_row_converts() {
        let invoice = Invoice::try_from(invoice_row("PAID")).unwrap();
        assert_eq!(invoice.status, InvoiceStatus::Paid);
        assert_eq!(invoice.currency.as_str(), "USD");
    }

    #[test]
    fn lowercase_invoice_status_is_rejected() {
        let err = Invoice::try_from(invoice_row("paid")).unwrap_err();
        assert_eq!(err.code, ErrorCode::DatabaseError);
    }

    #[test]
    fn subscription_row_keeps_renewal_link() {
        let row = subscription_row("ACTIVE");
        let next = row.renewed_subscription_id;
        let sub = Subscription::try_from(row).unwrap();
        assert_eq!(sub.status, SubscriptionStatus::Active);
        assert_eq!(sub.renewed_subscription_id.map(|id| *id.as_uuid()), next);
    }

    #[test]
    fn unknown_subscription_status_is_rejected() {
        assert!(Subscription::try_from(subscription_row("active")).is_err());
        assert!(Subscription::try_from(subscription_row("CANCELLED")).is_err());
    }

    // ────────────────────────────────────────────────────────────────────────
    // Against a live database: cargo test -- --ignored
    // ────────────────────────────────────────────────────────────────────────

    use crate::domain::billing::Charge;
    use crate::ports::{DraftPurpose, NewDraft};
    use std::sync::Arc;
    use std::time::Duration;

    async fn test_pool() -> PgPool {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let pool = PgPool::connect(&url).await.unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        pool
    }

    async fn seed_customer_and_plan(pool: &PgPool) -> (CustomerId, PlanId) {
        let customer = CustomerId::new();
        let product = Uuid::new_v4();
        let plan = PlanId::new();
        sqlx::query("INSERT INTO customers (id, email, currency) VALUES ($1, 'sweep@example.com', 'USD')")
            .bind(customer.as_uuid())
            .execute(pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO products (id, name) VALUES ($1, 'Sweep')")
            .bind(product)
            .execute(pool)
            .await
            .unwrap();
        sqlx::query(
            "INSERT INTO plans (id, product_id, name, billing_interval) VALUES ($1, $2, 'Basic', 1)",
        )
        .bind(plan.as_uuid())
        .bind(product)
        .execute(pool)
        .await
        .unwrap();
        (customer, plan)
    }

    #[tokio::test]
    #[ignore = "Requires live PostgreSQL (DATABASE_URL)"]
    async fn sweep_waits_for_an_in_flight_payment_and_spares_it() {
        let pool = test_pool().await;
        let ledger = Arc::new(PostgresBillingLedger::new(pool.clone()));
        let (customer, plan) = seed_customer_and_plan(&pool).await;
        let created_at = Timestamp::now().minus_hours(3);
        let draft = ledger
            .create_draft(NewDraft {
                customer_id: customer,
                plan_id: plan,
                currency: CurrencyCode::new("USD").unwrap(),
                charge: Charge {
                    subtotal: 1000,
                    tax_amount: 100,
                    credit_applied: 0,
                    total_amount: 1100,
                },
                starts_at: created_at,
                ends_at: created_at.add_days(30),
                provider_session_id: format!("cs_sweep_{}", Uuid::new_v4()),
                due_at: created_at.plus_hours(2),
                purpose: DraftPurpose::Subscribe,
                now: created_at,
            })
            .await
            .unwrap();

        // Payment holds the invoice row while the sweep starts
        let mut payment = pool.begin().await.unwrap();
        invoice_for_update(&mut *payment, draft.invoice_id).await.unwrap();
        sqlx::query("UPDATE invoices SET status = 'PAID', paid_at = NOW() WHERE id = $1")
            .bind(draft.invoice_id.as_uuid())
            .execute(&mut *payment)
            .await
            .unwrap();

        let sweeper = ledger.clone();
        let sweep = tokio::spawn(async move { sweeper.sweep_expired(Timestamp::now()).await });
        tokio::time::sleep(Duration::from_millis(200)).await;
        payment.commit().await.unwrap();
        sweep.await.unwrap().unwrap();

        let invoice = ledger.find_invoice(draft.invoice_id).await.unwrap().unwrap();
        assert_eq!(invoice.status, InvoiceStatus::Paid);
        assert!(!invoice.is_deleted());
        let outcome = ledger
            .activate_or_renew(draft.invoice_id, BillingInterval::months(1).unwrap(), Timestamp::now())
            .await
            .unwrap();
        assert_eq!(outcome.subscription_id(), draft.subscription_id);
    }
}
