/// Payments and their settlement state
///
/// A payment is created `pending` when a donation is initiated and is settled
/// exactly once by the provider's webhook. [`PaymentStatus::can_transition_to`]
/// encodes the only legal moves; [`Payment::settle`] additionally refuses to
/// touch a row that is no longer pending.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE payment_status AS ENUM ('pending', 'paid', 'expired', 'failed');
///
/// CREATE TABLE payments (
///     id BIGSERIAL PRIMARY KEY,
///     transaction_id UUID NOT NULL UNIQUE,
///     donor_id BIGINT NOT NULL REFERENCES donors(id),
///     donation_id BIGINT NOT NULL UNIQUE REFERENCES donations(id),
///     campaign_id BIGINT NOT NULL REFERENCES campaigns(id),
///     vendor VARCHAR(50),
///     method VARCHAR(50),
///     amount BIGINT NOT NULL,
///     link TEXT NOT NULL,
///     status payment_status NOT NULL DEFAULT 'pending',
///     response JSONB,
///     payment_date TIMESTAMPTZ,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgExecutor};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// Invoice created, waiting for the provider
    Pending,

    Paid,

    /// Invoice lapsed without payment
    Expired,

    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Expired => "expired",
            PaymentStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }

    /// Only a pending payment can move, and only to a terminal state
    pub fn can_transition_to(&self, target: PaymentStatus) -> bool {
        matches!(
            (self, target),
            (PaymentStatus::Pending, PaymentStatus::Paid)
                | (PaymentStatus::Pending, PaymentStatus::Expired)
                | (PaymentStatus::Pending, PaymentStatus::Failed)
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Payment {
    pub id: i64,

    /// Correlation key sent to the provider as the invoice's external id
    pub transaction_id: Uuid,

    pub donor_id: i64,

    pub donation_id: i64,

    pub campaign_id: i64,

    pub vendor: Option<String>,

    /// Provider payment method (e.g. `BANK_TRANSFER`, `EWALLET`)
    pub method: Option<String>,

    pub amount: i64,

    /// Hosted invoice URL
    pub link: String,

    pub status: PaymentStatus,

    /// Raw webhook payload
    pub response: Option<serde_json::Value>,

    pub payment_date: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub transaction_id: Uuid,
    pub donor_id: i64,
    pub donation_id: i64,
    pub campaign_id: i64,
    pub amount: i64,
    pub link: String,
}

/// Fields written when the provider reports the outcome
#[derive(Debug, Clone)]
pub struct Settlement {
    pub status: PaymentStatus,
    pub vendor: String,
    pub method: Option<String>,
    pub response: serde_json::Value,
    pub payment_date: Option<DateTime<Utc>>,
}

impl Payment {
    pub async fn create_pending(conn: &mut PgConnection, data: NewPayment) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Payment>(
            r#"
            INSERT INTO payments (transaction_id, donor_id, donation_id, campaign_id, amount, link, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, transaction_id, donor_id, donation_id, campaign_id, vendor, method, amount,
                      link, status, response, payment_date, created_at, updated_at
            "#,
        )
        .bind(data.transaction_id)
        .bind(data.donor_id)
        .bind(data.donation_id)
        .bind(data.campaign_id)
        .bind(data.amount)
        .bind(data.link)
        .bind(PaymentStatus::Pending)
        .fetch_one(conn)
        .await
    }

    pub async fn find_by_transaction_id<'e>(
        executor: impl PgExecutor<'e>,
        transaction_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Payment>(
            r#"
            SELECT id, transaction_id, donor_id, donation_id, campaign_id, vendor, method, amount,
                   link, status, response, payment_date, created_at, updated_at
            FROM payments
            WHERE transaction_id = $1
            "#,
        )
        .bind(transaction_id)
        .fetch_optional(executor)
        .await
    }

    /// Locks the payment row until the surrounding transaction ends
    pub async fn lock_by_transaction_id(
        conn: &mut PgConnection,
        transaction_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Payment>(
            r#"
            SELECT id, transaction_id, donor_id, donation_id, campaign_id, vendor, method, amount,
                   link, status, response, payment_date, created_at, updated_at
            FROM payments
            WHERE transaction_id = $1
            FOR UPDATE
            "#,
        )
        .bind(transaction_id)
        .fetch_optional(conn)
        .await
    }

    /// Records the outcome of a pending payment
    ///
    /// Returns `None` when the row is no longer pending, leaving it untouched.
    pub async fn settle(conn: &mut PgConnection, id: i64, settlement: Settlement) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Payment>(
            r#"
            UPDATE payments
            SET status = $2,
                vendor = $3,
                method = $4,
                response = $5,
                payment_date = $6,
                updated_at = NOW()
            WHERE id = $1 AND status = $7
            RETURNING id, transaction_id, donor_id, donation_id, campaign_id, vendor, method, amount,
                      link, status, response, payment_date, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(settlement.status)
        .bind(settlement.vendor)
        .bind(settlement.method)
        .bind(settlement.response)
        .bind(settlement.payment_date)
        .bind(PaymentStatus::Pending)
        .fetch_optional(conn)
        .await
    }
}
