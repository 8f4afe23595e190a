/// Donors ("donatur")
///
/// One donor row is written per donation attempt and records the name and
/// email the donating user chose to show for that donation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgExecutor};

use super::payment::PaymentStatus;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Donor {
    pub id: i64,
    pub campaign_id: i64,
    pub user_id: i64,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewDonor {
    pub campaign_id: i64,
    pub user_id: i64,
    pub name: String,
    pub email: String,
}

/// Public view of a settled donation; the donor's email is left out
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PaidDonor {
    pub id: i64,
    pub name: String,
    pub amount: i64,
    pub note: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
}

impl Donor {
    pub async fn create(conn: &mut PgConnection, data: NewDonor) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Donor>(
            r#"
            INSERT INTO donors (campaign_id, user_id, name, email)
            VALUES ($1, $2, $3, $4)
            RETURNING id, campaign_id, user_id, name, email, created_at
            "#,
        )
        .bind(data.campaign_id)
        .bind(data.user_id)
        .bind(data.name)
        .bind(data.email)
        .fetch_one(conn)
        .await
    }

    /// Donors whose payment for `campaign_id` has been settled as paid, latest first
    pub async fn list_paid_for_campaign<'e>(
        executor: impl PgExecutor<'e>,
        campaign_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<PaidDonor>, sqlx::Error> {
        sqlx::query_as::<_, PaidDonor>(
            r#"
            SELECT d.id, d.name, dn.amount, dn.note, p.payment_date AS paid_at
            FROM payments p
            JOIN donors d ON d.id = p.donor_id
            JOIN donations dn ON dn.id = p.donation_id
            WHERE p.campaign_id = $1 AND p.status = $2
            ORDER BY p.payment_date DESC NULLS LAST, p.id DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(campaign_id)
        .bind(PaymentStatus::Paid)
        .bind(limit)
        .bind(offset)
        .fetch_all(executor)
        .await
    }

    pub async fn count_paid_for_campaign<'e>(executor: impl PgExecutor<'e>, campaign_id: i64) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM payments WHERE campaign_id = $1 AND status = $2")
            .bind(campaign_id)
            .bind(PaymentStatus::Paid)
            .fetch_one(executor)
            .await
    }
}
