/// Donations
///
/// A donation records the pledged amount and note. Its settlement state lives
/// on the matching [`Payment`](super::payment::Payment), which references it
/// one-to-one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgExecutor};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Donation {
    pub id: i64,
    pub donor_id: i64,
    pub campaign_id: i64,
    pub amount: i64,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewDonation {
    pub donor_id: i64,
    pub campaign_id: i64,
    pub amount: i64,
    pub note: Option<String>,
}

impl Donation {
    pub async fn create(conn: &mut PgConnection, data: NewDonation) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Donation>(
            r#"
            INSERT INTO donations (donor_id, campaign_id, amount, note)
            VALUES ($1, $2, $3, $4)
            RETURNING id, donor_id, campaign_id, amount, note, created_at
            "#,
        )
        .bind(data.donor_id)
        .bind(data.campaign_id)
        .bind(data.amount)
        .bind(data.note)
        .fetch_one(conn)
        .await
    }

    pub async fn find_by_id<'e>(executor: impl PgExecutor<'e>, id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Donation>(
            "SELECT id, donor_id, campaign_id, amount, note, created_at FROM donations WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(executor)
        .await
    }
}
