/// Campaigns and their owner-scoped and public queries
///
/// A campaign belongs to the user who created it. Owners see and edit only
/// their own rows; the public listing shows active campaigns. Deletion is soft:
/// `deleted_at` is set and every query ignores such rows.
///
/// `current_amount` is only ever changed by [`Campaign::add_to_current_amount`],
/// which callers run after locking the row with [`Campaign::lock_by_id`] or
/// [`Campaign::lock_by_slug`] inside a transaction.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE campaigns (
///     id BIGSERIAL PRIMARY KEY,
///     user_id BIGINT NOT NULL REFERENCES users(id),
///     title VARCHAR(100) NOT NULL,
///     description TEXT NOT NULL,
///     slug VARCHAR(50) NOT NULL UNIQUE,
///     target_amount BIGINT NOT NULL,
///     current_amount BIGINT NOT NULL DEFAULT 0,
///     start_date TIMESTAMP NOT NULL,
///     end_date TIMESTAMP NOT NULL,
///     status SMALLINT NOT NULL DEFAULT 1,
///     images TEXT[] NOT NULL DEFAULT '{}',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     deleted_at TIMESTAMPTZ
/// );
/// ```

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgExecutor};

/// Lifecycle status, stored and serialized as its numeric code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(try_from = "i16", into = "i16")]
#[repr(i16)]
pub enum CampaignStatus {
    Draft = 1,
    Active = 2,
    Completed = 3,
    Cancelled = 4,
}

impl CampaignStatus {
    pub fn code(self) -> i16 {
        self as i16
    }

    pub fn from_code(code: i16) -> Option<Self> {
        match code {
            1 => Some(CampaignStatus::Draft),
            2 => Some(CampaignStatus::Active),
            3 => Some(CampaignStatus::Completed),
            4 => Some(CampaignStatus::Cancelled),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignStatus::Draft => "draft",
            CampaignStatus::Active => "active",
            CampaignStatus::Completed => "completed",
            CampaignStatus::Cancelled => "cancelled",
        }
    }

    /// Whether the campaign currently accepts donations
    pub fn accepts_donations(&self) -> bool {
        matches!(self, CampaignStatus::Active)
    }
}

impl From<CampaignStatus> for i16 {
    fn from(status: CampaignStatus) -> Self {
        status.code()
    }
}

impl TryFrom<i16> for CampaignStatus {
    type Error = String;

    fn try_from(code: i16) -> Result<Self, Self::Error> {
        CampaignStatus::from_code(code).ok_or_else(|| format!("unknown campaign status {}", code))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Campaign {
    pub id: i64,

    /// Owner
    pub user_id: i64,

    pub title: String,

    pub description: String,

    pub slug: String,

    /// Whole currency units (IDR)
    pub target_amount: i64,

    /// Sum of paid donations
    pub current_amount: i64,

    pub start_date: NaiveDateTime,

    pub end_date: NaiveDateTime,

    pub status: CampaignStatus,

    /// Public URLs of uploaded images
    pub images: Vec<String>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Writable campaign fields, shared by create and update
#[derive(Debug, Clone, PartialEq)]
pub struct CampaignInput {
    pub title: String,
    pub description: String,
    pub slug: String,
    pub target_amount: i64,
    pub start_date: NaiveDateTime,
    pub end_date: NaiveDateTime,
    pub status: CampaignStatus,
    pub images: Vec<String>,
}

/// Optional filters for the owner listing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CampaignFilter {
    /// Case-insensitive substring of the title
    pub title: Option<String>,
    pub status: Option<CampaignStatus>,
}

impl CampaignFilter {
    fn title_pattern(&self) -> Option<String> {
        self.title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(|t| format!("%{}%", t.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")))
    }
}

impl Campaign {
    pub async fn create<'e>(
        executor: impl PgExecutor<'e>,
        user_id: i64,
        data: CampaignInput,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Campaign>(
            r#"
            INSERT INTO campaigns (user_id, title, description, slug, target_amount,
                                   start_date, end_date, status, images)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id, user_id, title, description, slug, target_amount, current_amount,
                      start_date, end_date, status, images, created_at, updated_at, deleted_at
            "#,
        )
        .bind(user_id)
        .bind(data.title)
        .bind(data.description)
        .bind(data.slug)
        .bind(data.target_amount)
        .bind(data.start_date)
        .bind(data.end_date)
        .bind(data.status)
        .bind(data.images)
        .fetch_one(executor)
        .await
    }

    /// Finds a live campaign only if `user_id` owns it
    pub async fn find_for_owner<'e>(
        executor: impl PgExecutor<'e>,
        id: i64,
        user_id: i64,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Campaign>(
            r#"
            SELECT id, user_id, title, description, slug, target_amount, current_amount,
                   start_date, end_date, status, images, created_at, updated_at, deleted_at
            FROM campaigns
            WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(executor)
        .await
    }

    /// Public lookup; drafts and deleted campaigns are not found
    pub async fn find_by_slug<'e>(executor: impl PgExecutor<'e>, slug: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Campaign>(
            r#"
            SELECT id, user_id, title, description, slug, target_amount, current_amount,
                   start_date, end_date, status, images, created_at, updated_at, deleted_at
            FROM campaigns
            WHERE slug = $1 AND deleted_at IS NULL AND status <> $2
            "#,
        )
        .bind(slug)
        .bind(CampaignStatus::Draft)
        .fetch_optional(executor)
        .await
    }

    /// Locks a live campaign row by slug until the surrounding transaction ends
    pub async fn lock_by_slug(conn: &mut PgConnection, slug: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Campaign>(
            r#"
            SELECT id, user_id, title, description, slug, target_amount, current_amount,
                   start_date, end_date, status, images, created_at, updated_at, deleted_at
            FROM campaigns
            WHERE slug = $1 AND deleted_at IS NULL
            FOR UPDATE
            "#,
        )
        .bind(slug)
        .fetch_optional(conn)
        .await
    }

    /// Locks a campaign row by id until the surrounding transaction ends
    ///
    /// Soft-deleted rows are included: a payment settled after deletion still
    /// has to be counted.
    pub async fn lock_by_id(conn: &mut PgConnection, id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Campaign>(
            r#"
            SELECT id, user_id, title, description, slug, target_amount, current_amount,
                   start_date, end_date, status, images, created_at, updated_at, deleted_at
            FROM campaigns
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(conn)
        .await
    }

    /// Owner listing, newest first
    pub async fn list_for_owner<'e>(
        executor: impl PgExecutor<'e>,
        user_id: i64,
        filter: &CampaignFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Campaign>(
            r#"
            SELECT id, user_id, title, description, slug, target_amount, current_amount,
                   start_date, end_date, status, images, created_at, updated_at, deleted_at
            FROM campaigns
            WHERE user_id = $1
              AND deleted_at IS NULL
              AND ($2::TEXT IS NULL OR title ILIKE $2)
              AND ($3::SMALLINT IS NULL OR status = $3)
            ORDER BY created_at DESC, id DESC
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(user_id)
        .bind(filter.title_pattern())
        .bind(filter.status)
        .bind(limit)
        .bind(offset)
        .fetch_all(executor)
        .await
    }

    pub async fn count_for_owner<'e>(
        executor: impl PgExecutor<'e>,
        user_id: i64,
        filter: &CampaignFilter,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM campaigns
            WHERE user_id = $1
              AND deleted_at IS NULL
              AND ($2::TEXT IS NULL OR title ILIKE $2)
              AND ($3::SMALLINT IS NULL OR status = $3)
            "#,
        )
        .bind(user_id)
        .bind(filter.title_pattern())
        .bind(filter.status)
        .fetch_one(executor)
        .await
    }

    /// Active campaigns, newest first
    pub async fn list_public<'e>(
        executor: impl PgExecutor<'e>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Campaign>(
            r#"
            SELECT id, user_id, title, description, slug, target_amount, current_amount,
                   start_date, end_date, status, images, created_at, updated_at, deleted_at
            FROM campaigns
            WHERE status = $1 AND deleted_at IS NULL
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(CampaignStatus::Active)
        .bind(limit)
        .bind(offset)
        .fetch_all(executor)
        .await
    }

    pub async fn count_public<'e>(executor: impl PgExecutor<'e>) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM campaigns WHERE status = $1 AND deleted_at IS NULL")
            .bind(CampaignStatus::Active)
            .fetch_one(executor)
            .await
    }

    /// Replaces the writable fields of an owned, live campaign
    pub async fn update<'e>(
        executor: impl PgExecutor<'e>,
        id: i64,
        user_id: i64,
        data: CampaignInput,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Campaign>(
            r#"
            UPDATE campaigns
            SET title = $3,
                description = $4,
                slug = $5,
                target_amount = $6,
                start_date = $7,
                end_date = $8,
                status = $9,
                images = $10,
                updated_at = NOW()
            WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL
            RETURNING id, user_id, title, description, slug, target_amount, current_amount,
                      start_date, end_date, status, images, created_at, updated_at, deleted_at
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(data.title)
        .bind(data.description)
        .bind(data.slug)
        .bind(data.target_amount)
        .bind(data.start_date)
        .bind(data.end_date)
        .bind(data.status)
        .bind(data.images)
        .fetch_optional(executor)
        .await
    }

    /// Marks an owned campaign deleted; returns false if nothing matched
    pub async fn soft_delete<'e>(executor: impl PgExecutor<'e>, id: i64, user_id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE campaigns
            SET deleted_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .bind(user_id)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Adds a settled payment to the running total, returning the new total
    pub async fn add_to_current_amount(conn: &mut PgConnection, id: i64, amount: i64) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            UPDATE campaigns
            SET current_amount = current_amount + $2, updated_at = NOW()
            WHERE id = $1
            RETURNING current_amount
            "#,
        )
        .bind(id)
        .bind(amount)
        .fetch_one(conn)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(CampaignStatus::Draft.code(), 1);
        assert_eq!(CampaignStatus::Cancelled.code(), 4);
        assert_eq!(CampaignStatus::from_code(2), Some(CampaignStatus::Active));
        assert_eq!(CampaignStatus::from_code(0), None);
        assert_eq!(CampaignStatus::from_code(5), None);
    }

    #[test]
    fn test_status_serializes_as_number() {
        assert_eq!(serde_json::to_string(&CampaignStatus::Active).unwrap(), "2");
        let parsed: CampaignStatus = serde_json::from_str("3").unwrap();
        assert_eq!(parsed, CampaignStatus::Completed);
        assert!(serde_json::from_str::<CampaignStatus>("9").is_err());
    }

    #[test]
    fn test_only_active_accepts_donations() {
        assert!(CampaignStatus::Active.accepts_donations());
        assert!(!CampaignStatus::Draft.accepts_donations());
        assert!(!CampaignStatus::Completed.accepts_donations());
        assert!(!CampaignStatus::Cancelled.accepts_donations());
    }

    #[test]
    fn test_title_filter_escapes_wildcards() {
        let filter = CampaignFilter {
            title: Some(" 100%_clean ".to_string()),
            status: None,
        };
        assert_eq!(filter.title_pattern().as_deref(), Some("%100\\%\\_clean%"));

        let blank = CampaignFilter {
            title: Some("   ".to_string()),
            status: None,
        };
        assert_eq!(blank.title_pattern(), None);
    }
}
