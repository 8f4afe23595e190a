#![allow(dead_code)]

/// Shared fixtures for database-backed tests
///
/// Tests connect to `DATABASE_URL` and skip themselves when it is not set.
/// Every fixture row carries a random suffix so tests can run in parallel
/// against the same database.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use campaign_shared::db::migrations::run_migrations;
use campaign_shared::db::pool::{create_pool, DatabaseConfig};
use campaign_shared::models::campaign::{Campaign, CampaignInput, CampaignStatus};
use campaign_shared::models::user::{CreateUser, User};
use campaign_shared::payment::{Invoice, InvoiceRequest, PaymentError, PaymentGateway};
use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

/// Connects and migrates, or returns `None` when no database is configured
pub async fn test_pool() -> Option<PgPool> {
    let url = match std::env::var("DATABASE_URL") {
        Ok(url) if !url.is_empty() => url,
        _ => {
            eprintln!("DATABASE_URL not set; skipping database test");
            return None;
        }
    };

    let mut config = DatabaseConfig::new(url);
    config.max_connections = 5;
    config.min_connections = 0;

    let pool = create_pool(config).await.expect("Failed to connect to test database");
    run_migrations(&pool).await.expect("Failed to run migrations");
    Some(pool)
}

pub fn suffix() -> String {
    Uuid::new_v4().simple().to_string()[..12].to_string()
}

pub async fn create_user(pool: &PgPool) -> User {
    User::create(
        pool,
        CreateUser {
            name: "Test User".to_string(),
            email: format!("user-{}@example.com", suffix()),
            password_hash: "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA".to_string(),
        },
    )
    .await
    .expect("Failed to create user")
}

pub fn campaign_input(status: CampaignStatus) -> CampaignInput {
    let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
    let end = NaiveDate::from_ymd_opt(2025, 12, 31).unwrap().and_hms_opt(23, 59, 59).unwrap();

    CampaignInput {
        title: "Clean Water for Sumba".to_string(),
        description: "Wells and pipes for three villages".to_string(),
        slug: format!("water-{}", suffix()),
        target_amount: 10_000_000,
        start_date: start,
        end_date: end,
        status,
        images: vec![],
    }
}

pub async fn create_campaign(pool: &PgPool, owner_id: i64, status: CampaignStatus) -> Campaign {
    Campaign::create(pool, owner_id, campaign_input(status))
        .await
        .expect("Failed to create campaign")
}

pub async fn count_where_campaign(pool: &PgPool, table: &str, campaign_id: i64) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {} WHERE campaign_id = $1", table))
        .bind(campaign_id)
        .fetch_one(pool)
        .await
        .expect("count query failed")
}

pub async fn current_amount(pool: &PgPool, campaign_id: i64) -> i64 {
    sqlx::query_scalar("SELECT current_amount FROM campaigns WHERE id = $1")
        .bind(campaign_id)
        .fetch_one(pool)
        .await
        .expect("campaign lookup failed")
}

/// Gateway double: succeeds with a predictable URL or fails every call
pub struct FakeGateway {
    fail: bool,
    pub calls: AtomicUsize,
}

impl FakeGateway {
    pub fn ok() -> Arc<Self> {
        Arc::new(Self {
            fail: false,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    fn vendor(&self) -> &'static str {
        "xendit"
    }

    async fn create_invoice(&self, request: &InvoiceRequest) -> Result<Invoice, PaymentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.fail {
            return Err(PaymentError::Rejected {
                status: 503,
                body: "gateway unavailable".to_string(),
            });
        }

        Ok(Invoice {
            id: format!("inv_{}", request.external_id.simple()),
            invoice_url: format!("https://checkout.example.test/{}", request.external_id),
        })
    }
}
