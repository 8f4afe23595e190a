/// Donation initiation and webhook reconciliation against a real database
///
/// These tests need PostgreSQL; they are skipped when DATABASE_URL is unset.

mod common;

use std::sync::atomic::Ordering;

use campaign_shared::donations::{DonationError, DonationRequest, DonationService, Reconciliation};
use campaign_shared::models::campaign::CampaignStatus;
use campaign_shared::models::donation::Donation;
use campaign_shared::models::donor::Donor;
use campaign_shared::models::payment::{Payment, PaymentStatus};
use campaign_shared::models::user::User;
use campaign_shared::payment::webhook::{InvoiceWebhook, ParsedWebhook};
use common::*;
use serde_json::json;
use uuid::Uuid;

fn donation_request(slug: &str, donor_user_id: i64, amount: i64) -> DonationRequest {
    DonationRequest {
        campaign_slug: slug.to_string(),
        donor_user_id,
        amount,
        name: "Jane Donor".to_string(),
        email: "jane@example.com".to_string(),
        note: Some("Keep it up".to_string()),
    }
}

fn callback(transaction_id: Uuid, status: &str, amount: i64) -> ParsedWebhook {
    let body = json!({
        "id": format!("inv_{}", transaction_id.simple()),
        "external_id": transaction_id.to_string(),
        "status": status,
        "amount": amount,
        "paid_amount": amount,
        "payment_method": "BANK_TRANSFER",
        "paid_at": "2025-03-01T10:15:00.000Z",
        "currency": "IDR"
    });
    InvoiceWebhook::parse(body.to_string().as_bytes()).expect("valid callback")
}

#[tokio::test]
async fn test_initiate_records_pending_donation() {
    let Some(pool) = test_pool().await else { return };
    let owner = create_user(&pool).await;
    let donor = create_user(&pool).await;
    let campaign = create_campaign(&pool, owner.id, CampaignStatus::Active).await;
    let gateway = FakeGateway::ok();
    let service = DonationService::new(pool.clone(), gateway.clone());

    let receipt = service
        .initiate(donation_request(&campaign.slug, donor.id, 50_000))
        .await
        .expect("donation should be initiated");

    assert_eq!(gateway.calls.load(Ordering::SeqCst), 1);
    assert!(receipt.payment_link.contains(&receipt.transaction_id.to_string()));
    assert_eq!(count_where_campaign(&pool, "donors", campaign.id).await, 1);
    assert_eq!(count_where_campaign(&pool, "donations", campaign.id).await, 1);
    assert_eq!(count_where_campaign(&pool, "payments", campaign.id).await, 1);

    let payment = Payment::find_by_transaction_id(&pool, receipt.transaction_id)
        .await
        .unwrap()
        .expect("payment stored");
    assert_eq!(payment.status, PaymentStatus::Pending);
    assert_eq!(payment.amount, 50_000);
    assert_eq!(payment.donation_id, receipt.donation_id);
    assert_eq!(payment.link, receipt.payment_link);
    assert_eq!(current_amount(&pool, campaign.id).await, 0);

    let donation = Donation::find_by_id(&pool, receipt.donation_id)
        .await
        .unwrap()
        .expect("donation stored");
    assert_eq!(donation.amount, 50_000);
    assert_eq!(donation.note.as_deref(), Some("Keep it up"));
    assert_eq!(donation.donor_id, payment.donor_id);

    let stored_donor = User::find_by_id(&pool, donor.id).await.unwrap().expect("donor user");
    assert_eq!(stored_donor.email, donor.email);
}

#[tokio::test]
async fn test_gateway_failure_leaves_no_rows() {
    let Some(pool) = test_pool().await else { return };
    let owner = create_user(&pool).await;
    let donor = create_user(&pool).await;
    let campaign = create_campaign(&pool, owner.id, CampaignStatus::Active).await;
    let service = DonationService::new(pool.clone(), FakeGateway::failing());

    let result = service.initiate(donation_request(&campaign.slug, donor.id, 50_000)).await;

    assert!(matches!(result, Err(DonationError::Gateway(_))));
    assert_eq!(count_where_campaign(&pool, "donors", campaign.id).await, 0);
    assert_eq!(count_where_campaign(&pool, "donations", campaign.id).await, 0);
    assert_eq!(count_where_campaign(&pool, "payments", campaign.id).await, 0);
}

#[tokio::test]
async fn test_owner_cannot_donate_to_own_campaign() {
    let Some(pool) = test_pool().await else { return };
    let owner = create_user(&pool).await;
    let campaign = create_campaign(&pool, owner.id, CampaignStatus::Active).await;
    let gateway = FakeGateway::ok();
    let service = DonationService::new(pool.clone(), gateway.clone());

    let result = service.initiate(donation_request(&campaign.slug, owner.id, 50_000)).await;

    assert!(matches!(result, Err(DonationError::SelfDonation)));
    assert_eq!(gateway.calls.load(Ordering::SeqCst), 0);
    assert_eq!(count_where_campaign(&pool, "donors", campaign.id).await, 0);
}

#[tokio::test]
async fn test_inactive_and_unknown_campaigns_are_rejected() {
    let Some(pool) = test_pool().await else { return };
    let owner = create_user(&pool).await;
    let donor = create_user(&pool).await;
    let completed = create_campaign(&pool, owner.id, CampaignStatus::Completed).await;
    let service = DonationService::new(pool.clone(), FakeGateway::ok());

    let closed = service.initiate(donation_request(&completed.slug, donor.id, 10_000)).await;
    assert!(matches!(closed, Err(DonationError::CampaignClosed(CampaignStatus::Completed))));

    let missing = service
        .initiate(donation_request(&format!("missing-{}", suffix()), donor.id, 10_000))
        .await;
    assert!(matches!(missing, Err(DonationError::CampaignNotFound)));
}

#[tokio::test]
async fn test_paid_callback_credits_campaign_once() {
    let Some(pool) = test_pool().await else { return };
    let owner = create_user(&pool).await;
    let donor = create_user(&pool).await;
    let campaign = create_campaign(&pool, owner.id, CampaignStatus::Active).await;
    let service = DonationService::new(pool.clone(), FakeGateway::ok());

    let receipt = service
        .initiate(donation_request(&campaign.slug, donor.id, 75_000))
        .await
        .unwrap();

    let first = service
        .reconcile(callback(receipt.transaction_id, "PAID", 75_000))
        .await
        .unwrap();
    match first {
        Reconciliation::Paid { current_amount, amount, .. } => {
            assert_eq!(amount, 75_000);
            assert_eq!(current_amount, 75_000);
        }
        other => panic!("expected Paid, got {:?}", other),
    }

    let replay = service
        .reconcile(callback(receipt.transaction_id, "PAID", 75_000))
        .await
        .unwrap();
    assert_eq!(
        replay,
        Reconciliation::AlreadySettled {
            payment_id: receipt.payment_id,
            status: PaymentStatus::Paid,
        }
    );

    assert_eq!(current_amount(&pool, campaign.id).await, 75_000);

    let payment = Payment::find_by_transaction_id(&pool, receipt.transaction_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Paid);
    assert_eq!(payment.vendor.as_deref(), Some("xendit"));
    assert_eq!(payment.method.as_deref(), Some("BANK_TRANSFER"));
    assert!(payment.payment_date.is_some());
    assert!(payment.response.is_some());

    let donors = Donor::list_paid_for_campaign(&pool, campaign.id, 10, 0).await.unwrap();
    assert_eq!(donors.len(), 1);
    assert_eq!(donors[0].amount, 75_000);
}

#[tokio::test]
async fn test_expired_callback_leaves_amount_unchanged() {
    let Some(pool) = test_pool().await else { return };
    let owner = create_user(&pool).await;
    let donor = create_user(&pool).await;
    let campaign = create_campaign(&pool, owner.id, CampaignStatus::Active).await;
    let service = DonationService::new(pool.clone(), FakeGateway::ok());

    let receipt = service
        .initiate(donation_request(&campaign.slug, donor.id, 20_000))
        .await
        .unwrap();

    let result = service
        .reconcile(callback(receipt.transaction_id, "EXPIRED", 20_000))
        .await
        .unwrap();
    assert_eq!(result, Reconciliation::Expired { payment_id: receipt.payment_id });

    // A late PAID for an expired invoice is ignored.
    let late = service
        .reconcile(callback(receipt.transaction_id, "PAID", 20_000))
        .await
        .unwrap();
    assert!(matches!(late, Reconciliation::AlreadySettled { status: PaymentStatus::Expired, .. }));

    assert_eq!(current_amount(&pool, campaign.id).await, 0);
    assert_eq!(Donor::count_paid_for_campaign(&pool, campaign.id).await.unwrap(), 0);
}

#[tokio::test]
async fn test_unknown_transaction_is_reported() {
    let Some(pool) = test_pool().await else { return };
    let service = DonationService::new(pool.clone(), FakeGateway::ok());
    let transaction_id = Uuid::new_v4();

    let result = service.reconcile(callback(transaction_id, "PAID", 1_000)).await;

    assert!(matches!(result, Err(DonationError::PaymentNotFound(id)) if id == transaction_id));
}

#[tokio::test]
async fn test_concurrent_settlements_sum_to_current_amount() {
    let Some(pool) = test_pool().await else { return };
    let owner = create_user(&pool).await;
    let donor = create_user(&pool).await;
    let campaign = create_campaign(&pool, owner.id, CampaignStatus::Active).await;
    let service = DonationService::new(pool.clone(), FakeGateway::ok());

    let mut receipts = Vec::new();
    for amount in [10_000, 20_000, 30_000, 40_000] {
        receipts.push(
            service
                .initiate(donation_request(&campaign.slug, donor.id, amount))
                .await
                .unwrap(),
        );
    }

    let mut handles = Vec::new();
    for (receipt, amount) in receipts.iter().zip([10_000, 20_000, 30_000, 40_000]) {
        let service = service.clone();
        let transaction_id = receipt.transaction_id;
        handles.push(tokio::spawn(async move {
            // Each callback is delivered twice.
            let a = service.reconcile(callback(transaction_id, "PAID", amount)).await;
            let b = service.reconcile(callback(transaction_id, "SETTLED", amount)).await;
            (a.is_ok(), b.is_ok())
        }));
    }

    for handle in handles {
        assert_eq!(handle.await.unwrap(), (true, true));
    }

    let paid_sum: i64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(amount), 0)::BIGINT FROM payments WHERE campaign_id = $1 AND status = 'paid'",
    )
    .bind(campaign.id)
    .fetch_one(&pool)
    .await
    .unwrap();

    assert_eq!(paid_sum, 100_000);
    assert_eq!(current_amount(&pool, campaign.id).await, paid_sum);
}
