/// Donation initiation and webhook reconciliation
///
/// Both flows run as a single database transaction through
/// [`scoped`](crate::db::transaction::scoped):
///
/// - **initiate** locks the campaign row, writes donor and donation, opens an
///   invoice with the gateway and records a pending payment. Any failure,
///   including a gateway error or timeout, rolls all of it back.
/// - **reconcile** locks the payment row by transaction id and applies the
///   provider's outcome once. A payment that is no longer pending is left
///   alone, so replayed callbacks never add to a campaign twice.
///
/// The campaign row lock serializes concurrent donations and settlements of
/// the same campaign, so `current_amount` always equals the sum of its paid
/// payments.

use std::sync::Arc;

use serde::Serialize;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::transaction::scoped;
use crate::models::campaign::{Campaign, CampaignStatus};
use crate::models::donation::{Donation, NewDonation};
use crate::models::donor::{Donor, NewDonor};
use crate::models::payment::{NewPayment, Payment, PaymentStatus, Settlement};
use crate::payment::webhook::ParsedWebhook;
use crate::payment::{InvoiceRequest, Payer, PaymentError, PaymentGateway};

/// A validated donation attempt
#[derive(Debug, Clone)]
pub struct DonationRequest {
    pub campaign_slug: String,
    /// Authenticated user making the donation
    pub donor_user_id: i64,
    pub amount: i64,
    pub name: String,
    pub email: String,
    pub note: Option<String>,
}

/// Result of a successful initiation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DonationReceipt {
    pub transaction_id: Uuid,
    pub donation_id: i64,
    pub payment_id: i64,
    /// Hosted invoice the donor should be redirected to
    pub payment_link: String,
}

/// What a callback did to the payment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Reconciliation {
    Paid {
        payment_id: i64,
        campaign_id: i64,
        amount: i64,
        current_amount: i64,
    },
    Expired {
        payment_id: i64,
    },
    /// Callback replayed for a payment already settled; nothing was written
    AlreadySettled {
        payment_id: i64,
        status: PaymentStatus,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum DonationError {
    #[error("campaign not found")]
    CampaignNotFound,

    #[error("Cannot donate to your own campaign")]
    SelfDonation,

    #[error("campaign is {} and not accepting donations", .0.as_str())]
    CampaignClosed(CampaignStatus),

    #[error("donation amount must be positive")]
    InvalidAmount,

    #[error("no payment with transaction id {0}")]
    PaymentNotFound(Uuid),

    #[error(transparent)]
    Gateway(#[from] PaymentError),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[derive(Clone)]
pub struct DonationService {
    pool: PgPool,
    gateway: Arc<dyn PaymentGateway>,
}

impl DonationService {
    pub fn new(pool: PgPool, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self { pool, gateway }
    }

    /// Records a pending donation and returns the invoice link
    ///
    /// # Errors
    ///
    /// - `CampaignNotFound` when no live campaign has the slug
    /// - `SelfDonation` when the donor owns the campaign
    /// - `CampaignClosed` when the campaign is not active
    /// - `Gateway` when the invoice could not be opened; nothing is persisted
    pub async fn initiate(&self, request: DonationRequest) -> Result<DonationReceipt, DonationError> {
        if request.amount <= 0 {
            return Err(DonationError::InvalidAmount);
        }

        let gateway = Arc::clone(&self.gateway);

        scoped(&self.pool, move |conn| {
            Box::pin(async move {
                let campaign = Campaign::lock_by_slug(&mut *conn, &request.campaign_slug)
                    .await?
                    .ok_or(DonationError::CampaignNotFound)?;

                if campaign.user_id == request.donor_user_id {
                    return Err(DonationError::SelfDonation);
                }

                if !campaign.status.accepts_donations() {
                    return Err(DonationError::CampaignClosed(campaign.status));
                }

                let donor = Donor::create(
                    &mut *conn,
                    NewDonor {
                        campaign_id: campaign.id,
                        user_id: request.donor_user_id,
                        name: request.name.clone(),
                        email: request.email.clone(),
                    },
                )
                .await?;

                let donation = Donation::create(
                    &mut *conn,
                    NewDonation {
                        donor_id: donor.id,
                        campaign_id: campaign.id,
                        amount: request.amount,
                        note: request.note,
                    },
                )
                .await?;

                let transaction_id = Uuid::new_v4();
                let invoice_request = InvoiceRequest::for_donation(
                    transaction_id,
                    request.amount,
                    Payer {
                        name: request.name,
                        email: request.email,
                    },
                    &campaign.title,
                );

                let invoice = gateway.create_invoice(&invoice_request).await?;

                let payment = Payment::create_pending(
                    &mut *conn,
                    NewPayment {
                        transaction_id,
                        donor_id: donor.id,
                        donation_id: donation.id,
                        campaign_id: campaign.id,
                        amount: request.amount,
                        link: invoice.invoice_url.clone(),
                    },
                )
                .await?;

                info!(
                    campaign_id = campaign.id,
                    donation_id = donation.id,
                    %transaction_id,
                    amount = request.amount,
                    "Donation initiated"
                );

                Ok::<_, DonationError>(DonationReceipt {
                    transaction_id,
                    donation_id: donation.id,
                    payment_id: payment.id,
                    payment_link: invoice.invoice_url,
                })
            })
        })
        .await
    }

    /// Applies a provider callback to its payment, at most once
    pub async fn reconcile(&self, webhook: ParsedWebhook) -> Result<Reconciliation, DonationError> {
        let vendor = self.gateway.vendor();

        scoped(&self.pool, move |conn| {
            Box::pin(async move {
                let transaction_id = webhook.transaction_id;
                let payment = Payment::lock_by_transaction_id(&mut *conn, transaction_id)
                    .await?
                    .ok_or(DonationError::PaymentNotFound(transaction_id))?;

                let outcome = webhook.payload.outcome();

                if !payment.status.can_transition_to(outcome) {
                    info!(
                        %transaction_id,
                        status = payment.status.as_str(),
                        reported = %webhook.payload.status,
                        "Payment already settled; ignoring callback"
                    );
                    return Ok(Reconciliation::AlreadySettled {
                        payment_id: payment.id,
                        status: payment.status,
                    });
                }

                let settled = Payment::settle(
                    &mut *conn,
                    payment.id,
                    Settlement {
                        status: outcome,
                        vendor: vendor.to_string(),
                        method: webhook.payload.payment_method.clone(),
                        response: webhook.raw,
                        payment_date: webhook.paid_at,
                    },
                )
                .await?;

                // The row is locked, so this only fails if the lock was bypassed.
                let Some(settled) = settled else {
                    return Ok(Reconciliation::AlreadySettled {
                        payment_id: payment.id,
                        status: payment.status,
                    });
                };

                if outcome != PaymentStatus::Paid {
                    info!(%transaction_id, payment_id = settled.id, "Payment expired");
                    return Ok(Reconciliation::Expired { payment_id: settled.id });
                }

                if let Some(paid) = webhook.payload.paid_amount_units() {
                    if paid != settled.amount {
                        warn!(
                            %transaction_id,
                            expected = settled.amount,
                            paid,
                            "Provider paid amount differs from donation amount"
                        );
                    }
                }

                // Soft-deleted campaigns are still locked and credited.
                let campaign = Campaign::lock_by_id(&mut *conn, settled.campaign_id)
                    .await?
                    .ok_or(DonationError::CampaignNotFound)?;

                let current_amount = Campaign::add_to_current_amount(&mut *conn, campaign.id, settled.amount).await?;

                info!(
                    %transaction_id,
                    campaign_id = campaign.id,
                    amount = settled.amount,
                    current_amount,
                    "Payment settled"
                );

                Ok::<_, DonationError>(Reconciliation::Paid {
                    payment_id: settled.id,
                    campaign_id: campaign.id,
                    amount: settled.amount,
                    current_amount,
                })
            })
        })
        .await
    }
}
