/// Payment gateway integration
///
/// The donation flow talks to the provider through the [`PaymentGateway`]
/// trait: it builds an [`InvoiceRequest`], receives a hosted-invoice URL, and
/// later receives the outcome through a webhook parsed by [`webhook`].
///
/// - `xendit`: HTTP implementation against the Xendit invoice API
/// - `webhook`: inbound invoice callback payload

pub mod webhook;
pub mod xendit;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use webhook::{InvoiceStatus, InvoiceWebhook, WebhookError};
pub use xendit::{XenditConfig, XenditGateway};

/// Currency of every invoice; amounts are whole rupiah
pub const CURRENCY: &str = "IDR";

/// Line item name used for donations
pub const DONATION_ITEM_NAME: &str = "Donation to campaign";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceItem {
    pub name: String,
    pub price: i64,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payer {
    pub name: String,
    pub email: String,
}

/// Everything the provider needs to open a hosted invoice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceRequest {
    /// Our transaction id, echoed back by the webhook
    pub external_id: Uuid,
    pub amount: i64,
    pub currency: String,
    pub description: String,
    pub payer: Payer,
    pub items: Vec<InvoiceItem>,
}

impl InvoiceRequest {
    /// Single-item invoice for a donation of `amount` to `campaign_title`
    pub fn for_donation(external_id: Uuid, amount: i64, payer: Payer, campaign_title: &str) -> Self {
        Self {
            external_id,
            amount,
            currency: CURRENCY.to_string(),
            description: format!("Donation to {}", campaign_title),
            payer,
            items: vec![InvoiceItem {
                name: DONATION_ITEM_NAME.to_string(),
                price: amount,
                quantity: 1,
            }],
        }
    }

    /// Sum of item prices times quantities
    pub fn items_total(&self) -> i64 {
        self.items.iter().map(|i| i.price.saturating_mul(i.quantity)).sum()
    }

    /// Rejects requests the provider would refuse
    pub fn check(&self) -> Result<(), PaymentError> {
        if self.amount <= 0 {
            return Err(PaymentError::InvalidRequest("amount must be positive".to_string()));
        }

        if !self.items.is_empty() && self.items_total() != self.amount {
            return Err(PaymentError::InvalidRequest(format!(
                "item total {} does not match amount {}",
                self.items_total(),
                self.amount
            )));
        }

        Ok(())
    }
}

/// Invoice opened by the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    /// Provider's invoice id
    pub id: String,
    /// Hosted page the donor is redirected to
    pub invoice_url: String,
}

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("invalid invoice request: {0}")]
    InvalidRequest(String),

    #[error("payment gateway did not answer within {0:?}")]
    Timeout(Duration),

    #[error("payment gateway request failed: {0}")]
    Transport(String),

    #[error("payment gateway rejected the request with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("unexpected payment gateway response: {0}")]
    InvalidResponse(String),
}

/// Hosted-invoice payment provider
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Name stored as the payment's vendor
    fn vendor(&self) -> &'static str;

    async fn create_invoice(&self, request: &InvoiceRequest) -> Result<Invoice, PaymentError>;
}
