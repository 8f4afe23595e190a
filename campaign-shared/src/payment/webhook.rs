/// Inbound invoice callbacks
///
/// The provider POSTs the invoice state whenever it changes. The payload is
/// parsed strictly enough to be safe to act on (the external id must be one
/// of our transaction UUIDs, amounts must be non-negative, `paid_at` must be
/// RFC 3339) and is otherwise kept as received for the audit column.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::payment::PaymentStatus;

/// Invoice status as reported by the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum InvoiceStatus {
    Pending,
    Paid,
    /// Paid and disbursed to the merchant balance
    Settled,
    Expired,
    Other(String),
}

impl From<String> for InvoiceStatus {
    fn from(value: String) -> Self {
        match value.to_ascii_uppercase().as_str() {
            "PENDING" => InvoiceStatus::Pending,
            "PAID" => InvoiceStatus::Paid,
            "SETTLED" => InvoiceStatus::Settled,
            "EXPIRED" => InvoiceStatus::Expired,
            _ => InvoiceStatus::Other(value),
        }
    }
}

impl From<InvoiceStatus> for String {
    fn from(status: InvoiceStatus) -> Self {
        status.to_string()
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvoiceStatus::Pending => f.write_str("PENDING"),
            InvoiceStatus::Paid => f.write_str("PAID"),
            InvoiceStatus::Settled => f.write_str("SETTLED"),
            InvoiceStatus::Expired => f.write_str("EXPIRED"),
            InvoiceStatus::Other(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookItem {
    pub name: String,
    #[serde(default)]
    pub quantity: f64,
    #[serde(default)]
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

/// Invoice callback body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceWebhook {
    /// Provider invoice id
    pub id: String,
    /// Our transaction id
    pub external_id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    pub status: InvoiceStatus,
    #[serde(default)]
    pub merchant_name: Option<String>,
    #[serde(default)]
    pub amount: f64,
    #[serde(default)]
    pub paid_amount: Option<f64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub payer_email: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub payment_channel: Option<String>,
    #[serde(default)]
    pub payment_id: Option<String>,
    #[serde(default)]
    pub payment_details: Option<HashMap<String, serde_json::Value>>,
    #[serde(default)]
    pub paid_at: Option<String>,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub updated: Option<String>,
    #[serde(default)]
    pub success_redirect_url: Option<String>,
    #[serde(default)]
    pub failure_redirect_url: Option<String>,
    #[serde(default)]
    pub items: Vec<WebhookItem>,
}

#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("malformed webhook payload: {0}")]
    Malformed(String),

    #[error("external_id {0:?} is not a transaction id")]
    InvalidExternalId(String),

    #[error("webhook carries a negative amount")]
    NegativeAmount,

    #[error("paid_at {0:?} is not an RFC 3339 timestamp")]
    InvalidTimestamp(String),
}

/// Parsed callback plus the payload exactly as received
#[derive(Debug, Clone)]
pub struct ParsedWebhook {
    pub payload: InvoiceWebhook,
    pub raw: serde_json::Value,
    pub transaction_id: Uuid,
    pub paid_at: Option<DateTime<Utc>>,
}

impl InvoiceWebhook {
    /// Parses and checks a callback body
    pub fn parse(body: &[u8]) -> Result<ParsedWebhook, WebhookError> {
        let raw: serde_json::Value =
            serde_json::from_slice(body).map_err(|e| WebhookError::Malformed(e.to_string()))?;
        let payload: InvoiceWebhook =
            serde_json::from_value(raw.clone()).map_err(|e| WebhookError::Malformed(e.to_string()))?;

        let transaction_id = payload.transaction_id()?;

        if payload.amount < 0.0 || payload.paid_amount.map_or(false, |a| a < 0.0) {
            return Err(WebhookError::NegativeAmount);
        }

        let paid_at = payload.paid_at()?;

        Ok(ParsedWebhook {
            payload,
            raw,
            transaction_id,
            paid_at,
        })
    }

    pub fn transaction_id(&self) -> Result<Uuid, WebhookError> {
        Uuid::parse_str(self.external_id.trim()).map_err(|_| WebhookError::InvalidExternalId(self.external_id.clone()))
    }

    /// Payment time, if the invoice was paid
    pub fn paid_at(&self) -> Result<Option<DateTime<Utc>>, WebhookError> {
        match self.paid_at.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(ts) => DateTime::parse_from_rfc3339(ts)
                .map(|dt| Some(dt.with_timezone(&Utc)))
                .map_err(|_| WebhookError::InvalidTimestamp(ts.to_string())),
        }
    }

    /// Settlement the payment should move to; anything short of paid lapses the invoice
    pub fn outcome(&self) -> PaymentStatus {
        match self.status {
            InvoiceStatus::Paid | InvoiceStatus::Settled => PaymentStatus::Paid,
            _ => PaymentStatus::Expired,
        }
    }

    /// Amount the provider reports as paid, in whole units
    pub fn paid_amount_units(&self) -> Option<i64> {
        self.paid_amount.map(|a| a.round() as i64)
    }
}
