/// Payment provider callbacks
///
/// Xendit posts invoice status changes to `POST /api/v1/payments/webhook`.
/// The body is read raw so it can be stored exactly as received.

use axum::{extract::State, http::HeaderMap};
use bytes::Bytes;
use campaign_shared::{
    auth::callback::{verify_callback_token, CALLBACK_TOKEN_HEADER},
    donations::Reconciliation,
    payment::InvoiceWebhook,
};

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    response::ApiResponse,
};

fn check_callback_token(expected: Option<&str>, headers: &HeaderMap) -> Result<(), ApiError> {
    let Some(expected) = expected else {
        return Ok(());
    };

    let presented = headers
        .get(CALLBACK_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if verify_callback_token(expected, presented) {
        Ok(())
    } else {
        tracing::warn!("Rejected payment callback with invalid token");
        Err(ApiError::Unauthorized("Invalid callback token".to_string()))
    }
}

/// Applies an invoice callback
///
/// Responds 200 once the callback is applied or was already applied, so the
/// provider stops retrying. Any other status makes it retry later.
pub async fn xendit_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<ApiResponse<Reconciliation>> {
    check_callback_token(state.config.payment.callback_token.as_deref(), &headers)?;

    let webhook = InvoiceWebhook::parse(&body)?;

    tracing::info!(
        transaction_id = %webhook.transaction_id,
        status = ?webhook.payload.status,
        "Payment callback received"
    );

    let reconciliation = state.donations.reconcile(webhook).await?;

    Ok(ApiResponse::success("Webhook callback received successfully", reconciliation))
}
