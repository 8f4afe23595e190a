/// Xendit hosted-invoice client
///
/// Invoices are opened with `POST {base_url}/v2/invoices`, authenticated with
/// HTTP basic auth (secret key as the username, empty password). The call is
/// the only unbounded external dependency of a donation, so it runs under a
/// hard deadline: the client's own timeout plus an outer `tokio::time::timeout`
/// that also covers connection setup and body decoding.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use super::{Invoice, InvoiceRequest, PaymentError, PaymentGateway};

pub const DEFAULT_BASE_URL: &str = "https://api.xendit.co";
pub const VENDOR: &str = "xendit";

#[derive(Debug, Clone)]
pub struct XenditConfig {
    pub secret_key: String,
    pub base_url: String,
    pub timeout: Duration,
    pub success_redirect_url: Option<String>,
    pub failure_redirect_url: Option<String>,
}

impl XenditConfig {
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self {
            secret_key: secret_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(15),
            success_redirect_url: None,
            failure_redirect_url: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CreateInvoiceResponse {
    id: String,
    invoice_url: String,
}

#[derive(Debug, Clone)]
pub struct XenditGateway {
    client: reqwest::Client,
    config: XenditConfig,
}

impl XenditGateway {
    pub fn new(config: XenditConfig) -> Result<Self, PaymentError> {
        if config.secret_key.trim().is_empty() {
            return Err(PaymentError::InvalidRequest("Xendit secret key is empty".to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PaymentError::Transport(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn invoices_url(&self) -> String {
        format!("{}/v2/invoices", self.config.base_url.trim_end_matches('/'))
    }

    /// JSON body for the create-invoice call
    pub fn request_body(&self, request: &InvoiceRequest) -> serde_json::Value {
        let mut body = json!({
            "external_id": request.external_id.to_string(),
            "amount": request.amount,
            "currency": request.currency,
            "description": request.description,
            "payer_email": request.payer.email,
            "customer": {
                "given_names": request.payer.name,
                "email": request.payer.email,
            },
            "items": request.items.iter().map(|item| json!({
                "name": item.name,
                "price": item.price,
                "quantity": item.quantity,
            })).collect::<Vec<_>>(),
        });

        if let Some(url) = &self.config.success_redirect_url {
            body["success_redirect_url"] = json!(url);
        }
        if let Some(url) = &self.config.failure_redirect_url {
            body["failure_redirect_url"] = json!(url);
        }

        body
    }

    async fn send(&self, body: &impl Serialize) -> Result<Invoice, PaymentError> {
        let response = self
            .client
            .post(self.invoices_url())
            .basic_auth(&self.config.secret_key, None::<&str>)
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PaymentError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let created: CreateInvoiceResponse = response
            .json()
            .await
            .map_err(|e| PaymentError::InvalidResponse(e.to_string()))?;

        Ok(Invoice {
            id: created.id,
            invoice_url: created.invoice_url,
        })
    }

    fn transport_error(&self, e: reqwest::Error) -> PaymentError {
        if e.is_timeout() {
            PaymentError::Timeout(self.config.timeout)
        } else {
            PaymentError::Transport(e.to_string())
        }
    }
}

#[async_trait]
impl PaymentGateway for XenditGateway {
    fn vendor(&self) -> &'static str {
        VENDOR
    }

    async fn create_invoice(&self, request: &InvoiceRequest) -> Result<Invoice, PaymentError> {
        request.check()?;
        let body = self.request_body(request);

        debug!(external_id = %request.external_id, amount = request.amount, "Creating Xendit invoice");

        let invoice = tokio::time::timeout(self.config.timeout, self.send(&body))
            .await
            .map_err(|_| PaymentError::Timeout(self.config.timeout))?
            .map_err(|e| {
                warn!(external_id = %request.external_id, error = %e, "Xendit invoice creation failed");
                e
            })?;

        debug!(external_id = %request.external_id, invoice_id = %invoice.id, "Xendit invoice created");
        Ok(invoice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payment::Payer;
    use axum::{
        http::{header, HeaderMap, StatusCode},
        routing::post,
        Json, Router,
    };
    use std::sync::{Arc, Mutex};
    use uuid::Uuid;

    fn donation() -> InvoiceRequest {
        InvoiceRequest::for_donation(
            Uuid::new_v4(),
            75_000,
            Payer {
                name: "Sari".to_string(),
                email: "sari@example.com".to_string(),
            },
            "School Roof",
        )
    }

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn gateway(base_url: String, timeout: Duration) -> XenditGateway {
        let mut config = XenditConfig::new("xnd_development_secret");
        config.base_url = base_url;
        config.timeout = timeout;
        XenditGateway::new(config).unwrap()
    }

    #[test]
    fn test_empty_secret_is_rejected() {
        assert!(XenditGateway::new(XenditConfig::new("  ")).is_err());
    }

    #[test]
    fn test_request_body_is_deterministic() {
        let gw = gateway("http://localhost".to_string(), Duration::from_secs(1));
        let request = donation();

        let body = gw.request_body(&request);
        assert_eq!(body, gw.request_body(&request));
        assert_eq!(body["external_id"], request.external_id.to_string());
        assert_eq!(body["amount"], 75_000);
        assert_eq!(body["currency"], "IDR");
        assert_eq!(body["customer"]["email"], "sari@example.com");
        assert_eq!(body["items"][0]["name"], "Donation to campaign");
        assert_eq!(body["items"][0]["quantity"], 1);
        assert!(body.get("success_redirect_url").is_none());
    }

    #[tokio::test]
    async fn test_create_invoice_returns_hosted_url() {
        let seen: Arc<Mutex<Option<(String, serde_json::Value)>>> = Arc::default();
        let captured = seen.clone();

        let app = Router::new().route(
            "/v2/invoices",
            post(move |headers: HeaderMap, Json(body): Json<serde_json::Value>| {
                let captured = captured.clone();
                async move {
                    let auth = headers
                        .get(header::AUTHORIZATION)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default()
                        .to_string();
                    *captured.lock().unwrap() = Some((auth, body));
                    Json(serde_json::json!({
                        "id": "inv_123",
                        "invoice_url": "https://checkout.xendit.co/web/inv_123",
                        "status": "PENDING"
                    }))
                }
            }),
        );

        let gw = gateway(serve(app).await, Duration::from_secs(5));
        let request = donation();
        let invoice = gw.create_invoice(&request).await.unwrap();

        assert_eq!(invoice.id, "inv_123");
        assert_eq!(invoice.invoice_url, "https://checkout.xendit.co/web/inv_123");

        let (auth, body) = seen.lock().unwrap().clone().unwrap();
        assert!(auth.starts_with("Basic "));
        assert_eq!(body["external_id"], request.external_id.to_string());
    }

    #[tokio::test]
    async fn test_error_status_is_rejected() {
        let app = Router::new().route(
            "/v2/invoices",
            post(|| async { (StatusCode::BAD_REQUEST, r#"{"error_code":"API_VALIDATION_ERROR"}"#) }),
        );

        let gw = gateway(serve(app).await, Duration::from_secs(5));
        let err = gw.create_invoice(&donation()).await.unwrap_err();

        match err {
            PaymentError::Rejected { status, body } => {
                assert_eq!(status, 400);
                assert!(body.contains("API_VALIDATION_ERROR"));
            }
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_slow_gateway_times_out() {
        let app = Router::new().route(
            "/v2/invoices",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "late"
            }),
        );

        let gw = gateway(serve(app).await, Duration::from_millis(200));
        let err = gw.create_invoice(&donation()).await.unwrap_err();

        assert!(matches!(err, PaymentError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_unreachable_gateway_is_transport_error() {
        let gw = gateway("http://127.0.0.1:1".to_string(), Duration::from_secs(2));
        let err = gw.create_invoice(&donation()).await.unwrap_err();

        assert!(matches!(err, PaymentError::Transport(_) | PaymentError::Timeout(_)));
    }
}
