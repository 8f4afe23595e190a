/// Bearer-token authentication middleware for Axum
///
/// The middleware validates `Authorization: Bearer <token>`, and on success
/// inserts an [`AuthContext`] into the request extensions. Handlers take the
/// context directly as an extractor.
///
/// # Example
///
/// ```no_run
/// use axum::{middleware, routing::get, Router};
/// use campaign_shared::auth::middleware::{create_jwt_middleware, AuthContext};
///
/// async fn me(auth: AuthContext) -> String {
///     format!("user {}", auth.user_id)
/// }
///
/// let app: Router = Router::new()
///     .route("/me", get(me))
///     .layer(middleware::from_fn(create_jwt_middleware("secret".to_string())));
/// ```

use std::future::Future;
use std::pin::Pin;

use axum::{
    async_trait,
    extract::{FromRequestParts, Request},
    http::{header, request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::jwt::{validate_token, JwtError};

/// Identity of the caller, resolved from a validated token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    pub user_id: i64,
}

/// Error type for authentication middleware
#[derive(Debug, PartialEq, Eq)]
pub enum AuthError {
    MissingCredentials,
    InvalidFormat,
    InvalidToken(String),
}

impl AuthError {
    fn message(&self) -> String {
        match self {
            AuthError::MissingCredentials => "Missing authorization token".to_string(),
            AuthError::InvalidFormat => "Authorization header must be a Bearer token".to_string(),
            AuthError::InvalidToken(reason) => reason.clone(),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = json!({
            "status": "error",
            "message": "Unauthorized",
            "error": self.message(),
        });

        (StatusCode::UNAUTHORIZED, Json(body)).into_response()
    }
}

/// Pulls the bearer token out of the request headers
fn bearer_token(req: &Request) -> Result<&str, AuthError> {
    let value = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingCredentials)?;

    let token = value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .ok_or(AuthError::InvalidFormat)?;

    if token.is_empty() {
        return Err(AuthError::MissingCredentials);
    }

    Ok(token)
}

/// Validates the bearer token and attaches the caller's [`AuthContext`]
///
/// Returns 401 before the handler runs when the header is missing, malformed,
/// expired, or signed with another secret.
pub async fn jwt_auth_middleware(secret: String, mut req: Request, next: Next) -> Result<Response, AuthError> {
    let claims = validate_token(bearer_token(&req)?, &secret).map_err(|e| match e {
        JwtError::Expired => AuthError::InvalidToken("Token expired".to_string()),
        JwtError::MissingSecret => {
            tracing::error!("JWT secret is empty; rejecting authenticated request");
            AuthError::InvalidToken("Invalid token".to_string())
        }
        _ => AuthError::InvalidToken("Invalid token".to_string()),
    })?;

    req.extensions_mut().insert(AuthContext { user_id: claims.sub });

    Ok(next.run(req).await)
}

type MiddlewareFuture = Pin<Box<dyn Future<Output = Result<Response, AuthError>> + Send>>;

/// Captures the secret and returns a closure usable with `middleware::from_fn`
pub fn create_jwt_middleware(secret: String) -> impl Fn(Request, Next) -> MiddlewareFuture + Clone {
    move |req, next| {
        let secret = secret.clone();
        Box::pin(jwt_auth_middleware(secret, req, next))
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .copied()
            .ok_or(AuthError::MissingCredentials)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::{create_token, issue_token, Claims};
    use axum::{body::Body, http::Request, middleware, routing::get, Router};
    use chrono::Duration;
    use tower::ServiceExt;

    const SECRET: &str = "middleware-test-secret-32-bytes-long!";

    async fn whoami(auth: AuthContext) -> String {
        auth.user_id.to_string()
    }

    fn app() -> Router {
        Router::new()
            .route("/whoami", get(whoami))
            .layer(middleware::from_fn(create_jwt_middleware(SECRET.to_string())))
    }

    async fn status_for(authorization: Option<String>) -> StatusCode {
        let mut builder = Request::builder().uri("/whoami");
        if let Some(value) = authorization {
            builder = builder.header(header::AUTHORIZATION, value);
        }

        app().oneshot(builder.body(Body::empty()).unwrap()).await.unwrap().status()
    }

    #[tokio::test]
    async fn test_valid_token_reaches_handler() {
        let token = issue_token(99, SECRET).unwrap();
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/whoami")
                    .header(header::AUTHORIZATION, format!("Bearer {}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"99");
    }

    #[tokio::test]
    async fn test_missing_header_is_unauthorized() {
        assert_eq!(status_for(None).await, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_non_bearer_scheme_is_unauthorized() {
        assert_eq!(status_for(Some("Basic abc".to_string())).await, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_expired_token_is_unauthorized() {
        let claims = Claims::with_expiration(1, Duration::seconds(-60));
        let token = create_token(&claims, SECRET).unwrap();

        assert_eq!(status_for(Some(format!("Bearer {}", token))).await, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_token_from_other_secret_is_unauthorized() {
        let token = issue_token(1, "some-other-secret-that-is-long-enough").unwrap();
        assert_eq!(status_for(Some(format!("Bearer {}", token))).await, StatusCode::UNAUTHORIZED);
    }
}
