/// Authentication endpoints
///
/// - `POST /api/v1/auth/register` - create an account and get a token
/// - `POST /api/v1/auth/login` - exchange credentials for a token
/// - `POST /api/v1/auth/logout` - end the session (tokens are stateless; the
///   client discards its token)

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use campaign_shared::{
    auth::{jwt, middleware::AuthContext, password},
    models::user::{CreateUser, User},
    validation::{Field, Rule},
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    response::{ApiResponse, Created},
};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

fn normalize_email(email: &Option<String>) -> Option<String> {
    email.as_deref().map(|e| e.trim().to_lowercase())
}

/// Registers a user
///
/// ```text
/// POST /api/v1/auth/register
///
/// { "name": "Jane", "email": "jane@example.com", "password": "secret123" }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: body is not JSON
/// - `422 Unprocessable Entity`: validation failed (email taken included)
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<Created<TokenResponse>> {
    let Json(req) = payload?;
    let name = req.name.as_deref().map(str::trim).map(str::to_string);
    let email = normalize_email(&req.email);

    state
        .validator
        .validate(&[
            Field::new("name", &name).rules([Rule::Required, Rule::MinLength(2), Rule::MaxLength(50)]),
            Field::new("email", &email).rules([Rule::Required, Rule::Email, Rule::unique("users", "email")]),
            Field::new("password", &req.password).rules([
                Rule::Required,
                Rule::MinLength(6),
                Rule::MaxLength(50),
            ]),
        ])
        .await?;

    let password_hash = password::hash_password(req.password.as_deref().unwrap_or_default())?;

    let user = User::create(
        &state.db,
        CreateUser {
            name: name.unwrap_or_default(),
            email: email.unwrap_or_default(),
            password_hash,
        },
    )
    .await?;

    let token = jwt::issue_token(user.id, state.jwt_secret())?;
    info!(user_id = user.id, "User registered");

    Ok(Created(ApiResponse::success(
        "User registered successfully",
        TokenResponse { token },
    )))
}

/// Logs a user in
///
/// # Errors
///
/// - `404 Not Found`: no user with that email
/// - `401 Unauthorized`: wrong password
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<ApiResponse<TokenResponse>> {
    let Json(req) = payload?;
    let email = normalize_email(&req.email);

    state
        .validator
        .validate(&[
            Field::new("email", &email).rules([Rule::Required, Rule::Email]),
            Field::new("password", &req.password).rule(Rule::Required),
        ])
        .await?;

    let user = User::find_by_email(&state.db, email.as_deref().unwrap_or_default())
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    let valid = password::verify_password(req.password.as_deref().unwrap_or_default(), &user.password)?;
    if !valid {
        return Err(ApiError::Unauthorized("Email & Password does not match".to_string()));
    }

    let token = jwt::issue_token(user.id, state.jwt_secret())?;
    info!(user_id = user.id, "User logged in");

    Ok(ApiResponse::success("User logged in successfully", TokenResponse { token }))
}

pub async fn logout(auth: AuthContext) -> ApiResponse<()> {
    info!(user_id = auth.user_id, "User logged out");
    ApiResponse::message("User logged out successfully")
}
