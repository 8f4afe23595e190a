/// Public campaign endpoints and donations
///
/// - `GET  /api/v1/campaigns` - active campaigns, paginated
/// - `GET  /api/v1/campaigns/:slug` - one campaign (drafts are hidden)
/// - `GET  /api/v1/campaigns/:slug/donors` - donors with a paid donation, paginated
/// - `POST /api/v1/campaigns/:slug/donate` - start a donation (requires auth)

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::Json;
use campaign_shared::{
    auth::middleware::AuthContext,
    donations::DonationRequest,
    models::{campaign::Campaign, donor::Donor, donor::PaidDonor},
    pagination::{paginate, PageRequest},
    validation::{Field, Rule},
};
use serde::{Deserialize, Serialize};

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    response::{ApiResponse, PaginatedResponse},
};

pub const DONATION_THANK_YOU: &str =
    "Thank you for your donation! You will be redirected to the payment page shortly.";

#[derive(Debug, Deserialize)]
pub struct DonateRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    /// Whole rupiah
    pub amount: Option<i64>,
    pub note: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DonateResponse {
    pub message: String,
    /// Hosted invoice to redirect the donor to
    pub link: String,
}

fn not_found() -> ApiError {
    ApiError::NotFound("Campaign not found".to_string())
}

pub async fn index(
    State(state): State<AppState>,
    query: Result<Query<PageRequest>, QueryRejection>,
) -> ApiResult<PaginatedResponse<Campaign>> {
    let Query(page_request) = query?;

    let page = paginate(
        page_request,
        |limit, offset| Campaign::list_public(&state.db, limit, offset),
        Campaign::count_public(&state.db),
    )
    .await?;

    Ok(PaginatedResponse::new("Campaigns retrieved successfully", page))
}

pub async fn show(State(state): State<AppState>, Path(slug): Path<String>) -> ApiResult<ApiResponse<Campaign>> {
    let campaign = Campaign::find_by_slug(&state.db, &slug)
        .await?
        .ok_or_else(not_found)?;

    Ok(ApiResponse::success("Campaign retrieved successfully", campaign))
}

pub async fn donors(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    query: Result<Query<PageRequest>, QueryRejection>,
) -> ApiResult<PaginatedResponse<PaidDonor>> {
    let Query(page_request) = query?;

    let campaign = Campaign::find_by_slug(&state.db, &slug)
        .await?
        .ok_or_else(not_found)?;

    let page = paginate(
        page_request,
        |limit, offset| Donor::list_paid_for_campaign(&state.db, campaign.id, limit, offset),
        Donor::count_paid_for_campaign(&state.db, campaign.id),
    )
    .await?;

    Ok(PaginatedResponse::new("Donors retrieved successfully", page))
}

/// Starts a donation and returns the payment link
///
/// ```text
/// POST /api/v1/campaigns/:slug/donate
/// Authorization: Bearer <token>
///
/// { "name": "Jane", "email": "jane@example.com", "amount": 50000, "note": "Good luck" }
/// ```
///
/// # Errors
///
/// - `422`: validation failed; nothing is written
/// - `404`: no live campaign with that slug
/// - `400`: own campaign, or campaign not active
/// - `502`: the payment gateway failed; nothing is written
pub async fn donate(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(slug): Path<String>,
    payload: Result<Json<DonateRequest>, JsonRejection>,
) -> ApiResult<ApiResponse<DonateResponse>> {
    let Json(req) = payload?;
    let name = req.name.as_deref().map(str::trim).map(str::to_string);
    let email = req.email.as_deref().map(str::trim).map(str::to_string);
    let note = req
        .note
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string);

    state
        .validator
        .validate(&[
            Field::new("name", &name).rules([Rule::Required, Rule::MinLength(3), Rule::MaxLength(100)]),
            Field::new("email", &email).rules([Rule::Required, Rule::Email]),
            Field::new("amount", req.amount).rules([Rule::Required, Rule::Min(1)]),
            Field::new("note", &note).rule(Rule::MaxLength(500)),
        ])
        .await?;

    let receipt = state
        .donations
        .initiate(DonationRequest {
            campaign_slug: slug,
            donor_user_id: auth.user_id,
            amount: req.amount.unwrap_or_default(),
            name: name.unwrap_or_default(),
            email: email.unwrap_or_default(),
            note,
        })
        .await?;

    Ok(ApiResponse::success(
        "Donation successful",
        DonateResponse {
            message: DONATION_THANK_YOU.to_string(),
            link: receipt.payment_link,
        },
    ))
}
