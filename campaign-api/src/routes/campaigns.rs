/// Campaign management for the signed-in owner
///
/// - `GET    /api/v1/user/campaigns` - paginated, filter by `title` and `status`
/// - `POST   /api/v1/user/campaigns`
/// - `GET    /api/v1/user/campaigns/:id`
/// - `PUT    /api/v1/user/campaigns/:id`
/// - `DELETE /api/v1/user/campaigns/:id` (soft delete)
///
/// Campaigns of other owners answer 404, the same as missing ones.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::Json;
use campaign_shared::{
    auth::middleware::AuthContext,
    models::campaign::{Campaign, CampaignFilter, CampaignInput, CampaignStatus},
    pagination::{paginate, PageRequest},
    validation::{Field, Rule, Violation, Violations, DATETIME_FORMAT},
};
use chrono::NaiveDateTime;
use serde::Deserialize;
use tracing::info;

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    response::{ApiResponse, Created, PaginatedResponse},
};

/// Statuses an owner may set; completion and cancellation are not set by hand
const EDITABLE_STATUSES: &[&str] = &["1", "2"];

#[derive(Debug, Deserialize)]
pub struct ListCampaignsQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub title: Option<String>,
    pub status: Option<i16>,
}

/// Create/update body
#[derive(Debug, Default, Deserialize)]
pub struct CampaignRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub slug: Option<String>,
    pub target_amount: Option<i64>,
    /// `YYYY-MM-DD HH:MM:SS`
    pub start_date: Option<String>,
    /// `YYYY-MM-DD HH:MM:SS`
    pub end_date: Option<String>,
    /// 1 (draft) or 2 (active)
    pub status: Option<i64>,
    /// URLs returned by the image upload endpoint
    #[serde(default)]
    pub images: Vec<String>,
}

fn parse_datetime(value: &Option<String>) -> Option<NaiveDateTime> {
    value
        .as_deref()
        .and_then(|s| NaiveDateTime::parse_from_str(s, DATETIME_FORMAT).ok())
}

impl CampaignRequest {
    fn into_input(self) -> Option<CampaignInput> {
        let start_date = parse_datetime(&self.start_date)?;
        let end_date = parse_datetime(&self.end_date)?;
        let status = CampaignStatus::from_code(i16::try_from(self.status?).ok()?)?;

        Some(CampaignInput {
            title: self.title?.trim().to_string(),
            description: self.description?.trim().to_string(),
            slug: self.slug?.trim().to_string(),
            target_amount: self.target_amount?,
            start_date,
            end_date,
            status,
            images: self.images,
        })
    }
}

/// Validates a create (`campaign_id = None`) or update body
async fn validate_campaign(
    state: &AppState,
    req: CampaignRequest,
    campaign_id: Option<i64>,
) -> ApiResult<CampaignInput> {
    let slug_unique = match campaign_id {
        Some(id) => Rule::unique_except_id("campaigns", "slug", id),
        None => Rule::unique("campaigns", "slug"),
    };

    let fields = [
        Field::new("title", &req.title).rules([Rule::Required, Rule::MinLength(3), Rule::MaxLength(100)]),
        Field::new("description", &req.description).rules([
            Rule::Required,
            Rule::MinLength(10),
            Rule::MaxLength(500),
        ]),
        Field::new("slug", &req.slug).rules([Rule::Required, Rule::MinLength(3), Rule::MaxLength(50), slug_unique]),
        Field::new("target_amount", req.target_amount).rules([Rule::Required, Rule::Min(0)]),
        Field::new("start_date", &req.start_date).rules([Rule::Required, Rule::DateTime(DATETIME_FORMAT)]),
        Field::new("end_date", &req.end_date).rules([Rule::Required, Rule::DateTime(DATETIME_FORMAT)]),
        Field::new("status", req.status).rules([Rule::Required, Rule::OneOf(EDITABLE_STATUSES)]),
    ];

    let mut violations: Violations = state.validator.violations(&fields).await?;

    if !violations.has("start_date") && !violations.has("end_date") {
        if let (Some(start), Some(end)) = (parse_datetime(&req.start_date), parse_datetime(&req.end_date)) {
            if end <= start {
                violations.push(Violation::new("end_date", "end_date must be after start_date"));
            }
        }
    }

    for (index, url) in req.images.iter().enumerate() {
        if state.uploads.resolve_url(url).is_err() {
            let field = format!("images.{}", index);
            let message = format!("{} must be an image uploaded to this server", field);
            violations.push(Violation::new(field, message));
        }
    }

    violations.into_result()?;

    req.into_input()
        .ok_or_else(|| ApiError::BadRequest("Invalid campaign payload".to_string()))
}

fn campaign_id(path: Result<Path<i64>, PathRejection>) -> ApiResult<i64> {
    path.map(|Path(id)| id)
        .map_err(|_| ApiError::BadRequest("Campaign ID must be a valid integer".to_string()))
}

fn not_found() -> ApiError {
    ApiError::NotFound("Campaign not found".to_string())
}

pub async fn index(
    State(state): State<AppState>,
    auth: AuthContext,
    query: Result<Query<ListCampaignsQuery>, QueryRejection>,
) -> ApiResult<PaginatedResponse<Campaign>> {
    let Query(query) = query?;

    let status = match query.status {
        Some(code) => Some(
            CampaignStatus::from_code(code)
                .ok_or_else(|| ApiError::BadRequest(format!("Unknown campaign status {}", code)))?,
        ),
        None => None,
    };

    let filter = CampaignFilter {
        title: query.title,
        status,
    };

    let page = paginate(
        PageRequest::new(query.page, query.per_page),
        |limit, offset| Campaign::list_for_owner(&state.db, auth.user_id, &filter, limit, offset),
        Campaign::count_for_owner(&state.db, auth.user_id, &filter),
    )
    .await?;

    Ok(PaginatedResponse::new("Campaigns retrieved successfully", page))
}

pub async fn store(
    State(state): State<AppState>,
    auth: AuthContext,
    payload: Result<Json<CampaignRequest>, JsonRejection>,
) -> ApiResult<Created<Campaign>> {
    let Json(req) = payload?;
    let input = validate_campaign(&state, req, None).await?;

    let campaign = Campaign::create(&state.db, auth.user_id, input).await?;
    info!(campaign_id = campaign.id, user_id = auth.user_id, "Campaign created");

    Ok(Created(ApiResponse::success("Campaign created successfully", campaign)))
}

pub async fn show(
    State(state): State<AppState>,
    auth: AuthContext,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<ApiResponse<Campaign>> {
    let id = campaign_id(path)?;

    let campaign = Campaign::find_for_owner(&state.db, id, auth.user_id)
        .await?
        .ok_or_else(not_found)?;

    Ok(ApiResponse::success("Campaign retrieved successfully", campaign))
}

pub async fn update(
    State(state): State<AppState>,
    auth: AuthContext,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<CampaignRequest>, JsonRejection>,
) -> ApiResult<ApiResponse<Campaign>> {
    let id = campaign_id(path)?;
    let Json(req) = payload?;

    Campaign::find_for_owner(&state.db, id, auth.user_id)
        .await?
        .ok_or_else(not_found)?;

    let input = validate_campaign(&state, req, Some(id)).await?;

    let campaign = Campaign::update(&state.db, id, auth.user_id, input)
        .await?
        .ok_or_else(not_found)?;
    info!(campaign_id = id, "Campaign updated");

    Ok(ApiResponse::success("Campaign updated successfully", campaign))
}

pub async fn destroy(
    State(state): State<AppState>,
    auth: AuthContext,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<ApiResponse<()>> {
    let id = campaign_id(path)?;

    if !Campaign::soft_delete(&state.db, id, auth.user_id).await? {
        return Err(not_found());
    }
    info!(campaign_id = id, "Campaign deleted");

    Ok(ApiResponse::message("Campaign deleted successfully"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_request() -> CampaignRequest {
        CampaignRequest {
            title: Some("  Clean Water  ".to_string()),
            description: Some("Wells for three villages".to_string()),
            slug: Some("clean-water".to_string()),
            target_amount: Some(5_000_000),
            start_date: Some("2025-01-01 00:00:00".to_string()),
            end_date: Some("2025-06-30 23:59:59".to_string()),
            status: Some(2),
            images: vec![],
        }
    }

    #[test]
    fn test_into_input_parses_fields() {
        let input = valid_request().into_input().unwrap();

        assert_eq!(input.title, "Clean Water");
        assert_eq!(input.status, CampaignStatus::Active);
        assert_eq!(input.start_date.to_string(), "2025-01-01 00:00:00");
    }

    #[test]
    fn test_into_input_rejects_unknown_status() {
        let mut req = valid_request();
        req.status = Some(9);
        assert!(req.into_input().is_none());

        let mut req = valid_request();
        req.status = Some(i64::from(i16::MAX) + 1);
        assert!(req.into_input().is_none());
    }

    #[test]
    fn test_parse_datetime_requires_seconds() {
        assert!(parse_datetime(&Some("2025-01-01 10:00:00".to_string())).is_some());
        assert!(parse_datetime(&Some("2025-01-01 10:00".to_string())).is_none());
        assert!(parse_datetime(&None).is_none());
    }
}
