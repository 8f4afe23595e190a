/// Image upload endpoints
///
/// - `POST   /api/v1/images/:module` - multipart upload, `campaign` or `default`
/// - `DELETE /api/v1/images` - remove a file the caller uploaded, by its URL

use axum::{
    extract::{
        multipart::MultipartRejection,
        rejection::JsonRejection,
        Multipart, Path, State,
    },
    Json,
};
use bytes::Bytes;
use campaign_shared::{
    auth::middleware::AuthContext,
    uploads::UploadPolicy,
    validation::{Field, Rule, Violation, Violations},
};
use serde::{Deserialize, Serialize};

use crate::{
    app::{AppState, MAX_UPLOAD_FILES},
    error::{ApiError, ApiResult},
    response::ApiResponse,
};

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadedImages {
    pub images: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteImageRequest {
    pub url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeletedImage {
    pub url: String,
}

/// Reads every file sent under the policy's field name
async fn collect_files(multipart: &mut Multipart, field_name: &str) -> Result<Vec<Bytes>, ApiError> {
    let mut files = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(field_name) {
            continue;
        }

        if files.len() == MAX_UPLOAD_FILES {
            return Err(ApiError::BadRequest(format!(
                "At most {} files may be uploaded at once",
                MAX_UPLOAD_FILES
            )));
        }

        files.push(field.bytes().await?);
    }

    Ok(files)
}

/// Checks every file before any is written
fn check_files(policy: &UploadPolicy, files: &[Bytes]) -> Result<(), ApiError> {
    let mut violations = Violations::default();

    for (i, bytes) in files.iter().enumerate() {
        if let Err(e) = policy.check(bytes) {
            violations.push(Violation::new(format!("{}.{}", policy.field_name, i), e.to_string()));
        }
    }

    Ok(violations.into_result()?)
}

pub async fn upload(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(module): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<ApiResponse<UploadedImages>> {
    let policy = UploadPolicy::for_module(&module)?;
    let mut multipart = multipart?;

    let files = collect_files(&mut multipart, policy.field_name).await?;
    if files.is_empty() {
        return Err(ApiError::BadRequest("No files uploaded".to_string()));
    }

    check_files(&policy, &files)?;

    let mut images = Vec::with_capacity(files.len());
    for bytes in &files {
        let stored = state.uploads.store(&policy, auth.user_id, bytes).await?;
        images.push(stored.url);
    }

    tracing::info!(user_id = auth.user_id, module = %module, count = images.len(), "Images uploaded");

    Ok(ApiResponse::success("Images uploaded successfully", UploadedImages { images }))
}

pub async fn destroy(
    State(state): State<AppState>,
    auth: AuthContext,
    payload: Result<Json<DeleteImageRequest>, JsonRejection>,
) -> ApiResult<ApiResponse<DeletedImage>> {
    let Json(req) = payload?;
    let url = req.url.as_deref().map(str::trim).map(str::to_string);

    state
        .validator
        .validate(&[Field::new("url", &url).rule(Rule::Required)])
        .await?;

    let url = url.unwrap_or_default();
    state.uploads.remove_by_url(&url, auth.user_id).await?;

    tracing::info!(user_id = auth.user_id, url = %url, "Image deleted");

    Ok(ApiResponse::success("Image deleted successfully", DeletedImage { url }))
}
