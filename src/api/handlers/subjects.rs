use axum::{
    Json,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

use super::service_error_response;
use crate::api::Service;
use crate::identity::ClaimSet;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ProfileQuery {
    /// Comma separated claim types; omitted or empty returns every claim.
    pub claims: Option<String>,
}

impl ProfileQuery {
    fn requested_types(&self) -> Vec<String> {
        self.claims
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|claim_type| !claim_type.is_empty())
            .map(str::to_string)
            .collect()
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ActiveResponse {
    pub active: bool,
}

#[utoipa::path(
    get,
    path = "/v1/subjects/{sub}/profile",
    params(
        ("sub" = String, Path, description = "Subject identifier"),
        ProfileQuery
    ),
    responses(
        (status = 200, description = "Claims describing the subject.", body = ClaimSet),
        (status = 404, description = "No account for this subject."),
        (status = 500, description = "Store failure."),
    ),
    tag = "subjects"
)]
pub async fn profile(
    Path(sub): Path<String>,
    Query(query): Query<ProfileQuery>,
    service: Extension<Arc<Service>>,
) -> Response {
    let requested = query.requested_types();
    match service.get_profile_data(&sub, Some(requested.as_slice())).await {
        Ok(claims) => (StatusCode::OK, Json(claims)).into_response(),
        Err(err) => service_error_response(&err),
    }
}

#[utoipa::path(
    get,
    path = "/v1/subjects/{sub}/active",
    params(
        ("sub" = String, Path, description = "Subject identifier")
    ),
    responses(
        (status = 200, description = "Whether the subject still maps to an account.", body = ActiveResponse),
        (status = 500, description = "Store failure."),
    ),
    tag = "subjects"
)]
pub async fn active(Path(sub): Path<String>, service: Extension<Arc<Service>>) -> Response {
    match service.is_active(&sub).await {
        Ok(active) => (StatusCode::OK, Json(ActiveResponse { active })).into_response(),
        Err(err) => service_error_response(&err),
    }
}

#[utoipa::path(
    post,
    path = "/v1/subjects/{sub}/sign-out",
    params(
        ("sub" = String, Path, description = "Subject identifier")
    ),
    responses(
        (status = 204, description = "Sign-out acknowledged."),
    ),
    tag = "subjects"
)]
pub async fn sign_out(Path(sub): Path<String>, service: Extension<Arc<Service>>) -> StatusCode {
    service.sign_out(&sub);
    StatusCode::NO_CONTENT
}
