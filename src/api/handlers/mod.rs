pub mod authenticate;
pub mod health;
pub mod subjects;

// common functions for the handlers
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

use crate::identity::{AuthenticateResult, ServiceError};

/// Success maps to 200, a store-refused sign-in to 409.
pub(crate) fn authenticate_response(result: AuthenticateResult) -> Response {
    let status = if result.is_success() {
        StatusCode::OK
    } else {
        StatusCode::CONFLICT
    };
    (status, Json(result)).into_response()
}

pub(crate) fn service_error_response(err: &ServiceError) -> Response {
    match err {
        ServiceError::NotFound(_) => StatusCode::NOT_FOUND.into_response(),
        ServiceError::InvariantViolation(_) | ServiceError::Store(_) => {
            error!("Identity service failure: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
