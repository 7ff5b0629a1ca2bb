//! Sign-in endpoints.
//!
//! Flow Overview:
//! 1) Run the pre-authentication hook; a result there ends the request.
//! 2) Local: check the password. External: link or provision the account.
//! 3) Map the outcome: success 200, bad credentials 401, refused sign-in 409.

use axum::{
    Json,
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use secrecy::SecretString;
use serde::Deserialize;
use std::{fmt, sync::Arc};
use utoipa::ToSchema;

use super::{authenticate_response, service_error_response};
use crate::api::Service;
use crate::identity::{AuthenticateResult, Claim, ExternalIdentity, SignInMessage};

const INVALID_CREDENTIALS: &str = "Invalid username or password.";

/// Sign-in request context forwarded to the hooks.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(default, deny_unknown_fields)]
pub struct SignInContext {
    pub client_id: Option<String>,
    pub idp: Option<String>,
    pub return_url: Option<String>,
    pub acr_values: Vec<String>,
}

impl From<SignInContext> for SignInMessage {
    fn from(context: SignInContext) -> Self {
        Self {
            client_id: context.client_id,
            idp: context.idp,
            return_url: context.return_url,
            acr_values: context.acr_values,
        }
    }
}

#[derive(Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct LocalAuthenticateRequest {
    pub username: String,
    #[schema(format = Password)]
    pub password: String,
    #[serde(default)]
    pub context: SignInContext,
}

impl fmt::Debug for LocalAuthenticateRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalAuthenticateRequest")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("context", &self.context)
            .finish()
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct ExternalAuthenticateRequest {
    pub provider: String,
    pub provider_id: String,
    #[serde(default)]
    pub claims: Vec<Claim>,
    #[serde(default)]
    pub context: SignInContext,
}

#[utoipa::path(
    post,
    path = "/v1/authenticate/local",
    request_body = LocalAuthenticateRequest,
    responses(
        (status = 200, description = "Signed in.", body = AuthenticateResult),
        (status = 401, description = "Unknown user, wrong password or locked account.", body = AuthenticateResult),
        (status = 409, description = "Sign-in refused by a hook.", body = AuthenticateResult),
        (status = 500, description = "Store failure."),
    ),
    tag = "authenticate"
)]
pub async fn local(
    service: Extension<Arc<Service>>,
    Json(request): Json<LocalAuthenticateRequest>,
) -> Response {
    let LocalAuthenticateRequest {
        username,
        password,
        context,
    } = request;
    let password = SecretString::from(password);
    let message = SignInMessage::from(context);

    match service.pre_authenticate(&message).await {
        Ok(Some(result)) => return authenticate_response(result),
        Ok(None) => {}
        Err(err) => return service_error_response(&err),
    }

    match service
        .authenticate_local(&username, &password, &message)
        .await
    {
        Ok(Some(result)) => authenticate_response(result),
        Ok(None) => (
            StatusCode::UNAUTHORIZED,
            Json(AuthenticateResult::failure(INVALID_CREDENTIALS)),
        )
            .into_response(),
        Err(err) => service_error_response(&err),
    }
}

#[utoipa::path(
    post,
    path = "/v1/authenticate/external",
    request_body = ExternalAuthenticateRequest,
    responses(
        (status = 200, description = "Signed in; the account is created on first sight.", body = AuthenticateResult),
        (status = 409, description = "The store refused to create or update the account.", body = AuthenticateResult),
        (status = 500, description = "Store failure."),
    ),
    tag = "authenticate"
)]
pub async fn external(
    service: Extension<Arc<Service>>,
    Json(request): Json<ExternalAuthenticateRequest>,
) -> Response {
    let message = SignInMessage::from(request.context);
    let identity = ExternalIdentity::new(request.provider, request.provider_id, request.claims);

    match service.pre_authenticate(&message).await {
        Ok(Some(result)) => return authenticate_response(result),
        Ok(None) => {}
        Err(err) => return service_error_response(&err),
    }

    match service.authenticate_external(&identity, &message).await {
        Ok(result) => authenticate_response(result),
        Err(err) => service_error_response(&err),
    }
}
