use crate::api::handlers::{authenticate, health, subjects};
use utoipa::openapi::{Contact, InfoBuilder, License, OpenApiBuilder, Tag};
use utoipa_axum::{router::OpenApiRouter, routes};

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    let (_router, openapi) = api_router().split_for_parts();
    openapi
}

/// Router that also drives the `OpenAPI` document.
///
/// Routes added outside (like `OPTIONS /health`) are not documented.
pub(crate) fn api_router() -> OpenApiRouter {
    OpenApiRouter::with_openapi(cargo_openapi())
        .routes(routes!(health::health))
        .routes(routes!(authenticate::local))
        .routes(routes!(authenticate::external))
        .routes(routes!(subjects::profile))
        .routes(routes!(subjects::active))
        .routes(routes!(subjects::sign_out))
}

fn api_tags() -> Vec<Tag> {
    let mut authenticate_tag = Tag::new("authenticate");
    authenticate_tag.description = Some("Local and external sign-in".to_string());
    let mut subjects_tag = Tag::new("subjects");
    subjects_tag.description = Some("Profile claims and liveness of signed-in subjects".to_string());
    vec![authenticate_tag, subjects_tag]
}

fn cargo_openapi() -> utoipa::openapi::OpenApi {
    let mut info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .description(optional_str(env!("CARGO_PKG_DESCRIPTION")))
        .build();

    info.contact = cargo_contact();
    info.license = cargo_license();

    OpenApiBuilder::new()
        .info(info)
        .tags(Some(api_tags()))
        .build()
}

fn cargo_contact() -> Option<Contact> {
    // Cargo authors are `;` separated and may include "Name <email>".
    let primary = env!("CARGO_PKG_AUTHORS").split(';').next().map(str::trim)?;
    let (name, email) = parse_author(primary);
    if name.is_none() && email.is_none() {
        return None;
    }

    let mut contact = Contact::new();
    contact.name = name.map(str::to_string);
    contact.email = email.map(str::to_string);
    Some(contact)
}

fn cargo_license() -> Option<License> {
    let identifier = optional_str(env!("CARGO_PKG_LICENSE"))?;
    let mut license = License::new(identifier);
    license.identifier = Some(identifier.to_string());
    Some(license)
}

fn optional_str(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() { None } else { Some(trimmed) }
}

fn parse_author(author: &str) -> (Option<&str>, Option<&str>) {
    match author.find('<') {
        Some(start) => (
            optional_str(&author[..start]),
            optional_str(author[start + 1..].trim_end_matches('>')),
        ),
        None => (optional_str(author), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_author_splits_name_and_email() {
        assert_eq!(
            parse_author("Team Permesi <team@permesi.dev>"),
            (Some("Team Permesi"), Some("team@permesi.dev"))
        );
        assert_eq!(parse_author("Solo"), (Some("Solo"), None));
        assert_eq!(parse_author("  "), (None, None));
    }

    #[test]
    fn openapi_documents_every_route() {
        let openapi = openapi();
        let paths: Vec<&String> = openapi.paths.paths.keys().collect();
        for expected in [
            "/health",
            "/v1/authenticate/local",
            "/v1/authenticate/external",
            "/v1/subjects/{sub}/profile",
            "/v1/subjects/{sub}/active",
            "/v1/subjects/{sub}/sign-out",
        ] {
            assert!(
                paths.iter().any(|path| path.as_str() == expected),
                "missing {expected} in {paths:?}"
            );
        }
        assert_eq!(openapi.info.title, env!("CARGO_PKG_NAME"));
    }

    #[test]
    fn openapi_describes_route_tags() {
        let tags = openapi().tags.unwrap_or_default();
        let names: Vec<&str> = tags.iter().map(|tag| tag.name.as_str()).collect();
        assert_eq!(names, vec!["authenticate", "subjects"]);
        assert!(tags.iter().all(|tag| tag.description.is_some()));
    }
}
