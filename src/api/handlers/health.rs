//! Health probe: process metadata plus a database ping.

use crate::GIT_COMMIT_HASH;
use axum::{
    body::Body,
    extract::Extension,
    http::{HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use sqlx::{Connection, PgPool};
use tokio::time::{Duration, timeout};
use tracing::{Instrument, debug, error, info_span, warn};
use utoipa::ToSchema;

const HEALTH_DB_TIMEOUT_SECONDS: u64 = 2;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct Health {
    commit: String,
    name: String,
    version: String,
    database: String,
}

#[utoipa::path(
    get,
    path= "/health",
    responses (
        (status = 200, description = "Database connection is healthy", body = Health),
        (status = 503, description = "Database connection is unhealthy", body = Health)
    ),
    tag = "health",
)]
pub async fn health(method: Method, pool: Extension<PgPool>) -> impl IntoResponse {
    let db_healthy = database_probe(&pool.0).await;

    let health = Health {
        commit: GIT_COMMIT_HASH.to_string(),
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: if db_healthy { "ok" } else { "error" }.to_string(),
    };

    let body = if method == Method::GET {
        Json(&health).into_response()
    } else {
        Body::empty().into_response()
    };

    let headers = x_app_header(&health)
        .map(|value| {
            let mut headers = HeaderMap::new();
            headers.insert("X-App", value);
            headers
        })
        .unwrap_or_default();

    if db_healthy {
        (StatusCode::OK, headers, body)
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, headers, body)
    }
}

fn x_app_header(health: &Health) -> Option<HeaderValue> {
    let short_hash = if health.commit.len() > 7 {
        &health.commit[0..7]
    } else {
        ""
    };

    format!("{}:{}:{}", health.name, health.version, short_hash)
        .parse::<HeaderValue>()
        .map_err(|err| debug!("Failed to parse X-App header: {}", err))
        .ok()
}

async fn database_probe(pool: &PgPool) -> bool {
    let acquire_span = info_span!(
        "db.acquire",
        db.system = "postgresql",
        db.operation = "ACQUIRE"
    );

    let probe = async {
        match pool.acquire().instrument(acquire_span).await {
            Ok(mut conn) => {
                let ping_span =
                    info_span!("db.ping", db.system = "postgresql", db.operation = "PING");
                match conn.ping().instrument(ping_span).await {
                    Ok(()) => true,
                    Err(error) => {
                        error!("Failed to ping database: {}", error);
                        false
                    }
                }
            }
            Err(error) => {
                error!("Failed to acquire database connection: {}", error);
                false
            }
        }
    };

    if let Ok(healthy) = timeout(Duration::from_secs(HEALTH_DB_TIMEOUT_SECONDS), probe).await {
        healthy
    } else {
        warn!("Database health check timed out");
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn health(commit: &str) -> Health {
        Health {
            commit: commit.to_string(),
            name: "idlink".to_string(),
            version: "0.1.0".to_string(),
            database: "ok".to_string(),
        }
    }

    #[test]
    fn x_app_header_uses_short_hash() -> anyhow::Result<()> {
        let value = x_app_header(&health("0123456789abcdef")).ok_or_else(|| anyhow::anyhow!("no header"))?;
        assert_eq!(value.to_str()?, "idlink:0.1.0:0123456");
        Ok(())
    }

    #[test]
    fn x_app_header_without_commit() -> anyhow::Result<()> {
        let value = x_app_header(&health("unknown")).ok_or_else(|| anyhow::anyhow!("no header"))?;
        assert_eq!(value.to_str()?, "idlink:0.1.0:");
        Ok(())
    }
}
