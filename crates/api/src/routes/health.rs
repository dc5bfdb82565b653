//! Health check endpoints

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub database: &'static str,
    /// Entitlement checks still answer when the database is down (free tier),
    /// so billing mode is informational only
    pub billing: &'static str,
}

async fn database_healthy(state: &AppState) -> bool {
    sqlx::query("SELECT 1").execute(&state.pool).await.is_ok()
}

/// Health check endpoint
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let healthy = database_healthy(&state).await;
    let status = if healthy { "healthy" } else { "unhealthy" };

    let code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        code,
        Json(HealthResponse {
            status,
            version: env!("CARGO_PKG_VERSION"),
            database: status,
            billing: state.billing_mode.as_str(),
        }),
    )
}

/// Liveness probe (just returns 200 if the server is running)
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// Readiness probe
pub async fn readiness(State(state): State<AppState>) -> StatusCode {
    if database_healthy(&state).await {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::SupabaseAuth,
        config::{Config, LogFormat},
        state::BillingMode,
    };
    use specwright_billing::{
        BillingLookup, DisabledBillingProvider, EntitlementResolver, InMemorySubscriberStore, PgUsageCounter,
        ProductTiers,
    };
    use sqlx::postgres::PgPoolOptions;
    use std::{sync::Arc, time::Duration};

    // Nothing listens on port 1, so every connection attempt is refused
    const UNREACHABLE_DB: &str = "postgres://postgres@127.0.0.1:1/specwright";

    fn unreachable_state() -> AppState {
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_secs(2))
            .connect_lazy(UNREACHABLE_DB)
            .unwrap();

        let lookup = BillingLookup::new(
            Arc::new(DisabledBillingProvider),
            Arc::new(InMemorySubscriberStore::new()),
            ProductTiers::new(),
        );
        let resolver = EntitlementResolver::new(lookup, Arc::new(PgUsageCounter::new(pool.clone())));

        let config = Config {
            bind_address: "127.0.0.1:0".to_string(),
            cors_allowed_origins: Vec::new(),
            database_url: UNREACHABLE_DB.to_string(),
            database_max_connections: 1,
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            auth_timeout: Duration::from_secs(1),
            enable_billing: false,
            log_format: LogFormat::Pretty,
        };
        let auth = SupabaseAuth::new("", "", config.auth_timeout);

        AppState::new(config, pool, Arc::new(resolver), auth, BillingMode::Disabled)
    }

    #[tokio::test]
    async fn test_liveness_always_ok() {
        assert_eq!(liveness().await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_readiness_fails_without_database() {
        assert_eq!(readiness(State(unreachable_state())).await, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_health_reports_database_and_billing_mode() {
        let (code, Json(body)) = health(State(unreachable_state())).await;

        assert_eq!(code, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body.status, "unhealthy");
        assert_eq!(body.database, "unhealthy");
        assert_eq!(body.billing, "disabled");
    }
}
