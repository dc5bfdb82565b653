//! API error types and handling

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use specwright_billing::EntitlementDenied;

/// Application error type
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    // Validation errors
    #[error("Invalid request: {0}")]
    BadRequest(String),

    // Entitlement errors
    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),
    #[error("Feature not available: {0}")]
    FeatureNotAvailable(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),

            ApiError::QuotaExceeded(msg) => (StatusCode::PAYMENT_REQUIRED, "QUOTA_EXCEEDED", msg.clone()),
            ApiError::FeatureNotAvailable(msg) => (StatusCode::FORBIDDEN, "FEATURE_NOT_AVAILABLE", msg.clone()),
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

impl From<EntitlementDenied> for ApiError {
    fn from(denied: EntitlementDenied) -> Self {
        if denied.is_quota() {
            ApiError::QuotaExceeded(denied.to_string())
        } else {
            ApiError::FeatureNotAvailable(denied.to_string())
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use specwright_shared::{AgentRole, Tier};

    #[test]
    fn test_quota_denial_maps_to_payment_required() {
        let err: ApiError = EntitlementDenied::MessageQuota {
            tier: Tier::Free,
            limit: 20,
        }
        .into();

        assert!(matches!(err, ApiError::QuotaExceeded(_)));
        assert_eq!(err.into_response().status(), StatusCode::PAYMENT_REQUIRED);
    }

    #[test]
    fn test_feature_denial_maps_to_forbidden() {
        let err: ApiError = EntitlementDenied::AgentNotIncluded {
            tier: Tier::Pro,
            role: AgentRole::Backlog,
        }
        .into();

        assert!(matches!(err, ApiError::FeatureNotAvailable(_)));
        assert_eq!(err.into_response().status(), StatusCode::FORBIDDEN);
    }
}
