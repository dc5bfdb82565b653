//! Entitlement API routes

use axum::{
    extract::{rejection::JsonRejection, Extension, State},
    Json,
};
use serde::{Deserialize, Serialize};
use specwright_billing::{Action, EntitlementState};
use specwright_shared::Remaining;

use crate::{auth::Caller, error::ApiResult, state::AppState};

/// Units left in the current period
#[derive(Debug, Serialize)]
pub struct RemainingResponse {
    pub messages: Remaining,
    pub documents: Remaining,
    pub projects: Remaining,
}

/// Whether each quota-gated action would currently be allowed
#[derive(Debug, Serialize)]
pub struct AllowedResponse {
    pub send_message: bool,
    pub generate_document: bool,
    pub create_project: bool,
    pub use_integrations: bool,
}

/// Entitlement snapshot response
#[derive(Debug, Serialize)]
pub struct EntitlementResponse {
    #[serde(flatten)]
    pub entitlements: EntitlementState,
    pub remaining: RemainingResponse,
    pub allowed: AllowedResponse,
}

impl From<EntitlementState> for EntitlementResponse {
    fn from(state: EntitlementState) -> Self {
        Self {
            remaining: RemainingResponse {
                messages: state.remaining_messages(),
                documents: state.remaining_documents(),
                projects: state.remaining_projects(),
            },
            allowed: AllowedResponse {
                send_message: state.can_send_message(),
                generate_document: state.can_generate_document(),
                create_project: state.can_create_project(),
                use_integrations: state.can_use_integrations(),
            },
            entitlements: state,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct GateRequest {
    pub action: Action,
}

#[derive(Debug, Serialize)]
pub struct GateResponse {
    pub allowed: bool,
    pub action: Action,
    pub entitlements: EntitlementResponse,
}

/// Get the caller's entitlements
///
/// Always answers: anonymous callers and any lookup failure resolve to the
/// free tier.
pub async fn get_entitlements(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> Json<EntitlementResponse> {
    let entitlements = state.resolver.check(caller.identity()).await;
    Json(entitlements.into())
}

/// Check a single action against a fresh snapshot
///
/// Returns 402 when a quota is used up and 403 when the plan lacks the feature.
pub async fn gate_action(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    payload: Result<Json<GateRequest>, JsonRejection>,
) -> ApiResult<Json<GateResponse>> {
    let Json(req) = payload?;

    let entitlements = state.resolver.check(caller.identity()).await;

    if let Err(denied) = entitlements.gate(req.action) {
        tracing::info!(
            user_id = ?caller.identity().map(|i| i.user_id),
            tier = %entitlements.tier(),
            action = ?req.action,
            reason = %denied,
            "Action denied"
        );
        return Err(denied.into());
    }

    Ok(Json(GateResponse {
        allowed: true,
        action: req.action,
        entitlements: entitlements.into(),
    }))
}
