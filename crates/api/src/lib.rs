//! Specwright API Library
//!
//! HTTP surface for entitlement checks: caller resolution, the entitlement
//! routes and health probes.

pub mod auth;
pub mod config;
pub mod error;
pub mod logging;
pub mod routes;
pub mod state;

pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
