//! Billing error types

use thiserror::Error;

/// Billing-specific errors
///
/// None of these reach an entitlement caller: the lookup and resolver log them
/// and fall back to the free tier.
#[derive(Debug, Error)]
pub enum BillingError {
    #[error("Stripe API error: {0}")]
    StripeApi(String),

    #[error("Billing provider timed out after {0} ms")]
    Timeout(u128),

    #[error("Invalid customer ID: {0}")]
    InvalidCustomerId(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<stripe::StripeError> for BillingError {
    fn from(err: stripe::StripeError) -> Self {
        BillingError::StripeApi(err.to_string())
    }
}

impl From<sqlx::Error> for BillingError {
    fn from(err: sqlx::Error) -> Self {
        BillingError::Database(err.to_string())
    }
}

pub type BillingResult<T> = Result<T, BillingError>;
