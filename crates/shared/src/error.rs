//! Error types for Specwright

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpecwrightError {
    #[error("Validation error: {0}")]
    Validation(String),
}
