//! Specwright Shared Types and Utilities
//!
//! Types, errors, and utilities shared between the billing and API crates.

pub mod db;
pub mod error;
pub mod types;

pub use db::*;
pub use error::*;
pub use types::*;
