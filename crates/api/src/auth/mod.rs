//! Caller authentication
//!
//! Bearer tokens are issued by Supabase and verified against its auth API.
//! Authentication never rejects a request here: an unverifiable caller is
//! treated as anonymous and resolves to the free tier.

pub mod middleware;
pub mod supabase;

pub use middleware::{bearer_token, resolve_caller, Caller};
pub use supabase::{AuthError, SupabaseAuth};
