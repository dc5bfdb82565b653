//! Supabase access-token verification

use std::time::Duration;

use serde::Deserialize;
use specwright_shared::{Identity, UserId};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Supabase auth is not configured")]
    NotConfigured,
    #[error("Token rejected by Supabase (status {0})")]
    Rejected(u16),
    #[error("Failed to reach Supabase: {0}")]
    Transport(String),
    #[error("Unusable Supabase user: {0}")]
    MalformedUser(String),
}

#[derive(Deserialize)]
struct SupabaseUser {
    id: String,
    email: Option<String>,
}

/// Verifies bearer tokens by asking Supabase who they belong to
#[derive(Clone)]
pub struct SupabaseAuth {
    client: reqwest::Client,
    base_url: String,
    anon_key: String,
    timeout: Duration,
}

impl SupabaseAuth {
    pub fn new(base_url: &str, anon_key: &str, timeout: Duration) -> Self {
        let client = match reqwest::Client::builder().timeout(timeout).build() {
            Ok(client) => client,
            Err(e) => {
                // Requests still carry the timeout individually
                tracing::error!(error = %e, "Failed to build Supabase HTTP client, using defaults");
                reqwest::Client::new()
            }
        };

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            timeout,
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.base_url.is_empty() && !self.anon_key.is_empty()
    }

    /// Resolve a token to the caller's identity
    pub async fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        if !self.is_configured() {
            return Err(AuthError::NotConfigured);
        }

        let url = format!("{}/auth/v1/user", self.base_url);

        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", token))
            .send()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AuthError::Rejected(response.status().as_u16()));
        }

        let user: SupabaseUser = response
            .json()
            .await
            .map_err(|e| AuthError::MalformedUser(e.to_string()))?;

        let user_id = Uuid::parse_str(&user.id)
            .map_err(|_| AuthError::MalformedUser(format!("invalid user id {}", user.id)))?;

        // Billing customers are found by email, so a user without one cannot be resolved
        let email = user
            .email
            .filter(|email| !email.trim().is_empty())
            .ok_or_else(|| AuthError::MalformedUser(format!("user {} has no email", user_id)))?;

        Ok(Identity {
            user_id: UserId::from(user_id),
            email,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const USER_ID: &str = "5d8c7a52-4a8e-4c4f-9a43-1f0e6b1d2c3a";

    async fn server_with_user(body: &str) -> (mockito::ServerGuard, mockito::Mock) {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/auth/v1/user")
            .match_header("apikey", "anon-key")
            .match_header("authorization", "Bearer good-token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await;
        (server, mock)
    }

    #[tokio::test]
    async fn test_verify_valid_token() {
        let body = format!(r#"{{"id":"{}","email":"ada@example.com","role":"authenticated"}}"#, USER_ID);
        let (server, mock) = server_with_user(&body).await;
        let auth = SupabaseAuth::new(&server.url(), "anon-key", Duration::from_secs(5));

        let identity = auth.verify("good-token").await.unwrap();

        assert_eq!(identity.user_id.to_string(), USER_ID);
        assert_eq!(identity.email, "ada@example.com");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_rejected_token() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/auth/v1/user")
            .with_status(401)
            .with_body(r#"{"msg":"invalid JWT"}"#)
            .create_async()
            .await;
        let auth = SupabaseAuth::new(&server.url(), "anon-key", Duration::from_secs(5));

        assert!(matches!(auth.verify("expired").await, Err(AuthError::Rejected(401))));
    }

    #[tokio::test]
    async fn test_user_without_email_is_unusable() {
        let body = format!(r#"{{"id":"{}","email":null}}"#, USER_ID);
        let (server, _mock) = server_with_user(&body).await;
        let auth = SupabaseAuth::new(&server.url(), "anon-key", Duration::from_secs(5));

        assert!(matches!(auth.verify("good-token").await, Err(AuthError::MalformedUser(_))));
    }

    #[tokio::test]
    async fn test_unresponsive_supabase_times_out() {
        // Accepts connections but never answers
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _server = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let auth = SupabaseAuth::new(&format!("http://{}", addr), "anon-key", Duration::from_millis(200));
        let result = tokio::time::timeout(Duration::from_secs(5), auth.verify("good-token")).await;

        assert!(matches!(result, Ok(Err(AuthError::Transport(_)))));
    }

    #[tokio::test]
    async fn test_unconfigured_auth_rejects_everything() {
        let auth = SupabaseAuth::new("", "", Duration::from_secs(5));

        assert!(!auth.is_configured());
        assert!(matches!(auth.verify("anything").await, Err(AuthError::NotConfigured)));
    }
}
