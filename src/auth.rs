use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

/// Sign-in failure. The display string is suitable for showing inline at
/// the login prompt.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Email and password are required.")]
    MissingCredentials,

    #[error("{0}")]
    Rejected(String),

    #[error("Could not reach the sign-in service: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Deserialize, Clone, Debug)]
pub struct AuthUser {
    pub id: String,
    pub email: Option<String>,
    #[serde(default)]
    user_metadata: Value,
}

impl AuthUser {
    /// The user's preferred name, when their profile carries one.
    pub fn display_name(&self) -> Option<&str> {
        self.user_metadata.get("name").and_then(Value::as_str)
    }
}

#[derive(Deserialize, Clone, Debug)]
pub struct AuthSession {
    pub access_token: String,
    pub user: AuthUser,
}

/// Gateway to the hosted auth service: password sign-in and a
/// fire-and-forget sign-out.
pub struct AuthGateway {
    client: Client,
    base_url: String,
    anon_key: String,
}

impl AuthGateway {
    pub fn new(base_url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            anon_key: anon_key.into(),
        }
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Signs in with email and password. Returns the session on success or
    /// an error whose message can be shown directly at the prompt.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(AuthError::MissingCredentials);
        }

        log::info!("Signing in {}", email);
        let response = self
            .client
            .post(self.auth_url("token?grant_type=password"))
            .header("apikey", &self.anon_key)
            .json(&json!({ "email": email.trim(), "password": password }))
            .send()
            .await?;

        if response.status().is_success() {
            let session: AuthSession = response.json().await?;
            log::info!("Signed in user {}", session.user.id);
            return Ok(session);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        // The auth service puts the display message in error_description
        // (older deployments) or msg.
        let detail = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| {
                v["error_description"]
                    .as_str()
                    .or_else(|| v["msg"].as_str())
                    .map(|s| s.to_string())
            })
            .unwrap_or_else(|| format!("Sign-in failed with status {}", status));
        log::warn!("Sign-in rejected for {}: {}", email, detail);
        Err(AuthError::Rejected(detail))
    }

    /// Revokes the session in the background. The caller returns to the
    /// login view immediately; the hosted service treats logout as
    /// idempotent, so a failure here is only logged.
    pub fn sign_out(&self, access_token: String) {
        let client = self.client.clone();
        let url = self.auth_url("logout");
        let anon_key = self.anon_key.clone();

        tokio::spawn(async move {
            let result = client
                .post(url)
                .header("apikey", anon_key)
                .bearer_auth(access_token)
                .send()
                .await;
            match result {
                Ok(resp) if resp.status().is_success() => log::info!("Signed out"),
                Ok(resp) => log::warn!("Sign-out returned status {}", resp.status()),
                Err(e) => log::warn!("Sign-out request failed: {}", e),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sign_in_rejects_blank_credentials_without_a_network_call() {
        // Port 1 refuses connections, so reaching the network would fail
        // with an Http error instead of MissingCredentials.
        let gateway = AuthGateway::new("http://localhost:1", "anon-key");

        let err = gateway.sign_in("", "secret").await.unwrap_err();
        assert!(matches!(err, AuthError::MissingCredentials));

        let err = gateway.sign_in("a@b.c", "").await.unwrap_err();
        assert!(matches!(err, AuthError::MissingCredentials));
    }

    #[test]
    fn display_name_reads_profile_metadata() {
        let user: AuthUser = serde_json::from_value(json!({
            "id": "user-1",
            "email": "ada@example.com",
            "user_metadata": { "name": "Ada" }
        }))
        .unwrap();
        assert_eq!(user.display_name(), Some("Ada"));

        let bare: AuthUser = serde_json::from_value(json!({ "id": "user-2" })).unwrap();
        assert_eq!(bare.display_name(), None);
    }
}
