use std::time::Duration;

use cdc_protocol::{ClientConfig, GrantKind};
use serde::Deserialize;

use crate::error::EngineError;

const OAUTH_TIMEOUT: Duration = Duration::from_secs(30);
const IDENTITY_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    instance_url: Option<String>,
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenErrorBody {
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IdentityResponse {
    organization_id: Option<String>,
}

/// A resolved session: bearer token plus the metadata the Stream Engine
/// attaches to every gRPC call.
#[derive(Debug, Clone)]
pub struct Session {
    pub access_token: String,
    pub instance_url: String,
    pub organization_id: String,
}

pub struct Authenticator {
    http: reqwest::Client,
}

impl Authenticator {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }

    /// Exchanges client credentials for an access token, then resolves the
    /// organization id from the identity endpoint. Any failure along this
    /// path is `FatalConfigError` per the spec — there is nothing a
    /// reconnect can fix about bad credentials.
    pub async fn authenticate(&self, client: &ClientConfig) -> Result<Session, EngineError> {
        let token_url = format!("{}/services/oauth2/token", client.login_url.trim_end_matches('/'));

        let mut form: Vec<(&str, &str)> = vec![("client_id", &client.oauth_client_id), ("client_secret", &client.oauth_client_secret)];
        match &client.grant {
            GrantKind::Password { username, password } => {
                form.push(("grant_type", "password"));
                form.push(("username", username));
                form.push(("password", password));
            }
            GrantKind::ClientCredentials { username, password } => {
                form.push(("grant_type", "client_credentials"));
                form.push(("username", username));
                form.push(("password", password));
                // Required by the target broker's client_credentials flow; see
                // the design notes on the authoritative grant-kind variant.
                form.push(("response_type", "code"));
            }
        }

        let response = self
            .http
            .post(&token_url)
            .timeout(OAUTH_TIMEOUT)
            .form(&form)
            .send()
            .await
            .map_err(|e| EngineError::Transient(format!("oauth request failed: {e}")))?;

        let status = response.status();
        if status.is_client_error() {
            let body: TokenErrorBody = response.json().await.unwrap_or(TokenErrorBody {
                error: None,
                error_description: None,
            });
            let mut message = format!(
                "oauth token exchange failed ({status}): {} {}",
                body.error.as_deref().unwrap_or("unknown_error"),
                body.error_description.as_deref().unwrap_or("")
            );
            if matches!(client.grant, GrantKind::ClientCredentials { .. }) && body.error_description.as_deref().unwrap_or("").to_ascii_lowercase().contains("not supported") {
                message.push_str(" (hint: client_credentials requires a My Domain login URL)");
            }
            return Err(EngineError::Fatal(message));
        }
        if !status.is_success() {
            return Err(EngineError::Transient(format!("oauth token exchange returned {status}")));
        }

        let token: TokenResponse = response.json().await.map_err(|e| EngineError::Transient(format!("oauth response was not valid json: {e}")))?;
        let access_token = token.access_token.ok_or_else(|| EngineError::Fatal("oauth response missing access_token".to_owned()))?;
        let instance_url = token.instance_url.ok_or_else(|| EngineError::Fatal("oauth response missing instance_url".to_owned()))?;
        let identity_url = token.id.ok_or_else(|| EngineError::Fatal("oauth response missing id (identity url)".to_owned()))?;

        let organization_id = self.resolve_organization_id(&identity_url, &access_token).await?;

        Ok(Session {
            access_token,
            instance_url,
            organization_id,
        })
    }

    async fn resolve_organization_id(&self, identity_url: &str, access_token: &str) -> Result<String, EngineError> {
        let response = self
            .http
            .get(identity_url)
            .timeout(IDENTITY_TIMEOUT)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| EngineError::Fatal(format!("identity endpoint request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(EngineError::Fatal(format!("identity endpoint returned {}", response.status())));
        }

        let identity: IdentityResponse = response.json().await.map_err(|e| EngineError::Fatal(format!("identity response was not valid json: {e}")))?;
        identity.organization_id.ok_or_else(|| EngineError::Fatal("identity response missing organization_id".to_owned()))
    }
}

impl Default for Authenticator {
    fn default() -> Self {
        Self::new()
    }
}
