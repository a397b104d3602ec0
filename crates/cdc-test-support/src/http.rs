//! Mock HTTP endpoints for the OAuth/identity exchange and the tenant
//! webhook, built on `wiremock` — the same crate used for HTTP client
//! testing elsewhere in the retrieved ingestion-client pack.

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Starts a server that answers the OAuth token exchange and the identity
/// lookup the Stream Engine chains after it. The server's own base URL
/// doubles as `instance_url` and `login_url` — point `ClientConfig` at it
/// directly.
pub async fn mock_oauth_server(access_token: &str, organization_id: &str) -> MockServer {
    let server = MockServer::start().await;
    let identity_url = format!("{}/id/00Dxx0000000001/identity", server.uri());

    Mock::given(method("POST"))
        .and(path("/services/oauth2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": access_token,
            "instance_url": server.uri(),
            "id": identity_url,
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/id/00Dxx0000000001/identity"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "organization_id": organization_id })))
        .mount(&server)
        .await;

    server
}

/// Starts a server that answers the OAuth token exchange with a 400 error
/// body, for exercising the fatal-credentials path.
pub async fn mock_oauth_error_server(error: &str, error_description: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/services/oauth2/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": error,
            "error_description": error_description,
        })))
        .mount(&server)
        .await;
    server
}

/// Starts a server whose webhook endpoint always answers with `status`,
/// regardless of path. Use `server.received_requests()` afterwards to
/// inspect what was posted.
pub async fn mock_webhook_server(status: u16) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST")).respond_with(ResponseTemplate::new(status)).mount(&server).await;
    server
}
