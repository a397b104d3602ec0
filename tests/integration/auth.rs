//! OAuth credential exchange and identity resolution.
//!
//! Covers the fatal-vs-transient split a bad grant produces: an
//! authentication failure must never be retried by the Supervisor, so
//! `Authenticator::authenticate` has to surface it as `EngineError::Fatal`.

use cdc_engine::EngineError;
use cdc_engine::auth::Authenticator;
use cdc_protocol::{ClientConfig, GrantKind};

fn client_for(server_uri: &str) -> ClientConfig {
    ClientConfig {
        id: 1,
        client_name: "acme".to_owned(),
        login_url: server_uri.to_owned(),
        grant: GrantKind::Password {
            username: "bot@acme.example".to_owned(),
            password: "s3cret".to_owned(),
        },
        oauth_client_id: "client-id".to_owned(),
        oauth_client_secret: "client-secret".to_owned(),
        topic_name: "/data/AccountChangeEvent".to_owned(),
        webhook_url: "https://acme.example/webhook".to_owned(),
        pubsub_host: "pubsub.example:7443".to_owned(),
        tenant_id: None,
        flow_batch_size: 50,
        is_active: true,
    }
}

#[tokio::test]
async fn successful_exchange_resolves_organization_id() {
    let server = cdc_test_support::mock_oauth_server("access-token-123", "00Dxx0000000ORG").await;
    let client = client_for(&server.uri());

    let session = Authenticator::new().authenticate(&client).await.expect("authentication should succeed");

    assert_eq!(session.access_token, "access-token-123");
    assert_eq!(session.organization_id, "00Dxx0000000ORG");
    assert_eq!(session.instance_url, server.uri());
}

#[tokio::test]
async fn bad_credentials_are_fatal_not_transient() {
    let server = cdc_test_support::mock_oauth_error_server("invalid_grant", "authentication failure").await;
    let client = client_for(&server.uri());

    let err = Authenticator::new().authenticate(&client).await.expect_err("bad credentials must fail");

    assert!(matches!(err, EngineError::Fatal(_)));
    assert!(err.is_fatal());
}

#[tokio::test]
async fn client_credentials_hint_is_appended_for_unsupported_grant() {
    let server = cdc_test_support::mock_oauth_error_server("unsupported_grant_type", "grant type not supported").await;
    let mut client = client_for(&server.uri());
    client.grant = GrantKind::ClientCredentials {
        username: "bot@acme.example".to_owned(),
        password: "s3cret".to_owned(),
    };

    let err = Authenticator::new().authenticate(&client).await.expect_err("unsupported grant must fail");
    let message = err.to_string();
    assert!(message.contains("My Domain"), "expected a My Domain hint, got: {message}");
}
