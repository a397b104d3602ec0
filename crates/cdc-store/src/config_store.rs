use cdc_protocol::{ClientConfig, ClientId, GrantKind};
use sqlx::PgPool;

#[derive(Debug, thiserror::Error)]
pub enum ConfigStoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("client {0} row is missing oauth_username/oauth_password required for grant type {1}")]
    MissingCredentials(ClientId, String),
    #[error("client {0} has unknown oauth_grant_type {1:?}")]
    UnknownGrantType(ClientId, String),
}

struct ClientRow {
    id: i64,
    client_name: String,
    login_url: String,
    oauth_grant_type: String,
    oauth_client_id: String,
    oauth_client_secret: String,
    oauth_username: Option<String>,
    oauth_password: Option<String>,
    topic_name: String,
    webhook_url: String,
    pubsub_host: String,
    tenant_id: Option<String>,
    flow_batch_size: i32,
    is_active: bool,
}

fn into_client_config(row: ClientRow) -> Result<ClientConfig, ConfigStoreError> {
    let grant = match row.oauth_grant_type.as_str() {
        "password" => {
            let (Some(username), Some(password)) = (row.oauth_username.clone(), row.oauth_password.clone()) else {
                return Err(ConfigStoreError::MissingCredentials(row.id, row.oauth_grant_type));
            };
            GrantKind::Password { username, password }
        }
        "client_credentials" => {
            let (Some(username), Some(password)) = (row.oauth_username.clone(), row.oauth_password.clone()) else {
                return Err(ConfigStoreError::MissingCredentials(row.id, row.oauth_grant_type));
            };
            GrantKind::ClientCredentials { username, password }
        }
        other => return Err(ConfigStoreError::UnknownGrantType(row.id, other.to_owned())),
    };
    Ok(ClientConfig {
        id: row.id,
        client_name: row.client_name,
        login_url: row.login_url,
        grant,
        oauth_client_id: row.oauth_client_id,
        oauth_client_secret: row.oauth_client_secret,
        topic_name: row.topic_name,
        webhook_url: row.webhook_url,
        pubsub_host: row.pubsub_host,
        tenant_id: row.tenant_id,
        flow_batch_size: row.flow_batch_size,
        is_active: row.is_active,
    })
}

/// Loads one client row. Returns `Ok(None)` when the id does not exist,
/// matching the source system's "client not found" path (a startup failure
/// the Supervisor raises, not a store-level error).
pub async fn fetch_client(pool: &PgPool, client_id: ClientId) -> Result<Option<ClientConfig>, ConfigStoreError> {
    let row = sqlx::query_as!(
        ClientRow,
        r#"SELECT id, client_name, login_url, oauth_grant_type, oauth_client_id,
                  oauth_client_secret, oauth_username, oauth_password, topic_name,
                  webhook_url, pubsub_host, tenant_id, flow_batch_size, is_active
           FROM clients WHERE id = $1"#,
        client_id
    )
    .fetch_optional(pool)
    .await?;
    row.map(into_client_config).transpose()
}

/// All rows with `is_active = true`, for `Manager::autostart_active`.
pub async fn list_active_clients(pool: &PgPool) -> Result<Vec<ClientConfig>, ConfigStoreError> {
    let rows = sqlx::query_as!(
        ClientRow,
        r#"SELECT id, client_name, login_url, oauth_grant_type, oauth_client_id,
                  oauth_client_secret, oauth_username, oauth_password, topic_name,
                  webhook_url, pubsub_host, tenant_id, flow_batch_size, is_active
           FROM clients WHERE is_active = TRUE"#
    )
    .fetch_all(pool)
    .await?;
    rows.into_iter().map(into_client_config).collect()
}
