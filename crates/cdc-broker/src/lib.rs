//! Thin gRPC client for the change-event broker: `GetTopic`/`GetSchema`
//! unary calls plus a `Subscribe` bidirectional stream.
//!
//! The generated types live under [`proto`]; everything else in this crate
//! translates the spec's connection/keepalive/metadata requirements into
//! calls against the generated client stub.

pub mod proto {
    tonic::include_proto!("eventbus.v1");
}

use std::time::Duration;

use proto::pub_sub_client::PubSubClient;
use proto::{FetchRequest, FetchResponse, SchemaInfo, SchemaRequest, TopicInfo, TopicRequest};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tonic::codegen::StdError;
use tonic::metadata::MetadataValue;
use tonic::transport::{Channel, ClientTlsConfig, Endpoint};
use tonic::{Request, Streaming};

/// 64 MiB, per the spec's max receive length for the Subscribe stream.
const MAX_DECODE_BYTES: usize = 64 * 1024 * 1024;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(20);
const KEEP_ALIVE_TIMEOUT: Duration = Duration::from_secs(10);
const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("transport error: {0}")]
    Transport(#[from] tonic::transport::Error),
    #[error("grpc error: {0}")]
    Status(#[from] tonic::Status),
    #[error("subscribe request channel closed")]
    RequestChannelClosed,
}

/// Per-call credentials attached as gRPC metadata headers.
#[derive(Debug, Clone)]
pub struct CallCredentials {
    pub access_token: String,
    pub tenant_id: String,
    pub instance_url: String,
}

fn authenticated<T>(payload: T, creds: &CallCredentials) -> Result<Request<T>, BrokerError> {
    let mut req = Request::new(payload);
    let md = req.metadata_mut();
    md.insert("accesstoken", MetadataValue::try_from(creds.access_token.as_str()).map_err(|_| tonic::Status::invalid_argument("access token is not valid metadata"))?);
    md.insert("tenantid", MetadataValue::try_from(creds.tenant_id.as_str()).map_err(|_| tonic::Status::invalid_argument("tenant id is not valid metadata"))?);
    md.insert("instanceurl", MetadataValue::try_from(creds.instance_url.as_str()).map_err(|_| tonic::Status::invalid_argument("instance url is not valid metadata"))?);
    Ok(req)
}

/// A connected broker client. Cheap to clone (wraps a `tonic::Channel`);
/// each `Subscribe` call still opens its own independent stream.
#[derive(Clone)]
pub struct BrokerClient {
    inner: PubSubClient<Channel>,
}

impl BrokerClient {
    /// Opens a TLS channel to `host:port` with the keepalive settings the
    /// Stream Engine requires (ping every 30s, 10s timeout, pings permitted
    /// without active calls so an idle subscription doesn't get dropped by
    /// intermediate proxies).
    pub async fn connect(host_port: &str) -> Result<Self, BrokerError> {
        let endpoint = Endpoint::try_from(format!("https://{host_port}"))?
            .tls_config(ClientTlsConfig::new().with_native_roots())?
            .connect_timeout(CONNECT_TIMEOUT)
            .keep_alive_timeout(KEEP_ALIVE_TIMEOUT)
            .http2_keep_alive_interval(KEEP_ALIVE_INTERVAL)
            .keep_alive_while_idle(true);
        let channel = endpoint.connect().await?;
        let inner = PubSubClient::new(channel)
            .max_decoding_message_size(MAX_DECODE_BYTES)
            .max_encoding_message_size(MAX_DECODE_BYTES);
        Ok(Self { inner })
    }

    /// For test doubles that already have a channel (e.g. connected over an
    /// in-process transport); production code should use [`connect`].
    pub fn from_channel<E>(channel: E) -> Result<Self, BrokerError>
    where
        E: TryInto<Channel>,
        E::Error: Into<StdError>,
    {
        let channel = channel.try_into().map_err(|e| tonic::Status::internal(e.into().to_string()))?;
        Ok(Self {
            inner: PubSubClient::new(channel).max_decoding_message_size(MAX_DECODE_BYTES).max_encoding_message_size(MAX_DECODE_BYTES),
        })
    }

    pub async fn get_topic(&mut self, topic_name: &str, creds: &CallCredentials) -> Result<TopicInfo, BrokerError> {
        let req = authenticated(
            TopicRequest {
                topic_name: topic_name.to_owned(),
            },
            creds,
        )?;
        Ok(self.inner.get_topic(req).await?.into_inner())
    }

    pub async fn get_schema(&mut self, schema_id: &str, creds: &CallCredentials) -> Result<SchemaInfo, BrokerError> {
        let req = authenticated(
            SchemaRequest {
                schema_id: schema_id.to_owned(),
            },
            creds,
        )?;
        Ok(self.inner.get_schema(req).await?.into_inner())
    }

    /// Opens the bidirectional `Subscribe` stream. The first item written to
    /// the returned sender should be the initial `FetchRequest` carrying
    /// `topic_name`/`replay_preset`/`num_requested`; subsequent writes are
    /// credit refills.
    pub async fn subscribe(&mut self, creds: &CallCredentials) -> Result<BrokerSubscription, BrokerError> {
        let (tx, rx) = mpsc::unbounded_channel::<FetchRequest>();
        let outbound = UnboundedReceiverStream::new(rx);
        let req = authenticated(outbound, creds)?;
        let resp = self.inner.subscribe(req).await?;
        Ok(BrokerSubscription {
            req_tx: tx,
            resp_stream: resp.into_inner(),
        })
    }
}

/// An open `Subscribe` stream: an outbound request sender plus the inbound
/// response stream. Dropping `req_tx` (via [`BrokerSubscription::close`])
/// closes the request half, which the broker observes as end-of-stream.
pub struct BrokerSubscription {
    req_tx: mpsc::UnboundedSender<FetchRequest>,
    resp_stream: Streaming<FetchResponse>,
}

impl BrokerSubscription {
    pub fn send_credit(&self, req: FetchRequest) -> Result<(), BrokerError> {
        self.req_tx.send(req).map_err(|_| BrokerError::RequestChannelClosed)
    }

    /// Cancel-safe: the returned future only borrows the stream, so dropping
    /// it (e.g. because another `tokio::select!` branch won the race) never
    /// loses an in-flight message.
    pub async fn recv(&mut self) -> Result<Option<FetchResponse>, BrokerError> {
        use futures_util::TryStreamExt;
        Ok(self.resp_stream.try_next().await?)
    }

    /// Closes the outbound half, terminating the request stream the broker
    /// sees; the inbound half is closed by dropping the subscription.
    pub fn close(self) {
        drop(self.req_tx);
    }
}
