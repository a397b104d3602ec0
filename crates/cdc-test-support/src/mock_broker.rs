//! A mock `PubSub` gRPC server for integration-testing `cdc-engine` without
//! a real broker. Binds to a random port and serves `GetTopic`/`GetSchema`
//! from a fixed configuration and `Subscribe` from a preloaded queue of
//! events, respecting the caller's credit (`num_requested`) the same way a
//! real broker would.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use cdc_broker::proto::pub_sub_server::{PubSub, PubSubServer};
use cdc_broker::proto::{ConsumerEvent, FetchRequest, FetchResponse, SchemaInfo, SchemaRequest, TopicInfo, TopicRequest};
use futures_util::Stream;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_stream::wrappers::{ReceiverStream, TcpListenerStream};
use tonic::{Request, Response, Status, Streaming};

struct Inner {
    schema_id: String,
    schema_json: String,
    topic_status: Option<Status>,
    events: VecDeque<ConsumerEvent>,
    subscribe_error: Option<Status>,
}

/// Initial configuration for a [`MockBroker`]. All fields have sensible
/// defaults; tests typically only need to set `schema_json` and `events`.
pub struct MockBrokerConfig {
    pub schema_id: String,
    pub schema_json: String,
    pub events: Vec<ConsumerEvent>,
    /// When set, `GetTopic` fails with this status instead of succeeding.
    pub topic_status: Option<Status>,
    /// Sent once the event queue is drained, instead of idling.
    pub subscribe_error: Option<Status>,
}

impl Default for MockBrokerConfig {
    fn default() -> Self {
        Self {
            schema_id: "mock-schema-1".to_owned(),
            schema_json: "\"string\"".to_owned(),
            events: Vec::new(),
            topic_status: None,
            subscribe_error: None,
        }
    }
}

#[derive(Clone)]
struct State(Arc<Mutex<Inner>>);

impl State {
    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.0.lock().expect("mock broker state mutex poisoned")
    }
}

struct Service(State);

type SubscribeStream = Pin<Box<dyn Stream<Item = Result<FetchResponse, Status>> + Send + 'static>>;

#[tonic::async_trait]
impl PubSub for Service {
    type SubscribeStream = SubscribeStream;

    async fn get_topic(&self, request: Request<TopicRequest>) -> Result<Response<TopicInfo>, Status> {
        let inner = self.0.lock();
        if let Some(status) = &inner.topic_status {
            return Err(status.clone());
        }
        Ok(Response::new(TopicInfo {
            topic_name: request.into_inner().topic_name,
            schema_id: inner.schema_id.clone(),
            rpc_id: 0,
        }))
    }

    async fn get_schema(&self, request: Request<SchemaRequest>) -> Result<Response<SchemaInfo>, Status> {
        let inner = self.0.lock();
        Ok(Response::new(SchemaInfo {
            schema_id: request.into_inner().schema_id,
            schema_json: inner.schema_json.clone(),
        }))
    }

    async fn subscribe(&self, request: Request<Streaming<FetchRequest>>) -> Result<Response<Self::SubscribeStream>, Status> {
        let state = self.0.clone();
        let mut inbound = request.into_inner();
        let (tx, rx) = mpsc::channel::<Result<FetchResponse, Status>>(32);

        tokio::spawn(async move {
            let mut credit: i64 = 0;
            loop {
                match inbound.message().await {
                    Ok(Some(req)) => credit += i64::from(req.num_requested),
                    _ => return,
                }

                while credit > 0 {
                    let next_event = { state.lock().events.pop_front() };
                    let Some(event) = next_event else {
                        let pending_error = { state.lock().subscribe_error.clone() };
                        if let Some(status) = pending_error {
                            let _ = tx.send(Err(status)).await;
                            return;
                        }
                        break;
                    };
                    credit -= 1;
                    let latest_replay_id = event.replay_id.clone();
                    let response = FetchResponse {
                        events: vec![event],
                        latest_replay_id,
                        pending_num_requested: i32::try_from(credit).unwrap_or(0),
                    };
                    if tx.send(Ok(response)).await.is_err() {
                        return;
                    }
                }
            }
        });

        Ok(Response::new(Box::pin(ReceiverStream::new(rx))))
    }
}

/// A running mock broker. Dropping this stops the server.
pub struct MockBroker {
    addr: SocketAddr,
    state: State,
    _task: tokio::task::JoinHandle<()>,
}

impl MockBroker {
    pub async fn start(config: MockBrokerConfig) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind mock broker listener");
        let addr = listener.local_addr().expect("mock broker local addr");

        let state = State(Arc::new(Mutex::new(Inner {
            schema_id: config.schema_id,
            schema_json: config.schema_json,
            topic_status: config.topic_status,
            events: config.events.into(),
            subscribe_error: config.subscribe_error,
        })));

        let service = PubSubServer::new(Service(state.clone()));
        let incoming = TcpListenerStream::new(listener);
        let task = tokio::spawn(async move {
            let _ = tonic::transport::Server::builder().add_service(service).serve_with_incoming(incoming).await;
        });

        Self { addr, state, _task: task }
    }

    /// `host:port`, suitable for `ClientConfig::pubsub_host`. Callers
    /// pointing a TLS-only broker client at this address must use the
    /// `from_channel` entry point instead of `connect`, since this server
    /// does not speak TLS.
    pub fn host_port(&self) -> String {
        self.addr.to_string()
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Queues another event for `Subscribe` to deliver once credit allows.
    pub fn push_event(&self, event: ConsumerEvent) {
        self.state.lock().events.push_back(event);
    }

    pub fn set_subscribe_error(&self, status: Status) {
        self.state.lock().subscribe_error = Some(status);
    }
}
