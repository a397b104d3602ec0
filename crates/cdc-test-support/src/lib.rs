pub mod http;
pub mod mock_broker;

pub use http::{mock_oauth_error_server, mock_oauth_server, mock_webhook_server};
pub use mock_broker::{MockBroker, MockBrokerConfig};
