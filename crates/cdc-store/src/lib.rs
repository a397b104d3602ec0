pub mod config_store;
pub mod db;
pub mod offset_store;

pub use config_store::{ConfigStoreError, fetch_client, list_active_clients};
pub use offset_store::OffsetStore;
