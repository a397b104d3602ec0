pub mod decoder;
pub mod filter;
pub mod header;

pub use decoder::{DecodeError, SchemaCache, decode};
pub use filter::{FilterValue, resolve_per_record};
pub use header::{ChangeEventHeader, extract_header, normalize_commit_ms};
