mod codec;
mod migration;
mod query;
mod store;

pub use codec::{LEGACY_STORAGE_KEY, LoadOutcome, LoadSource, StateCodec};
pub use migration::{HISTORICAL_SELLING_FEES_UPFRONT, SchemaVersion, migrate, record_from_map};
pub(crate) use migration::{numeric_value, parse_number};
pub use query::QueryParams;
pub use store::{FileStore, KeyValueStore, MemoryStore, StoreError};
