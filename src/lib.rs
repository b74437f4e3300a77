pub mod cache;
pub mod config;
pub mod errors;
pub mod models;
pub mod store;
pub mod transport;
pub mod utils;

pub use cache::NameCache;
pub use config::NameCacheConfig;
pub use errors::{NameCacheError, NameCacheResult};
pub use models::{NameKey, NameRecord};
