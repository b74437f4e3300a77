//! Centralized error handling for the avatar name cache
//!
//! The lookup API itself never hands an error to callers: transport failures
//! and unresolved ids degrade to stale cache entries or legacy names. The
//! types here cover the edges that can genuinely fail.
//!
//! # Error Categories
//!
//! - **Persistence Errors**: reading or writing the cache document
//! - **Configuration Errors**: loading and validating settings
//! - **Transport Errors**: building the HTTP client and batch requests
//!
//! # Usage
//!
//! ```rust
//! use avatar_names::errors::{NameCacheError, NameCacheResult};
//!
//! fn example_function() -> NameCacheResult<String> {
//!     Err(NameCacheError::configuration("lookup url missing scheme"))
//! }
//! ```

pub mod types;

pub use types::*;

/// Convenience type alias for Results using NameCacheError
pub type NameCacheResult<T> = Result<T, NameCacheError>;
