//! Utility modules shared across the crate

pub mod url;

pub use url::UrlUtils;
