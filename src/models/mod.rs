//! Identity keys, resolved name records and lookup service payloads

pub mod lookup;
pub mod name_key;
pub mod name_record;

pub use lookup::{AgentPayload, LookupResponse};
pub use name_key::NameKey;
pub use name_record::NameRecord;
