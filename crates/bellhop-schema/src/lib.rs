//! Optional JSON Schema contracts for bellhop event payloads.
//!
//! Register a JSON Schema 2020-12 document per event type and the channel
//! drops inbound envelopes whose `data` violates it, before any listener
//! sees them.

pub mod config;
pub mod error;
pub mod registry;
pub mod validator;

pub use config::{RegistryConfig, DEFAULT_MAX_EVENT_TYPE_LEN};
pub use error::{Result, SchemaError};
pub use registry::SchemaRegistry;
