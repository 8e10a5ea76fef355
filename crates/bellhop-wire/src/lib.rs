//! Envelope codec and typed-value revival for bellhop channels.
//!
//! Once connected, the two sides of a channel exchange JSON text of the
//! form `{"type": "...", "data": ...}`. The only other message on the
//! wire is the bare handshake token [`HANDSHAKE_TOKEN`].
//!
//! Payload values may carry domain types: any JSON object tagged with a
//! `__classname` registered in a [`ClassRegistry`] is rebuilt into that
//! type while decoding, and tagged again while encoding.

pub mod class;
pub mod codec;
pub mod data;
pub mod error;

mod revive;

pub use class::{AsAny, ClassRegistry, FromWire, WireObject, CLASSNAME_FIELD};
pub use codec::{
    decode_message, encode_envelope, Envelope, Inbound, WireConfig, DEFAULT_MAX_DEPTH,
    DEFAULT_MAX_MESSAGE_SIZE, HANDSHAKE_TOKEN,
};
pub use data::{Data, TypedValue};
pub use error::{Result, WireError};
