//! One side of a cross-window conversation over `postMessage`.
//!
//! A [`Channel`] resolves its counterpart (the parent window for a child,
//! an iframe's content window for a parent), exchanges the bare
//! `"connected"` token, and from then on trades `{type, data}` envelopes.
//! Sends issued before the handshake completes are queued and flushed in
//! order exactly once; inbound messages are trusted only when they come
//! from the resolved counterpart window.

pub mod channel;
pub mod config;
pub mod error;
pub mod event;

pub use channel::{Channel, ConnectionState, Role};
pub use config::ChannelConfig;
pub use error::{ChannelError, Result};
pub use event::{ChannelEvent, Responder, CONNECTED_EVENT, FAILED_EVENT};
