//! Window and `postMessage` abstraction for cross-context messaging.
//!
//! Models the pieces of a browser embedding that a messaging channel
//! depends on:
//! - [`Host`] — the local window: its parent, load state and `message` listeners
//! - [`Window`] — a remote window that can be posted to
//! - [`FrameElement`] — an iframe element whose content window may change
//!
//! This is the lowest layer of bellhop. The [`memory`] backend runs
//! whole conversations in-process; the `web` feature binds the same
//! traits to `web-sys`.

pub mod error;
pub mod memory;
pub mod traits;

#[cfg(feature = "web")]
pub mod web;

pub use error::{Result, TransportError};
pub use memory::{MemoryFrame, MemoryWindow, MessageBus};
pub use traits::{
    FrameElement, Host, ListenerId, LoadCallback, MessageEvent, MessageListener, Window, WindowId,
    ANY_ORIGIN,
};

#[cfg(feature = "web")]
pub use web::{WebFrame, WebHost};
