//! Priority-ordered event listener registry.
//!
//! Maps an event-type string to the listeners registered for it. This is
//! both the dispatch table a channel uses internally and the listener API
//! it exposes to application code.

pub mod event;
pub mod registry;

pub use event::{listener, Event, Listener};
pub use registry::EventRegistry;
