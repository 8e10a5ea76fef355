//! Cross-window messaging over `postMessage`.
//!
//! bellhop lets code inside an iframe and code in the hosting page talk to
//! each other: a handshake tells both sides when the other is listening,
//! sends issued too early are queued instead of lost, messages from any
//! window other than the counterpart are ignored, and payloads can carry
//! typed domain objects.
//!
//! # Crate Structure
//!
//! - [`transport`] — Window and `postMessage` abstraction (in-memory and browser backends)
//! - [`events`] — Priority-ordered listener registry
//! - [`wire`] — Envelope codec and typed-value revival
//! - [`channel`] — Connection lifecycle, handshake and send-later queue
//! - [`schema`] — Optional JSON Schema validation (behind `schema` feature)

/// Re-export transport types.
pub mod transport {
    pub use bellhop_transport::*;
}

/// Re-export event registry types.
pub mod events {
    pub use bellhop_events::*;
}

/// Re-export wire format types.
pub mod wire {
    pub use bellhop_wire::*;
}

/// Re-export channel types.
pub mod channel {
    pub use bellhop_channel::*;
}

/// Re-export schema types (requires `schema` feature).
#[cfg(feature = "schema")]
pub mod schema {
    pub use bellhop_schema::*;
}
