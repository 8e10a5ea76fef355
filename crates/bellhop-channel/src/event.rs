use std::fmt;
use std::rc::Rc;

use bellhop_events::Event;
use bellhop_wire::Data;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;

/// Emitted locally when the handshake completes.
pub const CONNECTED_EVENT: &str = "connected";

/// Emitted locally when a channel has no counterpart window to talk to.
pub const FAILED_EVENT: &str = "failed";

/// An event dispatched to channel listeners: either a received envelope
/// or a local lifecycle notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Data>,
}

impl ChannelEvent {
    pub fn new(kind: impl Into<String>, data: Option<Data>) -> Self {
        Self {
            kind: kind.into(),
            data,
        }
    }

    /// Deserialize the payload into `T`. A missing payload decodes as `null`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        match &self.data {
            Some(data) => Ok(data.decode()?),
            None => Ok(serde_json::from_value(serde_json::Value::Null)?),
        }
    }
}

impl Event for ChannelEvent {
    fn event_type(&self) -> &str {
        &self.kind
    }

    fn bare(event_type: &str) -> Self {
        Self::new(event_type, None)
    }
}

/// What [`Channel::respond`](crate::Channel::respond) sends back.
#[derive(Clone)]
pub enum Responder {
    /// A fixed payload, or none.
    Value(Option<Data>),
    /// A payload computed each time a request arrives.
    Lazy(Rc<dyn Fn() -> Option<Data>>),
}

impl Responder {
    /// Respond with a fixed payload.
    pub fn value(data: impl Into<Data>) -> Self {
        Responder::Value(Some(data.into()))
    }

    /// Respond without a payload.
    pub fn empty() -> Self {
        Responder::Value(None)
    }

    /// Respond with the result of `f`, evaluated per request.
    pub fn lazy<F>(f: F) -> Self
    where
        F: Fn() -> Option<Data> + 'static,
    {
        Responder::Lazy(Rc::new(f))
    }

    pub(crate) fn resolve(&self) -> Option<Data> {
        match self {
            Responder::Value(data) => data.clone(),
            Responder::Lazy(f) => f(),
        }
    }
}

impl From<Data> for Responder {
    fn from(data: Data) -> Self {
        Responder::Value(Some(data))
    }
}

impl fmt::Debug for Responder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Responder::Value(data) => f.debug_tuple("Value").field(data).finish(),
            Responder::Lazy(_) => f.write_str("Lazy(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use serde::Deserialize;
    use serde_json::json;

    use super::*;

    #[test]
    fn decode_payload() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Ready {
            v: u32,
        }

        let event = ChannelEvent::new("ready", Some(Data::from(json!({ "v": 1 }))));
        assert_eq!(event.decode::<Ready>().unwrap(), Ready { v: 1 });
        assert!(event.decode::<String>().is_err());

        let bare = ChannelEvent::bare("pause");
        assert_eq!(bare.decode::<Option<Ready>>().unwrap(), None);
    }

    #[test]
    fn serializes_like_an_envelope() {
        let event = ChannelEvent::new("ping", Some(Data::from("pong")));
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({ "type": "ping", "data": "pong" })
        );
        assert_eq!(
            serde_json::to_value(ChannelEvent::bare("connected")).unwrap(),
            json!({ "type": "connected" })
        );
    }

    #[test]
    fn lazy_responder_runs_per_resolve() {
        let calls = Rc::new(Cell::new(0));
        let seen = calls.clone();
        let responder = Responder::lazy(move || {
            seen.set(seen.get() + 1);
            Some(Data::from(i64::from(seen.get())))
        });

        assert_eq!(responder.resolve(), Some(Data::from(1i64)));
        assert_eq!(responder.resolve(), Some(Data::from(2i64)));
        assert_eq!(calls.get(), 2);
        assert_eq!(Responder::empty().resolve(), None);
        assert_eq!(Responder::value("x").resolve(), Some(Data::from("x")));
    }
}
