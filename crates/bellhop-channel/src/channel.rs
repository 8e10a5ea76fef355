use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use bellhop_events::{listener, EventRegistry, Listener};
use bellhop_transport::{FrameElement, Host, ListenerId, MessageEvent, Window};
use bellhop_wire::{
    decode_message, encode_envelope, ClassRegistry, Data, Envelope, Inbound, HANDSHAKE_TOKEN,
};

use crate::config::ChannelConfig;
use crate::error::{ChannelError, Result};
use crate::event::{ChannelEvent, Responder, CONNECTED_EVENT, FAILED_EVENT};

/// Which side of the conversation a channel is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Role {
    /// Lives inside an iframe and talks to its parent window.
    #[default]
    Child,
    /// Hosts an iframe and talks to its content window.
    Parent,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Child => "child",
            Role::Parent => "parent",
        }
    }
}

/// Connection lifecycle.
///
/// Only advances `Disconnected -> Connecting -> Connected`; returning to
/// `Disconnected` takes an explicit `disconnect` or `destroy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One side of a cross-window conversation.
///
/// Cloning yields another handle to the same channel.
#[derive(Clone)]
pub struct Channel {
    inner: Rc<ChannelInner>,
}

struct ChannelInner {
    host: Rc<dyn Host>,
    config: ChannelConfig,
    classes: RefCell<Arc<ClassRegistry>>,
    #[cfg(feature = "schema")]
    schemas: RefCell<Option<Arc<bellhop_schema::SchemaRegistry>>>,
    events: EventRegistry<ChannelEvent>,
    state: RefCell<ChannelState>,
}

#[derive(Default)]
struct ChannelState {
    phase: ConnectionState,
    role: Role,
    remote_origin: String,
    target: Option<Rc<dyn Window>>,
    pending: VecDeque<Envelope>,
    supported: bool,
    listener: Option<ListenerId>,
    destroyed: bool,
    // Bumped on every reset so deferred load callbacks can tell they are stale.
    generation: u64,
}

impl Channel {
    /// Create a disconnected channel living in `host`.
    pub fn new(host: Rc<dyn Host>) -> Self {
        Self::with_config(host, ChannelConfig::default())
    }

    /// Create a disconnected channel with explicit config.
    pub fn with_config(host: Rc<dyn Host>, config: ChannelConfig) -> Self {
        let remote_origin = config.default_origin.clone();
        Self {
            inner: Rc::new(ChannelInner {
                host,
                config,
                classes: RefCell::new(Arc::new(ClassRegistry::new())),
                #[cfg(feature = "schema")]
                schemas: RefCell::new(None),
                events: EventRegistry::new(),
                state: RefCell::new(ChannelState {
                    remote_origin,
                    ..ChannelState::default()
                }),
            }),
        }
    }

    /// Attach the class registry used to revive typed payloads.
    pub fn with_class_registry(self, classes: Arc<ClassRegistry>) -> Self {
        *self.inner.classes.borrow_mut() = classes;
        self
    }

    /// Attach a schema registry. Inbound envelopes whose data fails
    /// validation are dropped before dispatch.
    #[cfg(feature = "schema")]
    pub fn with_schema_registry(self, schemas: Arc<bellhop_schema::SchemaRegistry>) -> Self {
        *self.inner.schemas.borrow_mut() = Some(schemas);
        self
    }

    /// Connect using the configured default origin.
    ///
    /// Without a frame the channel is a child talking to its parent window;
    /// with one it is a parent talking to the frame's content window.
    pub fn connect(&self, frame: Option<&dyn FrameElement>) -> Result<()> {
        let origin = self.inner.config.default_origin.clone();
        self.connect_with_origin(frame, &origin)
    }

    /// Connect, posting to the counterpart with `origin` as target origin.
    ///
    /// Ignored while a connection attempt is already in progress.
    pub fn connect_with_origin(
        &self,
        frame: Option<&dyn FrameElement>,
        origin: &str,
    ) -> Result<()> {
        {
            let state = self.inner.state.borrow();
            if state.destroyed {
                return Err(ChannelError::Destroyed);
            }
            if state.phase == ConnectionState::Connecting {
                tracing::debug!("connect ignored: already connecting");
                return Ok(());
            }
        }
        self.disconnect();

        let role = if frame.is_some() {
            Role::Parent
        } else {
            Role::Child
        };
        let target = match frame {
            Some(frame) => frame.content_window(),
            None => Some(self.inner.host.parent()),
        };
        let own_id = self.inner.host.window().id();
        let target = target.filter(|target| target.id() != own_id);
        let supported = target.is_some();

        let weak = Rc::downgrade(&self.inner);
        let listener_id = self
            .inner
            .host
            .add_message_listener(Rc::new(move |event: &MessageEvent| {
                if let Some(inner) = weak.upgrade() {
                    (Channel { inner }).receive(event);
                }
            }))?;

        let generation = {
            let mut state = self.inner.state.borrow_mut();
            state.role = role;
            state.remote_origin = origin.to_string();
            state.target = target;
            state.supported = supported;
            state.listener = Some(listener_id);
            state.phase = ConnectionState::Connecting;
            state.generation
        };
        tracing::debug!(role = role.as_str(), origin, supported, "connecting");

        if !supported {
            tracing::debug!(role = role.as_str(), "no counterpart window");
            self.disconnect();
            self.inner.state.borrow_mut().supported = false;
            self.inner.events.trigger_type(FAILED_EVENT);
            return Ok(());
        }

        if role == Role::Child {
            if self.inner.host.is_loaded() {
                self.post_handshake();
            } else {
                let weak = Rc::downgrade(&self.inner);
                self.inner.host.on_load(Box::new(move || {
                    if let Some(inner) = weak.upgrade() {
                        (Channel { inner }).on_document_loaded(generation);
                    }
                }));
            }
        }
        Ok(())
    }

    /// Reset to `Disconnected`: forget the counterpart, the origin and any
    /// queued sends, and remove the transport listener. Idempotent.
    pub fn disconnect(&self) {
        let (listener, was) = {
            let mut state = self.inner.state.borrow_mut();
            let was = state.phase;
            state.phase = ConnectionState::Disconnected;
            state.remote_origin = self.inner.config.default_origin.clone();
            state.target = None;
            state.pending.clear();
            state.supported = false;
            state.generation = state.generation.wrapping_add(1);
            (state.listener.take(), was)
        };
        if let Some(id) = listener {
            self.inner.host.remove_message_listener(id);
        }
        if was != ConnectionState::Disconnected {
            tracing::debug!(from = was.as_str(), "disconnected");
        }
    }

    /// Disconnect and drop every listener. The channel cannot be
    /// connected again.
    pub fn destroy(&self) {
        self.disconnect();
        self.inner.state.borrow_mut().destroyed = true;
        self.inner.events.destroy();
    }

    /// Send an envelope to the counterpart.
    ///
    /// Queued while connecting, dropped while disconnected, posted
    /// immediately once connected.
    pub fn send(&self, kind: &str, data: Option<Data>) -> Result<()> {
        validate_event_type(kind)?;
        let envelope = Envelope::new(kind, data);

        let outbound = {
            let mut state = self.inner.state.borrow_mut();
            match state.phase {
                ConnectionState::Disconnected => {
                    tracing::debug!(kind, "dropping send while disconnected");
                    return Ok(());
                }
                ConnectionState::Connecting => {
                    state.pending.push_back(envelope);
                    return Ok(());
                }
                ConnectionState::Connected => match &state.target {
                    Some(target) => (target.clone(), state.remote_origin.clone()),
                    None => return Err(ChannelError::NotConnected),
                },
            }
        };

        let (target, origin) = outbound;
        let text = encode_envelope(&envelope)?;
        target.post_message(&text, &origin)?;
        Ok(())
    }

    /// Register `listener` under each space-separated type in `types`.
    pub fn on(&self, types: &str, listener: &Listener<ChannelEvent>, priority: i32) {
        self.inner.events.on(types, listener, priority);
    }

    /// Register a listener that removes itself after its first dispatch.
    pub fn once(&self, types: &str, listener: &Listener<ChannelEvent>, priority: i32) {
        self.inner.events.once(types, listener, priority);
    }

    /// Register several `(types, listener)` pairs at one priority.
    pub fn on_map<'a, I>(&self, entries: I, priority: i32)
    where
        I: IntoIterator<Item = (&'a str, Listener<ChannelEvent>)>,
    {
        self.inner.events.on_map(entries, priority);
    }

    /// Remove one listener from one type.
    pub fn off(&self, kind: &str, listener: &Listener<ChannelEvent>) {
        self.inner.events.off(kind, listener);
    }

    /// Remove every listener of one type.
    pub fn off_type(&self, kind: &str) {
        self.inner.events.off_type(kind);
    }

    /// Remove every listener.
    pub fn off_all(&self) {
        self.inner.events.clear();
    }

    /// Dispatch an event to local listeners only.
    pub fn trigger(&self, event: &ChannelEvent) {
        self.inner.events.trigger(event);
    }

    /// Listen for `kind`, then send `kind` with `data`.
    ///
    /// There is no request correlation: any `kind` envelope from the
    /// counterpart reaches `listener`.
    pub fn fetch(
        &self,
        kind: &str,
        listener: &Listener<ChannelEvent>,
        data: Option<Data>,
        run_once: bool,
    ) -> Result<()> {
        validate_event_type(kind)?;
        if self.state() == ConnectionState::Disconnected {
            return Err(ChannelError::NotConnected);
        }
        if run_once {
            self.once(kind, listener, 0);
        } else {
            self.on(kind, listener, 0);
        }
        self.send(kind, data)
    }

    /// Answer every `kind` envelope by sending `kind` back with the
    /// responder's payload.
    ///
    /// Returns the installed listener so it can be removed with
    /// [`Channel::off`].
    pub fn respond(
        &self,
        kind: &str,
        responder: Responder,
        run_once: bool,
    ) -> Result<Listener<ChannelEvent>> {
        validate_event_type(kind)?;
        let weak: Weak<ChannelInner> = Rc::downgrade(&self.inner);
        let reply_kind = kind.to_string();
        let reply = listener(move |_: &ChannelEvent| {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            if let Err(err) = (Channel { inner }).send(&reply_kind, responder.resolve()) {
                tracing::warn!(kind = %reply_kind, error = %err, "failed sending response");
            }
        });
        if run_once {
            self.once(kind, &reply, 0);
        } else {
            self.on(kind, &reply, 0);
        }
        Ok(reply)
    }

    /// Whether the handshake has completed.
    pub fn connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Whether a connection attempt is waiting for the handshake.
    pub fn connecting(&self) -> bool {
        self.state() == ConnectionState::Connecting
    }

    /// Whether the last `connect` found a counterpart window.
    pub fn supported(&self) -> bool {
        self.inner.state.borrow().supported
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.state.borrow().phase
    }

    pub fn role(&self) -> Role {
        self.inner.state.borrow().role
    }

    /// Target origin used for outbound messages.
    pub fn remote_origin(&self) -> String {
        self.inner.state.borrow().remote_origin.clone()
    }

    /// Number of sends waiting for the handshake.
    pub fn pending_len(&self) -> usize {
        self.inner.state.borrow().pending.len()
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.state.borrow().destroyed
    }

    /// Number of listeners registered for `kind`.
    pub fn listener_count(&self, kind: &str) -> usize {
        self.inner.events.listener_count(kind)
    }

    fn on_document_loaded(&self, generation: u64) {
        let current = {
            let state = self.inner.state.borrow();
            state.generation == generation && state.phase == ConnectionState::Connecting
        };
        if current {
            self.post_handshake();
        } else {
            tracing::debug!("ignoring load notification for a stale connection attempt");
        }
    }

    fn post_handshake(&self) {
        let Some((target, origin)) = self.outbound() else {
            return;
        };
        if let Err(err) = target.post_message(HANDSHAKE_TOKEN, &origin) {
            tracing::warn!(window = %target.id(), error = %err, "failed posting handshake");
        }
    }

    fn outbound(&self) -> Option<(Rc<dyn Window>, String)> {
        let state = self.inner.state.borrow();
        let target = state.target.clone()?;
        Some((target, state.remote_origin.clone()))
    }

    fn receive(&self, event: &MessageEvent) {
        let phase = {
            let state = self.inner.state.borrow();
            let Some(target) = &state.target else {
                return;
            };
            if event.source != Some(target.id()) {
                tracing::debug!(
                    source = ?event.source,
                    origin = %event.origin,
                    "dropping message from foreign window"
                );
                return;
            }
            state.phase
        };

        let decoded = {
            let classes = self.inner.classes.borrow().clone();
            decode_message(&event.data, &classes, &self.inner.config.wire)
        };
        match decoded {
            Ok(Inbound::Handshake) => self.on_handshake(phase),
            Ok(Inbound::Envelope(envelope)) => {
                if phase != ConnectionState::Connected {
                    tracing::debug!(kind = %envelope.kind, "dropping envelope before handshake");
                    return;
                }
                if !self.accepts(&envelope) {
                    return;
                }
                self.inner
                    .events
                    .trigger(&ChannelEvent::new(envelope.kind, envelope.data));
            }
            Ok(Inbound::Other(_)) => {
                tracing::debug!("dropping message without a string type");
            }
            Err(err) => {
                tracing::debug!(error = %err, "dropping undecodable message");
            }
        }
    }

    fn on_handshake(&self, phase: ConnectionState) {
        let role = self.role();
        match phase {
            ConnectionState::Connecting => {
                let pending = {
                    let mut state = self.inner.state.borrow_mut();
                    state.phase = ConnectionState::Connected;
                    std::mem::take(&mut state.pending)
                };
                tracing::info!(
                    role = role.as_str(),
                    flushed = pending.len(),
                    "handshake complete"
                );
                if role == Role::Parent {
                    self.post_handshake();
                }
                self.flush(pending);
                self.inner.events.trigger_type(CONNECTED_EVENT);
            }
            ConnectionState::Connected if role == Role::Parent => {
                tracing::debug!("counterpart reconnected; acknowledging again");
                self.post_handshake();
                self.inner.events.trigger_type(CONNECTED_EVENT);
            }
            _ => tracing::debug!(phase = phase.as_str(), "ignoring handshake token"),
        }
    }

    fn flush(&self, pending: VecDeque<Envelope>) {
        let Some((target, origin)) = self.outbound() else {
            return;
        };
        for envelope in pending {
            let posted = encode_envelope(&envelope)
                .map_err(ChannelError::from)
                .and_then(|text| {
                    target
                        .post_message(&text, &origin)
                        .map_err(ChannelError::from)
                });
            if let Err(err) = posted {
                tracing::warn!(kind = %envelope.kind, error = %err, "failed flushing queued send");
            }
        }
    }

    #[cfg(feature = "schema")]
    fn accepts(&self, envelope: &Envelope) -> bool {
        let schemas = self.inner.schemas.borrow().clone();
        let Some(schemas) = schemas else {
            return true;
        };
        let data = envelope.data.as_ref().map(Data::to_value);
        match schemas.validate(&envelope.kind, data.as_ref()) {
            Ok(()) => true,
            Err(err) => {
                tracing::debug!(kind = %envelope.kind, error = %err, "dropping schema-invalid envelope");
                false
            }
        }
    }

    #[cfg(not(feature = "schema"))]
    fn accepts(&self, _envelope: &Envelope) -> bool {
        true
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("Channel")
            .field("state", &state.phase)
            .field("role", &state.role)
            .field("remote_origin", &state.remote_origin)
            .field("target", &state.target.as_ref().map(|target| target.id()))
            .field("pending", &state.pending.len())
            .field("supported", &state.supported)
            .field("destroyed", &state.destroyed)
            .finish()
    }
}

fn validate_event_type(kind: &str) -> Result<()> {
    if kind.is_empty() || kind.chars().any(char::is_whitespace) {
        return Err(ChannelError::InvalidEventType(kind.to_string()));
    }
    Ok(())
}
