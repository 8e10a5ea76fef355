//! In-process window backend.
//!
//! Every posted message becomes a queued delivery on a shared
//! [`MessageBus`], mirroring how a browser queues `message` tasks. Nothing
//! is delivered until the bus is driven with [`MessageBus::dispatch_next`]
//! or [`MessageBus::run_until_idle`].

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::rc::Rc;

use crate::error::{Result, TransportError};
use crate::traits::{
    FrameElement, Host, ListenerId, LoadCallback, MessageEvent, MessageListener, Window, WindowId,
    ANY_ORIGIN,
};

/// Upper bound on deliveries drained by one [`MessageBus::run_until_idle`] call.
pub const MAX_DELIVERIES_PER_RUN: usize = 10_000;

/// Shared task queue and window table for in-process conversations.
#[derive(Clone, Default)]
pub struct MessageBus {
    inner: Rc<BusInner>,
}

#[derive(Default)]
struct BusInner {
    next_window: Cell<u64>,
    next_listener: Cell<u64>,
    windows: RefCell<HashMap<WindowId, Rc<WindowState>>>,
    queue: RefCell<VecDeque<Delivery>>,
}

struct Delivery {
    to: WindowId,
    target_origin: String,
    event: MessageEvent,
}

struct WindowState {
    id: WindowId,
    origin: String,
    parent: Option<WindowId>,
    loaded: Cell<bool>,
    closed: Cell<bool>,
    load_callbacks: RefCell<Vec<LoadCallback>>,
    listeners: RefCell<Vec<(ListenerId, MessageListener)>>,
}

impl MessageBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a top-level window. Its parent is itself.
    pub fn open_window(&self, origin: &str) -> MemoryWindow {
        self.create_window(origin, None)
    }

    /// Open a window nested inside `parent`, without an iframe element.
    pub fn open_child(&self, parent: &MemoryWindow, origin: &str) -> MemoryWindow {
        self.create_window(origin, Some(parent.id()))
    }

    /// Open an iframe element in `owner` together with its content window.
    pub fn open_frame(&self, owner: &MemoryWindow, origin: &str) -> (MemoryFrame, MemoryWindow) {
        let child = self.open_child(owner, origin);
        let frame = MemoryFrame::empty(owner);
        frame.navigate(&child);
        (frame, child)
    }

    /// Number of queued deliveries.
    pub fn pending(&self) -> usize {
        self.inner.queue.borrow().len()
    }

    /// Queue a hand-crafted event for `to`, bypassing any window proxy.
    ///
    /// The event is delivered with a wildcard target origin, so `source` and
    /// `origin` can be set to anything.
    pub fn inject(&self, to: &MemoryWindow, event: MessageEvent) {
        self.inner.queue.borrow_mut().push_back(Delivery {
            to: to.id(),
            target_origin: ANY_ORIGIN.to_string(),
            event,
        });
    }

    /// Deliver the oldest queued message. Returns `false` when the queue is empty.
    pub fn dispatch_next(&self) -> bool {
        let delivery = self.inner.queue.borrow_mut().pop_front();
        let Some(delivery) = delivery else {
            return false;
        };

        let recipient = self.inner.windows.borrow().get(&delivery.to).cloned();
        let Some(recipient) = recipient else {
            tracing::debug!(to = %delivery.to, "dropping message for unknown window");
            return true;
        };
        if recipient.closed.get() {
            tracing::debug!(to = %delivery.to, "dropping message for closed window");
            return true;
        }
        if delivery.target_origin != ANY_ORIGIN && delivery.target_origin != recipient.origin {
            tracing::debug!(
                to = %delivery.to,
                target_origin = %delivery.target_origin,
                origin = %recipient.origin,
                "dropping message for mismatched target origin"
            );
            return true;
        }

        let listeners: Vec<MessageListener> = recipient
            .listeners
            .borrow()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in listeners {
            listener(&delivery.event);
        }
        true
    }

    /// Deliver queued messages, including any posted while delivering,
    /// until the queue is empty. Returns the number of deliveries made.
    pub fn run_until_idle(&self) -> usize {
        let mut delivered = 0usize;
        while delivered < MAX_DELIVERIES_PER_RUN && self.dispatch_next() {
            delivered += 1;
        }
        if delivered == MAX_DELIVERIES_PER_RUN && self.pending() > 0 {
            tracing::warn!(
                pending = self.pending(),
                "message bus still busy after {MAX_DELIVERIES_PER_RUN} deliveries"
            );
        }
        delivered
    }

    fn create_window(&self, origin: &str, parent: Option<WindowId>) -> MemoryWindow {
        let next = self.inner.next_window.get() + 1;
        self.inner.next_window.set(next);
        let state = Rc::new(WindowState {
            id: WindowId(next),
            origin: origin.to_string(),
            parent,
            loaded: Cell::new(true),
            closed: Cell::new(false),
            load_callbacks: RefCell::new(Vec::new()),
            listeners: RefCell::new(Vec::new()),
        });
        self.inner.windows.borrow_mut().insert(state.id, state.clone());
        MemoryWindow {
            bus: self.clone(),
            state,
        }
    }

    fn is_open(&self, id: WindowId) -> bool {
        self.inner
            .windows
            .borrow()
            .get(&id)
            .is_some_and(|state| !state.closed.get())
    }

    fn enqueue(&self, delivery: Delivery) {
        self.inner.queue.borrow_mut().push_back(delivery);
    }
}

impl fmt::Debug for MessageBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageBus")
            .field("windows", &self.inner.windows.borrow().len())
            .field("pending", &self.pending())
            .finish()
    }
}

/// A simulated browser window living on a [`MessageBus`].
#[derive(Clone)]
pub struct MemoryWindow {
    bus: MessageBus,
    state: Rc<WindowState>,
}

impl MemoryWindow {
    /// Identity of this window.
    pub fn id(&self) -> WindowId {
        self.state.id
    }

    /// Origin of the document in this window.
    pub fn origin(&self) -> &str {
        &self.state.origin
    }

    /// Mark the document as still loading. Load callbacks are held until
    /// [`MemoryWindow::finish_loading`].
    pub fn begin_loading(&self) {
        self.state.loaded.set(false);
    }

    /// Mark the document as loaded and run pending load callbacks.
    pub fn finish_loading(&self) {
        self.state.loaded.set(true);
        let callbacks = std::mem::take(&mut *self.state.load_callbacks.borrow_mut());
        for callback in callbacks {
            callback();
        }
    }

    /// Close the window. Queued and future deliveries to it are dropped.
    pub fn close(&self) {
        self.state.closed.set(true);
        self.state.listeners.borrow_mut().clear();
        self.state.load_callbacks.borrow_mut().clear();
    }

    /// Whether [`MemoryWindow::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.state.closed.get()
    }

    /// Number of installed `message` listeners.
    pub fn listener_count(&self) -> usize {
        self.state.listeners.borrow().len()
    }

    /// The bus this window lives on.
    pub fn bus(&self) -> &MessageBus {
        &self.bus
    }

    /// A reference to `target` as seen from this window. Messages posted
    /// through it carry this window as their source.
    pub fn proxy(&self, target: WindowId) -> Rc<dyn Window> {
        Rc::new(WindowProxy {
            bus: self.bus.clone(),
            from: self.state.id,
            from_origin: self.state.origin.clone(),
            to: target,
        })
    }
}

impl fmt::Debug for MemoryWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryWindow")
            .field("id", &self.state.id)
            .field("origin", &self.state.origin)
            .field("parent", &self.state.parent)
            .field("loaded", &self.state.loaded.get())
            .finish()
    }
}

impl Host for MemoryWindow {
    fn window(&self) -> Rc<dyn Window> {
        self.proxy(self.state.id)
    }

    fn parent(&self) -> Rc<dyn Window> {
        self.proxy(self.state.parent.unwrap_or(self.state.id))
    }

    fn is_loaded(&self) -> bool {
        self.state.loaded.get()
    }

    fn on_load(&self, callback: LoadCallback) {
        self.state.load_callbacks.borrow_mut().push(callback);
    }

    fn add_message_listener(&self, listener: MessageListener) -> Result<ListenerId> {
        if self.state.closed.get() {
            return Err(TransportError::Listener(format!(
                "{} is closed",
                self.state.id
            )));
        }
        let next = self.bus.inner.next_listener.get() + 1;
        self.bus.inner.next_listener.set(next);
        let id = ListenerId(next);
        self.state.listeners.borrow_mut().push((id, listener));
        Ok(id)
    }

    fn remove_message_listener(&self, id: ListenerId) {
        self.state
            .listeners
            .borrow_mut()
            .retain(|(existing, _)| *existing != id);
    }
}

/// A window reference held by one window and pointing at another.
struct WindowProxy {
    bus: MessageBus,
    from: WindowId,
    from_origin: String,
    to: WindowId,
}

impl Window for WindowProxy {
    fn id(&self) -> WindowId {
        self.to
    }

    fn post_message(&self, message: &str, target_origin: &str) -> Result<()> {
        if !self.bus.is_open(self.to) {
            return Err(TransportError::Closed(self.to.0));
        }
        self.bus.enqueue(Delivery {
            to: self.to,
            target_origin: target_origin.to_string(),
            event: MessageEvent {
                source: Some(self.from),
                origin: self.from_origin.clone(),
                data: message.to_string(),
            },
        });
        Ok(())
    }
}

/// A simulated iframe element owned by a [`MemoryWindow`].
#[derive(Clone)]
pub struct MemoryFrame {
    owner: MemoryWindow,
    content: Rc<Cell<Option<WindowId>>>,
}

impl MemoryFrame {
    /// An iframe element with no content window yet.
    pub fn empty(owner: &MemoryWindow) -> Self {
        Self {
            owner: owner.clone(),
            content: Rc::new(Cell::new(None)),
        }
    }

    /// Point the frame at a new content window.
    pub fn navigate(&self, window: &MemoryWindow) {
        self.content.set(Some(window.id()));
    }

    /// Remove the frame's content window.
    pub fn detach(&self) {
        self.content.set(None);
    }
}

impl FrameElement for MemoryFrame {
    fn content_window(&self) -> Option<Rc<dyn Window>> {
        let id = self.content.get()?;
        if !self.owner.bus.is_open(id) {
            return None;
        }
        Some(self.owner.proxy(id))
    }
}

impl fmt::Debug for MemoryFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryFrame")
            .field("owner", &self.owner.id())
            .field("content", &self.content.get())
            .finish()
    }
}
