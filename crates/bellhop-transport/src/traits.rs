use std::fmt;
use std::rc::Rc;

use crate::error::Result;

/// Target origin that matches any recipient.
pub const ANY_ORIGIN: &str = "*";

/// Opaque identity of a window.
///
/// Two references denote the same window exactly when their ids are equal.
/// This is what inbound messages are authenticated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowId(pub u64);

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "window-{}", self.0)
    }
}

/// A `message` event as delivered to a host window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEvent {
    /// Window that posted the message, if the platform exposes it.
    pub source: Option<WindowId>,
    /// Origin of the sending document.
    pub origin: String,
    /// Text payload.
    pub data: String,
}

/// Handle for an installed `message` listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Callback invoked for every `message` event on a host window.
pub type MessageListener = Rc<dyn Fn(&MessageEvent)>;

/// Callback invoked once the host document has finished loading.
pub type LoadCallback = Box<dyn FnOnce()>;

/// A reference to another window that messages can be posted to.
pub trait Window {
    /// Identity of the referenced window.
    fn id(&self) -> WindowId;

    /// Post a text message. Delivery is asynchronous; a `target_origin`
    /// other than [`ANY_ORIGIN`] restricts delivery to documents of that origin.
    fn post_message(&self, message: &str, target_origin: &str) -> Result<()>;
}

/// The local window a channel lives in.
pub trait Host {
    /// The host window itself.
    fn window(&self) -> Rc<dyn Window>;

    /// The parent window. Top-level windows return themselves.
    fn parent(&self) -> Rc<dyn Window>;

    /// Whether the host document has finished loading.
    fn is_loaded(&self) -> bool;

    /// Run `callback` once the document has loaded.
    ///
    /// Callers check [`Host::is_loaded`] first; a callback registered after
    /// load may never fire.
    fn on_load(&self, callback: LoadCallback);

    /// Install a `message` listener.
    fn add_message_listener(&self, listener: MessageListener) -> Result<ListenerId>;

    /// Remove a previously installed listener. Unknown ids are ignored.
    fn remove_message_listener(&self, id: ListenerId);
}

/// An iframe element embedded in the host document.
pub trait FrameElement {
    /// The frame's current content window, if it has one.
    fn content_window(&self) -> Option<Rc<dyn Window>>;
}
