//! Browser backend over `web-sys`.
//!
//! Window identity is resolved with `Object.is` against every window this
//! host has handed out (itself, its parent, iframe content windows).
//! Messages from any other window arrive with `source: None`.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::HtmlIFrameElement;

use crate::error::{Result, TransportError};
use crate::traits::{
    FrameElement, Host, ListenerId, LoadCallback, MessageEvent, MessageListener, Window, WindowId,
};

type JsMessageClosure = Closure<dyn FnMut(web_sys::MessageEvent)>;

/// The browser window the current script runs in.
#[derive(Clone)]
pub struct WebHost {
    window: web_sys::Window,
    state: Rc<WebState>,
}

struct WebState {
    known: RefCell<Vec<(WindowId, web_sys::Window)>>,
    next_window: Cell<u64>,
    listeners: RefCell<HashMap<ListenerId, JsMessageClosure>>,
    next_listener: Cell<u64>,
}

impl WebState {
    fn identify(&self, window: &web_sys::Window) -> WindowId {
        if let Some(id) = self.lookup(window.as_ref()) {
            return id;
        }
        let next = self.next_window.get() + 1;
        self.next_window.set(next);
        let id = WindowId(next);
        self.known.borrow_mut().push((id, window.clone()));
        id
    }

    fn lookup(&self, value: &JsValue) -> Option<WindowId> {
        self.known
            .borrow()
            .iter()
            .find(|(_, known)| js_sys::Object::is(known.as_ref(), value))
            .map(|(id, _)| *id)
    }
}

impl WebHost {
    /// Bind to the global `window`.
    pub fn new() -> Result<Self> {
        let window = web_sys::window()
            .ok_or_else(|| TransportError::Listener("no global window".to_string()))?;
        let state = Rc::new(WebState {
            known: RefCell::new(Vec::new()),
            next_window: Cell::new(0),
            listeners: RefCell::new(HashMap::new()),
            next_listener: Cell::new(0),
        });
        state.identify(&window);
        Ok(Self { window, state })
    }

    fn reference(&self, window: web_sys::Window) -> Rc<dyn Window> {
        Rc::new(WebWindowRef {
            id: self.state.identify(&window),
            window,
        })
    }
}

impl Host for WebHost {
    fn window(&self) -> Rc<dyn Window> {
        self.reference(self.window.clone())
    }

    fn parent(&self) -> Rc<dyn Window> {
        match self.window.parent() {
            Ok(Some(parent)) => self.reference(parent),
            _ => self.window(),
        }
    }

    fn is_loaded(&self) -> bool {
        self.window
            .document()
            .is_some_and(|document| document.ready_state() == "complete")
    }

    fn on_load(&self, callback: LoadCallback) {
        let handler = Closure::once_into_js(move || callback());
        if let Err(err) = self
            .window
            .add_event_listener_with_callback("load", handler.unchecked_ref())
        {
            tracing::warn!(error = ?err, "failed installing load listener");
        }
    }

    fn add_message_listener(&self, listener: MessageListener) -> Result<ListenerId> {
        let state: Weak<WebState> = Rc::downgrade(&self.state);
        let closure: JsMessageClosure = Closure::wrap(Box::new(move |event: web_sys::MessageEvent| {
            let Some(data) = event.data().as_string() else {
                return;
            };
            let source = match (state.upgrade(), event.source()) {
                (Some(state), Some(source)) => state.lookup(source.as_ref()),
                _ => None,
            };
            listener(&MessageEvent {
                source,
                origin: event.origin(),
                data,
            });
        }) as Box<dyn FnMut(web_sys::MessageEvent)>);

        self.window
            .add_event_listener_with_callback("message", closure.as_ref().unchecked_ref())
            .map_err(|err| TransportError::Listener(format!("{err:?}")))?;

        let next = self.state.next_listener.get() + 1;
        self.state.next_listener.set(next);
        let id = ListenerId(next);
        self.state.listeners.borrow_mut().insert(id, closure);
        Ok(id)
    }

    fn remove_message_listener(&self, id: ListenerId) {
        let Some(closure) = self.state.listeners.borrow_mut().remove(&id) else {
            return;
        };
        if let Err(err) = self
            .window
            .remove_event_listener_with_callback("message", closure.as_ref().unchecked_ref())
        {
            tracing::warn!(error = ?err, "failed removing message listener");
        }
    }
}

struct WebWindowRef {
    id: WindowId,
    window: web_sys::Window,
}

impl Window for WebWindowRef {
    fn id(&self) -> WindowId {
        self.id
    }

    fn post_message(&self, message: &str, target_origin: &str) -> Result<()> {
        self.window
            .post_message(&JsValue::from_str(message), target_origin)
            .map_err(|err| TransportError::Post(format!("{err:?}")))
    }
}

/// An `<iframe>` element in the host document.
pub struct WebFrame {
    host: WebHost,
    element: HtmlIFrameElement,
}

impl WebFrame {
    /// Wrap an iframe element owned by `host`'s document.
    pub fn new(host: &WebHost, element: HtmlIFrameElement) -> Self {
        Self {
            host: host.clone(),
            element,
        }
    }
}

impl FrameElement for WebFrame {
    fn content_window(&self) -> Option<Rc<dyn Window>> {
        self.element
            .content_window()
            .map(|window| self.host.reference(window))
    }
}
