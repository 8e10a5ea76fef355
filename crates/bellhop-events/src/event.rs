use std::rc::Rc;

/// Something a registry can dispatch: it names its own type.
pub trait Event {
    /// The event-type string listeners are keyed by.
    fn event_type(&self) -> &str;

    /// An event carrying nothing but its type.
    fn bare(event_type: &str) -> Self
    where
        Self: Sized;
}

/// A registered callback.
///
/// Listener identity is pointer identity: keep a clone of the `Rc` to
/// remove it later.
pub type Listener<E> = Rc<dyn Fn(&E)>;

/// Wrap a closure as a [`Listener`].
pub fn listener<E, F>(f: F) -> Listener<E>
where
    F: Fn(&E) + 'static,
{
    Rc::new(f)
}
