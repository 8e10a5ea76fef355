use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::event::{Event, Listener};

struct Entry<E> {
    listener: Listener<E>,
    priority: i32,
    once: bool,
}

/// Event-type keyed table of listeners.
///
/// Each type's list is kept sorted ascending by priority and dispatched
/// from the far end, so higher priorities run first and, within one
/// priority, the most recently registered listener runs first.
///
/// All methods take `&self`: listeners may register, remove or trigger on
/// the registry that is currently dispatching to them. Dispatch works on a
/// snapshot taken before the first listener runs, so a listener added
/// mid-dispatch waits for the next trigger and a listener removed
/// mid-dispatch still sees the current one.
pub struct EventRegistry<E> {
    listeners: RefCell<HashMap<String, Vec<Entry<E>>>>,
    destroyed: Cell<bool>,
}

impl<E: Event> EventRegistry<E> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            listeners: RefCell::new(HashMap::new()),
            destroyed: Cell::new(false),
        }
    }

    /// Register `listener` under every space-separated type in `types`.
    ///
    /// Registering the same listener twice for one type is a no-op; the
    /// first registration's priority is kept.
    pub fn on(&self, types: &str, listener: &Listener<E>, priority: i32) {
        self.insert(types, listener, priority, false);
    }

    /// Like [`EventRegistry::on`], but the listener is removed the first
    /// time it is dispatched to.
    pub fn once(&self, types: &str, listener: &Listener<E>, priority: i32) {
        self.insert(types, listener, priority, true);
    }

    /// Register several `(types, listener)` pairs at one priority.
    pub fn on_map<'a, I>(&self, entries: I, priority: i32)
    where
        I: IntoIterator<Item = (&'a str, Listener<E>)>,
    {
        for (types, listener) in entries {
            self.on(types, &listener, priority);
        }
    }

    /// Remove one listener from one type. Unknown types and listeners are ignored.
    pub fn off(&self, event_type: &str, listener: &Listener<E>) {
        let mut map = self.listeners.borrow_mut();
        let Some(entries) = map.get_mut(event_type) else {
            return;
        };
        entries.retain(|entry| !Rc::ptr_eq(&entry.listener, listener));
        if entries.is_empty() {
            map.remove(event_type);
        }
    }

    /// Remove every listener of one type.
    pub fn off_type(&self, event_type: &str) {
        self.listeners.borrow_mut().remove(event_type);
    }

    /// Remove every listener of every type.
    pub fn clear(&self) {
        self.listeners.borrow_mut().clear();
    }

    /// Dispatch `event` to the listeners of its type, highest priority first.
    pub fn trigger(&self, event: &E) {
        let snapshot: Vec<Listener<E>> = {
            let mut map = self.listeners.borrow_mut();
            let event_type = event.event_type();
            let Some(entries) = map.get_mut(event_type) else {
                return;
            };
            let snapshot = entries
                .iter()
                .rev()
                .map(|entry| entry.listener.clone())
                .collect();
            entries.retain(|entry| !entry.once);
            if entries.is_empty() {
                map.remove(event_type);
            }
            snapshot
        };

        for listener in snapshot {
            listener(event);
        }
    }

    /// Dispatch a bare event of type `event_type`.
    pub fn trigger_type(&self, event_type: &str) {
        self.trigger(&E::bare(event_type));
    }

    /// Whether any listener is registered for `event_type`.
    pub fn has_listeners(&self, event_type: &str) -> bool {
        self.listeners.borrow().contains_key(event_type)
    }

    /// Number of listeners registered for `event_type`.
    pub fn listener_count(&self, event_type: &str) -> usize {
        self.listeners
            .borrow()
            .get(event_type)
            .map_or(0, |entries| entries.len())
    }

    /// Types with at least one listener, sorted.
    pub fn event_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.listeners.borrow().keys().cloned().collect();
        types.sort_unstable();
        types
    }

    /// Drop every registration. Later registrations are ignored.
    pub fn destroy(&self) {
        self.destroyed.set(true);
        self.clear();
    }

    /// Whether [`EventRegistry::destroy`] has been called.
    pub fn is_destroyed(&self) -> bool {
        self.destroyed.get()
    }

    fn insert(&self, types: &str, listener: &Listener<E>, priority: i32, once: bool) {
        if self.destroyed.get() {
            tracing::debug!(types, "ignoring registration on destroyed registry");
            return;
        }

        let mut map = self.listeners.borrow_mut();
        for event_type in types.split_whitespace() {
            let entries = map.entry(event_type.to_string()).or_default();
            if entries
                .iter()
                .any(|entry| Rc::ptr_eq(&entry.listener, listener))
            {
                continue;
            }
            entries.push(Entry {
                listener: listener.clone(),
                priority,
                once,
            });
            entries.sort_by_key(|entry| entry.priority);
        }
    }
}

impl<E: Event> Default for EventRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for EventRegistry<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let map = self.listeners.borrow();
        let mut counts: Vec<(&String, usize)> =
            map.iter().map(|(kind, entries)| (kind, entries.len())).collect();
        counts.sort_unstable();
        f.debug_struct("EventRegistry")
            .field("listeners", &counts)
            .field("destroyed", &self.destroyed.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::event::listener;

    #[derive(Debug, Clone, PartialEq)]
    struct TestEvent {
        kind: String,
        value: i32,
    }

    impl Event for TestEvent {
        fn event_type(&self) -> &str {
            &self.kind
        }

        fn bare(event_type: &str) -> Self {
            Self {
                kind: event_type.to_string(),
                value: 0,
            }
        }
    }

    fn logging(log: &Rc<RefCell<Vec<String>>>, tag: &str) -> Listener<TestEvent> {
        let log = log.clone();
        let tag = tag.to_string();
        listener(move |event: &TestEvent| {
            log.borrow_mut().push(format!("{tag}:{}", event.kind));
        })
    }

    #[test]
    fn duplicate_registration_is_ignored() {
        let registry = EventRegistry::<TestEvent>::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let cb = logging(&log, "cb");

        registry.on("tick", &cb, 0);
        registry.on("tick", &cb, 5);
        assert_eq!(registry.listener_count("tick"), 1);

        registry.trigger_type("tick");
        assert_eq!(*log.borrow(), vec!["cb:tick"]);
    }

    #[test]
    fn higher_priority_runs_first_in_any_registration_order() {
        for high_first in [true, false] {
            let registry = EventRegistry::<TestEvent>::new();
            let log = Rc::new(RefCell::new(Vec::new()));
            let high = logging(&log, "high");
            let low = logging(&log, "low");

            if high_first {
                registry.on("go", &high, 10);
                registry.on("go", &low, 0);
            } else {
                registry.on("go", &low, 0);
                registry.on("go", &high, 10);
            }
            registry.trigger_type("go");

            assert_eq!(*log.borrow(), vec!["high:go", "low:go"]);
        }
    }

    #[test]
    fn equal_priority_runs_latest_registration_first() {
        let registry = EventRegistry::<TestEvent>::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        registry.on("go", &logging(&log, "first"), 0);
        registry.on("go", &logging(&log, "second"), 0);

        registry.trigger_type("go");
        assert_eq!(*log.borrow(), vec!["second:go", "first:go"]);
    }

    #[test]
    fn space_separated_types_register_each() {
        let registry = EventRegistry::<TestEvent>::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let cb = logging(&log, "cb");

        registry.on("pause  resume", &cb, 0);
        assert_eq!(registry.event_types(), vec!["pause", "resume"]);

        registry.trigger_type("resume");
        registry.trigger_type("pause");
        assert_eq!(*log.borrow(), vec!["cb:resume", "cb:pause"]);
    }

    #[test]
    fn on_map_registers_all_pairs() {
        let registry = EventRegistry::<TestEvent>::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        registry.on_map(
            [
                ("loaded", logging(&log, "a")),
                ("progress", logging(&log, "b")),
            ],
            0,
        );

        registry.trigger_type("progress");
        registry.trigger_type("loaded");
        assert_eq!(*log.borrow(), vec!["b:progress", "a:loaded"]);
    }

    #[test]
    fn trigger_passes_full_event() {
        let registry = EventRegistry::<TestEvent>::new();
        let seen = Rc::new(RefCell::new(None));
        let sink = seen.clone();
        registry.on(
            "score",
            &listener(move |event: &TestEvent| *sink.borrow_mut() = Some(event.clone())),
            0,
        );

        registry.trigger(&TestEvent {
            kind: "score".to_string(),
            value: 42,
        });
        assert_eq!(seen.borrow().as_ref().map(|e| e.value), Some(42));
    }

    #[test]
    fn off_variants() {
        let registry = EventRegistry::<TestEvent>::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let a = logging(&log, "a");
        let b = logging(&log, "b");
        let stranger = logging(&log, "stranger");

        registry.on("x y", &a, 0);
        registry.on("x", &b, 0);

        registry.off("x", &stranger);
        registry.off("missing", &a);
        assert_eq!(registry.listener_count("x"), 2);

        registry.off("x", &a);
        assert_eq!(registry.listener_count("x"), 1);

        registry.off_type("x");
        assert!(!registry.has_listeners("x"));
        assert!(registry.has_listeners("y"));

        registry.clear();
        assert!(registry.event_types().is_empty());

        registry.trigger_type("x");
        registry.trigger_type("y");
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn trigger_unknown_type_is_noop() {
        let registry = EventRegistry::<TestEvent>::new();
        registry.trigger_type("nothing");
        assert!(registry.event_types().is_empty());
    }

    #[test]
    fn once_listener_runs_a_single_time() {
        let registry = EventRegistry::<TestEvent>::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        registry.once("ping", &logging(&log, "once"), 0);
        registry.on("ping", &logging(&log, "always"), 0);

        registry.trigger_type("ping");
        registry.trigger_type("ping");

        assert_eq!(
            *log.borrow(),
            vec!["always:ping", "once:ping", "always:ping"]
        );
    }

    #[test]
    fn listener_added_during_dispatch_waits_for_next_trigger() {
        let registry = Rc::new(EventRegistry::<TestEvent>::new());
        let log = Rc::new(RefCell::new(Vec::new()));
        let late = logging(&log, "late");

        let weak = Rc::downgrade(&registry);
        let adder = {
            let late = late.clone();
            let log = log.clone();
            listener(move |event: &TestEvent| {
                log.borrow_mut().push(format!("adder:{}", event.kind));
                if let Some(registry) = weak.upgrade() {
                    registry.on("go", &late, 0);
                }
            })
        };
        registry.on("go", &adder, 0);

        registry.trigger_type("go");
        assert_eq!(*log.borrow(), vec!["adder:go"]);

        registry.trigger_type("go");
        assert_eq!(*log.borrow(), vec!["adder:go", "late:go", "adder:go"]);
    }

    #[test]
    fn listener_removed_during_dispatch_still_sees_current_trigger() {
        let registry = Rc::new(EventRegistry::<TestEvent>::new());
        let log = Rc::new(RefCell::new(Vec::new()));
        let victim = logging(&log, "victim");

        let weak = Rc::downgrade(&registry);
        let remover = {
            let victim = victim.clone();
            listener(move |_: &TestEvent| {
                if let Some(registry) = weak.upgrade() {
                    registry.off("go", &victim);
                }
            })
        };
        registry.on("go", &victim, 0);
        registry.on("go", &remover, 10);

        registry.trigger_type("go");
        registry.trigger_type("go");
        assert_eq!(*log.borrow(), vec!["victim:go"]);
    }

    #[test]
    fn destroy_makes_registry_inert() {
        let registry = EventRegistry::<TestEvent>::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let cb = logging(&log, "cb");
        registry.on("go", &cb, 0);

        registry.destroy();
        registry.on("go", &cb, 0);
        registry.trigger_type("go");

        assert!(registry.is_destroyed());
        assert!(log.borrow().is_empty());
    }
}
