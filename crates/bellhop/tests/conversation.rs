use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use bellhop::channel::{Channel, ChannelError, ChannelEvent, ConnectionState, Responder};
use bellhop::events::{listener, Event, EventRegistry, Listener};
use bellhop::transport::{MemoryFrame, MemoryWindow, MessageBus, MessageEvent, Window, WindowId};
use bellhop::wire::{ClassRegistry, Data, FromWire, WireObject};
use serde_json::{json, Value};

struct Page {
    bus: MessageBus,
    top: MemoryWindow,
    frame: MemoryFrame,
    game: MemoryWindow,
}

fn page() -> Page {
    let bus = MessageBus::new();
    let top = bus.open_window("https://host.example");
    let (frame, game) = bus.open_frame(&top, "https://game.example");
    Page {
        bus,
        top,
        frame,
        game,
    }
}

type Log = Rc<RefCell<Vec<ChannelEvent>>>;

fn record(channel: &Channel, types: &str) -> Log {
    let log: Log = Rc::new(RefCell::new(Vec::new()));
    let sink = log.clone();
    channel.on(
        types,
        &listener(move |event: &ChannelEvent| sink.borrow_mut().push(event.clone())),
        0,
    );
    log
}

#[test]
fn early_child_send_arrives_once_after_parent_connects() {
    let page = page();
    page.game.begin_loading();
    let parent = Channel::new(Rc::new(page.top.clone()));
    let child = Channel::new(Rc::new(page.game.clone()));
    let received = record(&parent, "ready");

    child.connect(None).unwrap();
    child
        .send("ready", Some(Data::from(json!({ "v": 1 }))))
        .unwrap();
    assert_eq!(child.state(), ConnectionState::Connecting);
    assert_eq!(page.bus.pending(), 0);

    parent.connect(Some(&page.frame)).unwrap();
    page.game.finish_loading();
    page.bus.run_until_idle();

    let received = received.borrow();
    assert_eq!(received.len(), 1);
    assert_eq!(
        serde_json::to_value(&received[0]).unwrap(),
        json!({ "type": "ready", "data": { "v": 1 } })
    );
    assert!(parent.connected());
    assert!(child.connected());
}

#[test]
fn fifo_order_survives_the_send_later_queue() {
    let page = page();
    let parent = Channel::new(Rc::new(page.top.clone()));
    let child = Channel::new(Rc::new(page.game.clone()));
    let received = record(&parent, "step");

    parent.connect(Some(&page.frame)).unwrap();
    child.connect(None).unwrap();
    for n in 0..5i64 {
        child.send("step", Some(Data::from(n))).unwrap();
    }
    page.bus.run_until_idle();
    for n in 5..8i64 {
        child.send("step", Some(Data::from(n))).unwrap();
    }
    page.bus.run_until_idle();

    let steps: Vec<i64> = received
        .borrow()
        .iter()
        .filter_map(|event| event.data.as_ref().and_then(Data::as_i64))
        .collect();
    assert_eq!(steps, (0..8).collect::<Vec<_>>());
}

#[test]
fn disconnected_sends_transmit_nothing() {
    let page = page();
    let child = Channel::new(Rc::new(page.game.clone()));

    child.send("ready", None).unwrap();
    child.connect(None).unwrap();
    child.disconnect();
    child.send("ready", None).unwrap();

    // Only the handshake token from the brief connection attempt.
    assert_eq!(page.bus.pending(), 1);
    assert_eq!(child.pending_len(), 0);
}

#[test]
fn spoofed_sender_is_ignored() {
    let page = page();
    let parent = Channel::new(Rc::new(page.top.clone()));
    let child = Channel::new(Rc::new(page.game.clone()));
    parent.connect(Some(&page.frame)).unwrap();
    child.connect(None).unwrap();
    page.bus.run_until_idle();

    let intruder = page.bus.open_window("https://game.example");
    let seen = record(&parent, "score connected");

    intruder
        .proxy(page.top.id())
        .post_message(r#"{"type":"score","data":1}"#, "*")
        .unwrap();
    page.bus.inject(
        &page.top,
        MessageEvent {
            source: Some(WindowId(u64::MAX)),
            origin: "https://game.example".to_string(),
            data: "connected".to_string(),
        },
    );
    page.bus.run_until_idle();

    assert!(seen.borrow().is_empty());
}

#[test]
fn fetch_once_against_respond() {
    let page = page();
    let parent = Channel::new(Rc::new(page.top.clone()));
    let child = Channel::new(Rc::new(page.game.clone()));
    parent.connect(Some(&page.frame)).unwrap();
    child.connect(None).unwrap();
    page.bus.run_until_idle();

    parent
        .respond("ping", Responder::value("pong"), false)
        .unwrap();
    let calls: Log = Rc::new(RefCell::new(Vec::new()));
    let sink = calls.clone();
    let cb: Listener<ChannelEvent> =
        listener(move |event: &ChannelEvent| sink.borrow_mut().push(event.clone()));

    child
        .fetch("ping", &cb, Some(Data::from("x")), true)
        .unwrap();
    page.bus.run_until_idle();
    child.send("ping", Some(Data::from("again"))).unwrap();
    page.bus.run_until_idle();

    let calls = calls.borrow();
    assert_eq!(calls.len(), 1);
    assert_eq!(
        serde_json::to_value(&calls[0]).unwrap(),
        json!({ "type": "ping", "data": "pong" })
    );
}

#[test]
fn invalid_type_fails_synchronously() {
    let page = page();
    let child = Channel::new(Rc::new(page.game.clone()));
    child.connect(None).unwrap();

    let before = (child.state(), child.pending_len(), page.bus.pending());
    assert!(matches!(
        child.send("", None),
        Err(ChannelError::InvalidEventType(_))
    ));
    assert_eq!(
        (child.state(), child.pending_len(), page.bus.pending()),
        before
    );
}

#[derive(Debug, Default)]
struct Point {
    x: i64,
    y: i64,
    raw: Option<Value>,
}

impl WireObject for Point {
    fn class_name(&self) -> &str {
        "springroll.Point"
    }

    fn to_json(&self) -> Value {
        json!({ "x": self.x, "y": self.y })
    }
}

impl FromWire for Point {
    fn from_json(&mut self, raw: &Data) -> bellhop::wire::Result<()> {
        self.x = raw.get("x").and_then(Data::as_i64).unwrap_or_default();
        self.y = raw.get("y").and_then(Data::as_i64).unwrap_or_default();
        self.raw = Some(raw.to_value());
        Ok(())
    }
}

#[test]
fn classname_round_trip_revives_registered_type() {
    let page = page();
    let classes = Arc::new(
        ClassRegistry::new()
            .with::<Point>("springroll.Point")
            .unwrap(),
    );
    let parent = Channel::new(Rc::new(page.top.clone())).with_class_registry(classes);
    let child = Channel::new(Rc::new(page.game.clone()));
    parent.connect(Some(&page.frame)).unwrap();
    child.connect(None).unwrap();
    page.bus.run_until_idle();
    let seen = record(&parent, "move");

    child
        .send(
            "move",
            Some(Data::from(vec![
                Data::typed(Point {
                    x: 3,
                    y: 4,
                    raw: None,
                }),
                Data::from(json!({ "__classname": "springroll.Unknown", "z": 1 })),
            ])),
        )
        .unwrap();
    page.bus.run_until_idle();

    let seen = seen.borrow();
    let Some(Data::Array(items)) = seen[0].data.as_ref() else {
        panic!("expected array payload");
    };
    let point = items[0].as_typed::<Point>().expect("point should be revived");
    assert_eq!((point.x, point.y), (3, 4));
    assert_eq!(
        point.raw,
        Some(json!({ "__classname": "springroll.Point", "x": 3, "y": 4 }))
    );
    assert!(items[1].class_name().is_none());
    assert_eq!(items[1].get("z").and_then(Data::as_i64), Some(1));
}

#[derive(Debug, Clone, PartialEq)]
struct Named(String);

impl Event for Named {
    fn event_type(&self) -> &str {
        &self.0
    }

    fn bare(event_type: &str) -> Self {
        Named(event_type.to_string())
    }
}

#[test]
fn registry_dedupes_and_orders_by_priority() {
    let registry = EventRegistry::<Named>::new();
    let order = Rc::new(RefCell::new(Vec::new()));

    let low_sink = order.clone();
    let low: Listener<Named> = listener(move |_: &Named| low_sink.borrow_mut().push(0));
    let high_sink = order.clone();
    let high: Listener<Named> = listener(move |_: &Named| high_sink.borrow_mut().push(10));

    registry.on("tick", &low, 0);
    registry.on("tick", &low, 0);
    registry.on("tick", &high, 10);
    registry.trigger_type("tick");

    assert_eq!(*order.borrow(), vec![10, 0]);
    assert_eq!(registry.listener_count("tick"), 2);
}

#[test]
fn destroyed_channel_cannot_reconnect() {
    let page = page();
    let parent = Channel::new(Rc::new(page.top.clone()));
    parent.connect(Some(&page.frame)).unwrap();
    parent.destroy();

    assert!(matches!(
        parent.connect(Some(&page.frame)),
        Err(ChannelError::Destroyed)
    ));
    assert_eq!(page.top.listener_count(), 0);
}

#[cfg(feature = "schema")]
#[test]
fn schema_rejects_invalid_inbound_payloads() {
    use bellhop::schema::SchemaRegistry;

    let page = page();
    let schemas = SchemaRegistry::from_embedded(&[(
        "ready",
        r#"{"type":"object","properties":{"v":{"type":"integer"}},"required":["v"]}"#,
    )])
    .unwrap();
    let parent = Channel::new(Rc::new(page.top.clone())).with_schema_registry(Arc::new(schemas));
    let child = Channel::new(Rc::new(page.game.clone()));
    let seen = record(&parent, "ready");

    parent.connect(Some(&page.frame)).unwrap();
    child.connect(None).unwrap();
    child.send("ready", Some(Data::from(json!({ "v": "one" })))).unwrap();
    child.send("ready", Some(Data::from(json!({ "v": 1 })))).unwrap();
    page.bus.run_until_idle();

    assert_eq!(seen.borrow().len(), 1);
}
