//! A host page and an embedded game talking through bellhop, in memory.
//!
//! The game starts loading, queues a `ready` message before anyone is
//! listening, and asks the host for its settings. The host connects once
//! the frame exists; the queued messages arrive after the handshake.
//!
//! Run with:
//!   cargo run --example iframe-handshake

use std::rc::Rc;
use std::sync::Arc;

use bellhop::channel::{Channel, ChannelEvent, Responder};
use bellhop::events::listener;
use bellhop::transport::MessageBus;
use bellhop::wire::{ClassRegistry, Data, FromWire, WireObject, WireError};
use serde_json::{json, Value};

#[derive(Debug, Default)]
struct Settings {
    volume: f64,
    captions: bool,
}

impl WireObject for Settings {
    fn class_name(&self) -> &str {
        "game.Settings"
    }

    fn to_json(&self) -> Value {
        json!({ "volume": self.volume, "captions": self.captions })
    }
}

impl FromWire for Settings {
    fn from_json(&mut self, raw: &Data) -> bellhop::wire::Result<()> {
        self.volume = raw
            .get("volume")
            .and_then(Data::as_f64)
            .ok_or_else(|| WireError::Revival {
                class: "game.Settings".to_string(),
                message: "missing volume".to_string(),
            })?;
        self.captions = raw.get("captions").and_then(Data::as_bool).unwrap_or(false);
        Ok(())
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let classes = Arc::new(ClassRegistry::new().with::<Settings>("game.Settings")?);

    let bus = MessageBus::new();
    let page = bus.open_window("https://host.example");
    let (frame, game) = bus.open_frame(&page, "https://game.example");
    game.begin_loading();

    let host = Channel::new(Rc::new(page.clone()));
    host.on(
        "ready",
        &listener(|event: &ChannelEvent| eprintln!("host <- ready {:?}", event.data)),
        0,
    );
    host.respond(
        "settings",
        Responder::value(Data::typed(Settings {
            volume: 0.8,
            captions: true,
        })),
        false,
    )?;

    let client = Channel::new(Rc::new(game.clone())).with_class_registry(classes);
    client.on(
        "connected",
        &listener(|_: &ChannelEvent| eprintln!("game connected")),
        0,
    );
    client.connect(None)?;
    client.send("ready", Some(Data::from(json!({ "v": 1 }))))?;
    client.fetch(
        "settings",
        &listener(|event: &ChannelEvent| {
            if let Some(settings) = event.data.as_ref().and_then(Data::as_typed::<Settings>) {
                eprintln!(
                    "game <- settings volume={} captions={}",
                    settings.volume, settings.captions
                );
            }
        }),
        None,
        true,
    )?;
    eprintln!("game queued {} messages", client.pending_len());

    host.connect(Some(&frame))?;
    game.finish_loading();
    let delivered = bus.run_until_idle();
    eprintln!("delivered {delivered} messages");

    client.destroy();
    host.destroy();
    Ok(())
}
