use std::cell::RefCell;
use std::rc::Rc;

use bellhop_channel::{Channel, ChannelEvent, Responder};
use bellhop_events::listener;
use bellhop_transport::MessageBus;
use bellhop_wire::Data;
use serde::Serialize;

use crate::cmd::SimulateArgs;
use crate::exit::{channel_error, CliError, CliResult, FAILURE, SUCCESS, USAGE};
use crate::output::{data_preview, now_unix_seconds, print_json, print_raw, print_table, OutputFormat};

const HOST_ORIGIN: &str = "https://host.example";
const GAME_ORIGIN: &str = "https://game.example";

#[derive(Serialize, Clone)]
struct Received {
    side: &'static str,
    #[serde(flatten)]
    event: ChannelEvent,
}

#[derive(Serialize)]
struct SimulationOutput<'a> {
    schema_id: &'static str,
    origin: &'a str,
    parent_state: &'static str,
    child_state: &'static str,
    received: &'a [Received],
    timestamp: String,
}

/// A `TYPE` or `TYPE=JSON` argument.
#[derive(Debug, Clone, PartialEq)]
struct Message {
    kind: String,
    data: Option<Data>,
}

pub fn run(args: SimulateArgs, format: OutputFormat) -> CliResult<i32> {
    let early = parse_messages("--early", &args.early)?;
    let later = parse_messages("--send", &args.send)?;
    let responses = parse_messages("--respond", &args.respond)?;

    let bus = MessageBus::new();
    let top = bus.open_window(HOST_ORIGIN);
    let (frame, game) = bus.open_frame(&top, GAME_ORIGIN);
    if args.child_loading {
        game.begin_loading();
    }

    let parent = Channel::new(Rc::new(top.clone()));
    let child = Channel::new(Rc::new(game.clone()));

    let received = Rc::new(RefCell::new(Vec::new()));
    let mut types: Vec<&str> = vec!["connected", "failed"];
    types.extend(early.iter().chain(&later).map(|m| m.kind.as_str()));
    types.extend(responses.iter().map(|m| m.kind.as_str()));
    let types = types.join(" ");
    record(&parent, "parent", &types, &received);
    record(&child, "child", &types, &received);

    for response in &responses {
        let responder = Responder::Value(response.data.clone());
        parent
            .respond(&response.kind, responder, false)
            .map_err(|err| channel_error("respond failed", err))?;
    }

    child
        .connect_with_origin(None, &args.origin)
        .map_err(|err| channel_error("child connect failed", err))?;
    for message in &early {
        child
            .send(&message.kind, message.data.clone())
            .map_err(|err| channel_error("early send failed", err))?;
    }
    tracing::debug!(queued = child.pending_len(), "child sends queued");

    parent
        .connect_with_origin(Some(&frame), &args.origin)
        .map_err(|err| channel_error("parent connect failed", err))?;
    if args.child_loading {
        game.finish_loading();
    }
    let handshake_deliveries = bus.run_until_idle();
    tracing::debug!(deliveries = handshake_deliveries, "handshake settled");

    for message in &later {
        child
            .send(&message.kind, message.data.clone())
            .map_err(|err| channel_error("send failed", err))?;
    }
    bus.run_until_idle();

    let received = received.borrow();
    print_simulation(&args.origin, &parent, &child, &received, format);

    if parent.connected() && child.connected() {
        Ok(SUCCESS)
    } else {
        Ok(FAILURE)
    }
}

fn record(channel: &Channel, side: &'static str, types: &str, sink: &Rc<RefCell<Vec<Received>>>) {
    let sink = sink.clone();
    channel.on(
        types,
        &listener(move |event: &ChannelEvent| {
            sink.borrow_mut().push(Received {
                side,
                event: event.clone(),
            });
        }),
        0,
    );
}

fn print_simulation(
    origin: &str,
    parent: &Channel,
    child: &Channel,
    received: &[Received],
    format: OutputFormat,
) {
    match format {
        OutputFormat::Json => print_json(&SimulationOutput {
            schema_id: "https://schemas.3leaps.dev/bellhop/cli/v1/simulation.schema.json",
            origin,
            parent_state: parent.state().as_str(),
            child_state: child.state().as_str(),
            received,
            timestamp: now_unix_seconds(),
        }),
        OutputFormat::Table => print_table(
            &["SIDE", "TYPE", "DATA"],
            received
                .iter()
                .map(|r| {
                    vec![
                        r.side.to_string(),
                        r.event.kind.clone(),
                        data_preview(r.event.data.as_ref()),
                    ]
                })
                .collect(),
        ),
        OutputFormat::Pretty => {
            for r in received {
                println!(
                    "{} <- {} {}",
                    r.side,
                    r.event.kind,
                    data_preview(r.event.data.as_ref())
                );
            }
            println!("parent={} child={}", parent.state(), child.state());
        }
        OutputFormat::Raw => {
            for r in received {
                print_raw(&serde_json::to_string(&r.event).unwrap_or_else(|_| "{}".to_string()));
            }
        }
    }
}

fn parse_messages(flag: &str, raw: &[String]) -> CliResult<Vec<Message>> {
    raw.iter().map(|arg| parse_message(flag, arg)).collect()
}

fn parse_message(flag: &str, arg: &str) -> CliResult<Message> {
    let (kind, data) = match arg.split_once('=') {
        Some((kind, json)) => {
            let value: serde_json::Value = serde_json::from_str(json).map_err(|err| {
                CliError::new(USAGE, format!("{flag} {kind}: payload is not valid JSON: {err}"))
            })?;
            (kind, Some(Data::from(value)))
        }
        None => (arg, None),
    };
    if kind.is_empty() {
        return Err(CliError::new(USAGE, format!("{flag}: missing event type")));
    }
    Ok(Message {
        kind: kind.to_string(),
        data,
    })
}
