use std::fs;
use std::io::Read;

use bellhop_schema::SchemaRegistry;
use bellhop_wire::{decode_message, ClassRegistry, Data, Inbound, WireConfig};
use serde::Serialize;

use crate::cmd::DecodeArgs;
use crate::exit::{io_error, schema_error, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{data_preview, print_json, print_raw, print_table, OutputFormat};

#[derive(Serialize)]
struct DecodeOutput {
    schema_id: &'static str,
    kind: &'static str,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    event_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Data>,
    size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    validated: Option<bool>,
}

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let message = read_message(&args)?;
    let schemas = match &args.validate {
        Some(dir) => Some(
            SchemaRegistry::from_directory(dir)
                .map_err(|err| schema_error("failed loading schemas", err))?,
        ),
        None => None,
    };

    let mut out = DecodeOutput {
        schema_id: "https://schemas.3leaps.dev/bellhop/cli/v1/decoded-message.schema.json",
        kind: "foreign",
        event_type: None,
        data: None,
        size: message.len(),
        reason: None,
        validated: None,
    };

    match decode_message(&message, &ClassRegistry::new(), &WireConfig::default()) {
        Ok(Inbound::Handshake) => out.kind = "handshake",
        Ok(Inbound::Envelope(envelope)) => {
            out.kind = "envelope";
            if let Some(schemas) = &schemas {
                let value = envelope.data.as_ref().map(Data::to_value);
                schemas
                    .validate(&envelope.kind, value.as_ref())
                    .map_err(|err| schema_error("payload rejected", err))?;
                out.validated = Some(schemas.has_schema(&envelope.kind));
            }
            out.event_type = Some(envelope.kind);
            out.data = envelope.data;
        }
        Ok(Inbound::Other(_)) => out.reason = Some("not an object with a string type".to_string()),
        Err(err) => out.reason = Some(err.to_string()),
    }

    print_decoded(&out, format);
    if out.kind == "foreign" {
        Ok(DATA_INVALID)
    } else {
        Ok(SUCCESS)
    }
}

fn read_message(args: &DecodeArgs) -> CliResult<String> {
    if let Some(message) = &args.message {
        return Ok(message.clone());
    }
    if let Some(path) = &args.file {
        return fs::read_to_string(path)
            .map(|text| text.trim_end_matches(['\r', '\n']).to_string())
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err));
    }
    let mut text = String::new();
    std::io::stdin()
        .read_to_string(&mut text)
        .map_err(|err| io_error("failed reading stdin", err))?;
    Ok(text.trim_end_matches(['\r', '\n']).to_string())
}

fn print_decoded(out: &DecodeOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table => print_table(
            &["KIND", "TYPE", "SIZE", "DATA"],
            vec![vec![
                out.kind.to_string(),
                out.event_type.clone().unwrap_or_else(|| "-".to_string()),
                out.size.to_string(),
                out.reason
                    .clone()
                    .unwrap_or_else(|| data_preview(out.data.as_ref())),
            ]],
        ),
        OutputFormat::Pretty => {
            let mut line = format!("kind={} size={}", out.kind, out.size);
            if let Some(kind) = &out.event_type {
                line.push_str(&format!(" type={kind} data={}", data_preview(out.data.as_ref())));
            }
            if let Some(reason) = &out.reason {
                line.push_str(&format!(" reason={reason}"));
            }
            println!("{line}");
        }
        OutputFormat::Raw => print_raw(out.kind),
    }
}
