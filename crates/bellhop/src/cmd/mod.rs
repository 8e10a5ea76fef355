use clap::{Args, Subcommand};
use std::path::PathBuf;

use bellhop_transport::ANY_ORIGIN;

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod decode;
pub mod simulate;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a parent/child conversation in memory and print what each side receives.
    Simulate(SimulateArgs),
    /// Classify one raw wire message.
    Decode(DecodeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Simulate(args) => simulate::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Child sends issued before the handshake (TYPE or TYPE=JSON, repeatable).
    #[arg(long, value_name = "TYPE[=JSON]")]
    pub early: Vec<String>,
    /// Child sends issued after the handshake (TYPE or TYPE=JSON, repeatable).
    #[arg(long, value_name = "TYPE[=JSON]")]
    pub send: Vec<String>,
    /// Parent answers every TYPE request with JSON (repeatable).
    #[arg(long, value_name = "TYPE[=JSON]")]
    pub respond: Vec<String>,
    /// Keep the child document loading until the parent has connected.
    #[arg(long)]
    pub child_loading: bool,
    /// Target origin both sides post with.
    #[arg(long, default_value = ANY_ORIGIN)]
    pub origin: String,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Raw message text. Read from --file or stdin when omitted.
    #[arg(conflicts_with = "file")]
    pub message: Option<String>,
    /// Read the message from a file.
    #[arg(long)]
    pub file: Option<PathBuf>,
    /// Schema directory for payload validation.
    #[arg(long, value_name = "DIR")]
    pub validate: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
