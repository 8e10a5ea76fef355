use clap::ValueEnum;
use tracing_subscriber::EnvFilter;

/// Filter directives that replace `--log-level` when set, e.g.
/// `BELLHOP_LOG=bellhop_channel=trace,bellhop_wire=debug`.
pub const LOG_ENV: &str = "BELLHOP_LOG";

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// `--log-level` applies to the `bellhop*` crates; everything else is
/// capped at warn.
fn default_directives(level: LogLevel) -> String {
    let others = match level {
        LogLevel::Error => "error",
        _ => "warn",
    };
    format!("{others},bellhop={}", level.as_str())
}

fn build_filter(level: LogLevel, overrides: Option<&str>) -> EnvFilter {
    if let Some(directives) = overrides.filter(|d| !d.trim().is_empty()) {
        match EnvFilter::try_new(directives) {
            Ok(filter) => return filter,
            Err(err) => eprintln!("warning: ignoring invalid {LOG_ENV}: {err}"),
        }
    }
    EnvFilter::new(default_directives(level))
}

/// Install the stderr subscriber. Targets stay visible so the layer a
/// record came from (`bellhop_channel`, `bellhop_wire`, ...) is obvious.
pub fn init_logging(format: LogFormat, level: LogLevel) {
    let overrides = std::env::var(LOG_ENV).ok();
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(build_filter(level, overrides.as_deref()))
        .with_ansi(false)
        .with_target(true);

    match format {
        LogFormat::Text => {
            let _ = builder.try_init();
        }
        LogFormat::Json => {
            let _ = builder.json().try_init();
        }
    }
}
