use std::time::Duration;

use clap::{Args, Subcommand};

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod channels;
pub mod countdown;
pub mod demo;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the bilateral loopback demo.
    Demo(DemoArgs),
    /// Subscribe to the countdown stream and print events.
    Countdown(CountdownArgs),
    /// List the demo channels and their wire contract.
    Channels(ChannelsArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Demo(args) => demo::run(args, format),
        Command::Countdown(args) => countdown::run(args, format),
        Command::Channels(args) => channels::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct DemoArgs {
    /// Rounds to run (0 = until Ctrl-C).
    #[arg(long, default_value = "3")]
    pub rounds: u32,
    /// Delay before each unsolicited push (e.g. 1s, 500ms).
    #[arg(long, default_value = "1s")]
    pub push_delay: String,
}

#[derive(Args, Debug)]
pub struct CountdownArgs {
    /// Ticks to count down from.
    #[arg(long, default_value = "10")]
    pub from: u32,
    /// Cadence between events (e.g. 1s, 250ms).
    #[arg(long, default_value = "1s")]
    pub interval: String,
}

#[derive(Args, Debug, Default)]
pub struct ChannelsArgs {}

#[derive(Args, Debug, Default)]
pub struct VersionArgs {
    /// Show extended build information.
    #[arg(long)]
    pub extended: bool,
}

/// Parse durations like `5s` or `500ms`.
pub(crate) fn parse_duration(text: &str) -> Result<Duration, String> {
    let text = text.trim();
    if let Some(millis) = text.strip_suffix("ms") {
        return millis
            .trim()
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|_| format!("invalid duration {text:?}"));
    }
    if let Some(secs) = text.strip_suffix('s') {
        return secs
            .trim()
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|_| format!("invalid duration {text:?}"));
    }
    Err(format!(
        "invalid duration {text:?} (expected e.g. 5s or 500ms)"
    ))
}
