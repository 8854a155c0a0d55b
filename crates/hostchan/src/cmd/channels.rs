use hostchan::demo::DemoConfig;

use crate::cmd::ChannelsArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_channel_table, ChannelRow, OutputFormat};

pub fn run(_args: ChannelsArgs, format: OutputFormat) -> CliResult<i32> {
    let config = DemoConfig::default();
    let rows = [
        ChannelRow {
            name: config.method_channel,
            kind: "method",
            codec: "json",
            direction: "request-reply + push",
        },
        ChannelRow {
            name: config.json_channel,
            kind: "message",
            codec: "json",
            direction: "duplex echo",
        },
        ChannelRow {
            name: config.byte_channel,
            kind: "message",
            codec: "binary",
            direction: "duplex echo",
        },
        ChannelRow {
            name: config.countdown_channel,
            kind: "event",
            codec: "json",
            direction: "stream",
        },
    ];
    print_channel_table(&rows, format);
    Ok(SUCCESS)
}
