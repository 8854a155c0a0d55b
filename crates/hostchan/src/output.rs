use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use hostchan::channel::StreamEvent;
use hostchan::codec::{MethodReply, RemoteError};
use serde::Serialize;
use serde_json::Value;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct ReplyOutput<'a> {
    channel: &'a str,
    method: &'a str,
    outcome: &'a str,
    value: &'a Value,
}

pub fn print_reply(channel: &str, method: &str, reply: &MethodReply<Value>, format: OutputFormat) {
    let (outcome, value) = reply_parts(reply);
    match format {
        OutputFormat::Json => {
            let out = ReplyOutput {
                channel,
                method,
                outcome,
                value: &value,
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["CHANNEL", "METHOD", "OUTCOME", "VALUE"])
                .add_row(vec![
                    channel.to_string(),
                    method.to_string(),
                    outcome.to_string(),
                    value.to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("channel={channel} method={method} outcome={outcome} value={value}");
        }
    }
}

#[derive(Serialize)]
struct PushOutput<'a> {
    channel: &'a str,
    method: &'a str,
    arguments: &'a Value,
}

pub fn print_push(channel: &str, method: &str, arguments: &Option<Value>, format: OutputFormat) {
    let arguments = arguments.clone().unwrap_or(Value::Null);
    match format {
        OutputFormat::Json => {
            let out = PushOutput {
                channel,
                method,
                arguments: &arguments,
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("channel={channel} push method={method} arguments={arguments}");
        }
    }
}

#[derive(Serialize)]
struct EventOutput<'a> {
    channel: &'a str,
    seq: usize,
    kind: &'a str,
    value: &'a Value,
}

pub fn print_event(channel: &str, seq: usize, event: &StreamEvent<Value>, format: OutputFormat) {
    let (kind, value) = match event {
        StreamEvent::Data(value) => ("data", value.clone().unwrap_or(Value::Null)),
        StreamEvent::Error(error) => ("error", error_value(error)),
        StreamEvent::Done => ("done", Value::Null),
    };
    match format {
        OutputFormat::Json => {
            let out = EventOutput {
                channel,
                seq,
                kind,
                value: &value,
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("channel={channel} seq={seq} {kind}={value}");
        }
    }
}

/// One row of the `channels` listing.
pub struct ChannelRow {
    pub name: String,
    pub kind: &'static str,
    pub codec: &'static str,
    pub direction: &'static str,
}

pub fn print_channel_table(rows: &[ChannelRow], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let items: Vec<Value> = rows
                .iter()
                .map(|row| {
                    serde_json::json!({
                        "name": row.name,
                        "kind": row.kind,
                        "codec": row.codec,
                        "direction": row.direction,
                    })
                })
                .collect();
            println!(
                "{}",
                serde_json::to_string(&items).unwrap_or_else(|_| "[]".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["NAME", "KIND", "CODEC", "DIRECTION"]);
            for row in rows {
                table.add_row(vec![
                    row.name.clone(),
                    row.kind.to_string(),
                    row.codec.to_string(),
                    row.direction.to_string(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for row in rows {
                println!(
                    "{} kind={} codec={} direction={}",
                    row.name, row.kind, row.codec, row.direction
                );
            }
        }
    }
}

fn reply_parts(reply: &MethodReply<Value>) -> (&'static str, Value) {
    match reply {
        MethodReply::Success(value) => ("success", value.clone().unwrap_or(Value::Null)),
        MethodReply::Error(error) => ("error", error_value(error)),
        MethodReply::NotImplemented => ("not-implemented", Value::Null),
    }
}

fn error_value(error: &RemoteError<Value>) -> Value {
    serde_json::json!({
        "code": error.code,
        "message": error.message,
        "details": error.details,
    })
}
