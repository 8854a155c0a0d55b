use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hostchan::channel::MethodChannel;
use hostchan::codec::JsonMethodCodec;
use hostchan::demo::{DemoConfig, DemoHost, ARG_NUM, METHOD_GET, METHOD_NOTIFY, METHOD_SEND};
use hostchan::messenger::{pair, BinaryMessenger};
use serde_json::json;

use crate::cmd::{parse_duration, DemoArgs};
use crate::exit::{channel_error, CliError, CliResult, INTERNAL, SUCCESS, USAGE};
use crate::output::{print_push, print_reply, OutputFormat};

pub fn run(args: DemoArgs, format: OutputFormat) -> CliResult<i32> {
    let push_delay = parse_duration(&args.push_delay).map_err(|err| CliError::new(USAGE, err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .map_err(|err| CliError::new(INTERNAL, format!("runtime setup failed: {err}")))?;
    let local = tokio::task::LocalSet::new();

    local.block_on(&runtime, async move {
        let (host_end, remote_end) = pair();
        let host_messenger: Rc<dyn BinaryMessenger> = Rc::new(host_end);
        let remote_messenger: Rc<dyn BinaryMessenger> = Rc::new(remote_end);

        let config = DemoConfig {
            push_delay,
            ..DemoConfig::default()
        };
        let method_name = config.method_channel.clone();
        let _host = DemoHost::bind(host_messenger, config);

        // The remote side of the boundary: answers the host's delayed
        // notify pushes and drives the counter service.
        let remote = MethodChannel::new(remote_messenger, method_name.clone(), JsonMethodCodec);
        let push_channel = method_name.clone();
        remote.set_method_handler(move |call, responder| match call.method.as_str() {
            METHOD_NOTIFY => {
                print_push(&push_channel, METHOD_NOTIFY, &call.arguments, format);
                responder.success(Some(json!("ack")));
            }
            _ => responder.not_implemented(),
        });

        let mut round: u32 = 0;
        while running.load(Ordering::SeqCst) {
            round += 1;
            invoke_and_print(&remote, METHOD_SEND, i64::from(round), format)?;
            invoke_and_print(&remote, METHOD_GET, i64::from(round), format)?;

            // Wait out the delayed pushes before starting the next round.
            tokio::time::sleep(push_delay + Duration::from_millis(50)).await;

            if args.rounds != 0 && round >= args.rounds {
                break;
            }
        }

        Ok(SUCCESS)
    })
}

fn invoke_and_print(
    channel: &MethodChannel<JsonMethodCodec>,
    method: &'static str,
    n: i64,
    format: OutputFormat,
) -> CliResult<()> {
    let name = channel.name().to_string();
    channel
        .invoke_with_reply(method, Some(json!({ ARG_NUM: n })), move |outcome| {
            match outcome {
                Ok(reply) => print_reply(&name, method, &reply, format),
                Err(err) => tracing::warn!(method, error = %err, "reply failed to decode"),
            }
        })
        .map_err(|err| channel_error("invoke failed", err))
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| {
        CliError::new(
            INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}
