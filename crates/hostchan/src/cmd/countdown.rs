use std::cell::Cell;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hostchan::channel::{EventChannel, StreamEvent};
use hostchan::codec::JsonMethodCodec;
use hostchan::demo::{DemoConfig, DemoHost};
use hostchan::messenger::{pair, BinaryMessenger};

use crate::cmd::{parse_duration, CountdownArgs};
use crate::exit::{channel_error, CliError, CliResult, INTERNAL, SUCCESS, USAGE};
use crate::output::{print_event, OutputFormat};

pub fn run(args: CountdownArgs, format: OutputFormat) -> CliResult<i32> {
    let interval = parse_duration(&args.interval).map_err(|err| CliError::new(USAGE, err))?;

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
            countdown_ticks: args.from,
            countdown_interval: interval,
            ..DemoConfig::default()
        };
        let countdown_name = config.countdown_channel.clone();
        let _host = DemoHost::bind(host_messenger, config);

        let channel = EventChannel::new(remote_messenger, countdown_name.clone(), JsonMethodCodec);
        let done = Rc::new(Cell::new(false));
        let seq = Rc::new(Cell::new(0usize));

        let done_flag = Rc::clone(&done);
        let subscription = channel
            .subscribe(None, move |event| {
                print_event(&countdown_name, seq.get(), &event, format);
                seq.set(seq.get() + 1);
                if matches!(event, StreamEvent::Done) {
                    done_flag.set(true);
                }
            })
            .map_err(|err| channel_error("subscribe failed", err))?;

        while !done.get() && running.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        subscription.cancel();

        Ok(SUCCESS)
    })
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
