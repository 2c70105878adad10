//! bashdap
//!
//! A Debug Adapter Protocol server for bash scripts. Speaks DAP with the client on
//! stdin and stdout and drives `bashdb` to do the debugging.
//!
//! Options supported:
//!   -v/--verbose          More logging on stderr, repeat for more
//!   --responsiveness      Milliseconds between checks for bashdb finishing a command
//!   --back-pressure       Requests that can queue for bashdb before the client waits
//!   --pipe-retry          Milliseconds between checks for bashdb's terminal pipe
//!
//! `RUST_LOG` overrides the verbosity when set.

use std::io;
use std::time::Duration;

use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use tokio::runtime;
use tracing_subscriber::EnvFilter;

use bashdap_core::config::Config;

mod debugger;
mod server;

fn get_app_args() -> ArgMatches {
    Command::new("bashdap")
        .version("0.1.0")
        .author("Steven Trotter <stevetrot@gmail.com>")
        .about("A Debug Adapter Protocol server for bashdb")
        .long_about("Interfaces with 'bashdb' to debug bash scripts and communicates with any editor supporting the Debug Adapter Protocol over stdin and stdout.")
        .arg(Arg::new("verbose")
                 .short('v')
                 .long("verbose")
                 .action(ArgAction::Count)
                 .help("log more to stderr, repeat for more"))
        .arg(Arg::new("responsiveness")
                 .long("responsiveness")
                 .value_parser(value_parser!(i64))
                 .help("milliseconds between checks for bashdb finishing a command"))
        .arg(Arg::new("back-pressure")
                 .long("back-pressure")
                 .value_parser(value_parser!(i64))
                 .help("requests that can queue for bashdb before the client waits"))
        .arg(Arg::new("pipe-retry")
                 .long("pipe-retry")
                 .value_parser(value_parser!(i64))
                 .help("milliseconds between checks for bashdb's terminal pipe"))
        .get_matches()
}

fn get_config(args: &ArgMatches) -> Config {
    let mut config = Config::new();

    for (arg, key) in [
        ("responsiveness", "Responsiveness"),
        ("back-pressure", "BackPressure"),
        ("pipe-retry", "PipeRetry"),
    ] {
        if let Some(value) = args.get_one::<i64>(arg) {
            config.set_config(key, *value);
        }
    }

    config
}

fn setup_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // stdout belongs to the protocol
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let args = get_app_args();
    setup_logging(args.get_count("verbose"));
    let config = get_config(&args);

    let rt = runtime::Builder::new_current_thread().enable_all().build()?;

    let result = rt.block_on(server::run(config));

    // Don't hang on a reader still blocked opening bashdb's pipe
    rt.shutdown_timeout(Duration::from_millis(100));

    result
}
