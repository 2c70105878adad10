//! The bashdb debugger module

#[macro_use]
extern crate lazy_static;

use bashdap_core::config::{Config, LaunchArguments};
use bashdap_core::notifier::{log_msg, LogLevel, NotifierTx};
use bashdap_core::util::{file_exists, get_file_full_path};
use bashdap_core::{Error, Result};

mod analyser;
mod breakpoints;
mod buffer;
mod debugger;
mod process;
mod session;

pub use debugger::ImplDebugger;
pub use process::Process;

/// Launch bashdb on the program, returning the running process and the debugger that
/// serves its queue.
pub fn get_debugger(
    launch: &LaunchArguments,
    config: &Config,
    notifier_tx: NotifierTx,
) -> Result<(Process, ImplDebugger)> {
    if launch.program.is_empty() {
        return Err(Error::MissingProgram);
    }

    let bashdb = get_file_full_path(&launch.path_bashdb);
    if !file_exists(&bashdb) {
        return Err(Error::DebuggerNotFound(bashdb.display().to_string()));
    }

    log_msg(
        &notifier_tx,
        LogLevel::INFO,
        &format!("Launching {} with {}", launch.program, bashdb.display()),
    );

    let session = session::SessionContext::new();
    let process = Process::spawn(launch, &bashdb, config, session.clone(), notifier_tx.clone())?;
    let debugger = ImplDebugger::new(session, process.stdin_tx(), notifier_tx, config);

    Ok((process, debugger))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn check_program_required() {
        let launch = LaunchArguments::from_value(serde_json::json!({"program": ""})).unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();

        match get_debugger(&launch, &Config::new(), tx) {
            Err(Error::MissingProgram) => {}
            _ => panic!("Expected a missing program error"),
        }
    }

    #[test]
    fn check_missing_bashdb_reported() {
        let launch = LaunchArguments::from_value(serde_json::json!({
            "program": "/s.sh",
            "pathBashdb": "/this/does/not/exist/bashdb",
        }))
        .unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();

        match get_debugger(&launch, &Config::new(), tx) {
            Err(Error::DebuggerNotFound(path)) => assert_eq!(path, "/this/does/not/exist/bashdb"),
            _ => panic!("Expected a debugger not found error"),
        }
    }
}
