//! Notifier
//!
//! This module contains tools for notifying the client about events that
//! happen independently of any request, the debugger stopping or output
//! arriving for example.

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, warn};

/// Log level to log at, anything at `WARN` or more severe is also shown to the
/// user.
#[derive(Clone, Copy, Debug, Eq, PartialEq, PartialOrd)]
pub enum LogLevel {
    CRITICAL = 1,
    ERROR,
    WARN,
    INFO,
    DEBUG,
}

/// Which stream a piece of output belongs to
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OutputCategory {
    Console,
    Stdout,
    Stderr,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StopReason {
    Entry,
    Breakpoint,
    Step,
}

/// A notification to be sent to the client of an event
#[derive(Clone, Debug, PartialEq)]
pub enum Notification {
    Output {
        category: OutputCategory,
        text: String,
    },
    Stopped {
        reason: StopReason,
        breakpoint_id: Option<i64>,
    },
    Terminated,
    ProcessExited {
        pid: u64,
        exit_code: i64,
    },
}

/// Notifications are unbounded so that they keep the order they were raised in and can be raised
/// from anywhere without awaiting.
pub type NotifierTx = UnboundedSender<Notification>;

fn send(notifier_tx: &NotifierTx, msg: Notification) {
    if let Err(e) = notifier_tx.send(msg) {
        debug!("Notifier can't send, client gone: {}", e);
    }
}

/// Send a log message
pub fn log_msg(notifier_tx: &NotifierTx, level: LogLevel, msg: &str) {
    match level {
        LogLevel::CRITICAL | LogLevel::ERROR => error!("{}", msg),
        LogLevel::WARN => warn!("{}", msg),
        LogLevel::INFO => info!("{}", msg),
        LogLevel::DEBUG => debug!("{}", msg),
    };

    if level <= LogLevel::WARN {
        send(
            notifier_tx,
            Notification::Output {
                category: OutputCategory::Console,
                text: format!("bashdap: {}\n", msg),
            },
        );
    }
}

/// Forward text to the client
pub fn output(notifier_tx: &NotifierTx, category: OutputCategory, text: String) {
    send(notifier_tx, Notification::Output { category, text });
}

/// Notify that the debugger has stopped and is listening again
pub fn signal_stopped(notifier_tx: &NotifierTx, reason: StopReason, breakpoint_id: Option<i64>) {
    send(
        notifier_tx,
        Notification::Stopped {
            reason,
            breakpoint_id,
        },
    );
}

/// Notify that the program being debugged has finished
pub fn signal_terminated(notifier_tx: &NotifierTx) {
    send(notifier_tx, Notification::Terminated);
}

/// Notify that the debugger process has exited
pub fn signal_exited(notifier_tx: &NotifierTx, pid: u64, exit_code: i64) {
    send(notifier_tx, Notification::ProcessExited { pid, exit_code });
}
