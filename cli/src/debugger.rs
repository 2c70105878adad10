//! Debugger Module
//!
//! Owns the bashdb session for the lifetime of the adapter. Requests are put on
//! the debugger queue in the order they arrive and the queue is served one at a
//! time by the bashdb debugger. Queueing never waits, a full queue refuses the
//! request so the server can always get to a disconnect.

use bashdap_core::config::{Config, LaunchArguments};
use bashdap_core::debugger::{DebuggerCmd, DebuggerQueueItem, DebuggerResponse};
use bashdap_core::notifier::{log_msg, LogLevel, NotifierTx};
use bashdap_core::{Error, Result};

use bashdap_bashdb::{get_debugger, Process};

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::oneshot;
use tracing::info;

pub type ResponseRx = oneshot::Receiver<Result<DebuggerResponse>>;

#[derive(Debug)]
pub struct Debugger {
    config: Config,
    notifier_tx: NotifierTx,
    process: Option<Process>,
    queue_tx: Option<mpsc::Sender<DebuggerQueueItem>>,
    stop_on_entry: bool,
}

impl Debugger {
    pub fn new(config: Config, notifier_tx: NotifierTx) -> Self {
        Debugger {
            config,
            notifier_tx,
            process: None,
            queue_tx: None,
            stop_on_entry: false,
        }
    }

    /// Start bashdb, the returned receiver gets `Ready` once bashdb first prompts.
    pub fn launch(&mut self, arguments: Option<serde_json::Value>) -> Result<ResponseRx> {
        if self.process.is_some() {
            log_msg(
                &self.notifier_tx,
                LogLevel::WARN,
                "Process already running, not launching",
            );
            return Err(Error::AlreadyLaunched);
        }

        let launch = LaunchArguments::from_value(arguments.unwrap_or(serde_json::Value::Null))?;

        let mut config = self.config.clone();
        for key in launch.apply_config(&mut config) {
            log_msg(
                &self.notifier_tx,
                LogLevel::WARN,
                &format!("Unknown config item {}, ignoring", key),
            );
        }

        let (process, debugger) = get_debugger(&launch, &config, self.notifier_tx.clone())?;
        info!("bashdb running as process {}", process.pid());

        let (queue_tx, queue_rx) = mpsc::channel(config.back_pressure());
        tokio::spawn(debugger.run(queue_rx));

        self.process = Some(process);
        self.queue_tx = Some(queue_tx);
        self.stop_on_entry = launch.stop_on_entry;

        self.submit(DebuggerCmd::Run)
    }

    /// Queue a command, `QueueFull` once `BackPressure` commands are waiting.
    pub fn submit(&self, cmd: DebuggerCmd) -> Result<ResponseRx> {
        let queue_tx = self.queue_tx.as_ref().ok_or(Error::NotLaunched)?;

        let (tx, rx) = oneshot::channel();
        queue_tx.try_send((cmd, tx)).map_err(|e| match e {
            TrySendError::Full(_) => Error::QueueFull,
            TrySendError::Closed(_) => Error::QueueClosed,
        })?;

        Ok(rx)
    }

    pub fn stop_on_entry(&self) -> bool {
        self.stop_on_entry
    }

    /// Stop bashdb and wait for it to exit, `None` if it wasn't running.
    pub async fn stop(&mut self) -> Option<i64> {
        self.queue_tx = None;

        match self.process.take() {
            Some(mut process) => process.stop().await,
            None => None,
        }
    }
}

/// Wait on the reply to a submitted command
pub async fn response(rx: ResponseRx) -> Result<DebuggerResponse> {
    rx.await.map_err(|_| Error::QueueClosed)?
}
