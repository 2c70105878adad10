//! bashdb debugger
//!
//! The main bashdb Debugger entry point. Takes commands off the debugger queue
//! one at a time, writes them to bashdb and waits for the sentinel that follows
//! them before replying. Nothing else is written while a command is
//! outstanding so output can always be matched to the command that caused it.

use std::time::Duration;

use bashdap_core::config::Config;
use bashdap_core::debugger::{
    DebuggerCmd, DebuggerQueueItem, DebuggerResponse, FileLocation, StackFrameRecord,
};
use bashdap_core::notifier::{log_msg, signal_stopped, signal_terminated, LogLevel, NotifierTx};
use bashdap_core::{Error, Result};

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::analyser::{
    analyse_backtrace, analyse_breakpoints, analyse_evaluate, analyse_halt, analyse_variables,
    Halt, WELL_KNOWN_VARIABLES,
};
use crate::process::{commands_text, single_line, Message};
use crate::session::SessionContext;

/// Label of the marker printed before an evaluated expression's value
const EVALUATE_LABEL: &str = "evaluate";

#[derive(Debug)]
pub struct ImplDebugger {
    session: SessionContext,
    stdin_tx: mpsc::Sender<Bytes>,
    notifier_tx: NotifierTx,
    responsiveness: Duration,
}

impl ImplDebugger {
    pub fn new(
        session: SessionContext,
        stdin_tx: mpsc::Sender<Bytes>,
        notifier_tx: NotifierTx,
        config: &Config,
    ) -> Self {
        ImplDebugger {
            session,
            stdin_tx,
            notifier_tx,
            responsiveness: config.responsiveness(),
        }
    }

    /// Process the debugger queue in order until every sender has gone.
    pub async fn run(mut self, mut queue_rx: mpsc::Receiver<DebuggerQueueItem>) {
        while let Some((cmd, tx)) = queue_rx.recv().await {
            debug!("Processing {:?}", cmd);
            self.process(cmd, tx).await;
        }

        debug!("Debugger queue closed");
    }

    async fn process(&mut self, cmd: DebuggerCmd, tx: oneshot::Sender<Result<DebuggerResponse>>) {
        let response = match cmd {
            DebuggerCmd::Run => self.execute(&[]).await.map(|_| DebuggerResponse::Ready),
            DebuggerCmd::SetBreakpoints(file, lines) => self.set_breakpoints(file, lines).await,
            DebuggerCmd::StackTrace(start_frame, levels) => {
                self.stack_trace(start_frame, levels).await
            }
            DebuggerCmd::Variables => self.variables().await,
            DebuggerCmd::Evaluate(expression) => self.evaluate(expression).await,
            DebuggerCmd::Continue => return self.step(Message::Continue, tx).await,
            DebuggerCmd::Next => return self.step(Message::StepOver, tx).await,
            DebuggerCmd::StepIn => return self.step(Message::StepIn, tx).await,
            DebuggerCmd::StepOut => return self.step(Message::StepOut, tx).await,
        };

        if tx.send(response).is_err() {
            debug!("Requester went away before the response");
        }
    }

    async fn set_breakpoints(&mut self, file: String, lines: Vec<i64>) -> Result<DebuggerResponse> {
        single_line(&file)?;

        let installed = self.session.lock().ledger.ids(&file);

        let mut messages = vec![];
        if !installed.is_empty() {
            messages.push(Message::DeleteBreakpoints(installed));
        }
        for line in &lines {
            messages.push(Message::Marker(format!("{}:{}", file, line)));
            messages.push(Message::Breakpoint(FileLocation::new(file.clone(), *line)));
        }

        let output = self.execute(&messages).await?;
        let breakpoints = analyse_breakpoints(&output);

        let dropped = self.session.lock().ledger.replace(&file, breakpoints.clone());

        log_msg(
            &self.notifier_tx,
            LogLevel::INFO,
            &format!(
                "Breakpoints in {} now {:?}, removed {:?}",
                file,
                breakpoints.iter().map(|bp| bp.id).collect::<Vec<i64>>(),
                dropped
            ),
        );

        Ok(DebuggerResponse::Breakpoints(breakpoints))
    }

    async fn stack_trace(
        &mut self,
        start_frame: Option<i64>,
        levels: Option<i64>,
    ) -> Result<DebuggerResponse> {
        let output = self.execute(&[Message::Backtrace]).await?;
        let frames = analyse_backtrace(&output);

        Ok(DebuggerResponse::StackFrames(slice_frames(
            frames,
            start_frame,
            levels,
        )))
    }

    async fn variables(&mut self) -> Result<DebuggerResponse> {
        let mut messages = vec![];
        for name in WELL_KNOWN_VARIABLES.iter() {
            messages.push(Message::Marker(name.to_string()));
            messages.push(Message::Examine(name.to_string()));
        }

        let output = self.execute(&messages).await?;

        Ok(DebuggerResponse::Variables(analyse_variables(&output)))
    }

    async fn evaluate(&mut self, expression: String) -> Result<DebuggerResponse> {
        single_line(&expression)?;

        let output = self
            .execute(&[
                Message::Marker(EVALUATE_LABEL.to_string()),
                Message::Examine(expression),
            ])
            .await?;

        Ok(DebuggerResponse::Evaluated(analyse_evaluate(&output)))
    }

    /// Step like commands are acknowledged as soon as they're written, when
    /// bashdb comes back the client is told it has stopped.
    async fn step(&mut self, message: Message, tx: oneshot::Sender<Result<DebuggerResponse>>) {
        let high_water_mark = match self.submit(&[message]).await {
            Ok(h) => h,
            Err(e) => {
                let _ = tx.send(Err(e));
                return;
            }
        };

        if tx.send(Ok(DebuggerResponse::Acknowledged)).is_err() {
            debug!("Requester went away before the acknowledgement");
        }

        match self.wait_for_completion(high_water_mark).await {
            Ok(output) => match analyse_halt(&output) {
                Halt::Stopped {
                    reason,
                    breakpoint_id,
                } => signal_stopped(&self.notifier_tx, reason, breakpoint_id),
                Halt::Terminated => signal_terminated(&self.notifier_tx),
            },
            Err(e) => debug!("Step never completed: {}", e),
        }
    }

    /// Write the messages and wait for their output.
    async fn execute(&mut self, messages: &[Message]) -> Result<Vec<String>> {
        let high_water_mark = self.submit(messages).await?;
        self.wait_for_completion(high_water_mark).await
    }

    /// Write the messages followed by the sentinel, returning the high water mark to look for
    /// the sentinel from.
    async fn submit(&mut self, messages: &[Message]) -> Result<usize> {
        let high_water_mark = {
            let mut session = self.session.lock();
            if session.closing {
                return Err(Error::DebuggerClosed);
            }
            session.busy = true;
            session.buffer.len()
        };

        if self.stdin_tx.send(commands_text(messages)).await.is_err() {
            self.session.set_busy(false);
            return Err(Error::DebuggerClosed);
        }

        Ok(high_water_mark)
    }

    /// Wait until the sentinel appears, waking whenever output arrives and at least every
    /// `Responsiveness` milliseconds.
    async fn wait_for_completion(&self, high_water_mark: usize) -> Result<Vec<String>> {
        loop {
            {
                let mut session = self.session.lock();

                if session.closing {
                    session.busy = false;
                    return Err(Error::DebuggerClosed);
                }

                if let Some(sentinel_index) = session.buffer.completed_since(high_water_mark) {
                    session.busy = false;
                    return Ok(session
                        .buffer
                        .captured(high_water_mark, sentinel_index)
                        .to_vec());
                }
            }

            let _ = tokio::time::timeout(self.responsiveness, self.session.output_arrived()).await;
        }
    }
}

fn slice_frames(
    frames: Vec<StackFrameRecord>,
    start_frame: Option<i64>,
    levels: Option<i64>,
) -> Vec<StackFrameRecord> {
    let start = start_frame.unwrap_or(0).max(0) as usize;

    let frames = frames.into_iter().skip(start);

    match levels {
        Some(levels) if levels > 0 => frames.take(levels as usize).collect(),
        _ => frames.collect(),
    }
}
