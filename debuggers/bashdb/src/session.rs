//! Session state
//!
//! All the state shared between the pipe reader, the command worker and the
//! process reaper for one debugging session.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::Notify;

use crate::breakpoints::BreakpointLedger;
use crate::buffer::LineBuffer;

#[derive(Debug, Default)]
pub struct Session {
    pub buffer: LineBuffer,
    pub ledger: BreakpointLedger,
    /// A command has been written and its sentinel not yet seen
    pub busy: bool,
    /// The debugger has exited, nothing more is written
    pub closing: bool,
}

/// Handle on a `Session`, cloned into every task that needs it.
#[derive(Clone, Debug, Default)]
pub struct SessionContext {
    session: Arc<Mutex<Session>>,
    output_arrived: Arc<Notify>,
}

impl SessionContext {
    pub fn new() -> Self {
        SessionContext::default()
    }

    pub fn lock(&self) -> MutexGuard<Session> {
        self.session.lock().unwrap()
    }

    /// Add debugger output and wake anything waiting on it
    pub fn feed(&self, text: &str) {
        self.lock().buffer.append(text);
        self.output_arrived.notify_one();
    }

    /// Resolves the next time output arrives or the session closes.
    pub async fn output_arrived(&self) {
        self.output_arrived.notified().await
    }

    pub fn close(&self) {
        {
            let mut session = self.lock();
            session.closing = true;
            session.busy = false;
        }
        self.output_arrived.notify_one();
    }

    pub fn is_closing(&self) -> bool {
        self.lock().closing
    }

    pub fn set_busy(&self, busy: bool) {
        self.lock().busy = busy;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn check_feed_appends_to_buffer() {
        let context = SessionContext::new();

        context.feed("bashdb<0> ");
        context.feed("hi\n");

        assert_eq!(context.lock().buffer.lines(), &["hi", ""]);
    }

    #[test]
    fn check_close() {
        let context = SessionContext::new();
        context.set_busy(true);

        context.close();

        assert!(context.is_closing());
        assert!(!context.lock().busy);
    }

    #[tokio::test]
    async fn check_output_before_waiting_is_not_lost() {
        let context = SessionContext::new();

        context.feed("abc");

        tokio::time::timeout(Duration::from_secs(5), context.output_arrived())
            .await
            .unwrap();
    }
}
