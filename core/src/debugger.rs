//! Debugger commands and the structured results they produce

use crate::Result;

use tokio::sync::oneshot;

/// A position in a source file, line numbers are 1-based as the debugger reports them
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FileLocation {
    name: String,
    line_num: i64,
}

impl FileLocation {
    pub fn new(name: String, line_num: i64) -> Self {
        FileLocation { name, line_num }
    }

    pub fn name(&self) -> &str {
        &self.name[..]
    }

    pub fn line_num(&self) -> i64 {
        self.line_num
    }
}

/// A breakpoint as confirmed by the debugger
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BreakpointRecord {
    pub id: i64,
    pub line: i64,
    // The line the breakpoint was asked for, the debugger may move it
    pub requested_line: i64,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StackFrameRecord {
    pub index: i64,
    pub text: String,
    pub location: FileLocation,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VariableRecord {
    pub name: String,
    pub value: String,
}

#[derive(Clone, Debug, PartialEq)]
pub enum DebuggerCmd {
    /// Wait for the debugger to show its first prompt
    Run,
    /// Replace all breakpoints in a file with breakpoints on these lines
    SetBreakpoints(String, Vec<i64>),
    /// Start frame and maximum number of frames
    StackTrace(Option<i64>, Option<i64>),
    Variables,
    Evaluate(String),
    Continue,
    Next,
    StepIn,
    StepOut,
}

#[derive(Clone, Debug, PartialEq)]
pub enum DebuggerResponse {
    Ready,
    Breakpoints(Vec<BreakpointRecord>),
    StackFrames(Vec<StackFrameRecord>),
    Variables(Vec<VariableRecord>),
    Evaluated(String),
    Acknowledged,
}

/// What goes down the debugger queue, the sender is used to reply once the command has been
/// processed.
pub type DebuggerQueueItem = (DebuggerCmd, oneshot::Sender<Result<DebuggerResponse>>);
