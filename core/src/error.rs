//! Errors shared by the adapter and the debugger engines

use std::io;

/// Anything that can stop a request from being served
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("can't spawn debugger `{cmd}`: {source}")]
    ProcessSpawn {
        cmd: String,
        #[source]
        source: io::Error,
    },

    #[error("debugger {0} does not exist")]
    DebuggerNotFound(String),

    #[error("invalid launch arguments: {0}")]
    LaunchArguments(#[from] serde_json::Error),

    #[error("no program to debug specified")]
    MissingProgram,

    #[error("debugger not launched")]
    NotLaunched,

    #[error("debugger already launched")]
    AlreadyLaunched,

    #[error("`{0}` can't span more than one line")]
    MultiLine(String),

    #[error("debugger queue full, try again")]
    QueueFull,

    #[error("debugger has exited")]
    DebuggerClosed,

    #[error("debugger queue closed")]
    QueueClosed,

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
