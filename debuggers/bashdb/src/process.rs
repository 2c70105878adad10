//! bashdb process handler
//!
//! This module performs the basic setup of and interfacing with bashdb. bashdb
//! runs inside a small bash wrapper which creates a named pipe for bashdb to use
//! as its terminal, direct redirection isn't followed by subshells the script
//! starts. Commands go to bashdb's stdin and everything it says about them comes
//! back through the pipe, the script's own stdout and stderr are relayed to the
//! client as they are.

use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use bashdap_core::config::{Config, LaunchArguments};
use bashdap_core::debugger::FileLocation;
use bashdap_core::notifier::{
    log_msg, output, signal_exited, LogLevel, NotifierTx, OutputCategory,
};
use bashdap_core::util::{file_exists, read_output, setup_stdin};
use bashdap_core::{Error, Result};

use bytes::Bytes;
use futures::StreamExt;
use tokio::fs::File;
use tokio::io::{AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc::Sender, watch};
use tracing::{debug, info, warn};

use crate::buffer::SENTINEL;
use crate::session::SessionContext;

/// Runs bashdb with its terminal pointed at a fresh named pipe.
///
/// Positional parameters: pipe path, mkfifo, bashdb, program, program arguments.
const WRAPPER: &str = r#"fifo=$1
mkfifo_cmd=$2
bashdb=$3
program=$4
shift 4

cleanup() {
    status=$?
    rm -f "$fifo"
    exit $status
}

trap 'echo "bashdap: debugger terminated" >&2; cleanup' TERM
trap 'echo "bashdap: debugger interrupted" >&2; cleanup' INT

"$mkfifo_cmd" "$fifo" || cleanup
"$bashdb" --quiet --tty "$fifo" -- "$program" "$@"
cleanup
"#;

/// Messages that can be sent to bashdb for processing
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Message {
    Breakpoint(FileLocation),
    DeleteBreakpoints(Vec<i64>),
    Continue,
    StepOver,
    StepIn,
    StepOut,
    Backtrace,
    Examine(String),
    Marker(String),
    Quit,
}

impl Message {
    /// The bashdb command for the message, without a newline.
    pub fn command(&self) -> String {
        match self {
            Message::Breakpoint(fl) => format!("break {}:{}", fl.name(), fl.line_num()),
            Message::DeleteBreakpoints(ids) => {
                let ids: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
                format!("delete {}", ids.join(" "))
            }
            Message::Continue => "continue".to_string(),
            Message::StepOver => "next".to_string(),
            Message::StepIn => "step".to_string(),
            Message::StepOut => "finish".to_string(),
            Message::Backtrace => "backtrace".to_string(),
            Message::Examine(expression) => format!("examine {}", expression),
            Message::Marker(label) => format!("print ' <{}> '", label.replace('\'', "'\\''")),
            Message::Quit => "quit".to_string(),
        }
    }
}

/// bashdb reads a command per line, text going into a command can't break the line.
pub fn single_line(text: &str) -> Result<&str> {
    if text.contains(['\n', '\r']) {
        return Err(Error::MultiLine(text.to_string()));
    }
    Ok(text)
}

/// Everything to write for one request, the messages followed by the sentinel print.
pub fn commands_text(messages: &[Message]) -> Bytes {
    let mut text = String::new();
    for message in messages {
        text.push_str(&message.command());
        text.push('\n');
    }
    text.push_str(&format!("print '{}'\n", SENTINEL));
    Bytes::from(text)
}

/// Arguments given to `bash -c`, `$0` followed by the wrapper's positional parameters.
fn get_wrapper_args(launch: &LaunchArguments, bashdb: &Path) -> Vec<String> {
    let mut args = vec![
        "-c".to_string(),
        WRAPPER.to_string(),
        "bashdap".to_string(),
        launch.fifo_path.to_string_lossy().into_owned(),
        launch.path_mkfifo.clone(),
        bashdb.to_string_lossy().into_owned(),
        launch.program.clone(),
    ];
    args.extend(launch.args.iter().cloned());
    args
}

/// Main handler for spawning the bashdb process
#[derive(Debug)]
pub struct Process {
    pid: u64,
    stdin_tx: Sender<Bytes>,
    exit_rx: watch::Receiver<Option<i64>>,
    session: SessionContext,
    notifier_tx: NotifierTx,
}

impl Process {
    /// Spawn bashdb and set up all the relevant stdio handlers.
    ///
    /// In particular:
    /// - Relays the wrapper's stdout and stderr to the client as they arrive;
    /// - Reads the named pipe into the session's line buffer once it exists;
    /// - Sets up a task to forward commands to bashdb's stdin;
    /// - Reaps the process, closing the session when it exits.
    pub fn spawn(
        launch: &LaunchArguments,
        bashdb: &Path,
        config: &Config,
        session: SessionContext,
        notifier_tx: NotifierTx,
    ) -> Result<Self> {
        let args = get_wrapper_args(launch, bashdb);

        let mut command = Command::new(&launch.path_bash);
        command
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if let Some(cwd) = &launch.cwd {
            command.current_dir(cwd);
        }

        // Own process group so the whole tree can be signalled at once
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command.spawn().map_err(|source| Error::ProcessSpawn {
            cmd: format!("{} {}", launch.path_bash, bashdb.display()),
            source,
        })?;

        let pid = child.id().unwrap_or(0) as u64;
        log_msg(
            &notifier_tx,
            LogLevel::INFO,
            &format!("Process launched with pid: {}", pid),
        );

        if let Some(stdout) = child.stdout.take() {
            setup_output(stdout, OutputCategory::Stdout, notifier_tx.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            setup_output(stderr, OutputCategory::Stderr, notifier_tx.clone());
        }

        let stdin = child.stdin.take().ok_or_else(|| {
            Error::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "bashdb process did not have a handle to stdin",
            ))
        })?;
        let stdin_tx = setup_stdin(stdin);

        setup_pipe(
            launch.fifo_path.clone(),
            config.pipe_retry(),
            launch.show_debug_output,
            session.clone(),
            notifier_tx.clone(),
        );

        let exit_rx = setup_reaper(child, pid, session.clone(), notifier_tx.clone());

        Ok(Process {
            pid,
            stdin_tx,
            exit_rx,
            session,
            notifier_tx,
        })
    }

    pub fn pid(&self) -> u64 {
        self.pid
    }

    /// Sender for writing commands to bashdb
    pub fn stdin_tx(&self) -> Sender<Bytes> {
        self.stdin_tx.clone()
    }

    /// Stop bashdb, returning its exit code once it has exited.
    ///
    /// Signals the process group and also asks bashdb to quit, whichever lands
    /// first. Only returns once the process is gone.
    pub async fn stop(&mut self) -> Option<i64> {
        self.session.set_busy(false);

        #[cfg(unix)]
        {
            use nix::sys::signal::{killpg, Signal};
            use nix::unistd::Pid;

            if self.pid != 0 {
                if let Err(e) = killpg(Pid::from_raw(self.pid as i32), Signal::SIGTERM) {
                    debug!("Can't signal process group {}: {}", self.pid, e);
                }
            }
        }

        let quit = Bytes::from(format!("{}\n", Message::Quit.command()));
        if self.stdin_tx.send(quit).await.is_err() {
            debug!("bashdb stdin already closed");
        }

        loop {
            let exited = *self.exit_rx.borrow();
            if exited.is_some() {
                return exited;
            }
            if self.exit_rx.changed().await.is_err() {
                log_msg(
                    &self.notifier_tx,
                    LogLevel::WARN,
                    "Lost track of the debugger process while stopping",
                );
                return None;
            }
        }
    }
}

/// Relay text from the process to the client as it arrives.
///
/// Invalid UTF-8 is replaced rather than ending the relay, the pipe must stay
/// open for as long as the program writes to it.
fn setup_output<R>(reader: R, category: OutputCategory, notifier_tx: NotifierTx)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = read_output(BufReader::new(reader));
        while let Some(text) = reader.next().await {
            match text {
                Ok(text) => output(&notifier_tx, category, text),
                Err(e) => {
                    warn!("Can't read {:?} output: {}", category, e);
                    break;
                }
            }
        }
    });
}

/// Wait for the named pipe to appear then read everything bashdb writes to it into the session.
fn setup_pipe(
    fifo_path: PathBuf,
    retry: Duration,
    show_debug_output: bool,
    session: SessionContext,
    notifier_tx: NotifierTx,
) {
    tokio::spawn(async move {
        while !file_exists(&fifo_path) {
            if session.is_closing() {
                return;
            }
            tokio::time::sleep(retry).await;
        }

        let fifo = match File::open(&fifo_path).await {
            Ok(f) => f,
            Err(e) => {
                log_msg(
                    &notifier_tx,
                    LogLevel::ERROR,
                    &format!("Can't open {}: {}", fifo_path.display(), e),
                );
                return;
            }
        };

        info!("Reading bashdb output from {}", fifo_path.display());

        let mut reader = read_output(BufReader::new(fifo));
        while let Some(text) = reader.next().await {
            match text {
                Ok(text) => {
                    if show_debug_output {
                        output(&notifier_tx, OutputCategory::Console, text.clone());
                    }
                    session.feed(&text);
                }
                Err(e) => {
                    warn!("Can't read from {}: {}", fifo_path.display(), e);
                    break;
                }
            }
        }

        debug!("Finished reading {}", fifo_path.display());
    });
}

/// Wait on the process exiting, the returned receiver gets its exit code.
fn setup_reaper(
    mut child: Child,
    pid: u64,
    session: SessionContext,
    notifier_tx: NotifierTx,
) -> watch::Receiver<Option<i64>> {
    let (exit_tx, exit_rx) = watch::channel(None);

    tokio::spawn(async move {
        let exit_code = match child.wait().await {
            Ok(status) => status.code().map(i64::from).unwrap_or(-1),
            Err(e) => {
                warn!("Can't wait on process {}: {}", pid, e);
                -1
            }
        };

        info!("Process {} exited with code {}", pid, exit_code);

        session.close();
        // Nobody may be listening, that's fine
        let _ = exit_tx.send(Some(exit_code));
        signal_exited(&notifier_tx, pid, exit_code);
    });

    exit_rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use bashdap_core::notifier::Notification;
    use tokio::io::AsyncWriteExt;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    fn launch_arguments(args: serde_json::Value) -> LaunchArguments {
        LaunchArguments::from_value(args).unwrap()
    }

    #[test]
    fn check_wrapper_args() {
        let launch = launch_arguments(serde_json::json!({
            "program": "/s.sh",
            "args": ["a", "b c", "$HOME"],
            "fifoPath": "/tmp/fifo",
        }));

        let args = get_wrapper_args(&launch, Path::new("/usr/bin/bashdb"));

        assert_eq!(args[0], "-c");
        assert_eq!(args[1], WRAPPER);
        assert_eq!(
            &args[2..],
            &["bashdap", "/tmp/fifo", "mkfifo", "/usr/bin/bashdb", "/s.sh", "a", "b c", "$HOME"]
        );
    }

    #[test]
    fn check_message_commands() {
        assert_eq!(
            Message::Breakpoint(FileLocation::new("/s.sh".to_string(), 5)).command(),
            "break /s.sh:5"
        );
        assert_eq!(Message::DeleteBreakpoints(vec![1, 2]).command(), "delete 1 2");
        assert_eq!(Message::StepOver.command(), "next");
        assert_eq!(Message::StepIn.command(), "step");
        assert_eq!(Message::StepOut.command(), "finish");
        assert_eq!(Message::Examine("$PWD".to_string()).command(), "examine $PWD");
        assert_eq!(Message::Marker("$0".to_string()).command(), "print ' <$0> '");
    }

    #[test]
    fn check_marker_quotes_escaped() {
        assert_eq!(
            Message::Marker("it's".to_string()).command(),
            "print ' <it'\\''s> '"
        );
    }

    #[test]
    fn check_line_breaks_refused() {
        assert_eq!(single_line("$PWD").unwrap(), "$PWD");

        match single_line("x\ncontinue") {
            Err(Error::MultiLine(text)) => assert_eq!(text, "x\ncontinue"),
            _ => panic!("Expected a multi line error"),
        }
        assert!(single_line("/s.sh\r").is_err());
    }

    async fn relayed(
        notifier_rx: &mut mpsc::UnboundedReceiver<Notification>,
        until: &str,
    ) -> String {
        let mut text = String::new();
        while !text.contains(until) {
            let notification = timeout(Duration::from_secs(5), notifier_rx.recv())
                .await
                .unwrap()
                .unwrap();
            match notification {
                Notification::Output { category, text: chunk } => {
                    assert_eq!(category, OutputCategory::Stdout);
                    text += &chunk;
                }
                n => panic!("Unexpected notification {:?}", n),
            }
        }
        text
    }

    #[tokio::test]
    async fn check_output_relayed_past_invalid_utf8() {
        let (tx, mut rx) = mpsc::unbounded_channel();

        setup_output(&b"caf\xe9\nhello\n"[..], OutputCategory::Stdout, tx);

        assert_eq!(relayed(&mut rx, "hello\n").await, "caf\u{FFFD}\nhello\n");
    }

    #[tokio::test]
    async fn check_output_without_newline_relayed() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (mut writer, reader) = tokio::io::duplex(64);

        setup_output(reader, OutputCategory::Stdout, tx);
        writer.write_all(b"Name: ").await.unwrap();

        assert_eq!(relayed(&mut rx, "Name: ").await, "Name: ");
    }

    #[test]
    fn check_sentinel_follows_commands() {
        let text = commands_text(&[Message::Backtrace]);
        assert_eq!(text, Bytes::from(format!("backtrace\nprint '{}'\n", SENTINEL)));

        let text = commands_text(&[]);
        assert_eq!(text, Bytes::from(format!("print '{}'\n", SENTINEL)));
    }
}
