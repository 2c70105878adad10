//! Runs the real process handling against a scripted stand in for bashdb.

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::time::Duration;

use bashdap_bashdb::get_debugger;
use bashdap_core::config::{Config, LaunchArguments};
use bashdap_core::debugger::{DebuggerCmd, DebuggerQueueItem, DebuggerResponse};
use bashdap_core::notifier::{Notification, OutputCategory};

use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;

/// Understands just enough of bashdb's command language, talking to its
/// terminal the same way bashdb does.
const FAKE_BASHDB: &str = r#"#!/bin/bash
tty=$3
program=$5
exec 3>"$tty"

echo "($program:1):" >&3
echo "1:	echo hi" >&3
n=0
bp=0
printf 'bashdb<%d> ' $n >&3

while read -r cmd; do
    n=$((n + 1))
    case "$cmd" in
        "print '"*)
            text=${cmd#print \'}
            echo "${text%\'}" >&3
            ;;
        "break "*)
            location=${cmd#break }
            bp=$((bp + 1))
            echo "Breakpoint $bp set in file ${location%:*}, line ${location##*:}." >&3
            ;;
        backtrace)
            echo "->0 in file \`$program' at line 1" >&3
            ;;
        continue)
            echo "hi"
            echo "Debugged program terminated normally. Use q to quit or R to restart." >&3
            ;;
        quit)
            exit 0
            ;;
    esac
    printf 'bashdb<%d> ' $n >&3
done
"#;

fn write_script(path: &Path, text: &str) {
    fs::write(path, text).unwrap();
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
}

async fn request(
    queue_tx: &mpsc::Sender<DebuggerQueueItem>,
    cmd: DebuggerCmd,
) -> DebuggerResponse {
    let (tx, rx) = oneshot::channel();
    queue_tx.send((cmd, tx)).await.unwrap();
    rx.await.unwrap().unwrap()
}

#[tokio::test]
async fn check_debugging_session_against_fake_bashdb() {
    let dir = tempfile::tempdir().unwrap();
    let bashdb = dir.path().join("bashdb");
    let program = dir.path().join("s.sh");
    let fifo = dir.path().join("fifo");
    write_script(&bashdb, FAKE_BASHDB);
    write_script(&program, "echo hi\n");

    let launch = LaunchArguments::from_value(serde_json::json!({
        "program": program.to_str().unwrap(),
        "pathBashdb": bashdb.to_str().unwrap(),
        "fifoPath": fifo.to_str().unwrap(),
    }))
    .unwrap();
    let config = Config::new();
    let (notifier_tx, mut notifier_rx) = mpsc::unbounded_channel();
    let (queue_tx, queue_rx) = mpsc::channel(config.back_pressure());

    let (mut process, debugger) = get_debugger(&launch, &config, notifier_tx).unwrap();
    tokio::spawn(debugger.run(queue_rx));

    timeout(Duration::from_secs(20), async {
        assert_eq!(
            request(&queue_tx, DebuggerCmd::Run).await,
            DebuggerResponse::Ready
        );

        let file = program.to_str().unwrap().to_string();
        match request(&queue_tx, DebuggerCmd::SetBreakpoints(file.clone(), vec![1])).await {
            DebuggerResponse::Breakpoints(breakpoints) => {
                assert_eq!(breakpoints.len(), 1);
                assert_eq!(breakpoints[0].id, 1);
                assert_eq!(breakpoints[0].line, 1);
            }
            r => panic!("Unexpected response {:?}", r),
        }

        match request(&queue_tx, DebuggerCmd::StackTrace(None, None)).await {
            DebuggerResponse::StackFrames(frames) => {
                assert_eq!(frames.len(), 1);
                assert_eq!(frames[0].location.name(), file);
            }
            r => panic!("Unexpected response {:?}", r),
        }

        assert_eq!(
            request(&queue_tx, DebuggerCmd::Continue).await,
            DebuggerResponse::Acknowledged
        );

        // Program output and bashdb's own arrive by different routes, either may be first
        let mut saw_output = false;
        let mut terminated = false;
        while !(saw_output && terminated) {
            match notifier_rx.recv().await.unwrap() {
                Notification::Output {
                    category: OutputCategory::Stdout,
                    text,
                } if text == "hi\n" => saw_output = true,
                Notification::Terminated => terminated = true,
                _ => {}
            }
        }

        assert!(process.stop().await.is_some());
    })
    .await
    .unwrap();

    assert!(!fifo.exists());
}
