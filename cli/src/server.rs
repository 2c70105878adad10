//! Serve the Debug Adapter Protocol over stdin and stdout, passing requests on to
//! the debugger and debugger notifications back as events.

use std::io::{self, BufReader, BufWriter, Stdin, Stdout, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use dap::events::{Event, ExitedEventBody, OutputEventBody, StoppedEventBody};
use dap::requests::{Command, Request};
use dap::responses::{
    ContinueResponse, EvaluateResponse, Response, ResponseBody, ScopesResponse,
    SetBreakpointsResponse, StackTraceResponse, ThreadsResponse, VariablesResponse,
};
use dap::server::{Server, ServerOutput};
use dap::types::{
    Breakpoint, Capabilities, OutputEventCategory, Scope, Source, StackFrame, StoppedEventReason,
    Thread, Variable,
};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, info, warn};

use bashdap_core::config::Config;
use bashdap_core::debugger::{
    BreakpointRecord, DebuggerCmd, DebuggerResponse, StackFrameRecord, VariableRecord,
};
use bashdap_core::notifier::{Notification, OutputCategory, StopReason};

use crate::debugger::{response, Debugger, ResponseRx};

/// bash is single threaded, there's only ever this one
const THREAD_ID: i64 = 42;
const THREAD_NAME: &str = "Bash";

const LOCALS_NAME: &str = "Locals";
const LOCALS_REFERENCE: i64 = 1;

type Output<W> = Arc<Mutex<ServerOutput<W>>>;

/// Run the adapter until the client disconnects or closes stdin
pub async fn run(config: Config) -> anyhow::Result<()> {
    let server = Server::new(BufReader::new(io::stdin()), BufWriter::new(io::stdout()));
    let output = server.output.clone();

    // The protocol library reads stdin blocking so it gets a thread of its own
    let (request_tx, mut request_rx) = mpsc::unbounded_channel();
    thread::spawn(move || read_requests(server, request_tx));

    let (notifier_tx, notifier_rx) = mpsc::unbounded_channel();
    let disconnecting = Arc::new(AtomicBool::new(false));
    tokio::spawn(forward_notifications(
        notifier_rx,
        output.clone(),
        disconnecting.clone(),
    ));

    let mut debugger = Debugger::new(config, notifier_tx);

    while let Some(req) = request_rx.recv().await {
        debug!("{}: {:?}", req.seq, req.command);

        match handle_request(req, &mut debugger, &output, &disconnecting).await {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => error!("{}", e),
        }
    }

    if let Some(exit_code) = debugger.stop().await {
        info!("bashdb exited with {}", exit_code);
    }

    Ok(())
}

fn read_requests(mut server: Server<Stdin, Stdout>, request_tx: UnboundedSender<Request>) {
    loop {
        match server.poll_request() {
            Ok(Some(req)) => {
                if request_tx.send(req).is_err() {
                    break;
                }
            }
            Ok(None) => {
                info!("Client closed the connection");
                break;
            }
            Err(e) => error!("Can't read request: {}", e),
        }
    }
}

/// Returns false once the adapter should shut down.
///
/// Nothing here waits on bashdb except disconnect, replies to queued commands are sent from
/// their own tasks.
async fn handle_request<W>(
    req: Request,
    debugger: &mut Debugger,
    output: &Output<W>,
    disconnecting: &AtomicBool,
) -> anyhow::Result<bool>
where
    W: Write + Send + 'static,
{
    match &req.command {
        Command::Initialize(_) => {
            respond(output, req.success(ResponseBody::Initialize(capabilities())));
        }
        Command::Launch(args) => {
            let arguments = args.additional_data.clone();
            match debugger.launch(arguments) {
                Ok(rx) => {
                    let output = output.clone();
                    tokio::spawn(async move {
                        match response(rx).await {
                            Ok(_) => {
                                respond(&output, req.success(ResponseBody::Launch));
                                send_event(&output, Event::Initialized);
                            }
                            Err(e) => respond(&output, req.error(&e.to_string())),
                        }
                    });
                }
                Err(e) => respond(output, req.error(&e.to_string())),
            }
        }
        Command::ConfigurationDone => {
            respond(output, req.success(ResponseBody::ConfigurationDone));

            if debugger.stop_on_entry() {
                send_event(output, stopped_event(StopReason::Entry, None));
            } else {
                let rx = debugger.submit(DebuggerCmd::Continue)?;
                tokio::spawn(async move {
                    if let Err(e) = response(rx).await {
                        warn!("Can't start the program: {}", e);
                    }
                });
            }
        }
        Command::Disconnect(_) => {
            disconnecting.store(true, Ordering::SeqCst);
            if let Some(exit_code) = debugger.stop().await {
                info!("bashdb exited with {}", exit_code);
            }
            respond(output, req.success(ResponseBody::Disconnect));
            return Ok(false);
        }
        Command::SetBreakpoints(args) => {
            let path = match &args.source.path {
                Some(path) => path.clone(),
                None => {
                    respond(output, req.error("Breakpoints need a source path"));
                    return Ok(true);
                }
            };
            let lines: Vec<i64> = args.breakpoints.iter().flatten().map(|bp| bp.line).collect();
            let source = args.source.clone();

            let cmd = DebuggerCmd::SetBreakpoints(path, lines.clone());
            submit(debugger, output, req, cmd, move |resp| match resp {
                DebuggerResponse::Breakpoints(records) => {
                    Some(ResponseBody::SetBreakpoints(SetBreakpointsResponse {
                        breakpoints: to_breakpoints(&lines, &source, &records),
                    }))
                }
                _ => None,
            });
        }
        Command::Threads => {
            respond(
                output,
                req.success(ResponseBody::Threads(ThreadsResponse {
                    threads: vec![Thread {
                        id: THREAD_ID,
                        name: THREAD_NAME.to_string(),
                    }],
                })),
            );
        }
        Command::StackTrace(args) => {
            let cmd = DebuggerCmd::StackTrace(args.start_frame, args.levels);
            submit(debugger, output, req, cmd, |resp| match resp {
                DebuggerResponse::StackFrames(frames) => {
                    Some(ResponseBody::StackTrace(StackTraceResponse {
                        stack_frames: to_stack_frames(&frames),
                        total_frames: None,
                    }))
                }
                _ => None,
            });
        }
        Command::Scopes(_) => {
            respond(
                output,
                req.success(ResponseBody::Scopes(ScopesResponse {
                    scopes: vec![Scope {
                        name: LOCALS_NAME.to_string(),
                        variables_reference: LOCALS_REFERENCE,
                        expensive: false,
                        ..Default::default()
                    }],
                })),
            );
        }
        Command::Variables(args) => {
            if args.variables_reference != LOCALS_REFERENCE {
                respond(
                    output,
                    req.success(ResponseBody::Variables(VariablesResponse { variables: vec![] })),
                );
                return Ok(true);
            }

            submit(debugger, output, req, DebuggerCmd::Variables, |resp| match resp {
                DebuggerResponse::Variables(variables) => {
                    Some(ResponseBody::Variables(VariablesResponse {
                        variables: to_variables(&variables),
                    }))
                }
                _ => None,
            });
        }
        Command::Continue(_) => {
            submit(debugger, output, req, DebuggerCmd::Continue, |_| {
                Some(ResponseBody::Continue(ContinueResponse {
                    all_threads_continued: Some(true),
                }))
            });
        }
        Command::Next(_) => {
            submit(debugger, output, req, DebuggerCmd::Next, |_| Some(ResponseBody::Next));
        }
        Command::StepIn(_) => {
            submit(debugger, output, req, DebuggerCmd::StepIn, |_| Some(ResponseBody::StepIn));
        }
        Command::StepOut(_) => {
            submit(debugger, output, req, DebuggerCmd::StepOut, |_| Some(ResponseBody::StepOut));
        }
        Command::Evaluate(args) => {
            let cmd = DebuggerCmd::Evaluate(args.expression.clone());
            submit(debugger, output, req, cmd, |resp| match resp {
                DebuggerResponse::Evaluated(result) => {
                    Some(ResponseBody::Evaluate(EvaluateResponse {
                        result,
                        type_field: Some("string".to_string()),
                        variables_reference: 0,
                        ..Default::default()
                    }))
                }
                _ => None,
            });
        }
        _ => {
            warn!("Unsupported command: {:?}", req.command);
            respond(output, req.cancellation());
        }
    }

    Ok(true)
}

/// Queue the command and respond once the debugger replies, `body` builds the response from
/// the reply.
fn submit<W, F>(debugger: &Debugger, output: &Output<W>, req: Request, cmd: DebuggerCmd, body: F)
where
    W: Write + Send + 'static,
    F: FnOnce(DebuggerResponse) -> Option<ResponseBody> + Send + 'static,
{
    match debugger.submit(cmd) {
        Ok(rx) => respond_when_done(output.clone(), req, rx, body),
        Err(e) => respond(output, req.error(&e.to_string())),
    }
}

fn respond_when_done<W, F>(output: Output<W>, req: Request, rx: ResponseRx, body: F)
where
    W: Write + Send + 'static,
    F: FnOnce(DebuggerResponse) -> Option<ResponseBody> + Send + 'static,
{
    tokio::spawn(async move {
        let resp = match response(rx).await {
            Ok(resp) => match body(resp) {
                Some(body) => req.success(body),
                None => req.error("Unexpected response from debugger"),
            },
            Err(e) => req.error(&e.to_string()),
        };

        respond(&output, resp);
    });
}

fn respond<W: Write>(output: &Output<W>, resp: Response) {
    if let Err(e) = output.lock().unwrap().respond(resp) {
        error!("Can't send response: {}", e);
    }
}

fn send_event<W: Write>(output: &Output<W>, event: Event) {
    if let Err(e) = output.lock().unwrap().send_event(event) {
        error!("Can't send event: {}", e);
    }
}

async fn forward_notifications<W: Write>(
    mut notifier_rx: UnboundedReceiver<Notification>,
    output: Output<W>,
    disconnecting: Arc<AtomicBool>,
) {
    while let Some(notification) = notifier_rx.recv().await {
        for event in notification_events(notification, disconnecting.load(Ordering::SeqCst)) {
            send_event(&output, event);
        }
    }
}

fn capabilities() -> Capabilities {
    Capabilities {
        supports_configuration_done_request: Some(true),
        supports_evaluate_for_hovers: Some(true),
        ..Default::default()
    }
}

/// The events to send the client for a notification.
///
/// bashdb exiting by itself ends the session, if we're the ones stopping it the client
/// already knows.
fn notification_events(notification: Notification, disconnecting: bool) -> Vec<Event> {
    match notification {
        Notification::Output { category, text } => vec![Event::Output(OutputEventBody {
            category: Some(output_category(category)),
            output: text,
            ..Default::default()
        })],
        Notification::Stopped {
            reason,
            breakpoint_id,
        } => vec![stopped_event(reason, breakpoint_id)],
        Notification::Terminated => vec![Event::Terminated(None)],
        Notification::ProcessExited { exit_code, .. } if !disconnecting => vec![
            Event::Exited(ExitedEventBody { exit_code }),
            Event::Terminated(None),
        ],
        Notification::ProcessExited { .. } => vec![],
    }
}

fn output_category(category: OutputCategory) -> OutputEventCategory {
    match category {
        OutputCategory::Console => OutputEventCategory::Console,
        OutputCategory::Stdout => OutputEventCategory::Stdout,
        OutputCategory::Stderr => OutputEventCategory::Stderr,
    }
}

fn stopped_event(reason: StopReason, breakpoint_id: Option<i64>) -> Event {
    let reason = match reason {
        StopReason::Entry => StoppedEventReason::Entry,
        StopReason::Breakpoint => StoppedEventReason::Breakpoint,
        StopReason::Step => StoppedEventReason::Step,
    };

    Event::Stopped(StoppedEventBody {
        reason,
        description: None,
        thread_id: Some(THREAD_ID),
        preserve_focus_hint: None,
        text: None,
        all_threads_stopped: Some(true),
        hit_breakpoint_ids: breakpoint_id.map(|id| vec![id]),
    })
}

/// One breakpoint per requested line, lines bashdb didn't confirm are unverified
fn to_breakpoints(
    requested: &[i64],
    source: &Source,
    records: &[BreakpointRecord],
) -> Vec<Breakpoint> {
    requested
        .iter()
        .map(
            |line| match records.iter().find(|r| r.requested_line == *line) {
                Some(record) => Breakpoint {
                    id: Some(record.id),
                    verified: true,
                    source: Some(source.clone()),
                    line: Some(record.line),
                    ..Default::default()
                },
                None => Breakpoint {
                    verified: false,
                    message: Some("Breakpoint not set by bashdb".to_string()),
                    source: Some(source.clone()),
                    line: Some(*line),
                    ..Default::default()
                },
            },
        )
        .collect()
}

fn to_stack_frames(frames: &[StackFrameRecord]) -> Vec<StackFrame> {
    frames
        .iter()
        .map(|frame| StackFrame {
            id: frame.index,
            name: frame.text.clone(),
            source: Some(Source {
                path: Some(frame.location.name().to_string()),
                ..Default::default()
            }),
            line: frame.location.line_num(),
            column: 1,
            ..Default::default()
        })
        .collect()
}

fn to_variables(variables: &[VariableRecord]) -> Vec<Variable> {
    variables
        .iter()
        .map(|variable| Variable {
            name: variable.name.clone(),
            value: variable.value.clone(),
            variables_reference: 0,
            ..Default::default()
        })
        .collect()
}
