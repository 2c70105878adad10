//! bashdb output analyser
//!
//! Turns the lines a command produced into structured results. bashdb only
//! ever prints text meant for a person so everything here relies on the
//! exact shape of that text. We bracket interesting output with markers,
//! printed by ourselves with `print ' <label> '`, so the line after a marker
//! is known to be the output we asked for.

use bashdap_core::debugger::{BreakpointRecord, FileLocation, StackFrameRecord, VariableRecord};
use bashdap_core::notifier::StopReason;

use regex::Regex;

/// The variables reported for every frame, bash has no way of listing the locals.
pub const WELL_KNOWN_VARIABLES: [&str; 8] = ["$0", "$1", "$2", "$3", "$#", "$$", "$?", "$PWD"];

/// How the program came to a halt after a step like command
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Halt {
    Stopped {
        reason: StopReason,
        breakpoint_id: Option<i64>,
    },
    Terminated,
}

/// The label in a marker line, `None` if it's not a marker.
pub fn marker_label(line: &str) -> Option<&str> {
    if line.len() >= 4 && line.starts_with(" <") && line.ends_with("> ") {
        Some(&line[2..line.len() - 2])
    } else {
        None
    }
}

/// Every marker label along with the line that follows it.
fn marked_lines(lines: &[String]) -> impl Iterator<Item = (&str, &str)> {
    lines
        .windows(2)
        .filter_map(|w| marker_label(&w[0]).map(|label| (label, &w[1][..])))
}

/// Read confirmations of the form `Breakpoint 1 set in file /s.sh, line 5.`
pub fn analyse_breakpoints(lines: &[String]) -> Vec<BreakpointRecord> {
    marked_lines(lines)
        .filter_map(|(label, confirmation)| {
            let tokens: Vec<&str> = confirmation.split_whitespace().collect();

            let id = tokens.get(1)?.parse::<i64>().ok()?;
            let line = tokens.last()?.trim_end_matches('.').parse::<i64>().ok()?;
            let requested_line = label
                .rsplit(':')
                .next()
                .and_then(|s| s.parse::<i64>().ok())
                .unwrap_or(line);

            Some(BreakpointRecord {
                id,
                line,
                requested_line,
            })
        })
        .collect()
}

/// Read a `backtrace`, frames look like one of
///
/// ```text
/// ->0 in file `/s.sh' at line 5
/// ##1 main() called from file `/s.sh' at line 10
/// ```
pub fn analyse_backtrace(lines: &[String]) -> Vec<StackFrameRecord> {
    lines
        .iter()
        .filter(|line| line.starts_with("->") || line.starts_with("##"))
        .filter_map(|line| {
            let index_end = line.find(' ')?;
            let index = line[2..index_end].parse::<i64>().ok()?;

            let path_start = line.rfind('`')? + 1;
            let path_end = line.rfind('\'')?;
            if path_end < path_start {
                return None;
            }

            let line_num = line.split_whitespace().last()?.parse::<i64>().ok()?;

            Some(StackFrameRecord {
                index,
                text: line.to_string(),
                location: FileLocation::new(line[path_start..path_end].to_string(), line_num),
            })
        })
        .collect()
}

/// Read the marker/value pairs of examined variables.
pub fn analyse_variables(lines: &[String]) -> Vec<VariableRecord> {
    marked_lines(lines)
        .map(|(name, value)| VariableRecord {
            name: name.to_string(),
            value: value.to_string(),
        })
        .collect()
}

/// The value of an evaluated expression, empty if the debugger printed nothing.
pub fn analyse_evaluate(lines: &[String]) -> String {
    marked_lines(lines)
        .next()
        .map(|(_, value)| value.to_string())
        .unwrap_or_default()
}

/// Work out why the program stopped after it was set running.
pub fn analyse_halt(lines: &[String]) -> Halt {
    lazy_static! {
        static ref RE_BREAKPOINT_HIT: Regex = Regex::new("^Breakpoint (\\d+) hit").unwrap();
    }

    let mut breakpoint_id = None;

    for line in lines {
        if line.starts_with("Debugged program terminated") {
            return Halt::Terminated;
        }

        if let Some(cap) = RE_BREAKPOINT_HIT.captures(line) {
            breakpoint_id = cap[1].parse::<i64>().ok();
        }
    }

    match breakpoint_id {
        Some(_) => Halt::Stopped {
            reason: StopReason::Breakpoint,
            breakpoint_id,
        },
        None => Halt::Stopped {
            reason: StopReason::Step,
            breakpoint_id: None,
        },
    }
}
