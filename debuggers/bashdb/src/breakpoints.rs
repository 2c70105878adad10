//! Breakpoint ledger
//!
//! Records the ids bashdb gave the breakpoints we've installed in each file.
//! Every `setBreakpoints` request describes all breakpoints for a file so the
//! old ones are deleted and the file's entry is swapped for the new set.

use std::collections::HashMap;

use bashdap_core::debugger::BreakpointRecord;

#[derive(Debug, Default)]
pub struct BreakpointLedger {
    files: HashMap<String, Vec<BreakpointRecord>>,
}

impl BreakpointLedger {
    pub fn new() -> Self {
        BreakpointLedger {
            files: HashMap::new(),
        }
    }

    /// The debugger ids currently installed in `file`
    pub fn ids(&self, file: &str) -> Vec<i64> {
        match self.files.get(file) {
            Some(records) => records.iter().map(|r| r.id).collect(),
            None => vec![],
        }
    }

    /// Replace everything known about `file`, returning the ids that were dropped.
    pub fn replace(&mut self, file: &str, records: Vec<BreakpointRecord>) -> Vec<i64> {
        let old = if records.is_empty() {
            self.files.remove(file)
        } else {
            self.files.insert(file.to_string(), records)
        };

        old.unwrap_or_default().iter().map(|r| r.id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: i64, line: i64) -> BreakpointRecord {
        BreakpointRecord {
            id,
            line,
            requested_line: line,
        }
    }

    #[test]
    fn check_unknown_file_has_no_ids() {
        let ledger = BreakpointLedger::new();
        assert!(ledger.ids("/s.sh").is_empty());
    }

    #[test]
    fn check_second_set_replaces_first() {
        let mut ledger = BreakpointLedger::new();

        let dropped = ledger.replace("/s.sh", vec![record(1, 3), record(2, 7)]);
        assert!(dropped.is_empty());
        assert_eq!(ledger.ids("/s.sh"), vec![1, 2]);

        let dropped = ledger.replace("/s.sh", vec![record(3, 7), record(4, 9)]);
        assert_eq!(dropped, vec![1, 2]);
        assert_eq!(ledger.ids("/s.sh"), vec![3, 4]);
    }

    #[test]
    fn check_files_kept_apart() {
        let mut ledger = BreakpointLedger::new();

        ledger.replace("/a.sh", vec![record(1, 3)]);
        ledger.replace("/b.sh", vec![record(2, 3)]);
        ledger.replace("/a.sh", vec![]);

        assert!(ledger.ids("/a.sh").is_empty());
        assert_eq!(ledger.ids("/b.sh"), vec![2]);
    }
}
