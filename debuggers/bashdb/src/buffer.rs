//! Debugger output buffer
//!
//! Everything bashdb writes to its terminal ends up in a `LineBuffer`. The
//! terminal is read in arbitrary chunks so lines are stitched back together
//! here, and the sentinel printed after every command is looked for to find
//! out when a command has finished.

use std::ops::Range;

/// Printed after every command, when we see it the command's output is complete.
pub const SENTINEL: &str = "############################################################";

/// bashdb prompts look like `bashdb<3> ` or `bashdb<(3)> ` in subshells.
const PROMPT_PREFIX: &str = "bashdb<";

/// Remove a leading bashdb prompt from a line.
///
/// The prompt is printed on the same line as the output of the next command, so
/// `bashdb<1> Breakpoint 1 set in file /s.sh, line 5.` becomes
/// `Breakpoint 1 set in file /s.sh, line 5.`.
pub fn strip_prompt(line: &str) -> &str {
    if !line.starts_with(PROMPT_PREFIX) {
        return line;
    }

    match line.find("> ") {
        Some(i) => &line[i + 2..],
        None => line,
    }
}

/// Append only history of every line of debugger output.
///
/// The last line is always the one currently being written to, it's empty at
/// the start and after every newline. All lines before the cursor are
/// complete and have had any prompt stripped.
#[derive(Debug)]
pub struct LineBuffer {
    lines: Vec<String>,
    cursor: usize,
}

impl LineBuffer {
    pub fn new() -> Self {
        LineBuffer {
            lines: vec![String::new()],
            cursor: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines[..]
    }

    /// Add a chunk of output, returning the range of lines it completed.
    pub fn append(&mut self, chunk: &str) -> Range<usize> {
        let mut fragments = chunk.split('\n');

        // split always returns at least one item
        if let Some(first) = fragments.next() {
            if let Some(last) = self.lines.last_mut() {
                last.push_str(first);
            }
        }

        self.lines.extend(fragments.map(|s| s.to_string()));

        let from = self.cursor;
        while self.cursor < self.lines.len() - 1 {
            let line = &mut self.lines[self.cursor];
            let stripped = strip_prompt(line);
            if stripped.len() != line.len() {
                *line = stripped.to_string();
            }
            self.cursor += 1;
        }

        from..self.cursor
    }

    /// Check whether a command submitted when the buffer was `high_water_mark` lines long has
    /// finished, returning the index of its sentinel line if so.
    ///
    /// The command's output starts on the prompt line it was typed at, `high_water_mark - 1`,
    /// and a finished command leaves its sentinel followed by a fresh prompt.
    pub fn completed_since(&self, high_water_mark: usize) -> Option<usize> {
        if self.lines.len() < 2 {
            return None;
        }

        let index = self.lines.len() - 2;
        if index + 1 >= high_water_mark && self.lines[index] == SENTINEL {
            Some(index)
        } else {
            None
        }
    }

    /// The output of a finished command, excluding its sentinel.
    pub fn captured(&self, high_water_mark: usize, sentinel_index: usize) -> &[String] {
        let from = high_water_mark.saturating_sub(1).min(sentinel_index);
        &self.lines[from..sentinel_index]
    }
}

impl Default for LineBuffer {
    fn default() -> Self {
        LineBuffer::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_lines_reassembled_across_any_split() {
        let text = "bashdb<0> (/s.sh:3):\n3:\techo hi\nbashdb<1> ";

        for split in 0..=text.len() {
            let mut buffer = LineBuffer::new();
            buffer.append(&text[..split]);
            buffer.append(&text[split..]);

            assert_eq!(buffer.len(), 3, "split at {}", split);
            assert_eq!(buffer.lines()[0], "(/s.sh:3):");
            assert_eq!(buffer.lines()[1], "3:\techo hi");
            assert_eq!(buffer.lines()[2], "bashdb<1> ");
        }
    }

    #[test]
    fn check_lines_reassembled_from_single_bytes() {
        let text = "a\nbb\n\nccc\n";
        let mut buffer = LineBuffer::new();

        for i in 0..text.len() {
            buffer.append(&text[i..i + 1]);
        }

        assert_eq!(buffer.lines(), &["a", "bb", "", "ccc", ""]);
    }

    #[test]
    fn check_append_returns_completed_lines() {
        let mut buffer = LineBuffer::new();

        assert_eq!(buffer.append("abc"), 0..0);
        assert_eq!(buffer.append("def\nghi\njk"), 0..2);
        assert_eq!(buffer.append("l"), 2..2);
        assert_eq!(buffer.append("\n"), 2..3);
        assert_eq!(buffer.lines()[2], "jkl");
    }

    #[test]
    fn check_prompt_stripped() {
        assert_eq!(strip_prompt("bashdb<1> 42"), "42");
        assert_eq!(strip_prompt("bashdb<(2)> "), "");
        assert_eq!(strip_prompt("bashdb<3>  <$PWD> "), " <$PWD> ");
    }

    #[test]
    fn check_non_prompt_unchanged() {
        assert_eq!(strip_prompt("hello > world"), "hello > world");
        assert_eq!(strip_prompt(" bashdb<1> x"), " bashdb<1> x");
        assert_eq!(strip_prompt("bashdb<1>"), "bashdb<1>");
    }

    #[test]
    fn check_prompt_stripped_when_line_completes() {
        let mut buffer = LineBuffer::new();

        buffer.append("bashdb<0> ");
        assert_eq!(buffer.lines()[0], "bashdb<0> ");

        buffer.append("Breakpoint 1 set in file /s.sh, line 5.\nbashdb<1> ");
        assert_eq!(
            buffer.lines(),
            &["Breakpoint 1 set in file /s.sh, line 5.", "bashdb<1> "]
        );
    }

    #[test]
    fn check_completion_needs_sentinel_then_prompt() {
        let mut buffer = LineBuffer::new();
        buffer.append("bashdb<0> ");
        let high_water_mark = buffer.len();

        buffer.append(SENTINEL);
        assert_eq!(buffer.completed_since(high_water_mark), None);

        buffer.append("\nbashdb<1> ");
        assert_eq!(buffer.completed_since(high_water_mark), Some(0));
    }

    #[test]
    fn check_completion_ignores_earlier_sentinels() {
        let mut buffer = LineBuffer::new();
        buffer.append(&format!("bashdb<0> {}\nbashdb<1> ", SENTINEL));
        assert_eq!(buffer.completed_since(1), Some(0));

        let high_water_mark = buffer.len();
        buffer.append("42\n");
        assert_eq!(buffer.completed_since(high_water_mark), None);

        buffer.append(&format!("{}\nbashdb<2> ", SENTINEL));
        assert_eq!(buffer.completed_since(high_water_mark), Some(2));
    }

    #[test]
    fn check_captured_output_starts_at_prompt_line() {
        let mut buffer = LineBuffer::new();
        buffer.append(&format!("bashdb<0> {}\nbashdb<1> ", SENTINEL));
        let high_water_mark = buffer.len();

        buffer.append(&format!(" <$$> \n1234\n{}\nbashdb<2> ", SENTINEL));
        let sentinel_index = buffer.completed_since(high_water_mark).unwrap();

        assert_eq!(buffer.captured(high_water_mark, sentinel_index), &[" <$$> ", "1234"]);
    }
}
