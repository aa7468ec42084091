//! Scripted command runner.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};

use osnet_common::shell::command_line;
use osnet_common::{CommandRunner, CommonResult, ExecResult};
use tracing::info;

/// [`CommandRunner`] that records commands and replays canned results.
///
/// Replies are matched on the full command line first, then on the program
/// alone. Several replies for the same key are served in order, the last one
/// repeating. Unscripted commands succeed with empty output.
#[derive(Debug, Default)]
pub struct MockRunner {
    replies: RefCell<HashMap<String, VecDeque<ExecResult>>>,
    captured_commands: RefCell<Vec<String>>,
}

impl MockRunner {
    /// Creates a runner where every command succeeds silently.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the reply for one exact command line.
    pub fn with_reply(self, program: &str, args: &[&str], result: ExecResult) -> Self {
        self.push_reply(command_line(program, args), result);
        self
    }

    /// Scripts the reply for every invocation of `program`.
    pub fn with_program_reply(self, program: &str, result: ExecResult) -> Self {
        self.push_reply(program.to_string(), result);
        self
    }

    fn push_reply(&self, key: String, result: ExecResult) {
        self.replies
            .borrow_mut()
            .entry(key)
            .or_default()
            .push_back(result);
    }

    fn next_reply(&self, key: &str) -> Option<ExecResult> {
        let mut replies = self.replies.borrow_mut();
        let queue = replies.get_mut(key)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }

    /// Every command line run so far, in order.
    pub fn captured_commands(&self) -> Vec<String> {
        self.captured_commands.borrow().clone()
    }

    /// Returns true if `line` was run.
    pub fn ran(&self, line: &str) -> bool {
        self.captured_commands.borrow().iter().any(|c| c == line)
    }

    /// Number of commands starting with `prefix`.
    pub fn count(&self, prefix: &str) -> usize {
        self.captured_commands
            .borrow()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }
}

impl CommandRunner for MockRunner {
    fn exec(&self, program: &str, args: &[&str]) -> CommonResult<ExecResult> {
        let line = command_line(program, args);
        info!("Mock exec: {}", line);
        self.captured_commands.borrow_mut().push(line.clone());

        Ok(self
            .next_reply(&line)
            .or_else(|| self.next_reply(program))
            .unwrap_or_default())
    }
}
