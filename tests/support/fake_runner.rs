// ABOUTME: Command runner fake that records every invocation and replays scripted outputs.
// ABOUTME: Unscripted commands succeed with empty output.

use async_trait::async_trait;
use keel::runner::{CommandOutput, CommandRunner, CommandSpec, LineStream, RunnerError};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;

struct Rule {
    needle: Vec<String>,
    output: CommandOutput,
    /// How many more times the rule applies; `None` for always.
    remaining: Option<usize>,
}

type LookupHook = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct State {
    calls: Vec<CommandSpec>,
    rules: Vec<Rule>,
    missing_programs: Vec<String>,
    log_lines: Vec<String>,
    on_lookup: Option<LookupHook>,
}

/// Cloning shares the call log, so a test can keep a handle after moving one into a provider.
#[derive(Clone, Default)]
pub struct FakeRunner {
    state: Arc<Mutex<State>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretend `program` is not installed.
    pub fn without_program(self, program: &str) -> Self {
        self.state.lock().missing_programs.push(program.to_string());
        self
    }

    /// Reply with `output` to every command whose args contain `needle`.
    pub fn on(self, needle: &[&str], output: CommandOutput) -> Self {
        self.push_rule(needle, output, None);
        self
    }

    /// Reply with `output` the next `times` matching commands only.
    pub fn on_times(self, needle: &[&str], times: usize, output: CommandOutput) -> Self {
        self.push_rule(needle, output, Some(times));
        self
    }

    pub fn fail_on(self, needle: &[&str], stderr: &str) -> Self {
        self.on(needle, failure(stderr))
    }

    pub fn stdout_on(self, needle: &[&str], stdout: &[u8]) -> Self {
        self.on(needle, success(stdout))
    }

    /// Run `hook` once, during the next program lookup. Lets a test act
    /// between an operation's pre-checks and its lock acquisition.
    pub fn on_next_lookup(self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.state.lock().on_lookup = Some(Box::new(hook));
        self
    }

    /// Lines served by `stream`.
    pub fn with_log_lines(self, lines: &[&str]) -> Self {
        self.state.lock().log_lines = lines.iter().map(|l| l.to_string()).collect();
        self
    }

    fn push_rule(&self, needle: &[&str], output: CommandOutput, remaining: Option<usize>) {
        self.state.lock().rules.push(Rule {
            needle: needle.iter().map(|s| s.to_string()).collect(),
            output,
            remaining,
        });
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.state.lock().calls.clone()
    }

    pub fn count(&self, needle: &[&str]) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| c.has_args(needle))
            .count()
    }

    pub fn called(&self, needle: &[&str]) -> bool {
        self.count(needle) > 0
    }

    pub fn clear(&self) {
        self.state.lock().calls.clear();
    }

    fn reply(&self, spec: &CommandSpec) -> CommandOutput {
        let mut state = self.state.lock();
        state.calls.push(spec.clone());

        let needle_matches = |rule: &Rule| {
            let needle: Vec<&str> = rule.needle.iter().map(String::as_str).collect();
            spec.has_args(&needle) && rule.remaining != Some(0)
        };
        match state.rules.iter_mut().find(|r| needle_matches(r)) {
            Some(rule) => {
                if let Some(n) = rule.remaining.as_mut() {
                    *n -= 1;
                }
                rule.output.clone()
            }
            None => success(b""),
        }
    }
}

pub fn success(stdout: &[u8]) -> CommandOutput {
    CommandOutput {
        exit_code: Some(0),
        stdout: stdout.to_vec(),
        stderr: String::new(),
    }
}

pub fn failure(stderr: &str) -> CommandOutput {
    CommandOutput {
        exit_code: Some(1),
        stdout: Vec::new(),
        stderr: stderr.to_string(),
    }
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, RunnerError> {
        Ok(self.reply(spec))
    }

    async fn stream(&self, spec: &CommandSpec) -> Result<LineStream, RunnerError> {
        self.reply(spec);
        let lines: Vec<std::io::Result<String>> =
            self.state.lock().log_lines.iter().cloned().map(Ok).collect();
        Ok(Box::pin(futures::stream::iter(lines)))
    }

    fn find_program(&self, name: &str) -> Option<PathBuf> {
        let hook = self.state.lock().on_lookup.take();
        if let Some(hook) = hook {
            hook();
        }
        let missing = self.state.lock().missing_programs.iter().any(|p| p == name);
        (!missing).then(|| PathBuf::from("/usr/bin").join(name))
    }
}
