//! In-process `TB` implementation.
//!
//! A `Recorder` keeps everything a flow reports: logs, the failed and skipped
//! flags, a [`TestingCase`] for every finished sub-run, and the cleanup stack.
//! It is the host adapter behind [`crate::run`] and doubles as a test double
//! for code written against `TB`.

use std::path::PathBuf;

use crate::config::{Config, SEED_ENV};
use crate::doc::{DocumentFormat, TestingCase};
use crate::flow::{self, FlowExit, Outcome};
use crate::tb::{Cleanup, RunBody, TB};

/// One logged line. `origin` names the sub-run that logged it, relative to
/// the recorder holding the line; it is empty for the recorder's own lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub origin: Vec<String>,
    pub message: String,
}

impl LogLine {
    fn own(message: impl Into<String>) -> Self {
        Self {
            origin: Vec::new(),
            message: message.into(),
        }
    }
}

pub struct Recorder {
    path: Vec<String>,
    failed: bool,
    skipped: bool,
    logs: Vec<LogLine>,
    cleanups: Vec<Cleanup>,
    cases: Vec<TestingCase>,
}

/// What a finished, isolated flow reported. Unlike a `Recorder` it can cross
/// threads. Log origins and case paths are relative to the flow itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub name: String,
    pub failed: bool,
    pub skipped: bool,
    pub logs: Vec<LogLine>,
    pub cases: Vec<TestingCase>,
}

impl RunReport {
    /// Reproduces the report on `tb`: its own logs, every recorded sub-run as
    /// a real sub-run of `tb`, then failure, then skip.
    pub fn replay(&self, tb: &mut dyn TB) {
        self.replay_scope(&[], tb);
        if self.failed {
            tb.fail();
        }
        if self.skipped {
            tb.skip_now();
        }
    }

    fn replay_scope(&self, scope: &[String], tb: &mut dyn TB) {
        for line in self.logs.iter().filter(|l| l.origin == scope) {
            tb.log(&line.message);
        }
        let children = self
            .cases
            .iter()
            .filter(|c| c.path.len() == scope.len() + 1 && c.path.starts_with(scope));
        for case in children {
            let Some(name) = case.path.last() else {
                continue;
            };
            tb.run(name, &mut |tb: &mut dyn TB| {
                self.replay_scope(&case.path, tb);
                if case.failed {
                    tb.fail();
                }
                if case.skipped {
                    tb.skip_now();
                }
            });
        }
    }
}

impl Recorder {
    pub fn new(name: &str) -> Self {
        Self {
            path: vec![name.to_string()],
            failed: false,
            skipped: false,
            logs: Vec::new(),
            cleanups: Vec::new(),
            cases: Vec::new(),
        }
    }

    /// A recorder named as if it were the `name` sub-run of `parent`, for
    /// flows that run apart from their host and are replayed later.
    pub fn detached(parent: &str, name: &str) -> Self {
        let mut recorder = Self::new(parent);
        recorder.path.push(name.to_string());
        recorder
    }

    /// A recorder named after the current `#[test]` function.
    pub fn host() -> Self {
        let current = std::thread::current();
        Self::new(current.name().unwrap_or("testcase"))
    }

    fn child(&self, name: &str) -> Self {
        let mut child = Self::new(name);
        child.path = self.path.clone();
        child.path.push(name.to_string());
        child
    }

    /// Logged lines; lines from sub-runs are prefixed with the sub-run's
    /// full name.
    pub fn logs(&self) -> Vec<String> {
        self.logs.iter().map(|line| self.render(line)).collect()
    }

    fn render(&self, line: &LogLine) -> String {
        if line.origin.is_empty() {
            return line.message.clone();
        }
        format!("{}/{}: {}", self.name(), line.origin.join("/"), line.message)
    }

    /// Every finished sub-run, innermost first.
    pub fn cases(&self) -> &[TestingCase] {
        &self.cases
    }

    /// Runs `f` as a flow on this recorder, absorbing its exit.
    pub fn execute<F: FnOnce(&mut dyn TB)>(&mut self, f: F) {
        let outcome = flow::guard(|| f(self));
        self.absorb(outcome);
    }

    fn absorb(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Completed => {}
            Outcome::Exited(FlowExit::Fail) => self.failed = true,
            Outcome::Exited(FlowExit::Skip) => self.skipped = true,
            Outcome::Panicked(payload) => {
                let message = flow::payload_message(payload.as_ref());
                self.logs.push(LogLine::own(format!("panicked: {}", message)));
                self.failed = true;
            }
        }
    }

    /// Runs pending cleanups, last registered first. A cleanup registered
    /// while cleaning up joins the same stack.
    pub fn finish(&mut self) {
        while let Some(cleanup) = self.cleanups.pop() {
            let outcome = flow::guard(|| cleanup(self));
            self.absorb(outcome);
        }
    }

    pub fn into_report(mut self) -> RunReport {
        self.finish();
        let depth = self.path.len();
        let cases = std::mem::take(&mut self.cases)
            .into_iter()
            .map(|mut case| {
                case.path.drain(..depth.min(case.path.len()));
                case
            })
            .collect();
        RunReport {
            name: self.name(),
            failed: self.failed,
            skipped: self.skipped,
            logs: std::mem::take(&mut self.logs),
            cases,
        }
    }

    /// Runs cleanups and renders what a host flow prints when it ends: the
    /// logs, the seed when verbose, and the document report.
    pub fn summary(&mut self, config: &Config) -> String {
        self.finish();
        let mut out: Vec<String> = self.logs();
        if config.verbose {
            out.push(format!("{}={}", SEED_ENV, config.seed));
        }
        let report = DocumentFormat::from_config(config).format(&self.cases);
        if !report.is_empty() {
            out.push(report);
        }
        out.join("\n")
    }

    /// Ends a host flow: prints its [`Recorder::summary`] and panics when the
    /// flow failed so the enclosing `#[test]` fails too.
    pub fn conclude(mut self, config: &Config) {
        let summary = self.summary(config);
        if !summary.is_empty() {
            eprintln!("{}", summary);
        }
        if self.failed {
            panic!("{} failed", self.name());
        }
    }
}

impl TB for Recorder {
    fn name(&self) -> String {
        self.path.join("/")
    }

    fn fail(&mut self) {
        self.failed = true;
    }

    fn fail_now(&mut self) -> ! {
        self.failed = true;
        flow::exit(FlowExit::Fail)
    }

    fn failed(&self) -> bool {
        self.failed
    }

    fn log(&mut self, message: &str) {
        self.logs.push(LogLine::own(message));
    }

    fn skip_now(&mut self) -> ! {
        self.skipped = true;
        flow::exit(FlowExit::Skip)
    }

    fn skipped(&self) -> bool {
        self.skipped
    }

    fn cleanup(&mut self, f: Cleanup) {
        self.cleanups.push(f);
    }

    fn temp_dir(&mut self) -> Option<PathBuf> {
        let dir = match tempfile::Builder::new().prefix("testcase-").tempdir() {
            Ok(dir) => dir,
            Err(err) => self.fatal(&format!("creating temp dir: {}", err)),
        };
        let path = dir.path().to_path_buf();
        self.cleanup(Box::new(move |_| drop(dir)));
        Some(path)
    }

    fn run(&mut self, name: &str, body: RunBody<'_>) -> bool {
        let mut child = self.child(name);
        child.execute(|tb| body(tb));
        child.finish();

        if child.failed {
            self.failed = true;
        }
        self.logs.extend(child.logs.drain(..).map(|mut line| {
            line.origin.insert(0, name.to_string());
            line
        }));
        self.cases.append(&mut child.cases);
        self.cases.push(TestingCase::new(
            child.path.clone(),
            child.failed,
            child.skipped,
        ));
        !child.failed
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        if !self.cleanups.is_empty() && !std::thread::panicking() {
            self.finish();
        }
    }
}
