//! The `TB` capability surface.
//!
//! `TB` is the minimal set of operations a test context must provide for the
//! spec runner to drive it: failing, skipping, logging, cleanups, temp dirs and
//! named sub-runs. [`Recorder`] is the in-process implementation used both as
//! the host adapter for `#[test]` functions and as a test double.
//!
//! Implementations must raise flow exits through [`crate::flow::exit`] so the
//! runner can still fire finalisers on the way out.

use std::fmt;
use std::path::PathBuf;

pub mod contract;
pub mod recorder;

pub use contract::TBContract;
pub use recorder::Recorder;

/// A cleanup callback. It receives the `TB` it was registered on, so it may
/// log, fail, or register further cleanups.
pub type Cleanup = Box<dyn FnOnce(&mut dyn TB)>;

/// Sub-run body.
pub type RunBody<'a> = &'a mut dyn FnMut(&mut dyn TB);

pub trait TB {
    /// Full name of the flow, sub-run names joined with `/`.
    fn name(&self) -> String;

    /// Marks the flow failed and keeps going.
    fn fail(&mut self);

    /// Marks the flow failed and exits it.
    fn fail_now(&mut self) -> !;

    fn failed(&self) -> bool;

    fn log(&mut self, message: &str);

    /// Marks the flow skipped and exits it.
    fn skip_now(&mut self) -> !;

    fn skipped(&self) -> bool;

    /// Marks the caller as a helper frame. Adapters without stack trimming
    /// ignore it.
    fn helper(&mut self) {}

    /// Registers `f` to run when the flow ends, after any later registrations.
    fn cleanup(&mut self, f: Cleanup);

    /// Creates a fresh directory removed at flow end, or `None` when the
    /// adapter has no temp dir support.
    fn temp_dir(&mut self) -> Option<PathBuf>;

    /// Runs `body` as a named nested flow. Returns whether it passed.
    fn run(&mut self, name: &str, body: RunBody<'_>) -> bool;

    fn error(&mut self, message: &str) {
        self.log(message);
        self.fail();
    }

    fn errorf(&mut self, args: fmt::Arguments<'_>) {
        self.error(&args.to_string());
    }

    fn fatal(&mut self, message: &str) -> ! {
        self.log(message);
        self.fail_now()
    }

    fn fatalf(&mut self, args: fmt::Arguments<'_>) -> ! {
        self.fatal(&args.to_string())
    }

    fn logf(&mut self, args: fmt::Arguments<'_>) {
        self.log(&args.to_string());
    }

    fn skip(&mut self, message: &str) -> ! {
        self.log(message);
        self.skip_now()
    }

    fn skipf(&mut self, args: fmt::Arguments<'_>) -> ! {
        self.skip(&args.to_string())
    }
}
